pub mod afit;
pub mod bfit;
pub mod capex;
pub mod depreciation;
pub mod discount;
pub mod econ_limit;
pub mod engine;
pub mod error;
pub mod expense;
pub mod production_tax;
pub mod registry;
pub mod report;
pub mod revenue;
pub mod reversion;
pub mod solver;
pub mod types;
pub mod volumes;

pub use engine::{
    BatchEntry, BatchOutcome, EvaluationResult, evaluate, evaluate_batch, validate_options,
};
pub use error::EvalError;
pub use registry::{ColumnSpec, column_registry, find_column};
pub use report::{EvaluationSummary, Report, ReportRow};
pub use types::{
    CashAccrualTiming, DiscountMethod, DiscountTable, EconLimitCriteria, EconLimitPolicy,
    EvaluationOptions, IncomeTaxConfig, ReportingPeriod, TaxBracketTable, WellInputs,
};
