use thiserror::Error;

/// Configuration problems that stop one well's evaluation. Numeric
/// degeneracies and uneconomic outcomes are never reported through here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("well {well_id}: forecast has no months")]
    EmptyForecast { well_id: String },

    #[error("capex item {item} references unknown depreciation model '{model}'")]
    UnknownDdaModel { item: usize, model: String },

    #[error("depreciation model '{model}': {reason}")]
    InvalidDdaModel { model: String, reason: String },

    #[error("{table} tax table row {row} starts at month {start}, expected {expected}")]
    TaxBracketGap {
        table: &'static str,
        row: usize,
        start: u32,
        expected: u32,
    },

    #[error("{table} tax table row {row}: {reason}")]
    TaxBracketInvalid {
        table: &'static str,
        row: usize,
        reason: String,
    },

    #[error("discount table has {count} rates, at most {max} allowed")]
    TooManyDiscountRates { count: usize, max: usize },

    #[error("discount rate {0} must be finite and greater than -1")]
    InvalidDiscountRate(f64),

    #[error("{phase} pricing has {count} differentials, at most 3 allowed")]
    TooManyDifferentials { phase: &'static str, count: usize },

    #[error("pricing: {0}")]
    InvalidPricing(String),

    #[error("ownership: {0}")]
    InvalidOwnership(String),

    #[error("stream property {name} must be {allowed}, got {value}")]
    InvalidStreamProperty {
        name: &'static str,
        allowed: &'static str,
        value: f64,
    },

    #[error("expense: {0}")]
    InvalidExpense(String),

    #[error("options: {0}")]
    InvalidOption(String),

    #[error("non-finite input: {0}")]
    NonFiniteInput(String),

    #[error("evaluation cancelled before well {well_id} started")]
    Cancelled { well_id: String },
}
