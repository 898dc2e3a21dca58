use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::afit::{CashFlowSeries, calculate_afit, validate_tax_table};
use super::bfit::{BfitSeries, assemble_bfit, econ_limit_metric, validate_npi};
use super::capex::{CapexPass, CapexSummary, place_capex, validate_capex};
use super::depreciation::{Deductions, schedule_deductions, validate_dda_models};
use super::discount::{
    DiscountedCashFlow, cumulative, discount_cash_flow, payout_month, validate_discount_table,
};
use super::econ_limit::{Truncate, find_econ_limit};
use super::error::EvalError;
use super::expense::{ExpenseSummary, aggregate_expenses, validate_expenses};
use super::production_tax::{ProductionTax, calculate_production_tax, validate_production_tax};
use super::report::{EvaluationSummary, Report, build_report, summarize};
use super::revenue::{RevenueSummary, calculate_revenue, validate_pricing};
use super::reversion::{OwnershipSeries, resolve_scheduled, validate_schedule};
use super::types::{EvaluationOptions, ReportingPeriod, TimeAxis, WellInputs};
use super::volumes::{PhaseVolumes, build_volumes, validate_stream};

/// Every series and metric produced for one well. All monthly series share
/// `cash_flow.dates` as their axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub well_id: String,
    pub as_of_date: NaiveDate,
    pub unecon: bool,
    pub econ_limit_date: Option<NaiveDate>,
    /// Months from which each payout-triggered reversion took effect.
    pub payout_reversion_months: Vec<usize>,
    pub ownership: OwnershipSeries,
    pub volumes: PhaseVolumes,
    pub revenue: RevenueSummary,
    pub expenses: ExpenseSummary,
    pub production_tax: ProductionTax,
    pub capex: CapexSummary,
    pub deductions: Deductions,
    pub cash_flow: CashFlowSeries,
    pub bfit: DiscountedCashFlow,
    pub afit: DiscountedCashFlow,
    pub summary: EvaluationSummary,
    pub report: Report,
}

impl EvaluationResult {
    pub fn len(&self) -> usize {
        self.cash_flow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cash_flow.is_empty()
    }
}

/// Outcome of one well inside a batch. A failed well never affects its
/// siblings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub well_id: String,
    #[serde(flatten)]
    pub outcome: BatchEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchEntry {
    Ok { result: Box<EvaluationResult> },
    Failed { error: String },
}

struct PreTax {
    volumes: PhaseVolumes,
    revenue: RevenueSummary,
    expenses: ExpenseSummary,
    production_tax: ProductionTax,
    capex: CapexSummary,
    bfit: BfitSeries,
}

fn validate(inputs: &WellInputs, options: &EvaluationOptions) -> Result<(), EvalError> {
    if inputs.forecast.is_empty() {
        return Err(EvalError::EmptyForecast {
            well_id: inputs.well_id.clone(),
        });
    }
    let forecast = &inputs.forecast;
    let mut volumes = forecast.oil.iter().chain(&forecast.gas).chain(&forecast.water);
    if volumes.any(|v| !v.is_finite()) {
        return Err(EvalError::NonFiniteInput("forecast volume".to_string()));
    }

    validate_stream(&inputs.stream)?;
    validate_pricing(&inputs.pricing)?;
    validate_schedule(&inputs.ownership)?;
    validate_npi(inputs.net_profit_interest)?;
    validate_expenses(&inputs.expenses)?;
    validate_production_tax(&inputs.production_taxes)?;
    validate_capex(&inputs.capex)?;
    validate_dda_models(&inputs.capex, &inputs.dda_models)?;

    let escalations = inputs
        .expenses
        .fixed
        .iter()
        .map(|e| &e.escalation)
        .chain(inputs.expenses.variable.iter().map(|e| &e.escalation))
        .chain(inputs.expenses.water_disposal.iter().map(|e| &e.escalation))
        .chain(inputs.expenses.carbon.iter().map(|e| &e.escalation))
        .chain(inputs.capex.iter().map(|c| &c.escalation));
    for escalation in escalations {
        if !escalation.is_valid() {
            return Err(EvalError::NonFiniteInput(format!(
                "escalation {escalation:?}"
            )));
        }
    }

    validate_options(options)
}

pub fn validate_options(options: &EvaluationOptions) -> Result<(), EvalError> {
    validate_discount_table(&options.discount)?;

    let boe = &options.boe;
    for (name, factor) in [
        ("gas_mcf_per_boe", boe.gas_mcf_per_boe),
        ("ngl_bbl_per_boe", boe.ngl_bbl_per_boe),
        ("drip_condensate_bbl_per_boe", boe.drip_condensate_bbl_per_boe),
    ] {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(EvalError::InvalidOption(format!(
                "{name} must be positive, got {factor}"
            )));
        }
    }

    if options.income_tax.enabled {
        validate_tax_table(&options.income_tax.state, "state")?;
        validate_tax_table(&options.income_tax.federal, "federal")?;
    }

    if !options.econ_limit.threshold.is_finite() {
        return Err(EvalError::InvalidOption(
            "econ limit threshold must be finite".to_string(),
        ));
    }
    if let ReportingPeriod::Fiscal { start_month } = options.reporting {
        if !(1..=12).contains(&start_month) {
            return Err(EvalError::InvalidOption(format!(
                "fiscal year start month must be 1-12, got {start_month}"
            )));
        }
    }
    Ok(())
}

fn run_pre_tax(
    inputs: &WellInputs,
    options: &EvaluationOptions,
    axis: &TimeAxis,
    ownership: &OwnershipSeries,
    fpd_month: i64,
) -> PreTax {
    let volumes = build_volumes(&inputs.forecast, &inputs.stream, &options.boe, ownership);
    let revenue = calculate_revenue(&inputs.pricing, &inputs.stream, &volumes, ownership);
    let expenses = aggregate_expenses(&inputs.expenses, &volumes, &revenue, ownership, fpd_month);
    let production_tax = calculate_production_tax(&inputs.production_taxes, &expenses, &volumes);
    let capex = place_capex(
        &inputs.capex,
        ownership,
        axis,
        fpd_month,
        CapexPass::BeforeEconLimit,
    );
    let bfit = assemble_bfit(
        &revenue,
        &expenses,
        &production_tax,
        &capex.total_net_capex,
        inputs.net_profit_interest,
    );
    PreTax {
        volumes,
        revenue,
        expenses,
        production_tax,
        capex,
        bfit,
    }
}

/// Evaluates one well. Configuration problems are returned as errors; an
/// uneconomic well is a normal result with zero-length series.
pub fn evaluate(
    inputs: &WellInputs,
    options: &EvaluationOptions,
) -> Result<EvaluationResult, EvalError> {
    validate(inputs, options)?;
    let well_id = inputs.well_id.as_str();

    let axis = TimeAxis::new(inputs.as_of_date, inputs.forecast.len());
    let fpd_month = axis.month_of(inputs.first_production_date);
    let mut scheduled = resolve_scheduled(&inputs.ownership, &axis);
    let payout_reversions = std::mem::take(&mut scheduled.payout);
    let mut ownership = scheduled.series(axis.len);
    let mut pre = run_pre_tax(inputs, options, &axis, &ownership, fpd_month);
    debug!(well_id, months = axis.len, "pre-tax stages complete");

    // Each payout reversion is judged on cash flow accumulated since the
    // previous one took effect.
    let mut payout_reversion_months = Vec::new();
    let mut since = 0;
    for reversion in payout_reversions {
        let Some(paid_out) = payout_month(&cumulative(&pre.bfit.cash_flow[since..])) else {
            break;
        };
        let from = since + paid_out + 1;
        if from >= axis.len {
            break;
        }
        scheduled.insert_payout(from, &reversion.interest);
        ownership = scheduled.series(axis.len);
        pre = run_pre_tax(inputs, options, &axis, &ownership, fpd_month);
        payout_reversion_months.push(from);
        since = from;
        debug!(well_id, month = from, "payout reversion applied");
    }

    let capex_for_limit = options
        .econ_limit
        .include_capex
        .then_some(pre.capex.total_net_capex.as_slice());
    let metric = econ_limit_metric(
        &pre.revenue,
        &pre.expenses,
        &pre.production_tax,
        &pre.bfit.net_profit_interest,
        capex_for_limit,
    );
    let limit = find_econ_limit(&metric, &options.econ_limit);
    let kept = limit.len;
    debug!(well_id, kept, unecon = limit.unecon, "econ limit resolved");

    let axis = axis.truncated(kept);
    let ownership = ownership.truncated(kept);
    let volumes = pre.volumes.truncated(kept);
    let revenue = pre.revenue.truncated(kept);
    let expenses = pre.expenses.truncated(kept);
    let production_tax = pre.production_tax.truncated(kept);
    let mut capex = pre.capex.truncated(kept);
    if let Some(econ_month) = limit.econ_limit_month() {
        let trailing = place_capex(
            &inputs.capex,
            &ownership,
            &axis,
            fpd_month,
            CapexPass::AfterEconLimit { econ_month },
        );
        capex = capex.merged(&trailing);
    }

    let bfit = assemble_bfit(
        &revenue,
        &expenses,
        &production_tax,
        &capex.total_net_capex,
        inputs.net_profit_interest,
    );
    let deductions = schedule_deductions(
        &capex.placements,
        &inputs.dda_models,
        &volumes,
        &options.boe,
        fpd_month,
        kept,
    );
    let afit = calculate_afit(&bfit, &deductions, &options.income_tax);
    debug!(well_id, "income tax applied");

    let bfit_discounted = discount_cash_flow(&bfit.cash_flow, &bfit.capex, &options.discount);
    let afit_discounted = discount_cash_flow(&afit.afit_cash_flow, &bfit.capex, &options.discount);

    let mut result = EvaluationResult {
        well_id: inputs.well_id.clone(),
        as_of_date: axis.as_of,
        unecon: limit.unecon,
        econ_limit_date: limit.econ_limit_month().map(|t| axis.date(t)),
        payout_reversion_months,
        ownership,
        volumes,
        revenue,
        expenses,
        production_tax,
        capex,
        deductions,
        cash_flow: CashFlowSeries {
            dates: axis.dates(),
            bfit,
            afit,
        },
        bfit: bfit_discounted,
        afit: afit_discounted,
        summary: EvaluationSummary::empty(&inputs.well_id, axis.as_of),
        report: Report::default(),
    };
    result.summary = summarize(&result);
    result.report = build_report(&result, options.reporting);
    Ok(result)
}

/// Evaluates wells in parallel, preserving input order. `cancel` is checked
/// before each well starts; wells not yet started when it is set are reported
/// as cancelled.
pub fn evaluate_batch(
    wells: &[WellInputs],
    options: &EvaluationOptions,
    cancel: &AtomicBool,
) -> Vec<BatchOutcome> {
    info!(wells = wells.len(), "batch evaluation started");
    let outcomes: Vec<BatchOutcome> = wells
        .par_iter()
        .map(|well| {
            let result = if cancel.load(Ordering::Relaxed) {
                Err(EvalError::Cancelled {
                    well_id: well.well_id.clone(),
                })
            } else {
                evaluate(well, options)
            };
            let outcome = match result {
                Ok(result) => BatchEntry::Ok {
                    result: Box::new(result),
                },
                Err(err) => {
                    warn!(well_id = %well.well_id, error = %err, "well evaluation failed");
                    BatchEntry::Failed {
                        error: err.to_string(),
                    }
                }
            };
            BatchOutcome {
                well_id: well.well_id.clone(),
                outcome,
            }
        })
        .collect();
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o.outcome, BatchEntry::Failed { .. }))
        .count();
    info!(wells = wells.len(), failed, "batch evaluation finished");
    outcomes
}
