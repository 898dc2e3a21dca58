use serde::Serialize;

use super::error::EvalError;
use super::solver::{IrrSolveConfig, solve_irr};
use super::types::{CashAccrualTiming, DiscountMethod, DiscountTable, MAX_DISCOUNT_RATES, sum};

/// Cumulative cash flow discounted at one rate of the discount table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscountedColumn {
    pub rate: f64,
    pub cumulative: Vec<f64>,
    pub present_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnMetrics {
    pub undiscounted_total: f64,
    pub first_discount_npv: f64,
    pub second_discount_npv: f64,
    pub irr: Option<f64>,
    /// Month index after which cumulative cash flow stays non-negative.
    pub payout_month: Option<usize>,
    pub discounted_payout_month: Option<usize>,
    pub roi: Option<f64>,
    pub discounted_roi: Option<f64>,
    pub max_consecutive_negative_months: usize,
    pub negative_months: usize,
}

/// Discounted views and metrics of one cash-flow column (BFIT or AFIT).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscountedCashFlow {
    pub cumulative: Vec<f64>,
    pub first_discount_cash_flow: Vec<f64>,
    pub first_discount_cumulative: Vec<f64>,
    pub second_discount_cash_flow: Vec<f64>,
    pub second_discount_cumulative: Vec<f64>,
    pub table: Vec<DiscountedColumn>,
    pub metrics: ReturnMetrics,
}

pub fn validate_discount_table(table: &DiscountTable) -> Result<(), EvalError> {
    if table.rates.len() > MAX_DISCOUNT_RATES {
        return Err(EvalError::TooManyDiscountRates {
            count: table.rates.len(),
            max: MAX_DISCOUNT_RATES,
        });
    }
    let all_rates = [table.first_discount, table.second_discount]
        .into_iter()
        .chain(table.rates.iter().copied());
    for rate in all_rates {
        if !rate.is_finite() || rate <= -1.0 {
            return Err(EvalError::InvalidDiscountRate(rate));
        }
    }
    Ok(())
}

/// Month position of each cash flow used as the discount exponent.
pub fn accrual_times(len: usize, timing: CashAccrualTiming) -> Vec<f64> {
    let shift = match timing {
        CashAccrualTiming::MidMonth => 0.5,
        CashAccrualTiming::EndMonth => 1.0,
    };
    (0..len).map(|t| t as f64 + shift).collect()
}

pub fn discount_factor(rate: f64, tau: f64, method: DiscountMethod) -> f64 {
    match method {
        DiscountMethod::Yearly => (1.0 + rate).powf(-tau / 12.0),
        DiscountMethod::Monthly => (1.0 + rate / 12.0).powf(-tau),
    }
}

pub fn discounted(cash_flow: &[f64], rate: f64, table: &DiscountTable) -> Vec<f64> {
    let times = accrual_times(cash_flow.len(), table.cash_accrual_time);
    cash_flow
        .iter()
        .zip(&times)
        .map(|(cf, tau)| cf * discount_factor(rate, *tau, table.method))
        .collect()
}

pub fn cumulative(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

/// First month from which the cumulative series never drops below zero again.
pub fn payout_month(cumulative: &[f64]) -> Option<usize> {
    let mut payout = None;
    for (t, value) in cumulative.iter().enumerate().rev() {
        if *value < 0.0 {
            break;
        }
        payout = Some(t);
    }
    payout
}

fn negative_runs(cash_flow: &[f64]) -> (usize, usize) {
    let mut longest = 0;
    let mut current = 0;
    let mut total = 0;
    for value in cash_flow {
        if *value < 0.0 {
            current += 1;
            total += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    (longest, total)
}

fn roi(total: f64, capex: f64) -> Option<f64> {
    (capex > 0.0).then(|| (total + capex) / capex)
}

/// Discounts `cash_flow` at every rate of `table` and derives return metrics.
/// `capex` is the investment the ROI is measured against.
pub fn discount_cash_flow(
    cash_flow: &[f64],
    capex: &[f64],
    table: &DiscountTable,
) -> DiscountedCashFlow {
    let first = discounted(cash_flow, table.first_discount, table);
    let second = discounted(cash_flow, table.second_discount, table);
    let cumulative_cf = cumulative(cash_flow);
    let first_cumulative = cumulative(&first);
    let second_cumulative = cumulative(&second);

    let columns = table
        .rates
        .iter()
        .map(|&rate| {
            let cum = cumulative(&discounted(cash_flow, rate, table));
            DiscountedColumn {
                rate,
                present_value: cum.last().copied().unwrap_or(0.0),
                cumulative: cum,
            }
        })
        .collect();

    let times = accrual_times(cash_flow.len(), table.cash_accrual_time);
    let irr = solve_irr(cash_flow, &times, IrrSolveConfig::default()).irr;
    let (max_consecutive_negative_months, negative_months) = negative_runs(cash_flow);
    let discounted_capex = discounted(capex, table.first_discount, table);

    let metrics = ReturnMetrics {
        undiscounted_total: sum(cash_flow),
        first_discount_npv: sum(&first),
        second_discount_npv: sum(&second),
        irr,
        payout_month: payout_month(&cumulative_cf),
        discounted_payout_month: payout_month(&first_cumulative),
        roi: roi(sum(cash_flow), sum(capex)),
        discounted_roi: roi(sum(&first), sum(&discounted_capex)),
        max_consecutive_negative_months,
        negative_months,
    };

    DiscountedCashFlow {
        cumulative: cumulative_cf,
        first_discount_cash_flow: first,
        first_discount_cumulative: first_cumulative,
        second_discount_cash_flow: second,
        second_discount_cumulative: second_cumulative,
        table: columns,
        metrics,
    }
}
