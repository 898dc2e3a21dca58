use serde::Serialize;

use super::econ_limit::Truncate;
use super::error::EvalError;
use super::expense::ExpenseSummary;
use super::production_tax::ProductionTax;
use super::revenue::RevenueSummary;

/// Pre-income-tax cash flow and the columns it is built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BfitSeries {
    pub total_gross_revenue: Vec<f64>,
    pub total_net_revenue: Vec<f64>,
    pub expense: Vec<f64>,
    pub production_tax: Vec<f64>,
    pub capex: Vec<f64>,
    pub net_profit_interest: Vec<f64>,
    pub net_income: Vec<f64>,
    pub cash_flow: Vec<f64>,
}

pub fn validate_npi(rate: f64) -> Result<(), EvalError> {
    if !(0.0..=1.0).contains(&rate) {
        return Err(EvalError::InvalidOwnership(format!(
            "net profit interest must be within [0, 1], got {rate}"
        )));
    }
    Ok(())
}

/// Net profit interest carve-out. Only positive operating income is shared.
pub fn net_profit_interest(
    revenue: &RevenueSummary,
    expenses: &ExpenseSummary,
    tax: &ProductionTax,
    rate: f64,
) -> Vec<f64> {
    revenue
        .total_net_revenue
        .iter()
        .zip(&expenses.total_expense)
        .zip(&tax.total_production_tax)
        .map(|((r, e), p)| rate * (r - e - p).max(0.0))
        .collect()
}

pub fn assemble_bfit(
    revenue: &RevenueSummary,
    expenses: &ExpenseSummary,
    tax: &ProductionTax,
    capex: &[f64],
    npi_rate: f64,
) -> BfitSeries {
    let npi = net_profit_interest(revenue, expenses, tax, npi_rate);
    let len = npi.len();

    let net_income: Vec<f64> = (0..len)
        .map(|t| {
            revenue.total_net_revenue[t]
                - expenses.total_expense[t]
                - tax.total_production_tax[t]
                - npi[t]
        })
        .collect();
    let cash_flow = net_income.iter().zip(capex).map(|(n, c)| n - c).collect();

    BfitSeries {
        total_gross_revenue: revenue.total_gross_revenue.clone(),
        total_net_revenue: revenue.total_net_revenue.clone(),
        expense: expenses.total_expense.clone(),
        production_tax: tax.total_production_tax.clone(),
        capex: capex.to_vec(),
        net_profit_interest: npi,
        net_income,
        cash_flow,
    }
}

/// Monthly value the econ limit is judged on. Only expenses flagged as
/// affecting the limit count against it.
pub fn econ_limit_metric(
    revenue: &RevenueSummary,
    expenses: &ExpenseSummary,
    tax: &ProductionTax,
    npi: &[f64],
    capex: Option<&[f64]>,
) -> Vec<f64> {
    (0..npi.len())
        .map(|t| {
            let capex = capex.map_or(0.0, |c| c[t]);
            revenue.total_net_revenue[t]
                - expenses.econ_limit_expense[t]
                - tax.total_production_tax[t]
                - npi[t]
                - capex
        })
        .collect()
}

impl Truncate for BfitSeries {
    fn truncated(&self, len: usize) -> Self {
        Self {
            total_gross_revenue: self.total_gross_revenue.truncated(len),
            total_net_revenue: self.total_net_revenue.truncated(len),
            expense: self.expense.truncated(len),
            production_tax: self.production_tax.truncated(len),
            capex: self.capex.truncated(len),
            net_profit_interest: self.net_profit_interest.truncated(len),
            net_income: self.net_income.truncated(len),
            cash_flow: self.cash_flow.truncated(len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Phase, PhaseTable};

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn revenue(net: Vec<f64>) -> RevenueSummary {
        RevenueSummary {
            lines: Vec::new(),
            total_gross_revenue: net.iter().map(|v| v / 0.8).collect(),
            total_net_revenue: net,
        }
    }

    fn expenses(total: Vec<f64>, econ: Vec<f64>) -> ExpenseSummary {
        let len = total.len();
        ExpenseSummary {
            lines: Vec::new(),
            total_fixed_expense: total.clone(),
            variable_by_phase: PhaseTable::from_fn(|_| vec![0.0; len]),
            total_variable_expense: vec![0.0; len],
            water_disposal: vec![0.0; len],
            total_carbon_expense: vec![0.0; len],
            total_expense: total,
            econ_limit_expense: econ,
            severance_base: PhaseTable::from_fn(|_| vec![0.0; len]),
            ad_valorem_base: vec![0.0; len],
        }
    }

    fn tax(total: Vec<f64>) -> ProductionTax {
        let len = total.len();
        ProductionTax {
            severance: PhaseTable::from_fn(|phase| match phase {
                Phase::Oil => total.clone(),
                _ => vec![0.0; len],
            }),
            total_severance_tax: total.clone(),
            ad_valorem_tax: vec![0.0; len],
            total_production_tax: total,
        }
    }

    #[test]
    fn cash_flow_is_income_less_capex() {
        let bfit = assemble_bfit(
            &revenue(vec![1000.0, 500.0, 100.0]),
            &expenses(vec![200.0, 200.0, 200.0], vec![200.0; 3]),
            &tax(vec![50.0, 25.0, 5.0]),
            &[400.0, 0.0, 0.0],
            0.1,
        );
        assert_approx(bfit.net_profit_interest[0], 75.0);
        assert_approx(bfit.net_profit_interest[1], 27.5);
        assert_approx(bfit.net_profit_interest[2], 0.0);
        assert_approx(bfit.net_income[0], 675.0);
        assert_approx(bfit.net_income[2], -105.0);
        assert_approx(bfit.cash_flow[0], 275.0);
        for t in 0..3 {
            assert_approx(
                bfit.cash_flow[t],
                bfit.total_net_revenue[t]
                    - bfit.expense[t]
                    - bfit.production_tax[t]
                    - bfit.capex[t]
                    - bfit.net_profit_interest[t],
            );
        }
    }

    #[test]
    fn econ_metric_ignores_unflagged_expenses() {
        let revenue = revenue(vec![100.0, 100.0]);
        let expenses = expenses(vec![150.0, 150.0], vec![50.0, 50.0]);
        let tax = tax(vec![10.0, 10.0]);
        let npi = vec![0.0, 0.0];
        let metric = econ_limit_metric(&revenue, &expenses, &tax, &npi, None);
        assert_approx(metric[0], 40.0);
        let with_capex = econ_limit_metric(&revenue, &expenses, &tax, &npi, Some(&[100.0, 0.0]));
        assert_approx(with_capex[0], -60.0);
        assert_approx(with_capex[1], 40.0);
    }

    #[test]
    fn npi_rate_outside_unit_interval_is_rejected() {
        assert!(validate_npi(0.25).is_ok());
        assert!(validate_npi(-0.1).is_err());
        assert!(validate_npi(f64::NAN).is_err());
    }
}
