use serde::Serialize;

use super::econ_limit::Truncate;
use super::error::EvalError;
use super::expense::ExpenseSummary;
use super::types::{Phase, PhaseTable, ProductionTaxConfig, add_into};
use super::volumes::PhaseVolumes;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionTax {
    pub severance: PhaseTable<Vec<f64>>,
    pub total_severance_tax: Vec<f64>,
    pub ad_valorem_tax: Vec<f64>,
    pub total_production_tax: Vec<f64>,
}

pub fn validate_production_tax(config: &ProductionTaxConfig) -> Result<(), EvalError> {
    for phase in Phase::REVENUE {
        let finite = config
            .severance(phase)
            .is_none_or(|tax| tax.rate.is_finite() && tax.per_unit.is_finite());
        if !finite {
            return Err(EvalError::NonFiniteInput(format!(
                "{} severance tax",
                phase.key()
            )));
        }
    }
    if !config.ad_valorem.rate.is_finite() || !config.ad_valorem.per_boe.is_finite() {
        return Err(EvalError::NonFiniteInput("ad valorem tax".to_string()));
    }
    Ok(())
}

/// Severance per phase on its deduction base, plus ad valorem on the total
/// base. A negative base is taxed as zero.
pub fn calculate_production_tax(
    config: &ProductionTaxConfig,
    expenses: &ExpenseSummary,
    volumes: &PhaseVolumes,
) -> ProductionTax {
    let len = expenses.total_expense.len();

    let severance = PhaseTable::from_fn(|phase| {
        let Some(tax) = config.severance(phase) else {
            return vec![0.0; len];
        };
        let rate = tax.rate.resolve(len);
        let per_unit = tax.per_unit.resolve(len);
        let base = &expenses.severance_base[phase];
        let net_volume = &volumes.nri[phase];
        (0..len)
            .map(|t| rate[t] * base[t].max(0.0) + per_unit[t] * net_volume[t])
            .collect()
    });

    let mut total_severance_tax = vec![0.0; len];
    for phase in Phase::REVENUE {
        add_into(&mut total_severance_tax, &severance[phase]);
    }

    let ad_valorem = &config.ad_valorem;
    let rate = ad_valorem.rate.resolve(len);
    let per_boe = ad_valorem.per_boe.resolve(len);
    let ad_valorem_tax: Vec<f64> = (0..len)
        .map(|t| {
            let mut base = expenses.ad_valorem_base[t];
            if ad_valorem.deduct_severance_tax {
                base -= total_severance_tax[t];
            }
            rate[t] * base.max(0.0) + per_boe[t] * volumes.nri_boe[t]
        })
        .collect();

    let total_production_tax = total_severance_tax
        .iter()
        .zip(&ad_valorem_tax)
        .map(|(s, a)| s + a)
        .collect();

    ProductionTax {
        severance,
        total_severance_tax,
        ad_valorem_tax,
        total_production_tax,
    }
}

impl Truncate for ProductionTax {
    fn truncated(&self, len: usize) -> Self {
        Self {
            severance: self.severance.truncated(len),
            total_severance_tax: self.total_severance_tax.truncated(len),
            ad_valorem_tax: self.ad_valorem_tax.truncated(len),
            total_production_tax: self.total_production_tax.truncated(len),
        }
    }
}
