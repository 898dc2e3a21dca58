use serde::Serialize;

use super::econ_limit::Truncate;
use super::error::EvalError;
use super::reversion::OwnershipSeries;
use super::types::{
    DifferentialUnit, Phase, PhasePricing, PriceUnit, Pricing, StreamProperties, add_into,
    safe_ratio,
};
use super::volumes::PhaseVolumes;

pub const MAX_DIFFERENTIALS: usize = 3;

/// Gross revenue re-cut by each ownership fraction and its complements.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OwnershipRevenue {
    pub wi: Vec<f64>,
    pub nri: Vec<f64>,
    pub lease_nri: Vec<f64>,
    pub one_minus_wi: Vec<f64>,
    pub one_minus_nri: Vec<f64>,
    pub one_minus_lease_nri: Vec<f64>,
    pub wi_minus_one: Vec<f64>,
    pub nri_minus_one: Vec<f64>,
    pub lease_nri_minus_one: Vec<f64>,
    pub hundred_pct_wi: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueLine {
    pub phase: Phase,
    pub original_price: Vec<f64>,
    pub differentials: [Vec<f64>; MAX_DIFFERENTIALS],
    pub price_after_diff: Vec<f64>,
    pub gross_revenue: Vec<f64>,
    pub net_revenue: Vec<f64>,
    pub ownership: OwnershipRevenue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueSummary {
    pub lines: Vec<RevenueLine>,
    pub total_gross_revenue: Vec<f64>,
    pub total_net_revenue: Vec<f64>,
}

impl RevenueSummary {
    pub fn line(&self, phase: Phase) -> Option<&RevenueLine> {
        self.lines.iter().find(|line| line.phase == phase)
    }

    pub fn net_revenue(&self, phase: Phase) -> &[f64] {
        self.line(phase).map_or(&[], |line| &line.net_revenue)
    }

    pub fn gross_revenue(&self, phase: Phase) -> &[f64] {
        self.line(phase).map_or(&[], |line| &line.gross_revenue)
    }
}

pub fn validate_pricing(pricing: &Pricing) -> Result<(), EvalError> {
    if pricing.oil.unit == PriceUnit::PercentOfOil {
        return Err(EvalError::InvalidPricing(
            "oil price cannot be a percent of oil price".to_string(),
        ));
    }
    for phase in Phase::REVENUE {
        let Some(phase_pricing) = pricing.get(phase) else {
            continue;
        };
        let count = phase_pricing.differentials.len();
        if count > MAX_DIFFERENTIALS {
            return Err(EvalError::TooManyDifferentials {
                phase: phase.key(),
                count,
            });
        }
        if !phase_pricing.price.is_finite()
            || phase_pricing.differentials.iter().any(|d| !d.value.is_finite())
        {
            return Err(EvalError::NonFiniteInput(format!("{} pricing", phase.key())));
        }
    }
    Ok(())
}

fn resolve_price(
    phase: Phase,
    pricing: &PhasePricing,
    oil_price: &[f64],
    stream: &StreamProperties,
    len: usize,
) -> Vec<f64> {
    let raw = pricing.price.resolve(len);
    match pricing.unit {
        PriceUnit::PerUnit => raw,
        PriceUnit::PerMmbtu if phase == Phase::Gas => {
            raw.iter().map(|p| p * stream.gas_btu).collect()
        }
        PriceUnit::PerMmbtu => raw,
        PriceUnit::PercentOfOil => raw
            .iter()
            .zip(oil_price)
            .map(|(pct, oil)| pct * oil)
            .collect(),
    }
}

fn scaled(values: &[f64], factor: impl Fn(usize) -> f64) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .map(|(t, v)| v * factor(t))
        .collect()
}

fn revenue_line(
    phase: Phase,
    pricing: &PhasePricing,
    oil_price: &[f64],
    stream: &StreamProperties,
    volumes: &PhaseVolumes,
    ownership: &OwnershipSeries,
) -> RevenueLine {
    let len = ownership.len();
    let original_price = resolve_price(phase, pricing, oil_price, stream, len);

    let differentials: [Vec<f64>; MAX_DIFFERENTIALS] = std::array::from_fn(|idx| {
        match pricing.differentials.get(idx) {
            Some(diff) => {
                let value = diff.value.resolve(len);
                match diff.unit {
                    DifferentialUnit::PerUnit => value,
                    DifferentialUnit::PercentOfPrice => value
                        .iter()
                        .zip(&original_price)
                        .map(|(pct, price)| pct * price)
                        .collect(),
                }
            }
            None => vec![0.0; len],
        }
    });

    let price_after_diff: Vec<f64> = (0..len)
        .map(|t| original_price[t] - differentials.iter().map(|d| d[t]).sum::<f64>())
        .collect();

    let gross_revenue: Vec<f64> = price_after_diff
        .iter()
        .zip(&volumes.gross[phase])
        .map(|(price, volume)| price * volume)
        .collect();
    let nri = &ownership.phase_nri[phase];
    let net_revenue = scaled(&gross_revenue, |t| nri[t]);

    let ownership_revenue = OwnershipRevenue {
        wi: scaled(&gross_revenue, |t| ownership.wi[t]),
        nri: net_revenue.clone(),
        lease_nri: scaled(&gross_revenue, |t| ownership.lease_nri[t]),
        one_minus_wi: scaled(&gross_revenue, |t| ownership.one_minus_wi(t)),
        one_minus_nri: scaled(&gross_revenue, |t| 1.0 - nri[t]),
        one_minus_lease_nri: scaled(&gross_revenue, |t| ownership.one_minus_lease_nri(t)),
        wi_minus_one: scaled(&gross_revenue, |t| ownership.wi_minus_one(t)),
        nri_minus_one: scaled(&gross_revenue, |t| nri[t] - 1.0),
        lease_nri_minus_one: scaled(&gross_revenue, |t| ownership.lease_nri_minus_one(t)),
        hundred_pct_wi: scaled(&gross_revenue, |t| safe_ratio(nri[t], ownership.wi[t])),
    };

    RevenueLine {
        phase,
        original_price,
        differentials,
        price_after_diff,
        gross_revenue,
        net_revenue,
        ownership: ownership_revenue,
    }
}

pub fn calculate_revenue(
    pricing: &Pricing,
    stream: &StreamProperties,
    volumes: &PhaseVolumes,
    ownership: &OwnershipSeries,
) -> RevenueSummary {
    let len = ownership.len();
    let oil_price = resolve_price(Phase::Oil, &pricing.oil, &[], stream, len);

    let lines: Vec<RevenueLine> = Phase::REVENUE
        .iter()
        .filter_map(|&phase| {
            pricing
                .get(phase)
                .map(|p| revenue_line(phase, p, &oil_price, stream, volumes, ownership))
        })
        .collect();

    let mut total_gross_revenue = vec![0.0; len];
    let mut total_net_revenue = vec![0.0; len];
    for line in &lines {
        add_into(&mut total_gross_revenue, &line.gross_revenue);
        add_into(&mut total_net_revenue, &line.net_revenue);
    }

    RevenueSummary {
        lines,
        total_gross_revenue,
        total_net_revenue,
    }
}

impl Truncate for OwnershipRevenue {
    fn truncated(&self, len: usize) -> Self {
        Self {
            wi: self.wi.truncated(len),
            nri: self.nri.truncated(len),
            lease_nri: self.lease_nri.truncated(len),
            one_minus_wi: self.one_minus_wi.truncated(len),
            one_minus_nri: self.one_minus_nri.truncated(len),
            one_minus_lease_nri: self.one_minus_lease_nri.truncated(len),
            wi_minus_one: self.wi_minus_one.truncated(len),
            nri_minus_one: self.nri_minus_one.truncated(len),
            lease_nri_minus_one: self.lease_nri_minus_one.truncated(len),
            hundred_pct_wi: self.hundred_pct_wi.truncated(len),
        }
    }
}

impl Truncate for RevenueLine {
    fn truncated(&self, len: usize) -> Self {
        Self {
            phase: self.phase,
            original_price: self.original_price.truncated(len),
            differentials: std::array::from_fn(|i| self.differentials[i].truncated(len)),
            price_after_diff: self.price_after_diff.truncated(len),
            gross_revenue: self.gross_revenue.truncated(len),
            net_revenue: self.net_revenue.truncated(len),
            ownership: self.ownership.truncated(len),
        }
    }
}

impl Truncate for RevenueSummary {
    fn truncated(&self, len: usize) -> Self {
        Self {
            lines: self.lines.iter().map(|l| l.truncated(len)).collect(),
            total_gross_revenue: self.total_gross_revenue.truncated(len),
            total_net_revenue: self.total_net_revenue.truncated(len),
        }
    }
}
