use serde::Serialize;

use super::econ_limit::Truncate;
use super::error::EvalError;
use super::reversion::OwnershipSeries;
use super::types::{
    CapexBasis, CapexCategory, CapexItem, CapexTiming, CategoryTable, TimeAxis, add_into,
    safe_ratio,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CapexAmounts {
    pub tangible: Vec<f64>,
    pub intangible: Vec<f64>,
    pub total: Vec<f64>,
}

impl CapexAmounts {
    fn zeros(len: usize) -> Self {
        Self {
            tangible: vec![0.0; len],
            intangible: vec![0.0; len],
            total: vec![0.0; len],
        }
    }

    fn add(&mut self, month: usize, tangible: f64, intangible: f64) {
        self.tangible[month] += tangible;
        self.intangible[month] += intangible;
        self.total[month] += tangible + intangible;
    }

    fn merge(&mut self, other: &CapexAmounts) {
        add_into(&mut self.tangible, &other.tangible);
        add_into(&mut self.intangible, &other.intangible);
        add_into(&mut self.total, &other.total);
    }
}

/// One capex item after timing, escalation and ownership are resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapexPlacement {
    pub item: usize,
    pub category: CapexCategory,
    pub month: usize,
    pub gross_tangible: f64,
    pub gross_intangible: f64,
    pub net_tangible: f64,
    pub net_intangible: f64,
    pub dda_model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapexSummary {
    pub gross: CategoryTable<CapexAmounts>,
    pub net: CategoryTable<CapexAmounts>,
    pub total_gross_capex: Vec<f64>,
    pub total_net_capex: Vec<f64>,
    pub placements: Vec<CapexPlacement>,
}

/// Which items a placement pass handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapexPass {
    /// Items that exist before the econ limit is known; they drive it.
    BeforeEconLimit,
    /// Abandonment-style items placed once the last kept month is known.
    AfterEconLimit { econ_month: usize },
}

pub fn is_after_econ_limit(item: &CapexItem) -> bool {
    item.after_econ_limit || matches!(item.timing, CapexTiming::OffsetToEconLimit { .. })
}

pub fn validate_capex(items: &[CapexItem]) -> Result<(), EvalError> {
    for (idx, item) in items.iter().enumerate() {
        if !item.tangible.is_finite() || !item.intangible.is_finite() {
            return Err(EvalError::NonFiniteInput(format!(
                "capex item {} ({})",
                idx + 1,
                item.category.key()
            )));
        }
    }
    Ok(())
}

fn resolve_month(
    timing: &CapexTiming,
    axis: &TimeAxis,
    fpd_month: i64,
    econ_month: Option<usize>,
) -> Option<i64> {
    match *timing {
        CapexTiming::OffsetToFpd { months } => Some(fpd_month + months),
        CapexTiming::OffsetToAsOf { months } => Some(months),
        CapexTiming::Date { date } => Some(axis.month_of(date)),
        CapexTiming::OffsetToEconLimit { months } => {
            econ_month.map(|m| i64::try_from(m).unwrap_or(i64::MAX) + months)
        }
    }
}

/// Places capex items onto `axis`. Items dated before the as-of month are sunk
/// and dropped. In the after-econ-limit pass, items falling past the last
/// kept month collapse into it instead of extending the axis.
pub fn place_capex(
    items: &[CapexItem],
    ownership: &OwnershipSeries,
    axis: &TimeAxis,
    fpd_month: i64,
    pass: CapexPass,
) -> CapexSummary {
    let len = axis.len;
    let mut gross = CategoryTable::from_fn(|_| CapexAmounts::zeros(len));
    let mut net = CategoryTable::from_fn(|_| CapexAmounts::zeros(len));
    let mut placements = Vec::new();

    let econ_month = match pass {
        CapexPass::BeforeEconLimit => None,
        CapexPass::AfterEconLimit { econ_month } => Some(econ_month),
    };

    for (idx, item) in items.iter().enumerate() {
        if is_after_econ_limit(item) != econ_month.is_some() || len == 0 {
            continue;
        }
        let Some(month) = resolve_month(&item.timing, axis, fpd_month, econ_month) else {
            continue;
        };
        if month < 0 {
            continue;
        }
        let month = usize::try_from(month).unwrap_or(usize::MAX);
        let month = match pass {
            CapexPass::BeforeEconLimit if month >= len => continue,
            CapexPass::BeforeEconLimit => month,
            CapexPass::AfterEconLimit { .. } => month.min(len - 1),
        };

        let escalate = |amount: f64| item.escalation.apply(amount, month as i64);
        let tangible = escalate(item.tangible);
        let intangible = escalate(item.intangible);
        let wi = ownership.wi[month];
        let (gross_tangible, gross_intangible, net_tangible, net_intangible) = match item.basis {
            CapexBasis::Gross => (tangible, intangible, tangible * wi, intangible * wi),
            CapexBasis::Net => (
                safe_ratio(tangible, wi),
                safe_ratio(intangible, wi),
                tangible,
                intangible,
            ),
        };

        gross[item.category].add(month, gross_tangible, gross_intangible);
        net[item.category].add(month, net_tangible, net_intangible);
        placements.push(CapexPlacement {
            item: idx,
            category: item.category,
            month,
            gross_tangible,
            gross_intangible,
            net_tangible,
            net_intangible,
            dda_model: item.dda_model.clone(),
        });
    }

    let mut total_gross_capex = vec![0.0; len];
    let mut total_net_capex = vec![0.0; len];
    for category in CapexCategory::ALL {
        add_into(&mut total_gross_capex, &gross[category].total);
        add_into(&mut total_net_capex, &net[category].total);
    }

    CapexSummary {
        gross,
        net,
        total_gross_capex,
        total_net_capex,
        placements,
    }
}

impl CapexSummary {
    pub fn merged(&self, other: &CapexSummary) -> CapexSummary {
        let mut merged = self.clone();
        for category in CapexCategory::ALL {
            merged.gross[category].merge(&other.gross[category]);
            merged.net[category].merge(&other.net[category]);
        }
        add_into(&mut merged.total_gross_capex, &other.total_gross_capex);
        add_into(&mut merged.total_net_capex, &other.total_net_capex);
        merged.placements.extend(other.placements.iter().cloned());
        merged.placements.sort_by_key(|p| (p.month, p.item));
        merged
    }
}

impl Truncate for CapexAmounts {
    fn truncated(&self, len: usize) -> Self {
        Self {
            tangible: self.tangible.truncated(len),
            intangible: self.intangible.truncated(len),
            total: self.total.truncated(len),
        }
    }
}

impl Truncate for CapexSummary {
    fn truncated(&self, len: usize) -> Self {
        Self {
            gross: CategoryTable::from_fn(|c| self.gross[c].truncated(len)),
            net: CategoryTable::from_fn(|c| self.net[c].truncated(len)),
            total_gross_capex: self.total_gross_capex.truncated(len),
            total_net_capex: self.total_net_capex.truncated(len),
            placements: self
                .placements
                .iter()
                .filter(|p| p.month < len)
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{EscalationFrequency, EscalationModel, InterestFractions, PhaseNri};
    use chrono::NaiveDate;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn ownership(wi: f64, len: usize) -> OwnershipSeries {
        OwnershipSeries::constant(
            &InterestFractions {
                working_interest: wi,
                net_revenue_interest: 0.8,
                lease_net_revenue_interest: None,
                phase_nri: PhaseNri::default(),
            },
            len,
        )
    }

    fn axis(len: usize) -> TimeAxis {
        TimeAxis::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), len)
    }

    fn place(items: &[CapexItem], wi: f64, len: usize, fpd_month: i64) -> CapexSummary {
        place_capex(
            items,
            &ownership(wi, len),
            &axis(len),
            fpd_month,
            CapexPass::BeforeEconLimit,
        )
    }

    fn item(category: CapexCategory, tangible: f64, timing: CapexTiming) -> CapexItem {
        CapexItem {
            category,
            description: String::new(),
            tangible,
            intangible: 0.0,
            timing,
            after_econ_limit: false,
            basis: CapexBasis::Gross,
            escalation: EscalationModel::None,
            dda_model: None,
        }
    }

    #[test]
    fn single_drilling_item_lands_in_its_month_only() {
        let items = vec![item(
            CapexCategory::Drilling,
            100_000.0,
            CapexTiming::OffsetToAsOf { months: 1 },
        )];
        let summary = place(&items, 0.5, 6, 0);

        for t in 0..6 {
            let expected = if t == 1 { 100_000.0 } else { 0.0 };
            assert_eq!(summary.total_gross_capex[t], expected);
            assert_eq!(summary.gross[CapexCategory::Drilling].tangible[t], expected);
        }
        assert_approx(summary.total_net_capex[1], 50_000.0);
        for category in CapexCategory::ALL {
            if category != CapexCategory::Drilling {
                assert!(summary.gross[category].total.iter().all(|v| *v == 0.0));
            }
        }
    }

    #[test]
    fn timing_variants_resolve_against_their_anchor() {
        let items = vec![
            item(
                CapexCategory::Completion,
                10.0,
                CapexTiming::OffsetToFpd { months: -1 },
            ),
            item(
                CapexCategory::Pad,
                20.0,
                CapexTiming::Date {
                    date: NaiveDate::from_ymd_opt(2024, 4, 17).unwrap(),
                },
            ),
            item(
                CapexCategory::Legal,
                30.0,
                CapexTiming::OffsetToAsOf { months: -2 },
            ),
            item(
                CapexCategory::Facilities,
                40.0,
                CapexTiming::OffsetToAsOf { months: 12 },
            ),
        ];
        let summary = place(&items, 1.0, 6, 2);

        assert_approx(summary.gross[CapexCategory::Completion].total[1], 10.0);
        assert_approx(summary.gross[CapexCategory::Pad].total[3], 20.0);
        assert_approx(summary.total_gross_capex.iter().sum::<f64>(), 30.0);
        assert_eq!(summary.placements.len(), 2);
    }

    #[test]
    fn abandonment_collapses_into_final_kept_month() {
        let mut abandonment = item(
            CapexCategory::Abandonment,
            0.0,
            CapexTiming::OffsetToEconLimit { months: 3 },
        );
        abandonment.intangible = 25_000.0;
        let items = vec![abandonment];
        let before = place(&items, 1.0, 4, 0);
        assert!(before.placements.is_empty());

        let after = place_capex(
            &items,
            &ownership(1.0, 4),
            &axis(4),
            0,
            CapexPass::AfterEconLimit { econ_month: 3 },
        );
        assert_eq!(after.total_gross_capex.len(), 4);
        assert_approx(after.gross[CapexCategory::Abandonment].intangible[3], 25_000.0);
    }

    #[test]
    fn net_basis_and_escalation_apply_at_item_month() {
        let mut net_item = item(
            CapexCategory::Workover,
            1_000.0,
            CapexTiming::OffsetToAsOf { months: 12 },
        );
        net_item.basis = CapexBasis::Net;
        net_item.escalation = EscalationModel::Percent {
            annual_rate: 0.1,
            frequency: EscalationFrequency::Yearly,
        };
        let summary = place(&[net_item], 0.5, 13, 0);
        assert_approx(summary.total_net_capex[12], 1_100.0);
        assert_approx(summary.total_gross_capex[12], 2_200.0);
    }
}
