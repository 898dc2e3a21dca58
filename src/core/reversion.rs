use serde::Serialize;

use super::econ_limit::Truncate;
use super::error::EvalError;
use super::types::{
    CalculationBasis, InterestFractions, OwnershipSchedule, Phase, PhaseTable, Reversion,
    ReversionTrigger, TimeAxis,
};

/// Month-by-month ownership after scheduled reversions are applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnershipSeries {
    pub wi: Vec<f64>,
    pub nri: Vec<f64>,
    pub lease_nri: Vec<f64>,
    pub phase_nri: PhaseTable<Vec<f64>>,
}

impl OwnershipSeries {
    pub fn constant(interest: &InterestFractions, len: usize) -> Self {
        Self {
            wi: vec![interest.working_interest; len],
            nri: vec![interest.net_revenue_interest; len],
            lease_nri: vec![interest.lease_nri(); len],
            phase_nri: PhaseTable::from_fn(|phase| {
                if phase.has_revenue() {
                    vec![interest.nri_for(phase); len]
                } else {
                    vec![0.0; len]
                }
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.wi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wi.is_empty()
    }

    /// Copy of this series with `interest` in force from month `from` onward.
    pub fn with_reversion(&self, from: usize, interest: &InterestFractions) -> Self {
        let mut next = self.clone();
        for t in from.min(self.len())..self.len() {
            next.wi[t] = interest.working_interest;
            next.nri[t] = interest.net_revenue_interest;
            next.lease_nri[t] = interest.lease_nri();
            for phase in Phase::REVENUE {
                next.phase_nri[phase][t] = interest.nri_for(phase);
            }
        }
        next
    }

    pub fn basis_multiplier(&self, basis: CalculationBasis, t: usize) -> f64 {
        match basis {
            CalculationBasis::Gross => 1.0,
            CalculationBasis::Wi => self.wi[t],
            CalculationBasis::Nri => self.nri[t],
            CalculationBasis::LeaseNri => self.lease_nri[t],
        }
    }

    pub fn one_minus_wi(&self, t: usize) -> f64 {
        1.0 - self.wi[t]
    }

    pub fn one_minus_nri(&self, t: usize) -> f64 {
        1.0 - self.nri[t]
    }

    pub fn one_minus_lease_nri(&self, t: usize) -> f64 {
        1.0 - self.lease_nri[t]
    }

    pub fn wi_minus_one(&self, t: usize) -> f64 {
        self.wi[t] - 1.0
    }

    pub fn nri_minus_one(&self, t: usize) -> f64 {
        self.nri[t] - 1.0
    }

    pub fn lease_nri_minus_one(&self, t: usize) -> f64 {
        self.lease_nri[t] - 1.0
    }
}

impl Truncate for OwnershipSeries {
    fn truncated(&self, len: usize) -> Self {
        Self {
            wi: self.wi.truncated(len),
            nri: self.nri.truncated(len),
            lease_nri: self.lease_nri.truncated(len),
            phase_nri: self.phase_nri.map(|_, v| v.truncated(len)),
        }
    }
}

pub fn validate_interest(interest: &InterestFractions, label: &str) -> Result<(), EvalError> {
    let wi = interest.working_interest;
    if !wi.is_finite() || wi < 0.0 {
        return Err(EvalError::InvalidOwnership(format!(
            "{label} working interest must be finite and >= 0, got {wi}"
        )));
    }
    let mut fractions = vec![
        ("net revenue interest", interest.net_revenue_interest),
        ("lease net revenue interest", interest.lease_nri()),
    ];
    for phase in Phase::REVENUE {
        if let Some(v) = interest.phase_nri.get(phase) {
            fractions.push((phase.key(), v));
        }
    }
    for (name, value) in fractions {
        if !(0.0..=1.0).contains(&value) {
            return Err(EvalError::InvalidOwnership(format!(
                "{label} {name} must be within [0, 1], got {value}"
            )));
        }
    }
    Ok(())
}

pub fn validate_schedule(schedule: &OwnershipSchedule) -> Result<(), EvalError> {
    validate_interest(&schedule.initial, "initial")?;
    for (idx, reversion) in schedule.reversions.iter().enumerate() {
        validate_interest(&reversion.interest, &format!("reversion {}", idx + 1))?;
    }
    Ok(())
}

/// An ownership change in force from `month` to the end of the axis.
#[derive(Debug, Clone, Copy)]
pub struct ReversionStep<'a> {
    pub month: usize,
    pub interest: &'a InterestFractions,
}

/// Ownership steps known before any cash flow is computed, plus the
/// payout-triggered reversions still waiting on the cash flow.
#[derive(Debug, Clone)]
pub struct ScheduledOwnership<'a> {
    pub initial: &'a InterestFractions,
    pub steps: Vec<ReversionStep<'a>>,
    pub payout: Vec<&'a Reversion>,
}

impl<'a> ScheduledOwnership<'a> {
    /// Adds a resolved payout reversion. Steps are kept sorted by month;
    /// at equal months the later insertion wins.
    pub fn insert_payout(&mut self, month: usize, interest: &'a InterestFractions) {
        let at = self.steps.partition_point(|step| step.month <= month);
        self.steps.insert(at, ReversionStep { month, interest });
    }

    pub fn series(&self, len: usize) -> OwnershipSeries {
        self.steps
            .iter()
            .fold(OwnershipSeries::constant(self.initial, len), |series, step| {
                series.with_reversion(step.month, step.interest)
            })
    }
}

/// Sorts date- and offset-triggered reversions into month order and sets
/// the payout-triggered ones, in input order, aside for the engine.
pub fn resolve_scheduled<'a>(
    schedule: &'a OwnershipSchedule,
    axis: &TimeAxis,
) -> ScheduledOwnership<'a> {
    let mut steps = Vec::new();
    let mut payout = Vec::new();
    for reversion in &schedule.reversions {
        let month = match reversion.trigger {
            ReversionTrigger::AsOfOffset { months } => months,
            ReversionTrigger::Date { date } => axis.month_of(date),
            ReversionTrigger::Payout => {
                payout.push(reversion);
                continue;
            }
        };
        steps.push(ReversionStep {
            month: usize::try_from(month.max(0)).unwrap_or(usize::MAX),
            interest: &reversion.interest,
        });
    }
    steps.sort_by_key(|step| step.month);
    ScheduledOwnership {
        initial: &schedule.initial,
        steps,
        payout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PhaseNri;
    use chrono::NaiveDate;

    fn interest(wi: f64, nri: f64) -> InterestFractions {
        InterestFractions {
            working_interest: wi,
            net_revenue_interest: nri,
            lease_net_revenue_interest: None,
            phase_nri: PhaseNri::default(),
        }
    }

    #[test]
    fn complements_mirror_base_fractions() {
        let series = OwnershipSeries::constant(&interest(0.75, 0.6), 2);
        assert_eq!(series.one_minus_wi(0), 1.0 - 0.75);
        assert_eq!(series.wi_minus_one(1), 0.75 - 1.0);
        assert_eq!(series.one_minus_nri(0), 1.0 - 0.6);
        assert_eq!(series.nri_minus_one(0), 0.6 - 1.0);
        assert_eq!(series.one_minus_lease_nri(0), 1.0 - 0.6);
        assert_eq!(series.lease_nri_minus_one(0), 0.6 - 1.0);
    }

    #[test]
    fn dated_reversions_step_change_in_month_order() {
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let axis = TimeAxis::new(as_of, 6);
        let schedule = OwnershipSchedule {
            initial: interest(1.0, 0.8),
            reversions: vec![
                Reversion {
                    trigger: ReversionTrigger::Date {
                        date: NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
                    },
                    interest: interest(0.25, 0.2),
                },
                Reversion {
                    trigger: ReversionTrigger::AsOfOffset { months: 2 },
                    interest: interest(0.5, 0.4),
                },
                Reversion {
                    trigger: ReversionTrigger::Payout,
                    interest: interest(0.1, 0.1),
                },
            ],
        };

        let scheduled = resolve_scheduled(&schedule, &axis);
        let series = scheduled.series(axis.len);
        assert_eq!(series.wi, vec![1.0, 1.0, 0.5, 0.5, 0.25, 0.25]);
        assert_eq!(series.phase_nri[Phase::Oil], vec![0.8, 0.8, 0.4, 0.4, 0.2, 0.2]);
        assert_eq!(scheduled.payout.len(), 1);
    }

    #[test]
    fn payout_step_keeps_later_dated_steps() {
        let as_of = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let axis = TimeAxis::new(as_of, 6);
        let schedule = OwnershipSchedule {
            initial: interest(1.0, 0.8),
            reversions: vec![Reversion {
                trigger: ReversionTrigger::AsOfOffset { months: 4 },
                interest: interest(0.25, 0.2),
            }],
        };
        let payout = interest(0.5, 0.4);

        let mut scheduled = resolve_scheduled(&schedule, &axis);
        scheduled.insert_payout(2, &payout);
        assert_eq!(scheduled.series(axis.len).wi, vec![1.0, 1.0, 0.5, 0.5, 0.25, 0.25]);

        scheduled.insert_payout(4, &payout);
        assert_eq!(scheduled.series(axis.len).wi, vec![1.0, 1.0, 0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn working_interest_above_one_is_valid() {
        assert!(validate_interest(&interest(1.25, 0.9), "initial").is_ok());
        assert!(validate_interest(&interest(-0.1, 0.9), "initial").is_err());
        assert!(validate_interest(&interest(1.0, 1.2), "initial").is_err());
    }
}
