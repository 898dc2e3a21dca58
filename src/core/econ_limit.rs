use super::types::{EconLimitCriteria, EconLimitPolicy, PhaseTable};

/// Slices a month-indexed value down to its first `len` months. Never lengthens.
pub trait Truncate {
    fn truncated(&self, len: usize) -> Self;
}

impl Truncate for Vec<f64> {
    fn truncated(&self, len: usize) -> Self {
        self[..len.min(self.len())].to_vec()
    }
}

impl<T: Truncate> Truncate for PhaseTable<T> {
    fn truncated(&self, len: usize) -> Self {
        self.map(|_, v| v.truncated(len))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EconLimitOutcome {
    /// Number of months kept.
    pub len: usize,
    pub unecon: bool,
}

impl EconLimitOutcome {
    /// Index of the last month kept, if any.
    pub fn econ_limit_month(&self) -> Option<usize> {
        self.len.checked_sub(1)
    }
}

/// Finds how many months of `metric` survive the econ-limit policy.
pub fn find_econ_limit(metric: &[f64], policy: &EconLimitPolicy) -> EconLimitOutcome {
    let total = metric.len();
    let threshold = policy.threshold;

    let cut = match policy.criteria {
        EconLimitCriteria::NoCut => Some(total),
        EconLimitCriteria::FirstNegativeCashFlow => {
            match metric.iter().position(|&v| v < threshold) {
                Some(0) => None,
                Some(t) => Some(t),
                None => Some(total),
            }
        }
        EconLimitCriteria::LastPositiveCashFlow => {
            metric.iter().rposition(|&v| v > threshold).map(|t| t + 1)
        }
        EconLimitCriteria::MaxCumulativeCashFlow => {
            let mut cum = 0.0;
            let mut best: Option<(usize, f64)> = None;
            for (t, &v) in metric.iter().enumerate() {
                cum += v;
                if best.is_none_or(|(_, max)| cum > max) {
                    best = Some((t, cum));
                }
            }
            match best {
                Some((t, max)) if max > threshold => Some(t + 1),
                _ => None,
            }
        }
    };

    match cut {
        Some(len) => EconLimitOutcome {
            len: len.max(policy.min_life_months).min(total),
            unecon: false,
        },
        None => EconLimitOutcome {
            len: 0,
            unecon: true,
        },
    }
}
