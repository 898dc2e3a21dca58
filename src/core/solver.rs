#[derive(Debug, Clone, Copy)]
pub struct IrrSolveConfig {
    pub search_min: f64,
    pub search_max: f64,
    /// Largest upper bound tried while looking for a sign change.
    pub search_ceiling: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for IrrSolveConfig {
    fn default() -> Self {
        Self {
            search_min: -0.99,
            search_max: 1.0,
            search_ceiling: 1.0e6,
            tolerance: 1e-12,
            max_iterations: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrrSolveResult {
    pub irr: Option<f64>,
    pub iterations: u32,
    pub converged: bool,
}

impl IrrSolveResult {
    fn undefined() -> Self {
        Self {
            irr: None,
            iterations: 0,
            converged: false,
        }
    }
}

/// Net present value at an annual `rate`, each flow discounted by its month
/// position `times[t]` over twelve.
pub fn npv(cash_flow: &[f64], times: &[f64], rate: f64) -> f64 {
    let base = 1.0 + rate;
    cash_flow
        .iter()
        .zip(times)
        .map(|(cf, tau)| cf * base.powf(-tau / 12.0))
        .sum()
}

fn npv_derivative(cash_flow: &[f64], times: &[f64], rate: f64) -> f64 {
    let base = 1.0 + rate;
    cash_flow
        .iter()
        .zip(times)
        .map(|(cf, tau)| {
            let exponent = -tau / 12.0;
            cf * exponent * base.powf(exponent - 1.0)
        })
        .sum()
}

fn has_sign_change(cash_flow: &[f64]) -> bool {
    cash_flow.iter().any(|v| *v > 0.0) && cash_flow.iter().any(|v| *v < 0.0)
}

/// Annual internal rate of return. Newton steps are taken inside a bisection
/// bracket and replaced by bisection whenever they leave it. Flows without a
/// sign change, or whose NPV never crosses zero in the search range, have no
/// rate.
pub fn solve_irr(cash_flow: &[f64], times: &[f64], config: IrrSolveConfig) -> IrrSolveResult {
    if !has_sign_change(cash_flow) {
        return IrrSolveResult::undefined();
    }

    let mut lo = config.search_min;
    let mut hi = config.search_max;
    let mut f_lo = npv(cash_flow, times, lo);
    let mut f_hi = npv(cash_flow, times, hi);
    while f_lo.signum() == f_hi.signum() && hi < config.search_ceiling {
        lo = hi;
        f_lo = f_hi;
        hi *= 4.0;
        f_hi = npv(cash_flow, times, hi);
    }
    if f_lo == 0.0 {
        return IrrSolveResult {
            irr: Some(lo),
            iterations: 0,
            converged: true,
        };
    }
    if f_lo.signum() == f_hi.signum() || !f_lo.is_finite() || !f_hi.is_finite() {
        return IrrSolveResult::undefined();
    }

    let mut rate = (lo + hi) * 0.5;
    let mut it = 0;
    while it < config.max_iterations {
        it += 1;
        let value = npv(cash_flow, times, rate);
        if value == 0.0 {
            return IrrSolveResult {
                irr: Some(rate),
                iterations: it,
                converged: true,
            };
        }
        if value.signum() == f_lo.signum() {
            lo = rate;
            f_lo = value;
        } else {
            hi = rate;
        }

        let slope = npv_derivative(cash_flow, times, rate);
        let newton = rate - value / slope;
        let next = if slope != 0.0 && newton.is_finite() && newton > lo && newton < hi {
            newton
        } else {
            (lo + hi) * 0.5
        };

        let step = (next - rate).abs();
        if step <= config.tolerance * (1.0 + rate.abs()) || hi - lo <= config.tolerance {
            return IrrSolveResult {
                irr: Some(next),
                iterations: it,
                converged: true,
            };
        }
        rate = next;
    }

    IrrSolveResult {
        irr: Some(rate),
        iterations: it,
        converged: false,
    }
}
