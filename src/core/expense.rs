use serde::Serialize;

use super::econ_limit::Truncate;
use super::error::EvalError;
use super::revenue::RevenueSummary;
use super::reversion::OwnershipSeries;
use super::types::{
    CalculationBasis, EscalationModel, ExpenseConfig, ExpenseFlags, FixedCategory, Phase,
    PhaseTable, Pollutant, Schedule, VariableCategory, VariableUnit, add_into, safe_ratio,
};
use super::volumes::PhaseVolumes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpenseCategory {
    Fixed {
        category: FixedCategory,
    },
    Variable {
        phase: Phase,
        category: VariableCategory,
    },
    WaterDisposal,
    Carbon {
        pollutant: Pollutant,
    },
}

impl ExpenseCategory {
    /// Phase an expense belongs to when it only burdens one product stream.
    fn phase(self) -> Option<Phase> {
        match self {
            ExpenseCategory::Variable { phase, .. } => Some(phase),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseLine {
    pub category: ExpenseCategory,
    pub values: Vec<f64>,
    pub affect_econ_limit: bool,
    pub deduct_before_severance_tax: bool,
    pub deduct_before_ad_val_tax: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseSummary {
    pub lines: Vec<ExpenseLine>,
    pub total_fixed_expense: Vec<f64>,
    pub variable_by_phase: PhaseTable<Vec<f64>>,
    pub total_variable_expense: Vec<f64>,
    pub water_disposal: Vec<f64>,
    pub total_carbon_expense: Vec<f64>,
    pub total_expense: Vec<f64>,
    pub econ_limit_expense: Vec<f64>,
    pub severance_base: PhaseTable<Vec<f64>>,
    pub ad_valorem_base: Vec<f64>,
}

pub fn validate_expenses(config: &ExpenseConfig) -> Result<(), EvalError> {
    for (idx, line) in config.variable.iter().enumerate() {
        if !line.phase.has_revenue() {
            return Err(EvalError::InvalidExpense(format!(
                "variable expense {} is on water; use water_disposal instead",
                idx + 1
            )));
        }
    }
    let schedules = config
        .fixed
        .iter()
        .map(|e| ("fixed", &e.monthly_cost))
        .chain(config.variable.iter().map(|e| ("variable", &e.rate)))
        .chain(config.water_disposal.iter().map(|e| ("water_disposal", &e.rate)))
        .chain(
            config
                .carbon
                .iter()
                .flat_map(|e| [("carbon", &e.emissions), ("carbon", &e.price)]),
        );
    for (label, schedule) in schedules {
        if !schedule.is_finite() {
            return Err(EvalError::NonFiniteInput(format!("{label} expense")));
        }
    }
    Ok(())
}

struct LineContext<'a> {
    ownership: &'a OwnershipSeries,
    len: usize,
    start_month: usize,
}

impl LineContext<'_> {
    fn build(
        &self,
        schedule: &Schedule,
        escalation: &EscalationModel,
        basis: CalculationBasis,
        driver: impl Fn(usize) -> f64,
    ) -> Vec<f64> {
        let rates = escalation.apply_series(&schedule.resolve(self.len));
        (0..self.len)
            .map(|t| {
                if t < self.start_month {
                    0.0
                } else {
                    rates[t] * driver(t) * self.ownership.basis_multiplier(basis, t)
                }
            })
            .collect()
    }
}

fn line(category: ExpenseCategory, values: Vec<f64>, flags: ExpenseFlags) -> ExpenseLine {
    ExpenseLine {
        category,
        values,
        affect_econ_limit: flags.affect_econ_limit,
        deduct_before_severance_tax: flags.deduct_before_severance_tax,
        deduct_before_ad_val_tax: flags.deduct_before_ad_val_tax,
    }
}

/// Builds every expense line and the two production-tax deduction bases.
/// Fixed and carbon costs start at the first-production month; volume- and
/// revenue-driven costs follow their drivers.
pub fn aggregate_expenses(
    config: &ExpenseConfig,
    volumes: &PhaseVolumes,
    revenue: &RevenueSummary,
    ownership: &OwnershipSeries,
    fpd_month: i64,
) -> ExpenseSummary {
    let len = ownership.len();
    let fixed_ctx = LineContext {
        ownership,
        len,
        start_month: usize::try_from(fpd_month.max(0)).unwrap_or(usize::MAX),
    };
    let flow_ctx = LineContext {
        ownership,
        len,
        start_month: 0,
    };

    let mut lines = Vec::new();
    for expense in &config.fixed {
        let values =
            fixed_ctx.build(&expense.monthly_cost, &expense.escalation, expense.basis, |_| 1.0);
        lines.push(line(
            ExpenseCategory::Fixed {
                category: expense.category,
            },
            values,
            expense.flags,
        ));
    }
    for expense in &config.variable {
        let phase = expense.phase;
        let values = match expense.unit {
            VariableUnit::PerUnit => {
                let volume = &volumes.gross[phase];
                flow_ctx.build(&expense.rate, &expense.escalation, expense.basis, |t| volume[t])
            }
            VariableUnit::PercentOfRevenue => {
                let gross = revenue.gross_revenue(phase);
                flow_ctx.build(&expense.rate, &expense.escalation, expense.basis, |t| {
                    gross.get(t).copied().unwrap_or(0.0)
                })
            }
        };
        lines.push(line(
            ExpenseCategory::Variable {
                phase,
                category: expense.category,
            },
            values,
            expense.flags,
        ));
    }
    if let Some(water) = &config.water_disposal {
        let volume = &volumes.gross[Phase::Water];
        let values = flow_ctx.build(&water.rate, &water.escalation, water.basis, |t| volume[t]);
        lines.push(line(ExpenseCategory::WaterDisposal, values, water.flags));
    }
    for carbon in &config.carbon {
        let emissions = carbon.emissions.resolve(len);
        let values = fixed_ctx.build(&carbon.price, &carbon.escalation, carbon.basis, |t| {
            emissions[t]
        });
        lines.push(line(
            ExpenseCategory::Carbon {
                pollutant: carbon.pollutant,
            },
            values,
            carbon.flags,
        ));
    }

    summarize(lines, revenue, len)
}

fn summarize(lines: Vec<ExpenseLine>, revenue: &RevenueSummary, len: usize) -> ExpenseSummary {
    let mut total_fixed_expense = vec![0.0; len];
    let mut variable_by_phase: PhaseTable<Vec<f64>> = PhaseTable::from_fn(|_| vec![0.0; len]);
    let mut water_disposal = vec![0.0; len];
    let mut total_carbon_expense = vec![0.0; len];
    let mut econ_limit_expense = vec![0.0; len];

    let mut severance_by_phase: PhaseTable<Vec<f64>> = PhaseTable::from_fn(|_| vec![0.0; len]);
    let mut severance_shared = vec![0.0; len];
    let mut ad_valorem_deduction = vec![0.0; len];

    for expense in &lines {
        match expense.category {
            ExpenseCategory::Fixed { .. } => add_into(&mut total_fixed_expense, &expense.values),
            ExpenseCategory::Variable { phase, .. } => {
                add_into(&mut variable_by_phase[phase], &expense.values)
            }
            ExpenseCategory::WaterDisposal => add_into(&mut water_disposal, &expense.values),
            ExpenseCategory::Carbon { .. } => add_into(&mut total_carbon_expense, &expense.values),
        }
        if expense.affect_econ_limit {
            add_into(&mut econ_limit_expense, &expense.values);
        }
        if expense.deduct_before_severance_tax {
            match expense.category.phase() {
                Some(phase) => add_into(&mut severance_by_phase[phase], &expense.values),
                None => add_into(&mut severance_shared, &expense.values),
            }
        }
        if expense.deduct_before_ad_val_tax {
            add_into(&mut ad_valorem_deduction, &expense.values);
        }
    }

    let mut total_variable_expense = vec![0.0; len];
    for phase in Phase::REVENUE {
        add_into(&mut total_variable_expense, &variable_by_phase[phase]);
    }

    let total_expense: Vec<f64> = (0..len)
        .map(|t| {
            total_fixed_expense[t]
                + total_variable_expense[t]
                + total_carbon_expense[t]
                + water_disposal[t]
        })
        .collect();

    let total_net = &revenue.total_net_revenue;
    let severance_base = PhaseTable::from_fn(|phase| {
        if !phase.has_revenue() {
            return vec![0.0; len];
        }
        let phase_net = revenue.net_revenue(phase);
        (0..len)
            .map(|t| {
                let phase_revenue = phase_net.get(t).copied().unwrap_or(0.0);
                let share = safe_ratio(phase_revenue, total_net[t]);
                phase_revenue - severance_by_phase[phase][t] - severance_shared[t] * share
            })
            .collect()
    });
    let ad_valorem_base = (0..len)
        .map(|t| total_net[t] - ad_valorem_deduction[t])
        .collect();

    ExpenseSummary {
        lines,
        total_fixed_expense,
        variable_by_phase,
        total_variable_expense,
        water_disposal,
        total_carbon_expense,
        total_expense,
        econ_limit_expense,
        severance_base,
        ad_valorem_base,
    }
}

impl Truncate for ExpenseLine {
    fn truncated(&self, len: usize) -> Self {
        Self {
            values: self.values.truncated(len),
            ..self.clone()
        }
    }
}

impl Truncate for ExpenseSummary {
    fn truncated(&self, len: usize) -> Self {
        Self {
            lines: self.lines.iter().map(|l| l.truncated(len)).collect(),
            total_fixed_expense: self.total_fixed_expense.truncated(len),
            variable_by_phase: self.variable_by_phase.truncated(len),
            total_variable_expense: self.total_variable_expense.truncated(len),
            water_disposal: self.water_disposal.truncated(len),
            total_carbon_expense: self.total_carbon_expense.truncated(len),
            total_expense: self.total_expense.truncated(len),
            econ_limit_expense: self.econ_limit_expense.truncated(len),
            severance_base: self.severance_base.truncated(len),
            ad_valorem_base: self.ad_valorem_base.truncated(len),
        }
    }
}
