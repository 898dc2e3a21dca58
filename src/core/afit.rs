use chrono::NaiveDate;
use serde::Serialize;

use super::bfit::BfitSeries;
use super::depreciation::Deductions;
use super::error::EvalError;
use super::types::{IncomeTaxConfig, TaxBracketTable};

pub const PERCENTAGE_DEPLETION_RATE: f64 = 0.15;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AfitSeries {
    pub depreciation: Vec<f64>,
    pub depletion: Vec<f64>,
    pub percentage_depletion: Vec<f64>,
    pub total_deductions: Vec<f64>,
    pub taxable_income: Vec<f64>,
    pub state_tax_rate: Vec<f64>,
    pub state_income_tax: Vec<f64>,
    pub federal_tax_rate: Vec<f64>,
    pub federal_income_tax: Vec<f64>,
    pub tax_credit: Vec<f64>,
    pub afit_cash_flow: Vec<f64>,
}

/// Every monthly cash-flow column of one evaluation, keyed by date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlowSeries {
    pub dates: Vec<NaiveDate>,
    #[serde(flatten)]
    pub bfit: BfitSeries,
    #[serde(flatten)]
    pub afit: AfitSeries,
}

impl CashFlowSeries {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Rows must tile the months from 1 without gaps or overlaps.
pub fn validate_tax_table(table: &TaxBracketTable, name: &'static str) -> Result<(), EvalError> {
    let mut expected = 1;
    for (idx, row) in table.rows.iter().enumerate() {
        let row_no = idx + 1;
        if !row.rate.is_finite() || !(0.0..=1.0).contains(&row.rate) {
            return Err(EvalError::TaxBracketInvalid {
                table: name,
                row: row_no,
                reason: format!("rate {} must be within [0, 1]", row.rate),
            });
        }
        if row.end < row.start {
            return Err(EvalError::TaxBracketInvalid {
                table: name,
                row: row_no,
                reason: format!("ends at month {} before it starts at {}", row.end, row.start),
            });
        }
        if row.start != expected {
            return Err(EvalError::TaxBracketGap {
                table: name,
                row: row_no,
                start: row.start,
                expected,
            });
        }
        expected = row.end.saturating_add(1);
    }
    Ok(())
}

/// Length of the repeating cycle, when every row shares one `period` equal to
/// the months the rows span together.
fn cycle_len(table: &TaxBracketTable) -> Option<u32> {
    let last = table.rows.last()?;
    table
        .rows
        .iter()
        .all(|row| row.period == last.end)
        .then_some(last.end)
}

/// Rate in force for month `t` (0-based). Months past the last row fold back
/// into the cycle when the rows repeat; otherwise the last row's rate holds.
pub fn bracket_rate(table: &TaxBracketTable, t: usize) -> f64 {
    let mut month = u32::try_from(t + 1).unwrap_or(u32::MAX);
    if let Some(cycle) = cycle_len(table).filter(|&cycle| cycle > 0 && month > cycle) {
        month = (month - 1) % cycle + 1;
    }
    table
        .rows
        .iter()
        .find(|row| (row.start..=row.end).contains(&month))
        .or(table.rows.last())
        .map_or(0.0, |row| row.rate)
}

/// Applies deductions and tax brackets to the pre-tax cash flow.
pub fn calculate_afit(
    bfit: &BfitSeries,
    deductions: &Deductions,
    config: &IncomeTaxConfig,
) -> AfitSeries {
    let len = bfit.cash_flow.len();
    let depreciation = deductions.depreciation.clone();
    let depletion = deductions.depletion.clone();

    let percentage_depletion: Vec<f64> = if config.fifteen_percent_depletion {
        (0..len)
            .map(|t| {
                let ceiling = (bfit.cash_flow[t] - depreciation[t]).max(0.0);
                (PERCENTAGE_DEPLETION_RATE * bfit.total_net_revenue[t]).max(0.0).min(ceiling)
            })
            .collect()
    } else {
        vec![0.0; len]
    };

    let total_deductions: Vec<f64> = (0..len)
        .map(|t| {
            if config.fifteen_percent_depletion {
                depreciation[t] + percentage_depletion[t]
            } else {
                depreciation[t] + depletion[t]
            }
        })
        .collect();
    let taxable_income: Vec<f64> =
        (0..len).map(|t| bfit.cash_flow[t] - total_deductions[t]).collect();

    if !config.enabled {
        return AfitSeries {
            depreciation,
            depletion,
            percentage_depletion,
            total_deductions,
            taxable_income,
            state_tax_rate: vec![0.0; len],
            state_income_tax: vec![0.0; len],
            federal_tax_rate: vec![0.0; len],
            federal_income_tax: vec![0.0; len],
            tax_credit: vec![0.0; len],
            afit_cash_flow: bfit.cash_flow.clone(),
        };
    }

    let state_tax_rate: Vec<f64> = (0..len).map(|t| bracket_rate(&config.state, t)).collect();
    let federal_tax_rate: Vec<f64> = (0..len).map(|t| bracket_rate(&config.federal, t)).collect();

    let mut state_income_tax = vec![0.0; len];
    let mut federal_income_tax = vec![0.0; len];
    let mut loss_balance = 0.0;
    for t in 0..len {
        let income = taxable_income[t];
        let taxable = if !config.carry_forward {
            income.max(0.0)
        } else if income < 0.0 {
            loss_balance -= income;
            0.0
        } else {
            let used = loss_balance.min(income);
            loss_balance -= used;
            income - used
        };

        state_income_tax[t] = taxable * state_tax_rate[t];
        let federal_base = if config.federal_deducts_state_tax {
            taxable - state_income_tax[t]
        } else {
            taxable
        };
        federal_income_tax[t] = federal_base.max(0.0) * federal_tax_rate[t];
    }

    let tax_credit = deductions.tax_credit.clone();
    let afit_cash_flow = (0..len)
        .map(|t| bfit.cash_flow[t] - state_income_tax[t] - federal_income_tax[t] + tax_credit[t])
        .collect();

    AfitSeries {
        depreciation,
        depletion,
        percentage_depletion,
        total_deductions,
        taxable_income,
        state_tax_rate,
        state_income_tax,
        federal_tax_rate,
        federal_income_tax,
        tax_credit,
        afit_cash_flow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TaxBracketRow;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn row(rate: f64, start: u32, end: u32) -> TaxBracketRow {
        TaxBracketRow {
            rate,
            start,
            end,
            period: end - start + 1,
        }
    }

    fn bfit(cash_flow: Vec<f64>, net_revenue: Vec<f64>) -> BfitSeries {
        let len = cash_flow.len();
        BfitSeries {
            total_gross_revenue: net_revenue.clone(),
            total_net_revenue: net_revenue,
            expense: vec![0.0; len],
            production_tax: vec![0.0; len],
            capex: vec![0.0; len],
            net_profit_interest: vec![0.0; len],
            net_income: cash_flow.clone(),
            cash_flow,
        }
    }

    fn deductions(depreciation: Vec<f64>, depletion: Vec<f64>) -> Deductions {
        let len = depreciation.len();
        Deductions {
            depreciation,
            depletion,
            tax_credit: vec![0.0; len],
            items: Vec::new(),
        }
    }

    fn config(state: f64, federal: f64) -> IncomeTaxConfig {
        IncomeTaxConfig {
            enabled: true,
            state: TaxBracketTable {
                rows: vec![row(state, 1, 1200)],
            },
            federal: TaxBracketTable {
                rows: vec![row(federal, 1, 1200)],
            },
            ..IncomeTaxConfig::default()
        }
    }

    #[test]
    fn bracket_lookup_holds_last_row_past_the_table() {
        let table = TaxBracketTable {
            rows: vec![row(0.1, 1, 12), row(0.2, 13, 24)],
        };
        assert_approx(bracket_rate(&table, 0), 0.1);
        assert_approx(bracket_rate(&table, 11), 0.1);
        assert_approx(bracket_rate(&table, 12), 0.2);
        assert_approx(bracket_rate(&table, 500), 0.2);
        assert_approx(bracket_rate(&TaxBracketTable::default(), 3), 0.0);
    }

    #[test]
    fn gaps_and_bad_rates_are_rejected() {
        let gap = TaxBracketTable {
            rows: vec![row(0.1, 1, 12), row(0.2, 14, 24)],
        };
        assert_eq!(
            validate_tax_table(&gap, "state"),
            Err(EvalError::TaxBracketGap {
                table: "state",
                row: 2,
                start: 14,
                expected: 13,
            })
        );

        let late_start = TaxBracketTable {
            rows: vec![row(0.1, 2, 12)],
        };
        assert!(matches!(
            validate_tax_table(&late_start, "federal"),
            Err(EvalError::TaxBracketGap { row: 1, .. })
        ));

        let table = TaxBracketTable {
            rows: vec![row(1.5, 1, 12)],
        };
        assert!(matches!(
            validate_tax_table(&table, "federal"),
            Err(EvalError::TaxBracketInvalid { row: 1, .. })
        ));
    }

    #[test]
    fn repeating_rows_cycle_past_the_table() {
        let mut first = row(0.1, 1, 6);
        first.period = 12;
        let mut second = row(0.2, 7, 12);
        second.period = 12;
        let table = TaxBracketTable {
            rows: vec![first, second],
        };
        assert_eq!(validate_tax_table(&table, "state"), Ok(()));

        assert_approx(bracket_rate(&table, 5), 0.1);
        assert_approx(bracket_rate(&table, 6), 0.2);
        // month 13 starts the second cycle, month 19 its second half
        assert_approx(bracket_rate(&table, 12), 0.1);
        assert_approx(bracket_rate(&table, 17), 0.1);
        assert_approx(bracket_rate(&table, 18), 0.2);
        assert_approx(bracket_rate(&table, 12 * 40 + 7), 0.2);
    }

    #[test]
    fn federal_tax_is_net_of_state_tax() {
        let afit = calculate_afit(
            &bfit(vec![1000.0], vec![1000.0]),
            &deductions(vec![200.0], vec![0.0]),
            &config(0.05, 0.21),
        );
        assert_approx(afit.taxable_income[0], 800.0);
        assert_approx(afit.state_income_tax[0], 40.0);
        assert_approx(afit.federal_income_tax[0], 760.0 * 0.21);
        assert_approx(afit.afit_cash_flow[0], 1000.0 - 40.0 - 159.6);
    }

    #[test]
    fn carry_forward_offsets_later_income() {
        let mut cfg = config(0.0, 0.2);
        cfg.carry_forward = true;
        let afit = calculate_afit(
            &bfit(vec![-300.0, 200.0, 500.0], vec![0.0; 3]),
            &deductions(vec![0.0; 3], vec![0.0; 3]),
            &cfg,
        );
        assert_approx(afit.federal_income_tax[0], 0.0);
        assert_approx(afit.federal_income_tax[1], 0.0);
        assert_approx(afit.federal_income_tax[2], 400.0 * 0.2);

        cfg.carry_forward = false;
        let afit = calculate_afit(
            &bfit(vec![-300.0, 200.0, 500.0], vec![0.0; 3]),
            &deductions(vec![0.0; 3], vec![0.0; 3]),
            &cfg,
        );
        assert_approx(afit.federal_income_tax[1], 40.0);
    }

    #[test]
    fn percentage_depletion_replaces_cost_depletion() {
        let mut cfg = config(0.0, 0.0);
        cfg.fifteen_percent_depletion = true;
        let afit = calculate_afit(
            &bfit(vec![500.0, 50.0], vec![1000.0, 1000.0]),
            &deductions(vec![100.0, 40.0], vec![999.0, 999.0]),
            &cfg,
        );
        assert_approx(afit.percentage_depletion[0], 150.0);
        assert_approx(afit.total_deductions[0], 250.0);
        // capped at the income left after depreciation
        assert_approx(afit.percentage_depletion[1], 10.0);
        assert_approx(afit.depletion[0], 999.0);
    }

    #[test]
    fn disabled_income_tax_passes_cash_flow_through() {
        let afit = calculate_afit(
            &bfit(vec![1000.0, -20.0], vec![1000.0, 0.0]),
            &deductions(vec![10.0, 0.0], vec![0.0, 0.0]),
            &IncomeTaxConfig::default(),
        );
        assert_eq!(afit.afit_cash_flow, vec![1000.0, -20.0]);
        assert_approx(afit.taxable_income[0], 990.0);
    }
}
