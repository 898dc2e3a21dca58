use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use serde_json::{Value, json};

use super::engine::EvaluationResult;
use super::registry::{
    AggregationKind, ColumnType, ReportMode, column_registry, time_series_columns,
};
use super::types::{CapexCategory, Phase, ReportingPeriod, sum};

/// One-line summary of an evaluated well.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub well_id: String,
    pub as_of_date: NaiveDate,
    pub econ_limit_date: Option<NaiveDate>,
    pub unecon: bool,
    pub well_life_months: usize,
    pub first_discount_bfit_npv: f64,
    pub second_discount_bfit_npv: f64,
    pub bfit_irr: Option<f64>,
    pub bfit_payout_date: Option<NaiveDate>,
    pub bfit_discounted_payout_date: Option<NaiveDate>,
    pub bfit_roi: Option<f64>,
    pub first_discount_afit_npv: f64,
    pub second_discount_afit_npv: f64,
    pub afit_irr: Option<f64>,
    pub afit_payout_date: Option<NaiveDate>,
    pub afit_roi: Option<f64>,
    pub negative_cash_flow_months: usize,
    pub max_consecutive_negative_cash_flow_months: usize,
    /// Lifetime totals of the headline monthly columns.
    pub totals: BTreeMap<String, f64>,
}

impl EvaluationSummary {
    pub fn empty(well_id: &str, as_of_date: NaiveDate) -> Self {
        Self {
            well_id: well_id.to_string(),
            as_of_date,
            econ_limit_date: None,
            unecon: false,
            well_life_months: 0,
            first_discount_bfit_npv: 0.0,
            second_discount_bfit_npv: 0.0,
            bfit_irr: None,
            bfit_payout_date: None,
            bfit_discounted_payout_date: None,
            bfit_roi: None,
            first_discount_afit_npv: 0.0,
            second_discount_afit_npv: 0.0,
            afit_irr: None,
            afit_payout_date: None,
            afit_roi: None,
            negative_cash_flow_months: 0,
            max_consecutive_negative_cash_flow_months: 0,
            totals: BTreeMap::new(),
        }
    }

    /// Flattens the summary into one-liner registry keys.
    pub fn one_liner(&self) -> BTreeMap<String, Value> {
        let date = |d: Option<NaiveDate>| d.map(|d| d.to_string());
        let mut row = BTreeMap::new();
        let mut put = |key: &str, value: Value| {
            row.insert(key.to_string(), value);
        };
        put("well_id", json!(self.well_id));
        put("as_of_date", json!(self.as_of_date.to_string()));
        put("econ_limit_date", json!(date(self.econ_limit_date)));
        put("unecon", json!(if self.unecon { "yes" } else { "no" }));
        put("well_life_months", json!(self.well_life_months));
        put("first_discount_bfit_npv", json!(self.first_discount_bfit_npv));
        put("second_discount_bfit_npv", json!(self.second_discount_bfit_npv));
        put("bfit_irr", json!(self.bfit_irr));
        put("bfit_payout_date", json!(date(self.bfit_payout_date)));
        put(
            "bfit_discounted_payout_date",
            json!(date(self.bfit_discounted_payout_date)),
        );
        put("bfit_roi", json!(self.bfit_roi));
        put("first_discount_afit_npv", json!(self.first_discount_afit_npv));
        put("second_discount_afit_npv", json!(self.second_discount_afit_npv));
        put("afit_irr", json!(self.afit_irr));
        put("afit_payout_date", json!(date(self.afit_payout_date)));
        put("afit_roi", json!(self.afit_roi));
        put("negative_cash_flow_months", json!(self.negative_cash_flow_months));
        put(
            "max_consecutive_negative_cash_flow_months",
            json!(self.max_consecutive_negative_cash_flow_months),
        );
        for (key, total) in &self.totals {
            put(key, json!(total));
        }
        row
    }
}

pub fn summarize(result: &EvaluationResult) -> EvaluationSummary {
    let dates = &result.cash_flow.dates;
    let date_of = |month: Option<usize>| month.and_then(|t| dates.get(t).copied());
    let bfit = &result.bfit.metrics;
    let afit = &result.afit.metrics;

    let monthly = monthly_values(result);
    let totals = column_registry()
        .iter()
        .filter(|spec| {
            spec.column_type == ColumnType::Number
                && spec.supports(ReportMode::Monthly)
                && spec.supports(ReportMode::OneLiner)
        })
        .filter_map(|spec| {
            let values = monthly.get(&spec.key)?;
            Some((spec.key.clone(), sum(values)))
        })
        .collect();

    EvaluationSummary {
        well_id: result.well_id.clone(),
        as_of_date: result.as_of_date,
        econ_limit_date: result.econ_limit_date,
        unecon: result.unecon,
        well_life_months: result.len(),
        first_discount_bfit_npv: bfit.first_discount_npv,
        second_discount_bfit_npv: bfit.second_discount_npv,
        bfit_irr: bfit.irr,
        bfit_payout_date: date_of(bfit.payout_month),
        bfit_discounted_payout_date: date_of(bfit.discounted_payout_month),
        bfit_roi: bfit.roi,
        first_discount_afit_npv: afit.first_discount_npv,
        second_discount_afit_npv: afit.second_discount_npv,
        afit_irr: afit.irr,
        afit_payout_date: date_of(afit.payout_month),
        afit_roi: afit.roi,
        negative_cash_flow_months: bfit.negative_months,
        max_consecutive_negative_cash_flow_months: bfit.max_consecutive_negative_months,
        totals,
    }
}

const REVENUE_SUFFIXES: [&str; 4] = [
    "price",
    "price_after_differentials",
    "gross_revenue",
    "net_revenue",
];

/// Every monthly registry column of `result`, keyed by column key.
pub fn monthly_values(result: &EvaluationResult) -> BTreeMap<String, Vec<f64>> {
    let len = result.len();
    let zeros = vec![0.0; len];
    let mut out: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut put = |key: String, values: &[f64]| {
        out.insert(key, values.to_vec());
    };

    let volumes = &result.volumes;
    for phase in [Phase::Oil, Phase::Gas, Phase::Water] {
        put(
            format!("gross_{}_well_head_volume", phase.key()),
            &volumes.well_head[phase],
        );
    }
    put("unshrunk_gas_volume".into(), &volumes.unshrunk_gas);
    for phase in Phase::ALL {
        put(format!("gross_{}_sales_volume", phase.key()), &volumes.gross[phase]);
    }
    for phase in Phase::REVENUE {
        put(format!("wi_{}_sales_volume", phase.key()), &volumes.wi[phase]);
        put(format!("net_{}_sales_volume", phase.key()), &volumes.nri[phase]);
    }
    put("gross_boe_sales_volume".into(), &volumes.gross_boe);
    put("wi_boe_sales_volume".into(), &volumes.wi_boe);
    put("net_boe_sales_volume".into(), &volumes.nri_boe);

    put("wi".into(), &result.ownership.wi);
    put("nri".into(), &result.ownership.nri);
    put("lease_nri".into(), &result.ownership.lease_nri);

    for phase in Phase::REVENUE {
        let p = phase.key();
        match result.revenue.line(phase) {
            Some(line) => {
                put(format!("{p}_price"), &line.original_price);
                put(format!("{p}_price_after_differentials"), &line.price_after_diff);
                put(format!("{p}_gross_revenue"), &line.gross_revenue);
                put(format!("{p}_net_revenue"), &line.net_revenue);
            }
            None => {
                for suffix in REVENUE_SUFFIXES {
                    put(format!("{p}_{suffix}"), &zeros);
                }
            }
        }
    }
    put("total_gross_revenue".into(), &result.revenue.total_gross_revenue);
    put("total_net_revenue".into(), &result.revenue.total_net_revenue);

    let expenses = &result.expenses;
    put("total_fixed_expense".into(), &expenses.total_fixed_expense);
    for phase in Phase::REVENUE {
        put(
            format!("{}_variable_expense", phase.key()),
            &expenses.variable_by_phase[phase],
        );
    }
    put("total_variable_expense".into(), &expenses.total_variable_expense);
    put("water_disposal".into(), &expenses.water_disposal);
    put("total_carbon_expense".into(), &expenses.total_carbon_expense);
    put("total_expense".into(), &expenses.total_expense);

    let tax = &result.production_tax;
    for phase in Phase::REVENUE {
        put(format!("{}_severance_tax", phase.key()), &tax.severance[phase]);
    }
    put("total_severance_tax".into(), &tax.total_severance_tax);
    put("ad_valorem_tax".into(), &tax.ad_valorem_tax);
    put("total_production_tax".into(), &tax.total_production_tax);

    for category in CapexCategory::ALL {
        put(
            format!("{}_capex", category.key()),
            &result.capex.net[category].total,
        );
    }
    put("total_gross_capex".into(), &result.capex.total_gross_capex);
    put("total_capex".into(), &result.capex.total_net_capex);

    let bfit = &result.cash_flow.bfit;
    put("net_profit_interest".into(), &bfit.net_profit_interest);
    put("net_income".into(), &bfit.net_income);
    put("bfit_cash_flow".into(), &bfit.cash_flow);
    put("cumulative_bfit_cash_flow".into(), &result.bfit.cumulative);
    put(
        "first_discount_bfit_cash_flow".into(),
        &result.bfit.first_discount_cash_flow,
    );
    put(
        "second_discount_bfit_cash_flow".into(),
        &result.bfit.second_discount_cash_flow,
    );

    let afit = &result.cash_flow.afit;
    put("depreciation".into(), &afit.depreciation);
    put("depletion".into(), &afit.depletion);
    put("percentage_depletion".into(), &afit.percentage_depletion);
    put("total_deductions".into(), &afit.total_deductions);
    put("taxable_income".into(), &afit.taxable_income);
    put("state_tax_rate".into(), &afit.state_tax_rate);
    put("state_income_tax".into(), &afit.state_income_tax);
    put("federal_tax_rate".into(), &afit.federal_tax_rate);
    put("federal_income_tax".into(), &afit.federal_income_tax);
    put("tax_credit".into(), &afit.tax_credit);
    put("afit_cash_flow".into(), &afit.afit_cash_flow);
    put("cumulative_afit_cash_flow".into(), &result.afit.cumulative);
    put(
        "first_discount_afit_cash_flow".into(),
        &result.afit.first_discount_cash_flow,
    );
    put(
        "second_discount_afit_cash_flow".into(),
        &result.afit.second_discount_cash_flow,
    );

    out
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportRow {
    pub period: String,
    /// Months of the well's life that fall in this period.
    pub months: usize,
    pub values: Vec<f64>,
}

/// Time-series columns laid out per reporting period. `values` follow the
/// order of `columns`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub columns: Vec<String>,
    pub units: Vec<Option<&'static str>>,
    pub rows: Vec<ReportRow>,
}

impl Report {
    fn index_of(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == key)
    }

    pub fn column(&self, key: &str) -> Option<Vec<f64>> {
        let idx = self.index_of(key)?;
        Some(self.rows.iter().map(|row| row.values[idx]).collect())
    }

    pub fn unit(&self, key: &str) -> Option<&'static str> {
        self.units.get(self.index_of(key)?).copied().flatten()
    }
}

pub fn period_label(date: NaiveDate, period: ReportingPeriod) -> String {
    match period {
        ReportingPeriod::Monthly => format!("{}-{:02}", date.year(), date.month()),
        ReportingPeriod::Calendar => date.year().to_string(),
        ReportingPeriod::Fiscal { start_month } => {
            let year = if start_month > 1 && date.month() >= start_month {
                date.year() + 1
            } else {
                date.year()
            };
            format!("FY{year}")
        }
    }
}

fn aggregate(values: &[f64], kind: AggregationKind) -> f64 {
    match kind {
        AggregationKind::Sum | AggregationKind::None => sum(values),
        AggregationKind::Mean if values.is_empty() => 0.0,
        AggregationKind::Mean => sum(values) / values.len() as f64,
        AggregationKind::Last => values.last().copied().unwrap_or(0.0),
    }
}

/// Groups monthly columns into reporting periods, collapsing each column by
/// its registry aggregation.
pub fn build_report(result: &EvaluationResult, period: ReportingPeriod) -> Report {
    let monthly = monthly_values(result);
    let specs: Vec<_> = time_series_columns().collect();

    let mut spans: Vec<(String, usize, usize)> = Vec::new();
    for (t, date) in result.cash_flow.dates.iter().enumerate() {
        let label = period_label(*date, period);
        match spans.last_mut() {
            Some((last, _, end)) if *last == label => *end = t + 1,
            _ => spans.push((label, t, t + 1)),
        }
    }

    let rows = spans
        .into_iter()
        .map(|(label, start, end)| {
            let values = specs
                .iter()
                .map(|spec| {
                    monthly
                        .get(&spec.key)
                        .map_or(0.0, |v| aggregate(&v[start..end], spec.aggregation))
                })
                .collect();
            ReportRow {
                period: label,
                months: end - start,
                values,
            }
        })
        .collect();

    Report {
        columns: specs.iter().map(|spec| spec.key.clone()).collect(),
        units: specs.iter().map(|spec| spec.unit).collect(),
        rows,
    }
}
