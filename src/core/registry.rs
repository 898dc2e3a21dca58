use std::sync::OnceLock;

use serde::Serialize;

use super::types::{CapexCategory, Phase};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Number,
    String,
    Date,
    Group,
}

/// How monthly values collapse into one value per reporting period.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    Sum,
    Mean,
    Last,
    None,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    Monthly,
    Aggregate,
    OneLiner,
}

const TIME_SERIES: &[ReportMode] = &[ReportMode::Monthly, ReportMode::Aggregate];
const ONE_LINER: &[ReportMode] = &[ReportMode::OneLiner];
const EVERYWHERE: &[ReportMode] = &[
    ReportMode::Monthly,
    ReportMode::Aggregate,
    ReportMode::OneLiner,
];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnSpec {
    pub key: String,
    pub label: String,
    pub group: &'static str,
    pub column_type: ColumnType,
    pub unit: Option<&'static str>,
    pub aggregation: AggregationKind,
    pub modes: &'static [ReportMode],
}

impl ColumnSpec {
    pub fn supports(&self, mode: ReportMode) -> bool {
        self.modes.contains(&mode)
    }
}

pub fn volume_unit(phase: Phase) -> &'static str {
    match phase {
        Phase::Gas => "mcf",
        _ => "bbl",
    }
}

pub fn price_unit(phase: Phase) -> &'static str {
    match phase {
        Phase::Gas => "$/mcf",
        _ => "$/bbl",
    }
}

fn label(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for (idx, word) in key.split('_').enumerate() {
        if idx > 0 {
            out.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

struct Builder(Vec<ColumnSpec>);

impl Builder {
    fn push(
        &mut self,
        group: &'static str,
        key: impl Into<String>,
        column_type: ColumnType,
        unit: Option<&'static str>,
        aggregation: AggregationKind,
        modes: &'static [ReportMode],
    ) {
        let key = key.into();
        self.0.push(ColumnSpec {
            label: label(&key),
            key,
            group,
            column_type,
            unit,
            aggregation,
            modes,
        });
    }

    fn group(&mut self, key: &'static str) {
        self.push(key, key, ColumnType::Group, None, AggregationKind::None, EVERYWHERE);
    }

    fn series(&mut self, group: &'static str, key: impl Into<String>, unit: &'static str) {
        self.push(group, key, ColumnType::Number, Some(unit), AggregationKind::Sum, TIME_SERIES);
    }

    /// A summed series that also appears as a lifetime total in the one-liner.
    fn headline(&mut self, group: &'static str, key: impl Into<String>, unit: &'static str) {
        self.push(group, key, ColumnType::Number, Some(unit), AggregationKind::Sum, EVERYWHERE);
    }

    fn averaged(&mut self, group: &'static str, key: impl Into<String>, unit: &'static str) {
        self.push(group, key, ColumnType::Number, Some(unit), AggregationKind::Mean, TIME_SERIES);
    }

    fn running(&mut self, group: &'static str, key: impl Into<String>, unit: &'static str) {
        self.push(group, key, ColumnType::Number, Some(unit), AggregationKind::Last, TIME_SERIES);
    }

    fn one_liner(&mut self, key: &'static str, kind: ColumnType, unit: Option<&'static str>) {
        self.push("summary", key, kind, unit, AggregationKind::None, ONE_LINER);
    }
}

fn build_registry() -> Vec<ColumnSpec> {
    let mut b = Builder(Vec::new());

    b.group("volumes");
    for phase in [Phase::Oil, Phase::Gas, Phase::Water] {
        b.series(
            "volumes",
            format!("gross_{}_well_head_volume", phase.key()),
            volume_unit(phase),
        );
    }
    b.series("volumes", "unshrunk_gas_volume", "mcf");
    for cut in ["gross", "wi", "net"] {
        for phase in Phase::ALL {
            if cut != "gross" && !phase.has_revenue() {
                continue;
            }
            let key = format!("{cut}_{}_sales_volume", phase.key());
            if cut == "gross" && matches!(phase, Phase::Oil | Phase::Gas) {
                b.headline("volumes", key, volume_unit(phase));
            } else {
                b.series("volumes", key, volume_unit(phase));
            }
        }
        if cut == "net" {
            b.headline("volumes", "net_boe_sales_volume", "boe");
        } else {
            b.series("volumes", format!("{cut}_boe_sales_volume"), "boe");
        }
    }

    b.group("ownership");
    for key in ["wi", "nri", "lease_nri"] {
        b.averaged("ownership", key, "fraction");
    }

    b.group("revenue");
    for phase in Phase::REVENUE {
        let p = phase.key();
        b.averaged("revenue", format!("{p}_price"), price_unit(phase));
        b.averaged("revenue", format!("{p}_price_after_differentials"), price_unit(phase));
        b.series("revenue", format!("{p}_gross_revenue"), "$");
        b.series("revenue", format!("{p}_net_revenue"), "$");
    }
    b.series("revenue", "total_gross_revenue", "$");
    b.headline("revenue", "total_net_revenue", "$");

    b.group("expense");
    b.series("expense", "total_fixed_expense", "$");
    for phase in Phase::REVENUE {
        b.series("expense", format!("{}_variable_expense", phase.key()), "$");
    }
    b.series("expense", "total_variable_expense", "$");
    b.series("expense", "water_disposal", "$");
    b.series("expense", "total_carbon_expense", "$");
    b.headline("expense", "total_expense", "$");

    b.group("production_tax");
    for phase in Phase::REVENUE {
        b.series("production_tax", format!("{}_severance_tax", phase.key()), "$");
    }
    b.series("production_tax", "total_severance_tax", "$");
    b.series("production_tax", "ad_valorem_tax", "$");
    b.headline("production_tax", "total_production_tax", "$");

    b.group("capex");
    for category in CapexCategory::ALL {
        b.series("capex", format!("{}_capex", category.key()), "$");
    }
    b.series("capex", "total_gross_capex", "$");
    b.headline("capex", "total_capex", "$");

    b.group("cash_flow");
    b.series("cash_flow", "net_profit_interest", "$");
    b.series("cash_flow", "net_income", "$");
    b.headline("cash_flow", "bfit_cash_flow", "$");
    b.running("cash_flow", "cumulative_bfit_cash_flow", "$");
    b.series("cash_flow", "first_discount_bfit_cash_flow", "$");
    b.series("cash_flow", "second_discount_bfit_cash_flow", "$");

    b.group("income_tax");
    b.series("income_tax", "depreciation", "$");
    b.series("income_tax", "depletion", "$");
    b.series("income_tax", "percentage_depletion", "$");
    b.series("income_tax", "total_deductions", "$");
    b.series("income_tax", "taxable_income", "$");
    b.averaged("income_tax", "state_tax_rate", "fraction");
    b.series("income_tax", "state_income_tax", "$");
    b.averaged("income_tax", "federal_tax_rate", "fraction");
    b.series("income_tax", "federal_income_tax", "$");
    b.series("income_tax", "tax_credit", "$");
    b.headline("income_tax", "afit_cash_flow", "$");
    b.running("income_tax", "cumulative_afit_cash_flow", "$");
    b.series("income_tax", "first_discount_afit_cash_flow", "$");
    b.series("income_tax", "second_discount_afit_cash_flow", "$");

    b.group("summary");
    b.one_liner("well_id", ColumnType::String, None);
    b.one_liner("as_of_date", ColumnType::Date, None);
    b.one_liner("econ_limit_date", ColumnType::Date, None);
    b.one_liner("unecon", ColumnType::String, None);
    b.one_liner("well_life_months", ColumnType::Number, Some("months"));
    b.one_liner("first_discount_bfit_npv", ColumnType::Number, Some("$"));
    b.one_liner("second_discount_bfit_npv", ColumnType::Number, Some("$"));
    b.one_liner("bfit_irr", ColumnType::Number, Some("fraction"));
    b.one_liner("bfit_payout_date", ColumnType::Date, None);
    b.one_liner("bfit_discounted_payout_date", ColumnType::Date, None);
    b.one_liner("bfit_roi", ColumnType::Number, Some("ratio"));
    b.one_liner("first_discount_afit_npv", ColumnType::Number, Some("$"));
    b.one_liner("second_discount_afit_npv", ColumnType::Number, Some("$"));
    b.one_liner("afit_irr", ColumnType::Number, Some("fraction"));
    b.one_liner("afit_payout_date", ColumnType::Date, None);
    b.one_liner("afit_roi", ColumnType::Number, Some("ratio"));
    b.one_liner("negative_cash_flow_months", ColumnType::Number, Some("months"));
    b.one_liner(
        "max_consecutive_negative_cash_flow_months",
        ColumnType::Number,
        Some("months"),
    );

    b.0
}

/// Every output key the engine reports, in display order.
pub fn column_registry() -> &'static [ColumnSpec] {
    static REGISTRY: OnceLock<Vec<ColumnSpec>> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}

pub fn find_column(key: &str) -> Option<&'static ColumnSpec> {
    column_registry().iter().find(|spec| spec.key == key)
}

/// Numeric columns that carry one value per month.
pub fn time_series_columns() -> impl Iterator<Item = &'static ColumnSpec> {
    column_registry().iter().filter(|spec| {
        spec.column_type == ColumnType::Number && spec.supports(ReportMode::Monthly)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn keys_are_unique() {
        let mut seen = BTreeSet::new();
        for spec in column_registry() {
            assert!(seen.insert(spec.key.as_str()), "duplicate key {}", spec.key);
        }
    }

    #[test]
    fn lookups_carry_units_and_aggregation() {
        let oil = find_column("net_oil_sales_volume").expect("column exists");
        assert_eq!(oil.unit, Some("bbl"));
        assert_eq!(oil.aggregation, AggregationKind::Sum);
        assert_eq!(oil.label, "Net Oil Sales Volume");

        let price = find_column("gas_price").expect("column exists");
        assert_eq!(price.unit, Some("$/mcf"));
        assert_eq!(price.aggregation, AggregationKind::Mean);

        let cumulative = find_column("cumulative_afit_cash_flow").expect("column exists");
        assert_eq!(cumulative.aggregation, AggregationKind::Last);

        let irr = find_column("afit_irr").expect("column exists");
        assert!(irr.supports(ReportMode::OneLiner));
        assert!(!irr.supports(ReportMode::Monthly));

        let capex = find_column("total_capex").expect("column exists");
        assert!(capex.supports(ReportMode::Monthly));
        assert!(capex.supports(ReportMode::OneLiner));
        assert!(find_column("no_such_column").is_none());
    }

    #[test]
    fn every_capex_category_has_a_column() {
        for category in CapexCategory::ALL {
            let key = format!("{}_capex", category.key());
            assert!(find_column(&key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn non_revenue_water_only_reported_gross() {
        assert!(find_column("gross_water_sales_volume").is_some());
        assert!(find_column("net_water_sales_volume").is_none());
    }
}
