use std::collections::BTreeMap;

use serde::Serialize;

use super::capex::CapexPlacement;
use super::error::EvalError;
use super::types::{
    BoeConversion, CapexCategory, CapexItem, DdaMethod, DeductionKind, DepreciationDepletionModel,
    DepreciationTable, Phase, PrebuiltTable, UopBasis, add_into,
};
use super::volumes::PhaseVolumes;

const MACRS_3: [f64; 4] = [33.33, 44.45, 14.81, 7.41];
const MACRS_5: [f64; 6] = [20.0, 32.0, 19.2, 11.52, 11.52, 5.76];
const MACRS_7: [f64; 8] = [14.29, 24.49, 17.49, 12.49, 8.93, 8.92, 8.93, 4.46];
const MACRS_10: [f64; 11] = [
    10.0, 18.0, 14.4, 11.52, 9.22, 7.37, 6.55, 6.55, 6.56, 6.55, 3.28,
];
const MACRS_15: [f64; 16] = [
    5.0, 9.5, 8.55, 7.7, 6.93, 6.23, 5.9, 5.9, 5.91, 5.9, 5.91, 5.9, 5.91, 5.9, 5.91, 2.95,
];
const MACRS_20: [f64; 21] = [
    3.750, 7.219, 6.677, 6.177, 5.713, 5.285, 4.888, 4.522, 4.462, 4.461, 4.462, 4.461, 4.462,
    4.461, 4.462, 4.461, 4.462, 4.461, 4.462, 4.461, 2.231,
];

/// Shortfall a table schedule may leave behind and still be topped up in its
/// last month, as a fraction of the amount it was asked to write off.
const TABLE_RESIDUAL_TOLERANCE: f64 = 1e-3;

impl PrebuiltTable {
    /// Yearly write-off fractions.
    pub fn factors(self) -> Vec<f64> {
        let percent: &[f64] = match self {
            PrebuiltTable::Macrs3 => &MACRS_3,
            PrebuiltTable::Macrs5 => &MACRS_5,
            PrebuiltTable::Macrs7 => &MACRS_7,
            PrebuiltTable::Macrs10 => &MACRS_10,
            PrebuiltTable::Macrs15 => &MACRS_15,
            PrebuiltTable::Macrs20 => &MACRS_20,
            PrebuiltTable::StraightLine5 => return vec![0.2; 5],
            PrebuiltTable::StraightLine7 => return vec![1.0 / 7.0; 7],
            PrebuiltTable::StraightLine10 => return vec![0.1; 10],
        };
        percent.iter().map(|p| p / 100.0).collect()
    }
}

impl DepreciationTable {
    pub fn factors(&self) -> Vec<f64> {
        match self {
            DepreciationTable::Prebuilt(table) => table.factors(),
            DepreciationTable::Custom(fractions) => fractions.clone(),
        }
    }
}

/// Write-off sequences for one placed capex item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDeductions {
    pub item: usize,
    pub category: CapexCategory,
    pub month: usize,
    pub tangible_principal: f64,
    pub intangible_principal: f64,
    pub tangible: Vec<f64>,
    pub intangible: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deductions {
    pub depreciation: Vec<f64>,
    pub depletion: Vec<f64>,
    pub tax_credit: Vec<f64>,
    pub items: Vec<ItemDeductions>,
}

fn invalid(model: &str, reason: impl Into<String>) -> EvalError {
    EvalError::InvalidDdaModel {
        model: model.to_string(),
        reason: reason.into(),
    }
}

fn validate_fraction(model: &str, what: &str, value: f64) -> Result<(), EvalError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(model, format!("{what} must be within [0, 1], got {value}")));
    }
    Ok(())
}

fn validate_method(model: &str, method: &DdaMethod) -> Result<(), EvalError> {
    match method {
        DdaMethod::Table { table } => {
            let factors = table.factors();
            if factors.is_empty() {
                return Err(invalid(model, "table has no yearly factors"));
            }
            if factors.iter().any(|f| !f.is_finite() || *f < 0.0) {
                return Err(invalid(model, "table factors must be finite and non-negative"));
            }
            let total: f64 = factors.iter().sum();
            if total > 1.0 + 1e-9 {
                return Err(invalid(model, format!("table factors sum to {total}, above 1")));
            }
            Ok(())
        }
        DdaMethod::Immediate { percent, remainder } => {
            validate_fraction(model, "immediate percent", *percent)?;
            validate_method(model, remainder)
        }
        DdaMethod::UnitOfProduction { .. }
        | DdaMethod::EconLimit
        | DdaMethod::FirstProductionDate
        | DdaMethod::Never => Ok(()),
    }
}

/// Checks every model definition and every capex reference to one.
pub fn validate_dda_models(
    items: &[CapexItem],
    models: &BTreeMap<String, DepreciationDepletionModel>,
) -> Result<(), EvalError> {
    for (name, model) in models {
        validate_method(name, &model.tangible)?;
        validate_method(name, &model.intangible)?;
        validate_fraction(name, "tangible bonus", model.tangible_bonus)?;
        validate_fraction(name, "intangible bonus", model.intangible_bonus)?;
        validate_fraction(name, "tax credit", model.tax_credit)?;
    }
    for (idx, item) in items.iter().enumerate() {
        let Some(name) = &item.dda_model else {
            continue;
        };
        if !models.contains_key(name) {
            return Err(EvalError::UnknownDdaModel {
                item: idx + 1,
                model: name.clone(),
            });
        }
    }
    Ok(())
}

struct DdaContext<'a> {
    len: usize,
    fpd_month: i64,
    volumes: &'a PhaseVolumes,
    conversion: &'a BoeConversion,
}

impl DdaContext<'_> {
    fn uop_volume(&self, basis: UopBasis, start: usize) -> &[f64] {
        match basis {
            UopBasis::Boe => &self.volumes.gross_boe,
            UopBasis::MajorPhase => {
                let oil: f64 = self.volumes.gross[Phase::Oil][start..].iter().sum();
                let gas: f64 = self.volumes.gross[Phase::Gas][start..].iter().sum();
                if gas / self.conversion.gas_mcf_per_boe > oil {
                    &self.volumes.gross[Phase::Gas]
                } else {
                    &self.volumes.gross[Phase::Oil]
                }
            }
        }
    }

    /// Writes `principal` off from `start` onward into `out` using `method`.
    fn deduct(&self, method: &DdaMethod, principal: f64, start: usize, out: &mut [f64]) {
        if principal <= 0.0 || start >= self.len {
            return;
        }
        match method {
            DdaMethod::Never => {}
            DdaMethod::EconLimit => out[self.len - 1] += principal,
            DdaMethod::FirstProductionDate => {
                let month = usize::try_from(self.fpd_month.max(start as i64)).unwrap_or(start);
                if month < self.len {
                    out[month] += principal;
                }
            }
            DdaMethod::Immediate { percent, remainder } => {
                let immediate = principal * percent;
                out[start] += immediate;
                self.deduct(remainder, principal - immediate, start, out);
            }
            DdaMethod::Table { table } => {
                self.deduct_table(&table.factors(), principal, start, out)
            }
            DdaMethod::UnitOfProduction { basis } => self.deduct_uop(*basis, principal, start, out),
        }
    }

    fn deduct_table(&self, factors: &[f64], principal: f64, start: usize, out: &mut [f64]) {
        let mut cumulative = 0.0;
        let mut last = None;
        for (year, factor) in factors.iter().enumerate() {
            let monthly = factor * principal / 12.0;
            for m in 0..12 {
                let t = start + year * 12 + m;
                if t >= self.len {
                    return;
                }
                let amount = monthly.min(principal - cumulative).max(0.0);
                if amount > 0.0 {
                    out[t] += amount;
                    cumulative += amount;
                    last = Some(t);
                }
            }
        }
        let residual = principal - cumulative;
        if residual > 0.0 && residual <= principal * TABLE_RESIDUAL_TOLERANCE {
            if let Some(t) = last {
                out[t] += residual;
            }
        }
    }

    fn deduct_uop(&self, basis: UopBasis, principal: f64, start: usize, out: &mut [f64]) {
        let volume = self.uop_volume(basis, start);
        let reserve: f64 = volume[start..self.len].iter().sum();
        if reserve <= 0.0 {
            return;
        }
        let Some(last) = (start..self.len).rev().find(|&t| volume[t] > 0.0) else {
            return;
        };
        let mut cumulative = 0.0;
        for t in start..last {
            let amount = principal * volume[t] / reserve;
            out[t] += amount;
            cumulative += amount;
        }
        out[last] += (principal - cumulative).max(0.0);
    }

    fn schedule(&self, method: &DdaMethod, principal: f64, bonus: f64, start: usize) -> Vec<f64> {
        let mut out = vec![0.0; self.len];
        if principal <= 0.0 || start >= self.len {
            return out;
        }
        let bonus_amount = principal * bonus;
        out[start] += bonus_amount;
        self.deduct(method, principal - bonus_amount, start, &mut out);
        out
    }
}

/// Builds depreciation, depletion and tax-credit series from placed capex.
/// Principal is the net (owned) amount; items without a model write nothing
/// off.
pub fn schedule_deductions(
    placements: &[CapexPlacement],
    models: &BTreeMap<String, DepreciationDepletionModel>,
    volumes: &PhaseVolumes,
    conversion: &BoeConversion,
    fpd_month: i64,
    len: usize,
) -> Deductions {
    let ctx = DdaContext {
        len,
        fpd_month,
        volumes,
        conversion,
    };
    let mut depreciation = vec![0.0; len];
    let mut depletion = vec![0.0; len];
    let mut tax_credit = vec![0.0; len];
    let mut items = Vec::with_capacity(placements.len());

    for placement in placements {
        let model = placement.dda_model.as_ref().and_then(|name| models.get(name));
        let (tangible, intangible) = match model {
            Some(model) => {
                let tangible = ctx.schedule(
                    &model.tangible,
                    placement.net_tangible,
                    model.tangible_bonus,
                    placement.month,
                );
                let intangible = ctx.schedule(
                    &model.intangible,
                    placement.net_intangible,
                    model.intangible_bonus,
                    placement.month,
                );
                for (series, kind) in [
                    (&tangible, model.tangible_kind),
                    (&intangible, model.intangible_kind),
                ] {
                    match kind {
                        DeductionKind::Depreciation => add_into(&mut depreciation, series),
                        DeductionKind::Depletion => add_into(&mut depletion, series),
                    }
                }
                if placement.month < len {
                    tax_credit[placement.month] += model.tax_credit
                        * (placement.net_tangible + placement.net_intangible).max(0.0);
                }
                (tangible, intangible)
            }
            None => (vec![0.0; len], vec![0.0; len]),
        };
        items.push(ItemDeductions {
            item: placement.item,
            category: placement.category,
            month: placement.month,
            tangible_principal: placement.net_tangible,
            intangible_principal: placement.net_intangible,
            tangible,
            intangible,
        });
    }

    Deductions {
        depreciation,
        depletion,
        tax_credit,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reversion::OwnershipSeries;
    use crate::core::types::{InterestFractions, PhaseNri, ProductionForecast, StreamProperties};
    use crate::core::volumes::build_volumes;
    use proptest::prelude::{Just, Strategy, prop, prop_assert, prop_oneof, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    fn volumes(oil: Vec<f64>, gas: Vec<f64>) -> PhaseVolumes {
        let len = oil.len().max(gas.len());
        let ownership = OwnershipSeries::constant(
            &InterestFractions {
                working_interest: 1.0,
                net_revenue_interest: 0.8,
                lease_net_revenue_interest: None,
                phase_nri: PhaseNri::default(),
            },
            len,
        );
        let forecast = ProductionForecast {
            oil,
            gas,
            water: vec![],
        };
        build_volumes(
            &forecast,
            &StreamProperties::default(),
            &BoeConversion::default(),
            &ownership,
        )
    }

    fn placement(month: usize, tangible: f64, intangible: f64) -> CapexPlacement {
        CapexPlacement {
            item: 0,
            category: CapexCategory::Drilling,
            month,
            gross_tangible: tangible,
            gross_intangible: intangible,
            net_tangible: tangible,
            net_intangible: intangible,
            dda_model: Some("model".to_string()),
        }
    }

    fn model(tangible: DdaMethod, intangible: DdaMethod) -> DepreciationDepletionModel {
        DepreciationDepletionModel {
            tangible,
            intangible,
            tangible_kind: DeductionKind::Depreciation,
            intangible_kind: DeductionKind::Depletion,
            tangible_bonus: 0.0,
            intangible_bonus: 0.0,
            tax_credit: 0.0,
        }
    }

    fn run(model: DepreciationDepletionModel, placement: CapexPlacement, len: usize) -> Deductions {
        let models = BTreeMap::from([("model".to_string(), model)]);
        let vols = volumes(vec![100.0; len], vec![300.0; len]);
        schedule_deductions(&[placement], &models, &vols, &BoeConversion::default(), 0, len)
    }

    #[test]
    fn prebuilt_tables_write_off_their_whole_principal() {
        for table in [
            PrebuiltTable::Macrs3,
            PrebuiltTable::Macrs5,
            PrebuiltTable::Macrs7,
            PrebuiltTable::Macrs10,
            PrebuiltTable::Macrs15,
            PrebuiltTable::Macrs20,
            PrebuiltTable::StraightLine5,
            PrebuiltTable::StraightLine7,
            PrebuiltTable::StraightLine10,
        ] {
            let total: f64 = table.factors().iter().sum();
            assert_approx_tol(total, 1.0, 1e-9);
        }
    }

    #[test]
    fn macrs_five_spreads_yearly_factor_over_months() {
        let m = model(
            DdaMethod::Table {
                table: DepreciationTable::Prebuilt(PrebuiltTable::Macrs5),
            },
            DdaMethod::Never,
        );
        let out = run(m, placement(2, 120_000.0, 0.0), 80);
        assert_eq!(out.depreciation[1], 0.0);
        assert_approx_tol(out.depreciation[2], 0.2 * 120_000.0 / 12.0, 1e-9);
        assert_approx_tol(out.depreciation[14], 0.32 * 120_000.0 / 12.0, 1e-9);
        assert_approx_tol(out.depreciation.iter().sum::<f64>(), 120_000.0, 1e-6);
        assert!(out.depletion.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn bonus_is_taken_in_first_month_before_table() {
        let mut m = model(
            DdaMethod::Table {
                table: DepreciationTable::Prebuilt(PrebuiltTable::StraightLine5),
            },
            DdaMethod::Never,
        );
        m.tangible_bonus = 0.5;
        let out = run(m, placement(0, 1_200.0, 0.0), 60);
        assert_approx_tol(out.depreciation[0], 600.0 + 0.2 * 600.0 / 12.0, 1e-9);
        assert_approx_tol(out.depreciation[1], 0.2 * 600.0 / 12.0, 1e-9);
        assert_approx_tol(out.depreciation.iter().sum::<f64>(), 1_200.0, 1e-9);
    }

    #[test]
    fn lump_sums_land_on_their_designated_month() {
        let out = run(
            model(DdaMethod::EconLimit, DdaMethod::FirstProductionDate),
            placement(1, 500.0, 300.0),
            6,
        );
        assert_approx_tol(out.depreciation[5], 500.0, 0.0);
        assert_approx_tol(out.depletion[1], 300.0, 0.0);
        assert_approx_tol(out.depletion.iter().sum::<f64>(), 300.0, 0.0);
    }

    #[test]
    fn immediate_then_unit_of_production() {
        let m = model(
            DdaMethod::Never,
            DdaMethod::Immediate {
                percent: 0.7,
                remainder: Box::new(DdaMethod::UnitOfProduction {
                    basis: UopBasis::Boe,
                }),
            },
        );
        let out = run(m, placement(0, 0.0, 1_000.0), 4);
        assert_approx_tol(out.depletion[0], 700.0 + 75.0, 1e-9);
        assert_approx_tol(out.depletion[3], 75.0, 1e-9);
        assert_approx_tol(out.depletion.iter().sum::<f64>(), 1_000.0, 1e-9);
    }

    #[test]
    fn unit_of_production_follows_major_phase_volumes() {
        let models = BTreeMap::from([(
            "model".to_string(),
            model(
                DdaMethod::UnitOfProduction {
                    basis: UopBasis::MajorPhase,
                },
                DdaMethod::Never,
            ),
        )]);
        let vols = volumes(vec![30.0, 10.0, 0.0], vec![6000.0, 0.0, 0.0]);
        let out = schedule_deductions(
            &[placement(0, 900.0, 0.0)],
            &models,
            &vols,
            &BoeConversion::default(),
            0,
            3,
        );
        // gas is 1000 boe against 40 bbl of oil, so it drives the schedule
        assert_approx_tol(out.depreciation[0], 900.0, 1e-9);
        assert_eq!(out.depreciation[1], 0.0);
    }

    #[test]
    fn zero_remaining_reserve_writes_nothing_off() {
        let models = BTreeMap::from([(
            "model".to_string(),
            model(
                DdaMethod::UnitOfProduction {
                    basis: UopBasis::Boe,
                },
                DdaMethod::Never,
            ),
        )]);
        let vols = volumes(vec![5.0, 0.0, 0.0], vec![0.0; 3]);
        let out = schedule_deductions(
            &[placement(1, 900.0, 0.0)],
            &models,
            &vols,
            &BoeConversion::default(),
            0,
            3,
        );
        assert!(out.depreciation.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn tax_credit_is_separate_from_deductions() {
        let mut m = model(DdaMethod::Never, DdaMethod::Never);
        m.tax_credit = 0.1;
        let out = run(m, placement(3, 400.0, 600.0), 6);
        assert_approx_tol(out.tax_credit[3], 100.0, 1e-12);
        assert!(out.depreciation.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn unknown_model_reference_is_a_configuration_error() {
        let item = CapexItem {
            category: CapexCategory::Pad,
            description: String::new(),
            tangible: 1.0,
            intangible: 0.0,
            timing: crate::core::types::CapexTiming::OffsetToAsOf { months: 0 },
            after_econ_limit: false,
            basis: crate::core::types::CapexBasis::Gross,
            escalation: crate::core::types::EscalationModel::None,
            dda_model: Some("missing".to_string()),
        };
        let err = validate_dda_models(&[item], &BTreeMap::new()).unwrap_err();
        assert_eq!(
            err,
            EvalError::UnknownDdaModel {
                item: 1,
                model: "missing".to_string()
            }
        );
    }

    #[test]
    fn custom_table_above_one_is_rejected() {
        let models = BTreeMap::from([(
            "bad".to_string(),
            model(
                DdaMethod::Table {
                    table: DepreciationTable::Custom(vec![0.6, 0.6]),
                },
                DdaMethod::Never,
            ),
        )]);
        let err = validate_dda_models(&[], &models).unwrap_err();
        assert!(matches!(err, EvalError::InvalidDdaModel { .. }));
    }

    fn method_strategy() -> impl Strategy<Value = DdaMethod> {
        let leaf = prop_oneof![
            Just(DdaMethod::Never),
            Just(DdaMethod::EconLimit),
            Just(DdaMethod::FirstProductionDate),
            Just(DdaMethod::UnitOfProduction {
                basis: UopBasis::Boe
            }),
            Just(DdaMethod::UnitOfProduction {
                basis: UopBasis::MajorPhase
            }),
            Just(DdaMethod::Table {
                table: DepreciationTable::Prebuilt(PrebuiltTable::Macrs7)
            }),
            Just(DdaMethod::Table {
                table: DepreciationTable::Prebuilt(PrebuiltTable::Macrs20)
            }),
            prop::collection::vec(0.0..0.25f64, 1..5).prop_map(|factors| DdaMethod::Table {
                table: DepreciationTable::Custom(factors),
            }),
        ];
        leaf.prop_recursive(2, 4, 1, |inner| {
            (0.0..=1.0f64, inner).prop_map(|(percent, remainder)| DdaMethod::Immediate {
                percent,
                remainder: Box::new(remainder),
            })
        })
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(128))]

        #[test]
        fn deductions_never_exceed_principal(
            tangible_method in method_strategy(),
            intangible_method in method_strategy(),
            tangible in 0.0..5e6f64,
            intangible in 0.0..5e6f64,
            bonus in 0.0..=1.0f64,
            start in 0usize..30,
            len in 1usize..120,
            oil in prop::collection::vec(0.0..1e4f64, 1..120),
        ) {
            let mut m = model(tangible_method, intangible_method);
            m.tangible_bonus = bonus;
            let models = BTreeMap::from([("model".to_string(), m)]);
            let vols = volumes(oil.iter().cycle().take(len).copied().collect(), vec![0.0; len]);
            let out = schedule_deductions(
                &[placement(start, tangible, intangible)],
                &models,
                &vols,
                &BoeConversion::default(),
                3,
                len,
            );
            let item = &out.items[0];
            let tangible_total: f64 = item.tangible.iter().sum();
            let intangible_total: f64 = item.intangible.iter().sum();
            prop_assert!(tangible_total <= tangible * (1.0 + 1e-6) + 1e-9);
            prop_assert!(intangible_total <= intangible * (1.0 + 1e-6) + 1e-9);
            prop_assert!(
                item.tangible
                    .iter()
                    .chain(&item.intangible)
                    .all(|v| v.is_finite() && *v >= 0.0)
            );
        }
    }
}
