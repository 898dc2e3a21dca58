use std::collections::BTreeMap;
use std::ops::{Index, IndexMut};

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Oil,
    Gas,
    Ngl,
    DripCondensate,
    Water,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Oil,
        Phase::Gas,
        Phase::Ngl,
        Phase::DripCondensate,
        Phase::Water,
    ];
    pub const REVENUE: [Phase; 4] = [Phase::Oil, Phase::Gas, Phase::Ngl, Phase::DripCondensate];

    pub fn index(self) -> usize {
        match self {
            Phase::Oil => 0,
            Phase::Gas => 1,
            Phase::Ngl => 2,
            Phase::DripCondensate => 3,
            Phase::Water => 4,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Phase::Oil => "oil",
            Phase::Gas => "gas",
            Phase::Ngl => "ngl",
            Phase::DripCondensate => "drip_condensate",
            Phase::Water => "water",
        }
    }

    pub fn has_revenue(self) -> bool {
        self != Phase::Water
    }
}

/// Fixed-size table with one slot per [`Phase`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseTable<T>(pub [T; 5]);

impl<T> PhaseTable<T> {
    pub fn from_fn(mut f: impl FnMut(Phase) -> T) -> Self {
        Self(std::array::from_fn(|i| f(Phase::ALL[i])))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Phase, &T)> {
        Phase::ALL.iter().copied().zip(self.0.iter())
    }

    pub fn map<U>(&self, mut f: impl FnMut(Phase, &T) -> U) -> PhaseTable<U> {
        PhaseTable::from_fn(|phase| f(phase, &self[phase]))
    }
}

impl<T: Default> Default for PhaseTable<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<Phase> for PhaseTable<T> {
    type Output = T;

    fn index(&self, phase: Phase) -> &T {
        &self.0[phase.index()]
    }
}

impl<T> IndexMut<Phase> for PhaseTable<T> {
    fn index_mut(&mut self, phase: Phase) -> &mut T {
        &mut self.0[phase.index()]
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapexCategory {
    Drilling,
    Completion,
    Legal,
    Pad,
    Facilities,
    ArtificialLift,
    Workover,
    Leasehold,
    Development,
    Pipelines,
    Exploration,
    Waterline,
    Appraisal,
    OtherInvestment,
    Abandonment,
    Salvage,
}

impl CapexCategory {
    pub const COUNT: usize = 16;
    pub const ALL: [CapexCategory; 16] = [
        CapexCategory::Drilling,
        CapexCategory::Completion,
        CapexCategory::Legal,
        CapexCategory::Pad,
        CapexCategory::Facilities,
        CapexCategory::ArtificialLift,
        CapexCategory::Workover,
        CapexCategory::Leasehold,
        CapexCategory::Development,
        CapexCategory::Pipelines,
        CapexCategory::Exploration,
        CapexCategory::Waterline,
        CapexCategory::Appraisal,
        CapexCategory::OtherInvestment,
        CapexCategory::Abandonment,
        CapexCategory::Salvage,
    ];

    pub fn index(self) -> usize {
        match self {
            CapexCategory::Drilling => 0,
            CapexCategory::Completion => 1,
            CapexCategory::Legal => 2,
            CapexCategory::Pad => 3,
            CapexCategory::Facilities => 4,
            CapexCategory::ArtificialLift => 5,
            CapexCategory::Workover => 6,
            CapexCategory::Leasehold => 7,
            CapexCategory::Development => 8,
            CapexCategory::Pipelines => 9,
            CapexCategory::Exploration => 10,
            CapexCategory::Waterline => 11,
            CapexCategory::Appraisal => 12,
            CapexCategory::OtherInvestment => 13,
            CapexCategory::Abandonment => 14,
            CapexCategory::Salvage => 15,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            CapexCategory::Drilling => "drilling",
            CapexCategory::Completion => "completion",
            CapexCategory::Legal => "legal",
            CapexCategory::Pad => "pad",
            CapexCategory::Facilities => "facilities",
            CapexCategory::ArtificialLift => "artificial_lift",
            CapexCategory::Workover => "workover",
            CapexCategory::Leasehold => "leasehold",
            CapexCategory::Development => "development",
            CapexCategory::Pipelines => "pipelines",
            CapexCategory::Exploration => "exploration",
            CapexCategory::Waterline => "waterline",
            CapexCategory::Appraisal => "appraisal",
            CapexCategory::OtherInvestment => "other_investment",
            CapexCategory::Abandonment => "abandonment",
            CapexCategory::Salvage => "salvage",
        }
    }
}

/// Fixed-size table with one slot per [`CapexCategory`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTable<T>(pub [T; CapexCategory::COUNT]);

impl<T> CategoryTable<T> {
    pub fn from_fn(mut f: impl FnMut(CapexCategory) -> T) -> Self {
        Self(std::array::from_fn(|i| f(CapexCategory::ALL[i])))
    }

    pub fn iter(&self) -> impl Iterator<Item = (CapexCategory, &T)> {
        CapexCategory::ALL.iter().copied().zip(self.0.iter())
    }
}

impl<T: Default> Default for CategoryTable<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<CapexCategory> for CategoryTable<T> {
    type Output = T;

    fn index(&self, category: CapexCategory) -> &T {
        &self.0[category.index()]
    }
}

impl<T> IndexMut<CapexCategory> for CategoryTable<T> {
    fn index_mut(&mut self, category: CapexCategory) -> &mut T {
        &mut self.0[category.index()]
    }
}

/// A monthly input: either one value held for the whole axis or an explicit
/// month-by-month list. Lists shorter than the axis hold their last value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Schedule {
    Flat(f64),
    Monthly(Vec<f64>),
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::Flat(0.0)
    }
}

impl Schedule {
    pub fn resolve(&self, len: usize) -> Vec<f64> {
        match self {
            Schedule::Flat(value) => vec![*value; len],
            Schedule::Monthly(values) => {
                let hold = values.last().copied().unwrap_or(0.0);
                (0..len)
                    .map(|t| values.get(t).copied().unwrap_or(hold))
                    .collect()
            }
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            Schedule::Flat(value) => value.is_finite(),
            Schedule::Monthly(values) => values.iter().all(|v| v.is_finite()),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationFrequency {
    #[default]
    Monthly,
    Yearly,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EscalationModel {
    #[default]
    None,
    Percent {
        annual_rate: f64,
        #[serde(default)]
        frequency: EscalationFrequency,
    },
    Dollar {
        annual_increment: f64,
        #[serde(default)]
        frequency: EscalationFrequency,
    },
}

impl EscalationModel {
    /// Escalates `value` to `month` months after the as-of date. Months before
    /// the as-of date are not de-escalated.
    pub fn apply(&self, value: f64, month: i64) -> f64 {
        let elapsed_years = |frequency: EscalationFrequency| {
            let month = month.max(0);
            match frequency {
                EscalationFrequency::Monthly => month as f64 / 12.0,
                EscalationFrequency::Yearly => (month / 12) as f64,
            }
        };
        match *self {
            EscalationModel::None => value,
            EscalationModel::Percent {
                annual_rate,
                frequency,
            } => value * (1.0 + annual_rate).powf(elapsed_years(frequency)),
            EscalationModel::Dollar {
                annual_increment,
                frequency,
            } => value + annual_increment * elapsed_years(frequency),
        }
    }

    pub fn is_valid(&self) -> bool {
        match *self {
            EscalationModel::None => true,
            EscalationModel::Percent { annual_rate, .. } => {
                annual_rate.is_finite() && annual_rate > -1.0
            }
            EscalationModel::Dollar {
                annual_increment, ..
            } => annual_increment.is_finite(),
        }
    }

    pub fn apply_series(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .enumerate()
            .map(|(t, &v)| self.apply(v, t as i64))
            .collect()
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationBasis {
    Gross,
    #[default]
    Wi,
    Nri,
    LeaseNri,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseNri {
    #[serde(default)]
    pub oil: Option<f64>,
    #[serde(default)]
    pub gas: Option<f64>,
    #[serde(default)]
    pub ngl: Option<f64>,
    #[serde(default)]
    pub drip_condensate: Option<f64>,
}

impl PhaseNri {
    pub fn get(&self, phase: Phase) -> Option<f64> {
        match phase {
            Phase::Oil => self.oil,
            Phase::Gas => self.gas,
            Phase::Ngl => self.ngl,
            Phase::DripCondensate => self.drip_condensate,
            Phase::Water => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterestFractions {
    pub working_interest: f64,
    pub net_revenue_interest: f64,
    #[serde(default)]
    pub lease_net_revenue_interest: Option<f64>,
    #[serde(default)]
    pub phase_nri: PhaseNri,
}

impl InterestFractions {
    pub fn lease_nri(&self) -> f64 {
        self.lease_net_revenue_interest
            .unwrap_or(self.net_revenue_interest)
    }

    pub fn nri_for(&self, phase: Phase) -> f64 {
        self.phase_nri
            .get(phase)
            .unwrap_or(self.net_revenue_interest)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReversionTrigger {
    AsOfOffset { months: i64 },
    Date { date: NaiveDate },
    Payout,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reversion {
    pub trigger: ReversionTrigger,
    pub interest: InterestFractions,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OwnershipSchedule {
    pub initial: InterestFractions,
    #[serde(default)]
    pub reversions: Vec<Reversion>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionForecast {
    #[serde(default)]
    pub oil: Vec<f64>,
    #[serde(default)]
    pub gas: Vec<f64>,
    #[serde(default)]
    pub water: Vec<f64>,
}

impl ProductionForecast {
    pub fn len(&self) -> usize {
        self.oil.len().max(self.gas.len()).max(self.water.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamProperties {
    pub oil_loss: f64,
    pub gas_loss: f64,
    pub gas_flare: f64,
    pub gas_shrinkage: f64,
    pub ngl_yield: f64,
    pub drip_condensate_yield: f64,
    pub gas_btu: f64,
}

impl Default for StreamProperties {
    fn default() -> Self {
        Self {
            oil_loss: 0.0,
            gas_loss: 0.0,
            gas_flare: 0.0,
            gas_shrinkage: 1.0,
            ngl_yield: 0.0,
            drip_condensate_yield: 0.0,
            gas_btu: 1.0,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceUnit {
    #[default]
    PerUnit,
    PerMmbtu,
    PercentOfOil,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferentialUnit {
    #[default]
    PerUnit,
    PercentOfPrice,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Differential {
    pub value: Schedule,
    #[serde(default)]
    pub unit: DifferentialUnit,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhasePricing {
    #[serde(default)]
    pub price: Schedule,
    #[serde(default)]
    pub unit: PriceUnit,
    #[serde(default)]
    pub differentials: Vec<Differential>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pricing {
    pub oil: PhasePricing,
    pub gas: PhasePricing,
    pub ngl: PhasePricing,
    pub drip_condensate: PhasePricing,
}

impl Pricing {
    pub fn get(&self, phase: Phase) -> Option<&PhasePricing> {
        match phase {
            Phase::Oil => Some(&self.oil),
            Phase::Gas => Some(&self.gas),
            Phase::Ngl => Some(&self.ngl),
            Phase::DripCondensate => Some(&self.drip_condensate),
            Phase::Water => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpenseFlags {
    pub affect_econ_limit: bool,
    pub deduct_before_severance_tax: bool,
    pub deduct_before_ad_val_tax: bool,
}

impl Default for ExpenseFlags {
    fn default() -> Self {
        Self {
            affect_econ_limit: true,
            deduct_before_severance_tax: false,
            deduct_before_ad_val_tax: false,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedCategory {
    WellCost,
    Other1,
    Other2,
    Other3,
    Other4,
    Other5,
    Other6,
    Other7,
    Other8,
}

impl FixedCategory {
    pub fn key(self) -> &'static str {
        match self {
            FixedCategory::WellCost => "monthly_well_cost",
            FixedCategory::Other1 => "other_monthly_cost_1",
            FixedCategory::Other2 => "other_monthly_cost_2",
            FixedCategory::Other3 => "other_monthly_cost_3",
            FixedCategory::Other4 => "other_monthly_cost_4",
            FixedCategory::Other5 => "other_monthly_cost_5",
            FixedCategory::Other6 => "other_monthly_cost_6",
            FixedCategory::Other7 => "other_monthly_cost_7",
            FixedCategory::Other8 => "other_monthly_cost_8",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableCategory {
    Gathering,
    Processing,
    Transportation,
    Marketing,
    Other,
}

impl VariableCategory {
    pub const ALL: [VariableCategory; 5] = [
        VariableCategory::Gathering,
        VariableCategory::Processing,
        VariableCategory::Transportation,
        VariableCategory::Marketing,
        VariableCategory::Other,
    ];

    pub fn index(self) -> usize {
        match self {
            VariableCategory::Gathering => 0,
            VariableCategory::Processing => 1,
            VariableCategory::Transportation => 2,
            VariableCategory::Marketing => 3,
            VariableCategory::Other => 4,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            VariableCategory::Gathering => "gathering",
            VariableCategory::Processing => "processing",
            VariableCategory::Transportation => "transportation",
            VariableCategory::Marketing => "marketing",
            VariableCategory::Other => "other",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pollutant {
    Co2e,
    Co2,
    Ch4,
    N2o,
}

impl Pollutant {
    pub fn key(self) -> &'static str {
        match self {
            Pollutant::Co2e => "co2e",
            Pollutant::Co2 => "co2",
            Pollutant::Ch4 => "ch4",
            Pollutant::N2o => "n2o",
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableUnit {
    #[default]
    PerUnit,
    PercentOfRevenue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixedExpense {
    pub category: FixedCategory,
    pub monthly_cost: Schedule,
    #[serde(default)]
    pub basis: CalculationBasis,
    #[serde(default, flatten)]
    pub flags: ExpenseFlags,
    #[serde(default)]
    pub escalation: EscalationModel,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableExpense {
    pub phase: Phase,
    pub category: VariableCategory,
    pub rate: Schedule,
    #[serde(default)]
    pub unit: VariableUnit,
    #[serde(default)]
    pub basis: CalculationBasis,
    #[serde(default, flatten)]
    pub flags: ExpenseFlags,
    #[serde(default)]
    pub escalation: EscalationModel,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaterDisposal {
    pub rate: Schedule,
    #[serde(default)]
    pub basis: CalculationBasis,
    #[serde(default, flatten)]
    pub flags: ExpenseFlags,
    #[serde(default)]
    pub escalation: EscalationModel,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CarbonExpense {
    pub pollutant: Pollutant,
    /// Tonnes emitted per month.
    pub emissions: Schedule,
    /// Dollars per tonne.
    pub price: Schedule,
    #[serde(default)]
    pub basis: CalculationBasis,
    #[serde(default, flatten)]
    pub flags: ExpenseFlags,
    #[serde(default)]
    pub escalation: EscalationModel,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpenseConfig {
    pub fixed: Vec<FixedExpense>,
    pub variable: Vec<VariableExpense>,
    pub water_disposal: Option<WaterDisposal>,
    pub carbon: Vec<CarbonExpense>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeveranceTax {
    /// Fraction of the severance base.
    pub rate: Schedule,
    /// Dollars per net unit sold.
    pub per_unit: Schedule,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdValoremTax {
    pub rate: Schedule,
    pub per_boe: Schedule,
    pub deduct_severance_tax: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductionTaxConfig {
    pub oil: SeveranceTax,
    pub gas: SeveranceTax,
    pub ngl: SeveranceTax,
    pub drip_condensate: SeveranceTax,
    pub ad_valorem: AdValoremTax,
}

impl ProductionTaxConfig {
    pub fn severance(&self, phase: Phase) -> Option<&SeveranceTax> {
        match phase {
            Phase::Oil => Some(&self.oil),
            Phase::Gas => Some(&self.gas),
            Phase::Ngl => Some(&self.ngl),
            Phase::DripCondensate => Some(&self.drip_condensate),
            Phase::Water => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CapexTiming {
    OffsetToFpd { months: i64 },
    OffsetToAsOf { months: i64 },
    Date { date: NaiveDate },
    OffsetToEconLimit { months: i64 },
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapexBasis {
    #[default]
    Gross,
    Net,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapexItem {
    pub category: CapexCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tangible: f64,
    #[serde(default)]
    pub intangible: f64,
    pub timing: CapexTiming,
    #[serde(default)]
    pub after_econ_limit: bool,
    #[serde(default)]
    pub basis: CapexBasis,
    #[serde(default)]
    pub escalation: EscalationModel,
    /// Key into [`WellInputs::dda_models`]; no key means no tax write-off.
    #[serde(default)]
    pub dda_model: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrebuiltTable {
    Macrs3,
    Macrs5,
    Macrs7,
    Macrs10,
    Macrs15,
    Macrs20,
    StraightLine5,
    StraightLine7,
    StraightLine10,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepreciationTable {
    Prebuilt(PrebuiltTable),
    /// Yearly fractions of the (post-bonus) principal.
    Custom(Vec<f64>),
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UopBasis {
    #[default]
    MajorPhase,
    Boe,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DdaMethod {
    Table {
        table: DepreciationTable,
    },
    UnitOfProduction {
        #[serde(default)]
        basis: UopBasis,
    },
    Immediate {
        percent: f64,
        remainder: Box<DdaMethod>,
    },
    EconLimit,
    FirstProductionDate,
    Never,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductionKind {
    Depreciation,
    Depletion,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepreciationDepletionModel {
    pub tangible: DdaMethod,
    pub intangible: DdaMethod,
    #[serde(default = "default_tangible_kind")]
    pub tangible_kind: DeductionKind,
    #[serde(default = "default_intangible_kind")]
    pub intangible_kind: DeductionKind,
    #[serde(default)]
    pub tangible_bonus: f64,
    #[serde(default)]
    pub intangible_bonus: f64,
    #[serde(default)]
    pub tax_credit: f64,
}

fn default_tangible_kind() -> DeductionKind {
    DeductionKind::Depreciation
}

fn default_intangible_kind() -> DeductionKind {
    DeductionKind::Depletion
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WellInputs {
    pub well_id: String,
    pub as_of_date: NaiveDate,
    pub first_production_date: NaiveDate,
    pub forecast: ProductionForecast,
    #[serde(default)]
    pub stream: StreamProperties,
    #[serde(default)]
    pub pricing: Pricing,
    pub ownership: OwnershipSchedule,
    #[serde(default)]
    pub net_profit_interest: f64,
    #[serde(default)]
    pub expenses: ExpenseConfig,
    #[serde(default)]
    pub production_taxes: ProductionTaxConfig,
    #[serde(default)]
    pub capex: Vec<CapexItem>,
    #[serde(default)]
    pub dda_models: BTreeMap<String, DepreciationDepletionModel>,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountMethod {
    #[default]
    Yearly,
    Monthly,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashAccrualTiming {
    #[default]
    MidMonth,
    EndMonth,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscountTable {
    pub first_discount: f64,
    pub second_discount: f64,
    pub rates: Vec<f64>,
    pub method: DiscountMethod,
    pub cash_accrual_time: CashAccrualTiming,
}

pub const MAX_DISCOUNT_RATES: usize = 16;

impl Default for DiscountTable {
    fn default() -> Self {
        Self {
            first_discount: 0.10,
            second_discount: 0.15,
            rates: vec![
                0.0, 0.02, 0.05, 0.08, 0.10, 0.12, 0.15, 0.20, 0.25, 0.30, 0.40, 0.50, 0.60, 0.70,
                0.80, 1.00,
            ],
            method: DiscountMethod::Yearly,
            cash_accrual_time: CashAccrualTiming::MidMonth,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoeConversion {
    pub gas_mcf_per_boe: f64,
    pub ngl_bbl_per_boe: f64,
    pub drip_condensate_bbl_per_boe: f64,
}

impl Default for BoeConversion {
    fn default() -> Self {
        Self {
            gas_mcf_per_boe: 6.0,
            ngl_bbl_per_boe: 1.0,
            drip_condensate_bbl_per_boe: 1.0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaxBracketRow {
    pub rate: f64,
    /// First month covered, counted from 1 at the as-of month.
    pub start: u32,
    /// Last month covered, inclusive.
    pub end: u32,
    pub period: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxBracketTable {
    pub rows: Vec<TaxBracketRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeTaxConfig {
    pub enabled: bool,
    pub fifteen_percent_depletion: bool,
    pub carry_forward: bool,
    pub federal_deducts_state_tax: bool,
    pub state: TaxBracketTable,
    pub federal: TaxBracketTable,
}

impl Default for IncomeTaxConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fifteen_percent_depletion: false,
            carry_forward: false,
            federal_deducts_state_tax: true,
            state: TaxBracketTable::default(),
            federal: TaxBracketTable::default(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EconLimitCriteria {
    NoCut,
    #[default]
    MaxCumulativeCashFlow,
    FirstNegativeCashFlow,
    LastPositiveCashFlow,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconLimitPolicy {
    pub criteria: EconLimitCriteria,
    /// Dollars per month for the first-negative and last-positive criteria.
    /// For max cumulative it is compared with the peak cumulative cash flow,
    /// so it is a total in dollars.
    pub threshold: f64,
    pub include_capex: bool,
    pub min_life_months: usize,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportingPeriod {
    Monthly,
    #[default]
    Calendar,
    Fiscal {
        start_month: u32,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationOptions {
    pub discount: DiscountTable,
    pub boe: BoeConversion,
    pub income_tax: IncomeTaxConfig,
    pub econ_limit: EconLimitPolicy,
    pub reporting: ReportingPeriod,
}

/// Month offsets from the as-of month, shared by every series of one evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeAxis {
    pub as_of: NaiveDate,
    pub len: usize,
}

impl TimeAxis {
    pub fn new(as_of: NaiveDate, len: usize) -> Self {
        Self {
            as_of: first_of_month(as_of),
            len,
        }
    }

    pub fn date(&self, t: usize) -> NaiveDate {
        self.as_of
            .checked_add_months(Months::new(t as u32))
            .unwrap_or(self.as_of)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        (0..self.len).map(|t| self.date(t)).collect()
    }

    /// Signed month offset of `date` from the as-of month.
    pub fn month_of(&self, date: NaiveDate) -> i64 {
        months_between(self.as_of, date)
    }

    pub fn truncated(&self, len: usize) -> Self {
        Self {
            as_of: self.as_of,
            len: len.min(self.len),
        }
    }
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (i64::from(to.year()) - i64::from(from.year())) * 12 + i64::from(to.month())
        - i64::from(from.month())
}

/// Ratio that resolves to zero when the denominator is zero or negative.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

pub fn add_into(target: &mut [f64], values: &[f64]) {
    for (dst, v) in target.iter_mut().zip(values) {
        *dst += v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn schedule_holds_last_value_past_explicit_months() {
        let schedule = Schedule::Monthly(vec![1.0, 2.0]);
        assert_eq!(schedule.resolve(4), vec![1.0, 2.0, 2.0, 2.0]);
        assert_eq!(Schedule::Monthly(vec![]).resolve(2), vec![0.0, 0.0]);
        assert_eq!(Schedule::Flat(3.5).resolve(3), vec![3.5; 3]);
    }

    #[test]
    fn percent_escalation_steps_yearly_and_compounds_monthly() {
        let yearly = EscalationModel::Percent {
            annual_rate: 0.10,
            frequency: EscalationFrequency::Yearly,
        };
        assert_approx(yearly.apply(100.0, 11), 100.0);
        assert_approx(yearly.apply(100.0, 12), 110.0);
        assert_approx(yearly.apply(100.0, 25), 121.0);

        let monthly = EscalationModel::Percent {
            annual_rate: 0.10,
            frequency: EscalationFrequency::Monthly,
        };
        assert_approx(monthly.apply(100.0, 6), 100.0 * 1.1_f64.powf(0.5));
        assert_approx(monthly.apply(100.0, -6), 100.0);
    }

    #[test]
    fn dollar_escalation_adds_increment_per_year() {
        let model = EscalationModel::Dollar {
            annual_increment: 12.0,
            frequency: EscalationFrequency::Monthly,
        };
        assert_approx(model.apply(100.0, 3), 103.0);
        assert_eq!(
            EscalationModel::None.apply_series(&[1.0, 2.0]),
            vec![1.0, 2.0]
        );
    }

    #[test]
    fn month_offsets_follow_calendar_months() {
        let axis = TimeAxis::new(NaiveDate::from_ymd_opt(2024, 11, 15).unwrap(), 3);
        assert_eq!(axis.as_of, NaiveDate::from_ymd_opt(2024, 11, 1).unwrap());
        assert_eq!(axis.date(2), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(
            axis.month_of(NaiveDate::from_ymd_opt(2024, 8, 31).unwrap()),
            -3
        );
    }

    #[test]
    fn tables_index_by_enum() {
        let mut table: CategoryTable<f64> = CategoryTable::default();
        table[CapexCategory::Salvage] = 4.0;
        assert_approx(table.0[15], 4.0);
        let phases = PhaseTable::from_fn(|p| p.index() as f64);
        assert_approx(phases[Phase::Water], 4.0);
        assert!(!Phase::Water.has_revenue());
    }

    #[test]
    fn safe_ratio_clamps_degenerate_denominators() {
        assert_approx(safe_ratio(5.0, 0.0), 0.0);
        assert_approx(safe_ratio(5.0, -1.0), 0.0);
        assert_approx(safe_ratio(5.0, 2.0), 2.5);
    }
}
