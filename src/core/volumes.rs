use serde::Serialize;

use super::econ_limit::Truncate;
use super::error::EvalError;
use super::reversion::OwnershipSeries;
use super::types::{BoeConversion, Phase, PhaseTable, ProductionForecast, StreamProperties};

/// Volumes for every phase at each stage, plus the ownership cuts of sales.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseVolumes {
    pub well_head: PhaseTable<Vec<f64>>,
    pub unshrunk_gas: Vec<f64>,
    pub gross: PhaseTable<Vec<f64>>,
    pub wi: PhaseTable<Vec<f64>>,
    pub nri: PhaseTable<Vec<f64>>,
    pub lease_nri: PhaseTable<Vec<f64>>,
    pub gross_boe: Vec<f64>,
    pub wi_boe: Vec<f64>,
    pub nri_boe: Vec<f64>,
}

pub fn validate_stream(stream: &StreamProperties) -> Result<(), EvalError> {
    let fractions = [
        ("oil_loss", stream.oil_loss),
        ("gas_loss", stream.gas_loss),
        ("gas_flare", stream.gas_flare),
        ("gas_shrinkage", stream.gas_shrinkage),
    ];
    for (name, value) in fractions {
        if !(0.0..=1.0).contains(&value) {
            return Err(EvalError::InvalidStreamProperty {
                name,
                allowed: "within [0, 1]",
                value,
            });
        }
    }
    for (name, value) in [
        ("ngl_yield", stream.ngl_yield),
        ("drip_condensate_yield", stream.drip_condensate_yield),
        ("gas_btu", stream.gas_btu),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(EvalError::InvalidStreamProperty {
                name,
                allowed: "finite and >= 0",
                value,
            });
        }
    }
    Ok(())
}

fn padded(values: &[f64], len: usize) -> Vec<f64> {
    (0..len)
        .map(|t| values.get(t).copied().unwrap_or(0.0).max(0.0))
        .collect()
}

pub fn boe(volumes: &PhaseTable<Vec<f64>>, conversion: &BoeConversion, t: usize) -> f64 {
    volumes[Phase::Oil][t]
        + volumes[Phase::Gas][t] / conversion.gas_mcf_per_boe
        + volumes[Phase::Ngl][t] / conversion.ngl_bbl_per_boe
        + volumes[Phase::DripCondensate][t] / conversion.drip_condensate_bbl_per_boe
}

pub fn build_volumes(
    forecast: &ProductionForecast,
    stream: &StreamProperties,
    conversion: &BoeConversion,
    ownership: &OwnershipSeries,
) -> PhaseVolumes {
    let len = ownership.len();
    let oil = padded(&forecast.oil, len);
    let gas = padded(&forecast.gas, len);
    let water = padded(&forecast.water, len);

    let gas_retained = (1.0 - stream.gas_loss) * (1.0 - stream.gas_flare);
    let unshrunk_gas: Vec<f64> = gas.iter().map(|g| g * gas_retained).collect();

    let mut well_head: PhaseTable<Vec<f64>> = PhaseTable::from_fn(|_| vec![0.0; len]);
    well_head[Phase::Oil] = oil.clone();
    well_head[Phase::Gas] = gas;
    well_head[Phase::Water] = water.clone();

    let gross = PhaseTable::from_fn(|phase| match phase {
        Phase::Oil => oil.iter().map(|v| v * (1.0 - stream.oil_loss)).collect(),
        Phase::Gas => unshrunk_gas
            .iter()
            .map(|v| v * stream.gas_shrinkage)
            .collect(),
        Phase::Ngl => unshrunk_gas
            .iter()
            .map(|v| v / 1000.0 * stream.ngl_yield)
            .collect(),
        Phase::DripCondensate => unshrunk_gas
            .iter()
            .map(|v| v / 1000.0 * stream.drip_condensate_yield)
            .collect(),
        Phase::Water => water.clone(),
    });

    let wi = gross.map(|_, v| {
        v.iter()
            .enumerate()
            .map(|(t, x)| x * ownership.wi[t])
            .collect::<Vec<_>>()
    });
    let nri = gross.map(|phase, v| {
        v.iter()
            .enumerate()
            .map(|(t, x)| x * ownership.phase_nri[phase][t])
            .collect::<Vec<_>>()
    });
    let lease_nri = gross.map(|phase, v| {
        if !phase.has_revenue() {
            return vec![0.0; len];
        }
        v.iter()
            .enumerate()
            .map(|(t, x)| x * ownership.lease_nri[t])
            .collect::<Vec<_>>()
    });

    let gross_boe = (0..len).map(|t| boe(&gross, conversion, t)).collect();
    let wi_boe = (0..len).map(|t| boe(&wi, conversion, t)).collect();
    let nri_boe = (0..len).map(|t| boe(&nri, conversion, t)).collect();

    PhaseVolumes {
        well_head,
        unshrunk_gas,
        gross,
        wi,
        nri,
        lease_nri,
        gross_boe,
        wi_boe,
        nri_boe,
    }
}

impl Truncate for PhaseVolumes {
    fn truncated(&self, len: usize) -> Self {
        Self {
            well_head: self.well_head.truncated(len),
            unshrunk_gas: self.unshrunk_gas.truncated(len),
            gross: self.gross.truncated(len),
            wi: self.wi.truncated(len),
            nri: self.nri.truncated(len),
            lease_nri: self.lease_nri.truncated(len),
            gross_boe: self.gross_boe.truncated(len),
            wi_boe: self.wi_boe.truncated(len),
            nri_boe: self.nri_boe.truncated(len),
        }
    }
}
