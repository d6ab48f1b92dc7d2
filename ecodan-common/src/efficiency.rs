//! Guarded delivered/consumed ratios

use serde::{Deserialize, Serialize};

use crate::model::{Energy, EnergyFlow};

/// Consumed energy at or below this yields no ratio
///
/// Matches the controller's counter resolution; a ratio over less energy
/// than this is mostly quantisation noise.
pub const CONSUMED_FLOOR: Energy = Energy::from_wh(100);

/// [`CONSUMED_FLOOR`] for raw kWh readings
pub const CONSUMED_FLOOR_KWH: f64 = 0.1;

/// delivered / consumed, unavailable unless consumed exceeds the floor
pub fn ratio(delivered: Option<Energy>, consumed: Option<Energy>) -> Option<f64> {
    match (delivered, consumed) {
        (Some(d), Some(c)) if c > CONSUMED_FLOOR => Some(d.wh() as f64 / c.wh() as f64),
        _ => None,
    }
}

/// Same guard over raw kWh values, e.g. the controller's since-midnight counters
pub fn ratio_kwh(delivered: Option<f64>, consumed: Option<f64>) -> Option<f64> {
    match (delivered, consumed) {
        (Some(d), Some(c)) if c > CONSUMED_FLOOR_KWH && d.is_finite() => Some(d / c),
        _ => None,
    }
}

/// Running sums behind a weighted ratio
///
/// Only flows that report both sides are counted, so a window missing one
/// side cannot skew the ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedEnergy {
    delivered: Energy,
    consumed: Energy,
}

impl PairedEnergy {
    pub fn add(&mut self, flow: &EnergyFlow) {
        if let (Some(d), Some(c)) = (flow.delivered, flow.consumed) {
            self.delivered += d;
            self.consumed += c;
        }
    }

    pub fn merge(&mut self, other: &PairedEnergy) {
        self.delivered += other.delivered;
        self.consumed += other.consumed;
    }

    /// sum(delivered) / sum(consumed), floored like [`ratio`]
    ///
    /// Never the mean of per-flow ratios: that would weight a low-usage day the
    /// same as a high-usage one.
    pub fn ratio(&self) -> Option<f64> {
        ratio(Some(self.delivered), Some(self.consumed))
    }
}

impl<'a> FromIterator<&'a EnergyFlow> for PairedEnergy {
    fn from_iter<I: IntoIterator<Item = &'a EnergyFlow>>(flows: I) -> Self {
        let mut sums = PairedEnergy::default();
        for flow in flows {
            sums.add(flow);
        }
        sums
    }
}
