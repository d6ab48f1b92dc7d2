//! Fixed-point quantities used by summaries
//!
//! Summaries are rolled up across days, months and years, and the rollup must
//! give identical totals regardless of grouping. Floating-point addition is not
//! associative, so summed quantities are stored as integers at a resolution
//! finer than the controller reports (counters step in 0.01 kWh).

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// Energy in watt-hours
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Energy(i64);

impl Energy {
    pub const ZERO: Energy = Energy(0);

    pub const fn from_wh(wh: i64) -> Self {
        Energy(wh)
    }

    /// Convert a kWh reading, rounding to the nearest watt-hour
    pub fn from_kwh(kwh: f64) -> Self {
        Energy((kwh * 1000.0).round() as i64)
    }

    pub fn wh(self) -> i64 {
        self.0
    }

    pub fn kwh(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// `self - other`, floored at zero
    pub fn saturating_remainder(self, other: Energy) -> Energy {
        Energy((self.0 - other.0).max(0))
    }
}

impl Add for Energy {
    type Output = Energy;

    fn add(self, rhs: Energy) -> Energy {
        Energy(self.0 + rhs.0)
    }
}

impl AddAssign for Energy {
    fn add_assign(&mut self, rhs: Energy) {
        self.0 += rhs.0;
    }
}

impl Sub for Energy {
    type Output = Energy;

    fn sub(self, rhs: Energy) -> Energy {
        Energy(self.0 - rhs.0)
    }
}

impl Sum for Energy {
    fn sum<I: Iterator<Item = Energy>>(iter: I) -> Energy {
        iter.fold(Energy::ZERO, Add::add)
    }
}

/// Sum two optional quantities, staying unavailable only if both are
///
/// This is the rollup rule: a period total exists once any constituent
/// reported the quantity.
pub fn add_available(a: Option<Energy>, b: Option<Energy>) -> Option<Energy> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

/// Running mean over a continuous channel, mergeable across windows
///
/// Values are accumulated in thousandths so that merging partial means in any
/// grouping produces the same result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeanAccumulator {
    sum_milli: i64,
    count: u64,
}

impl MeanAccumulator {
    pub fn push(&mut self, value: f64) {
        if value.is_finite() {
            self.sum_milli += (value * 1000.0).round() as i64;
            self.count += 1;
        }
    }

    pub fn merge(&mut self, other: &MeanAccumulator) {
        self.sum_milli += other.sum_milli;
        self.count += other.count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of the accumulated values, `None` when nothing was observed
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum_milli as f64 / 1000.0 / self.count as f64)
        }
    }
}

impl FromIterator<f64> for MeanAccumulator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = MeanAccumulator::default();
        for v in iter {
            acc.push(v);
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_from_kwh_rounds() {
        assert_eq!(Energy::from_kwh(1.2346).wh(), 1235);
        assert_eq!(Energy::from_kwh(0.1).wh(), 100);
        assert_eq!(Energy::from_kwh(12.34).kwh(), 12.34);
    }

    #[test]
    fn test_saturating_remainder_floors_at_zero() {
        let a = Energy::from_wh(2000);
        let b = Energy::from_wh(5000);
        assert_eq!(a.saturating_remainder(b), Energy::ZERO);
        assert_eq!(b.saturating_remainder(a), Energy::from_wh(3000));
    }

    #[test]
    fn test_add_available() {
        let x = Some(Energy::from_wh(10));
        assert_eq!(add_available(x, None), x);
        assert_eq!(add_available(None, x), x);
        assert_eq!(add_available(x, x), Some(Energy::from_wh(20)));
        assert_eq!(add_available(None, None), None);
    }

    #[test]
    fn test_mean_merge_matches_single_pass() {
        let values = [1.1, 2.2, -3.3, 4.4, 5.5];
        let whole: MeanAccumulator = values.iter().copied().collect();

        let mut left: MeanAccumulator = values[..2].iter().copied().collect();
        let right: MeanAccumulator = values[2..].iter().copied().collect();
        left.merge(&right);

        assert_eq!(left, whole);
        assert_eq!(whole.count(), 5);
    }

    #[test]
    fn test_mean_empty_is_none() {
        assert_eq!(MeanAccumulator::default().mean(), None);
    }
}
