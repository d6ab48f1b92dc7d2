//! Counter reconciliation
//!
//! Per-window deltas for monotonic counters. Absent endpoints make a delta
//! unavailable, never zero, and stay unavailable up to the attribution step.
//!
//! # Rules
//!
//! 1. Lifetime counters: `last - first` over the window, rejected if negative.
//! 2. Daily counters (zeroed by the controller at midnight): the maximum
//!    value seen in the window. The reset and the last sample of the
//!    previous day race, so `last - first` can be badly off at either end.
//! 3. A missing total is derived from the breakdown counters.
//! 4. Energy the breakdown counters do not explain is attributed to heating
//!    when they cover less than [`ATTRIBUTION_COVERAGE_THRESHOLD`] of the
//!    total. See [`attribute_unexplained`].

use crate::efficiency::CONSUMED_FLOOR;
use crate::model::{add_available, Channel, ChannelKind, Energy, EnergyBreakdown, EnergyFlow, Reading};

/// Fraction of the total the breakdown counters must explain before their
/// figures are trusted as-is
///
/// The heating/hot-water counters update far less often than the total, so
/// on a short window they frequently show little or nothing. Below this
/// coverage the remainder goes to heating. The value is empirical.
pub const ATTRIBUTION_COVERAGE_THRESHOLD: f64 = 0.5;

/// Totals at or below this are never attributed
pub const ATTRIBUTION_FLOOR: Energy = CONSUMED_FLOOR;

/// `last - first` for a counter over the window's endpoint readings
///
/// `None` if the window has fewer than two readings, either endpoint lacks
/// the channel, or the counter went backwards.
pub fn window_delta(readings: &[Reading], channel: Channel) -> Option<f64> {
    if readings.len() < 2 {
        return None;
    }
    let first = readings.first()?.get(channel)?;
    let last = readings.last()?.get(channel)?;
    if last >= first {
        Some(last - first)
    } else {
        None
    }
}

/// Same endpoints as [`window_delta`] but keeps the sign
pub fn signed_delta(readings: &[Reading], channel: Channel) -> Option<f64> {
    if readings.len() < 2 {
        return None;
    }
    Some(readings.last()?.get(channel)? - readings.first()?.get(channel)?)
}

/// Maximum value of a daily-reset counter within the window
pub fn reset_tolerant_delta(readings: &[Reading], channel: Channel) -> Option<f64> {
    if readings.len() < 2 {
        return None;
    }
    readings
        .iter()
        .filter_map(|r| r.get(channel))
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
}

/// Window delta of an energy counter in watt-hours, chosen by channel kind
///
/// Endpoints are converted before subtracting so the result is exact.
/// Non-counter channels have no delta.
pub fn energy_delta(readings: &[Reading], channel: Channel) -> Option<Energy> {
    match channel.kind() {
        ChannelKind::Counter => {
            if readings.len() < 2 {
                return None;
            }
            let first = Energy::from_kwh(readings.first()?.get(channel)?);
            let last = Energy::from_kwh(readings.last()?.get(channel)?);
            if last >= first {
                Some(last - first)
            } else {
                None
            }
        }
        ChannelKind::DailyCounter => reset_tolerant_delta(readings, channel).map(Energy::from_kwh),
        ChannelKind::Continuous | ChannelKind::BinaryState => None,
    }
}

/// Use the reported total, else the sum of whatever breakdown is available
pub fn derive_total(
    total: Option<Energy>,
    heating: Option<Energy>,
    hot_water: Option<Energy>,
) -> Option<Energy> {
    total.or_else(|| add_available(heating, hot_water))
}

/// Unexplained energy to assign to heating, if the attribution rule applies
///
/// Applies when the total exceeds [`ATTRIBUTION_FLOOR`] and the available
/// breakdown figures sum to less than [`ATTRIBUTION_COVERAGE_THRESHOLD`] of
/// it. Returns the remainder `total - known`, floored at zero. Unavailable
/// breakdowns explain nothing.
///
/// This assumes heating dominates whatever the slow breakdown counters
/// missed. It is a policy, not an estimate: callers record the returned
/// amount separately so it can be audited.
pub fn attribute_unexplained(total: Option<Energy>, breakdown: &[Option<Energy>]) -> Option<Energy> {
    let total = total.filter(|t| *t > ATTRIBUTION_FLOOR)?;
    let known: Energy = breakdown.iter().flatten().copied().sum();
    if (known.wh() as f64) < total.wh() as f64 * ATTRIBUTION_COVERAGE_THRESHOLD {
        Some(total.saturating_remainder(known))
    } else {
        None
    }
}

/// Attribution for both sides of a flow
pub fn attribution(total: &EnergyFlow, heating: &EnergyFlow, hot_water: &EnergyFlow) -> EnergyFlow {
    EnergyFlow::new(
        attribute_unexplained(total.consumed, &[heating.consumed, hot_water.consumed]),
        attribute_unexplained(total.delivered, &[heating.delivered, hot_water.delivered]),
    )
}

fn add_attributed(measured: Option<Energy>, attributed: Option<Energy>) -> Option<Energy> {
    match attributed {
        Some(a) => Some(measured.unwrap_or(Energy::ZERO) + a),
        None => measured,
    }
}

/// Reconciled heating / hot-water / total breakdown for one window
///
/// A window with fewer than two readings has every figure unavailable.
pub fn reconcile_window(readings: &[Reading]) -> EnergyBreakdown {
    if readings.len() < 2 {
        return EnergyBreakdown::default();
    }

    let mut heating = EnergyFlow::new(
        energy_delta(readings, Channel::HeatingConsumedKwh),
        energy_delta(readings, Channel::HeatingDeliveredKwh),
    );
    let hot_water = EnergyFlow::new(
        energy_delta(readings, Channel::DhwConsumedKwh),
        energy_delta(readings, Channel::DhwDeliveredKwh),
    );
    let total = EnergyFlow::new(
        derive_total(
            energy_delta(readings, Channel::DailyConsumedKwh),
            heating.consumed,
            hot_water.consumed,
        ),
        derive_total(
            energy_delta(readings, Channel::DailyProducedKwh),
            heating.delivered,
            hot_water.delivered,
        ),
    );

    let attributed = attribution(&total, &heating, &hot_water);
    heating.consumed = add_attributed(heating.consumed, attributed.consumed);
    heating.delivered = add_attributed(heating.delivered, attributed.delivered);

    EnergyBreakdown {
        heating,
        hot_water,
        total,
        attributed,
    }
}
