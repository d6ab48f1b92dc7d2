//! Period analysis
//!
//! Diagnostic statistics over an arbitrary canonical slice: the whole log, a
//! date range, or either side of a split instant (e.g. before and after a
//! pump speed change).

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{add_available, Channel, EnergyFlow, Reading};
use crate::normalize::{span, CanonicalStream};
use crate::reconcile::{energy_delta, signed_delta};
use crate::segment::{segment, SegmentStats};

/// Specific heat of water, kJ/(kg·K)
pub const WATER_SPECIFIC_HEAT: f64 = 4.186;

/// Channels reported with min/avg/max
pub const RANGE_CHANNELS: [Channel; 9] = [
    Channel::OutsideTemp,
    Channel::FeedTemp,
    Channel::ReturnTemp,
    Channel::DeltaT,
    Channel::DhwTemp,
    Channel::RoomTemp,
    Channel::PumpSpeed,
    Channel::PumpWatts,
    Channel::FlowRateLmin,
];

/// Controller-reported efficiency channels
pub const COP_CHANNELS: [Channel; 3] = [Channel::EstimatedCop, Channel::HeatingCop, Channel::DhwCop];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub count: usize,
}

impl RangeStats {
    pub fn of<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        if count == 0 {
            None
        } else {
            Some(Self {
                min,
                avg: sum / count as f64,
                max,
                count,
            })
        }
    }
}

/// Statistics over non-zero readings of a reported efficiency channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CopStats {
    pub nonzero: Option<RangeStats>,
    pub zero_readings: usize,
}

/// Heat delivered while the compressor runs, estimated from flow and ΔT
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatDelivery {
    pub avg_flow_lmin: f64,
    pub avg_delta_t: f64,
    pub kw: f64,
}

impl HeatDelivery {
    pub fn estimate(avg_flow_lmin: f64, avg_delta_t: f64) -> Self {
        Self {
            avg_flow_lmin,
            avg_delta_t,
            kw: avg_flow_lmin * WATER_SPECIFIC_HEAT * avg_delta_t / 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodReport {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub readings: usize,
    pub hours: f64,
    pub ranges: BTreeMap<Channel, RangeStats>,
    pub compressor_on_pct: f64,
    /// Compressor frequency over readings with the compressor on and Hz > 0
    pub frequency_on: Option<RangeStats>,
    pub output_power_on: Option<RangeStats>,
    pub estimated_power_on: Option<RangeStats>,
    pub compressor_on: SegmentStats,
    pub compressor_off: SegmentStats,
    pub starts_per_hour: Option<f64>,
    pub hot_water: SegmentStats,
    pub defrost: SegmentStats,
    pub heat_delivery: Option<HeatDelivery>,
    /// last - first for every counter, with sign
    pub counter_deltas: BTreeMap<Channel, f64>,
    pub heating: EnergyFlow,
    pub hot_water_energy: EnergyFlow,
    pub total: EnergyFlow,
    pub cop: BTreeMap<Channel, CopStats>,
    /// Lifetime compressor starts per lifetime operating hour
    pub lifetime_starts_per_hour: Option<f64>,
}

fn values(readings: &[Reading], channel: Channel) -> impl Iterator<Item = f64> + '_ {
    readings.iter().filter_map(move |r| r.get(channel))
}

/// Analyse a canonical slice; `None` if it is empty
pub fn analyze(readings: &[Reading]) -> Option<PeriodReport> {
    let first = readings.first()?;
    let last = readings.last()?;
    let hours = span(readings).num_seconds() as f64 / 3600.0;

    let ranges = RANGE_CHANNELS
        .iter()
        .filter_map(|&c| RangeStats::of(values(readings, c)).map(|s| (c, s)))
        .collect();

    let on: Vec<&Reading> = readings
        .iter()
        .filter(|r| r.is_active(Channel::CompressorOn))
        .collect();
    let compressor_on_pct = on.len() as f64 * 100.0 / readings.len() as f64;
    let positive_on = |channel: Channel| {
        RangeStats::of(on.iter().filter_map(|r| r.get(channel)).filter(|v| *v > 0.0))
    };

    let compressor_segments = segment(readings, Channel::CompressorOn);
    let compressor_on = SegmentStats::of(&compressor_segments, true);
    let starts_per_hour = (hours > 0.0).then(|| compressor_on.count as f64 / hours);

    let delta_t_on = RangeStats::of(on.iter().filter_map(|r| r.get(Channel::DeltaT)).filter(|v| *v > 0.0));
    let flow_on = RangeStats::of(on.iter().filter_map(|r| r.get(Channel::FlowRateLmin)));
    let heat_delivery = match (flow_on, delta_t_on) {
        (Some(flow), Some(dt)) => Some(HeatDelivery::estimate(flow.avg, dt.avg)),
        _ => None,
    };

    let counter_deltas = Channel::ALL
        .iter()
        .filter(|c| c.kind().is_counter())
        .filter_map(|&c| signed_delta(readings, c).map(|d| (c, d)))
        .collect();

    let heating = EnergyFlow::new(
        energy_delta(readings, Channel::HeatingConsumedKwh),
        energy_delta(readings, Channel::HeatingDeliveredKwh),
    );
    let hot_water_energy = EnergyFlow::new(
        energy_delta(readings, Channel::DhwConsumedKwh),
        energy_delta(readings, Channel::DhwDeliveredKwh),
    );
    let total = EnergyFlow::new(
        add_available(heating.consumed, hot_water_energy.consumed),
        add_available(heating.delivered, hot_water_energy.delivered),
    );

    let cop = COP_CHANNELS
        .iter()
        .map(|&c| {
            let all: Vec<f64> = values(readings, c).collect();
            let nonzero = RangeStats::of(all.iter().copied().filter(|v| *v > 0.0));
            let zero_readings = all.len() - nonzero.map_or(0, |s| s.count);
            (c, CopStats { nonzero, zero_readings })
        })
        .collect();

    let lifetime_starts_per_hour = match (
        last.get(Channel::CompressorStarts),
        last.get(Channel::OperatingHours),
    ) {
        (Some(starts), Some(op_hours)) if op_hours > 0.0 => Some(starts / op_hours),
        _ => None,
    };

    Some(PeriodReport {
        from: first.timestamp,
        to: last.timestamp,
        readings: readings.len(),
        hours,
        ranges,
        compressor_on_pct,
        frequency_on: positive_on(Channel::CompressorHz),
        output_power_on: positive_on(Channel::OutputPowerKw),
        estimated_power_on: positive_on(Channel::EstimatedPowerKw),
        compressor_on,
        compressor_off: SegmentStats::of(&compressor_segments, false),
        starts_per_hour,
        hot_water: SegmentStats::of(&segment(readings, Channel::DhwValve), true),
        defrost: SegmentStats::of(&segment(readings, Channel::Defrost), true),
        heat_delivery,
        counter_deltas,
        heating,
        hot_water_energy,
        total,
        cop,
        lifetime_starts_per_hour,
    })
}

/// Reports for both sides of a split instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub split: NaiveDateTime,
    pub before: Option<PeriodReport>,
    pub after: Option<PeriodReport>,
}

pub fn compare(stream: &CanonicalStream, split: NaiveDateTime) -> Comparison {
    let (before, after) = stream.split_at(split);
    Comparison {
        split,
        before: analyze(before),
        after: analyze(after),
    }
}
