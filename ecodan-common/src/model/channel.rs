//! Fixed channel table for the Ecodan controller
//!
//! Every measurement the logger records is a [`Channel`] with a declared
//! [`ChannelKind`]. The kind is configuration: the reconciliation and
//! segmentation engines never infer it from the data.
//!
//! The table order is the persisted column order. Changing it changes the
//! stream header and triggers rotation of the existing log file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a channel's values behave over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Float measurement that may be absent in any cycle
    Continuous,
    /// 0/1 state flag
    BinaryState,
    /// Non-decreasing cumulative counter (lifetime energy, starts, hours)
    Counter,
    /// Counter that the controller zeroes at local midnight
    DailyCounter,
}

impl ChannelKind {
    /// True for both counter flavours
    pub fn is_counter(self) -> bool {
        matches!(self, ChannelKind::Counter | ChannelKind::DailyCounter)
    }

    /// Parse a raw transport payload for this kind of channel
    ///
    /// Binary payloads accept `ON`/`true` or a nonzero number as active;
    /// anything else is inactive. Numeric payloads that fail to parse, or parse to NaN/inf,
    /// yield `None` so the channel is recorded as absent rather than zero.
    pub fn parse_payload(self, raw: &str) -> Option<f64> {
        let raw = raw.trim();
        match self {
            ChannelKind::BinaryState => {
                let active = raw.eq_ignore_ascii_case("on")
                    || raw.eq_ignore_ascii_case("true")
                    || matches!(raw.parse::<f64>(), Ok(v) if v != 0.0 && v.is_finite());
                Some(if active { 1.0 } else { 0.0 })
            }
            _ => raw.parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

/// ESPHome component class an inbound entity belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Sensor,
    BinarySensor,
}

impl Component {
    /// Component name as used in event-stream ids
    pub fn as_str(self) -> &'static str {
        match self {
            Component::Sensor => "sensor",
            Component::BinarySensor => "binary_sensor",
        }
    }
}

/// Where a channel's values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrigin {
    /// Pushed by the controller under this ESPHome object id
    Inbound {
        component: Component,
        object_id: &'static str,
        /// Optional entities are recorded when present but not required
        optional: bool,
    },
    /// Computed from other channels after snapshotting
    Derived,
    /// Pulled from an external source once per flush cycle
    Auxiliary,
}

/// A parsed inbound entity identifier, e.g. `sensor-outside_temp`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityId<'a> {
    pub component: Component,
    pub object_id: &'a str,
}

impl<'a> EntityId<'a> {
    /// Parse an ESPHome event-stream id (`<component>-<object_id>`)
    pub fn parse_sse(id: &'a str) -> Option<Self> {
        // Object ids may themselves contain '-', so only the prefix is split off
        for component in [Component::BinarySensor, Component::Sensor] {
            if let Some(object_id) = id
                .strip_prefix(component.as_str())
                .and_then(|rest| rest.strip_prefix('-'))
            {
                if !object_id.is_empty() {
                    return Some(Self { component, object_id });
                }
            }
        }
        None
    }

    /// Look up the channel this entity feeds, if it is one we record
    pub fn channel(&self) -> Option<Channel> {
        Channel::ALL.iter().copied().find(|c| {
            matches!(
                c.origin(),
                ChannelOrigin::Inbound { component, object_id, .. }
                    if component == self.component && object_id == self.object_id
            )
        })
    }
}

/// Static description of one channel
#[derive(Debug, Clone, Copy)]
pub struct ChannelSpec {
    pub channel: Channel,
    pub column: &'static str,
    pub kind: ChannelKind,
    pub origin: ChannelOrigin,
}

/// Every channel the system knows about, in persisted column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    OutsideTemp,
    FeedTemp,
    ReturnTemp,
    DhwTemp,
    CompressorHz,
    OutputPowerKw,
    EstimatedPowerKw,
    EstimatedCop,
    HeatingCop,
    DhwCop,
    FlowRateLmin,
    PumpSpeed,
    PumpWatts,
    FanRpm,
    HeatingConsumedKwh,
    HeatingDeliveredKwh,
    DhwConsumedKwh,
    DhwDeliveredKwh,
    DailyConsumedKwh,
    DailyProducedKwh,
    CompressorStarts,
    OperatingHours,
    DischargeTemp,
    RefrigerantTemp,
    CondensingTemp,
    FlowTargetTemp,
    CompressorOn,
    Defrost,
    DhwValve,
    BoosterHeater,
    WaterPump,
    WaterPump2,
    DhwEco,
    ShortCycleLockout,
    PredictiveBoost,
    DeltaT,
    RoomTemp,
}

const fn sensor(
    channel: Channel,
    column: &'static str,
    kind: ChannelKind,
    object_id: &'static str,
) -> ChannelSpec {
    ChannelSpec {
        channel,
        column,
        kind,
        origin: ChannelOrigin::Inbound {
            component: Component::Sensor,
            object_id,
            optional: false,
        },
    }
}

const fn binary(
    channel: Channel,
    column: &'static str,
    object_id: &'static str,
    optional: bool,
) -> ChannelSpec {
    ChannelSpec {
        channel,
        column,
        kind: ChannelKind::BinaryState,
        origin: ChannelOrigin::Inbound {
            component: Component::BinarySensor,
            object_id,
            optional,
        },
    }
}

use ChannelKind::{Continuous, Counter, DailyCounter};

const TABLE: [ChannelSpec; Channel::COUNT] = [
    sensor(Channel::OutsideTemp, "outside_temp", Continuous, "outside_temp"),
    sensor(Channel::FeedTemp, "feed_temp", Continuous, "feed_temp"),
    sensor(Channel::ReturnTemp, "return_temp", Continuous, "return_temp"),
    sensor(Channel::DhwTemp, "dhw_temp", Continuous, "dhw_current_temp"),
    sensor(Channel::CompressorHz, "compressor_hz", Continuous, "compressor_frequency"),
    sensor(Channel::OutputPowerKw, "output_power_kw", Continuous, "output_power"),
    sensor(Channel::EstimatedPowerKw, "estimated_power_kw", Continuous, "estimated_output_power"),
    sensor(Channel::EstimatedCop, "estimated_cop", Continuous, "estimated_cop"),
    sensor(Channel::HeatingCop, "heating_cop", Continuous, "heating_cop"),
    sensor(Channel::DhwCop, "dhw_cop", Continuous, "dhw_cop"),
    sensor(Channel::FlowRateLmin, "flow_rate_lmin", Continuous, "flow_rate"),
    sensor(Channel::PumpSpeed, "pump_speed", Continuous, "pump_speed"),
    sensor(Channel::PumpWatts, "pump_watts", Continuous, "pump_consumption"),
    sensor(Channel::FanRpm, "fan_rpm", Continuous, "fan_speed"),
    sensor(Channel::HeatingConsumedKwh, "heating_consumed_kwh", Counter, "heating_consumed"),
    sensor(Channel::HeatingDeliveredKwh, "heating_delivered_kwh", Counter, "heating_delivered"),
    sensor(Channel::DhwConsumedKwh, "dhw_consumed_kwh", Counter, "dhw_consumed"),
    sensor(Channel::DhwDeliveredKwh, "dhw_delivered_kwh", Counter, "dhw_delivered"),
    sensor(
        Channel::DailyConsumedKwh,
        "daily_consumed_kwh",
        DailyCounter,
        "reported_total_daily_energy_consumption",
    ),
    sensor(
        Channel::DailyProducedKwh,
        "daily_produced_kwh",
        DailyCounter,
        "estimated_total_daily_energy_produced",
    ),
    sensor(Channel::CompressorStarts, "compressor_starts", Counter, "accumulated_compressor_starts"),
    sensor(Channel::OperatingHours, "operating_hours", Counter, "operating_runtime"),
    sensor(Channel::DischargeTemp, "discharge_temp", Continuous, "discharge_temp"),
    sensor(Channel::RefrigerantTemp, "refrigerant_temp", Continuous, "refrigerant_liquid_temp"),
    sensor(Channel::CondensingTemp, "condensing_temp", Continuous, "refrigerant_condensing_temp"),
    sensor(Channel::FlowTargetTemp, "flow_target_temp", Continuous, "zone_1_setpoint_value"),
    binary(Channel::CompressorOn, "compressor_on", "compressor", false),
    binary(Channel::Defrost, "defrost", "defrost", false),
    binary(Channel::DhwValve, "3way_valve_dhw", "3-way_valve", false),
    binary(Channel::BoosterHeater, "booster_heater", "booster_heater", false),
    binary(Channel::WaterPump, "water_pump", "water_pump_status", false),
    binary(Channel::WaterPump2, "water_pump_2", "water_pump_2_status", false),
    binary(Channel::DhwEco, "dhw_eco", "dhw_eco", false),
    binary(Channel::ShortCycleLockout, "sc_lockout", "short-cycle__lockout", true),
    binary(
        Channel::PredictiveBoost,
        "sc_predictive_boost",
        "short-cycle__predictive_boost_active",
        true,
    ),
    ChannelSpec {
        channel: Channel::DeltaT,
        column: "delta_t",
        kind: Continuous,
        origin: ChannelOrigin::Derived,
    },
    ChannelSpec {
        channel: Channel::RoomTemp,
        column: "room_temp",
        kind: Continuous,
        origin: ChannelOrigin::Auxiliary,
    },
];

impl Channel {
    /// Number of channels in the table
    pub const COUNT: usize = 37;

    /// All channels in persisted column order
    pub const ALL: [Channel; Channel::COUNT] = [
        Channel::OutsideTemp,
        Channel::FeedTemp,
        Channel::ReturnTemp,
        Channel::DhwTemp,
        Channel::CompressorHz,
        Channel::OutputPowerKw,
        Channel::EstimatedPowerKw,
        Channel::EstimatedCop,
        Channel::HeatingCop,
        Channel::DhwCop,
        Channel::FlowRateLmin,
        Channel::PumpSpeed,
        Channel::PumpWatts,
        Channel::FanRpm,
        Channel::HeatingConsumedKwh,
        Channel::HeatingDeliveredKwh,
        Channel::DhwConsumedKwh,
        Channel::DhwDeliveredKwh,
        Channel::DailyConsumedKwh,
        Channel::DailyProducedKwh,
        Channel::CompressorStarts,
        Channel::OperatingHours,
        Channel::DischargeTemp,
        Channel::RefrigerantTemp,
        Channel::CondensingTemp,
        Channel::FlowTargetTemp,
        Channel::CompressorOn,
        Channel::Defrost,
        Channel::DhwValve,
        Channel::BoosterHeater,
        Channel::WaterPump,
        Channel::WaterPump2,
        Channel::DhwEco,
        Channel::ShortCycleLockout,
        Channel::PredictiveBoost,
        Channel::DeltaT,
        Channel::RoomTemp,
    ];

    /// Position in [`Channel::ALL`] and in the persisted column list
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn spec(self) -> &'static ChannelSpec {
        &TABLE[self.index()]
    }

    /// Persisted column name
    pub fn column(self) -> &'static str {
        self.spec().column
    }

    pub fn kind(self) -> ChannelKind {
        self.spec().kind
    }

    pub fn origin(self) -> ChannelOrigin {
        self.spec().origin
    }

    /// Resolve a persisted column name back to its channel
    pub fn from_column(column: &str) -> Option<Channel> {
        TABLE.iter().find(|s| s.column == column).map(|s| s.channel)
    }

    /// Channels that must be seen before a discovery pass is considered complete
    pub fn required_inbound() -> impl Iterator<Item = Channel> {
        Channel::ALL.into_iter().filter(|c| {
            matches!(c.origin(), ChannelOrigin::Inbound { optional: false, .. })
        })
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_enum() {
        for (i, spec) in TABLE.iter().enumerate() {
            assert_eq!(spec.channel.index(), i, "table entry {} out of order", spec.column);
            assert_eq!(Channel::ALL[i], spec.channel);
        }
    }

    #[test]
    fn test_columns_unique() {
        let mut columns: Vec<&str> = TABLE.iter().map(|s| s.column).collect();
        columns.sort_unstable();
        columns.dedup();
        assert_eq!(columns.len(), Channel::COUNT);
    }

    #[test]
    fn test_from_column_roundtrip() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_column(channel.column()), Some(channel));
        }
        assert_eq!(Channel::from_column("timestamp"), None);
    }

    #[test]
    fn test_parse_sse_ids() {
        let id = EntityId::parse_sse("sensor-outside_temp").unwrap();
        assert_eq!(id.component, Component::Sensor);
        assert_eq!(id.channel(), Some(Channel::OutsideTemp));

        let id = EntityId::parse_sse("binary_sensor-3-way_valve").unwrap();
        assert_eq!(id.component, Component::BinarySensor);
        assert_eq!(id.channel(), Some(Channel::DhwValve));

        let id = EntityId::parse_sse("binary_sensor-short-cycle__lockout").unwrap();
        assert_eq!(id.channel(), Some(Channel::ShortCycleLockout));

        assert!(EntityId::parse_sse("switch-something").is_none());
        assert!(EntityId::parse_sse("sensor-").is_none());
    }

    #[test]
    fn test_unknown_entity_has_no_channel() {
        let id = EntityId::parse_sse("sensor-wifi_signal").unwrap();
        assert_eq!(id.channel(), None);
        // Same object id under the wrong component
        let id = EntityId::parse_sse("binary_sensor-outside_temp").unwrap();
        assert_eq!(id.channel(), None);
    }

    #[test]
    fn test_parse_payload() {
        assert_eq!(ChannelKind::BinaryState.parse_payload("ON"), Some(1.0));
        assert_eq!(ChannelKind::BinaryState.parse_payload("OFF"), Some(0.0));
        assert_eq!(ChannelKind::BinaryState.parse_payload("true"), Some(1.0));
        assert_eq!(ChannelKind::BinaryState.parse_payload("1"), Some(1.0));
        assert_eq!(ChannelKind::BinaryState.parse_payload("0"), Some(0.0));
        assert_eq!(ChannelKind::Continuous.parse_payload(" 21.5 "), Some(21.5));
        assert_eq!(ChannelKind::Continuous.parse_payload("unavailable"), None);
        assert_eq!(ChannelKind::Counter.parse_payload("nan"), None);
    }

    #[test]
    fn test_required_inbound_excludes_optional_and_derived() {
        let required: Vec<Channel> = Channel::required_inbound().collect();
        assert!(required.contains(&Channel::CompressorOn));
        assert!(!required.contains(&Channel::ShortCycleLockout));
        assert!(!required.contains(&Channel::DeltaT));
        assert!(!required.contains(&Channel::RoomTemp));
        assert_eq!(required.len(), 33);
    }
}
