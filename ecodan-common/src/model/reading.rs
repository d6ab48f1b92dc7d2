//! One timestamped record of channel values

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::channel::Channel;

/// A timestamp plus the channels reported for it
///
/// A channel missing from the map was not reported this cycle. Absence is
/// never stored as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Local wall-clock time of the flush that produced this record
    pub timestamp: NaiveDateTime,
    values: BTreeMap<Channel, f64>,
}

impl Reading {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style setter, mainly for tests and fixtures
    pub fn with(mut self, channel: Channel, value: f64) -> Self {
        self.set(channel, Some(value));
        self
    }

    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.values.get(&channel).copied()
    }

    /// Set or clear a channel. Non-finite values are treated as absent.
    pub fn set(&mut self, channel: Channel, value: Option<f64>) {
        match value.filter(|v| v.is_finite()) {
            Some(v) => {
                self.values.insert(channel, v);
            }
            None => {
                self.values.remove(&channel);
            }
        }
    }

    /// Binary state of a channel; absent counts as inactive
    pub fn is_active(&self, channel: Channel) -> bool {
        matches!(self.get(channel), Some(v) if v != 0.0)
    }

    /// Calendar day this reading belongs to
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of channels present
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Present channels in column order
    pub fn iter(&self) -> impl Iterator<Item = (Channel, f64)> + '_ {
        self.values.iter().map(|(c, v)| (*c, *v))
    }
}
