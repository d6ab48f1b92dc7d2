//! Record normaliser
//!
//! Turns a raw record stream (duplicated, out of order, possibly merged from
//! overlapping collector instances) into a [`CanonicalStream`].

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::model::Reading;

/// Strictly time-ascending readings with unique timestamps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalStream {
    readings: Vec<Reading>,
}

/// Deduplicate by timestamp (first occurrence wins) and sort ascending
///
/// Two readings with the same timestamp are duplicates even when their
/// payloads differ.
pub fn normalize(mut records: Vec<Reading>) -> CanonicalStream {
    // Stable sort keeps input order among equal timestamps, so dedup keeps
    // the first one encountered
    records.sort_by_key(|r| r.timestamp);
    records.dedup_by_key(|r| r.timestamp);
    CanonicalStream { readings: records }
}

impl CanonicalStream {
    pub fn as_slice(&self) -> &[Reading] {
        &self.readings
    }

    pub fn into_inner(self) -> Vec<Reading> {
        self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Reading> {
        self.readings.iter()
    }

    pub fn first(&self) -> Option<&Reading> {
        self.readings.first()
    }

    pub fn last(&self) -> Option<&Reading> {
        self.readings.last()
    }

    /// Time between the first and last reading
    pub fn duration(&self) -> Duration {
        span(&self.readings)
    }

    /// Contiguous per-day slices in date order
    pub fn days(&self) -> Vec<(NaiveDate, &[Reading])> {
        self.readings
            .chunk_by(|a, b| a.date() == b.date())
            .map(|chunk| (chunk[0].date(), chunk))
            .collect()
    }

    /// Readings with `from <= timestamp < to`; open bounds are unbounded
    pub fn range(&self, from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> &[Reading] {
        let start = from.map_or(0, |f| self.readings.partition_point(|r| r.timestamp < f));
        let end = to.map_or(self.readings.len(), |t| {
            self.readings.partition_point(|r| r.timestamp < t)
        });
        if start >= end {
            &[]
        } else {
            &self.readings[start..end]
        }
    }

    /// Readings before `at`, and readings at or after it
    pub fn split_at(&self, at: NaiveDateTime) -> (&[Reading], &[Reading]) {
        let idx = self.readings.partition_point(|r| r.timestamp < at);
        self.readings.split_at(idx)
    }
}

/// Wall-clock span of an ascending slice
pub fn span(readings: &[Reading]) -> Duration {
    match (readings.first(), readings.last()) {
        (Some(first), Some(last)) => last.timestamp - first.timestamp,
        _ => Duration::zero(),
    }
}
