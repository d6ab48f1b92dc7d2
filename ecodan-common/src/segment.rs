//! State segmentation
//!
//! Run-length encodes one binary channel over a canonical stream. Segments
//! are produced for both states; callers wanting only active runs filter
//! afterwards.

use serde::Serialize;

use crate::model::{Channel, Reading, Segment};

/// Split `readings` into maximal runs of constant state for `channel`
///
/// An absent value counts as inactive. Each segment ends at the timestamp of
/// the reading that changed state, so consecutive segments share endpoints
/// and their durations add up to the stream duration. The final segment is
/// closed at the last reading, which gives a zero-length segment for a
/// single-reading stream.
pub fn segment(readings: &[Reading], channel: Channel) -> Vec<Segment> {
    let first = match readings.first() {
        Some(r) => r,
        None => return Vec::new(),
    };

    let mut segments = Vec::new();
    let mut state = first.is_active(channel);
    let mut start = first.timestamp;

    for reading in &readings[1..] {
        let value = reading.is_active(channel);
        if value != state {
            segments.push(Segment {
                channel,
                active: state,
                start,
                end: reading.timestamp,
            });
            state = value;
            start = reading.timestamp;
        }
    }

    // first exists, so last does too
    let end = readings.last().map_or(start, |r| r.timestamp);
    segments.push(Segment {
        channel,
        active: state,
        start,
        end,
    });
    segments
}

/// Count and length statistics over segments of one state
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SegmentStats {
    pub count: usize,
    pub total_minutes: f64,
    pub min_minutes: Option<f64>,
    pub max_minutes: Option<f64>,
}

impl SegmentStats {
    /// Statistics over the segments whose state equals `active`
    pub fn of(segments: &[Segment], active: bool) -> Self {
        let mut stats = SegmentStats::default();
        for seg in segments.iter().filter(|s| s.active == active) {
            let minutes = seg.duration_minutes();
            stats.count += 1;
            stats.total_minutes += minutes;
            stats.min_minutes = Some(stats.min_minutes.map_or(minutes, |m| m.min(minutes)));
            stats.max_minutes = Some(stats.max_minutes.map_or(minutes, |m| m.max(minutes)));
        }
        stats
    }

    pub fn average_minutes(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total_minutes / self.count as f64)
        }
    }
}
