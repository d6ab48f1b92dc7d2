//! Per-day summaries
//!
//! A [`DailySummary`] is a pure function of one day's canonical readings and
//! the channel selection. Recomputing it from the same input serialises to
//! the same bytes.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::model::{ActiveShare, Channel, DailySummary, MeanAccumulator, Reading};
use crate::normalize::CanonicalStream;
use crate::reconcile::reconcile_window;

/// Which channels a summary averages and which it reports duty for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySelection {
    pub averages: Vec<Channel>,
    pub active: Vec<Channel>,
}

impl Default for DailySelection {
    fn default() -> Self {
        Self {
            averages: vec![
                Channel::OutsideTemp,
                Channel::RoomTemp,
                Channel::FeedTemp,
                Channel::FlowTargetTemp,
            ],
            active: vec![Channel::CompressorOn, Channel::DhwValve, Channel::Defrost],
        }
    }
}

/// Summarise one day; `None` for an empty slice
///
/// `readings` must be canonical and all fall on `date`.
pub fn summarize_day(
    date: NaiveDate,
    readings: &[Reading],
    selection: &DailySelection,
) -> Option<DailySummary> {
    let first = readings.first()?;
    let last = readings.last()?;

    let averages: BTreeMap<Channel, MeanAccumulator> = selection
        .averages
        .iter()
        .map(|&channel| {
            let acc: MeanAccumulator = readings.iter().filter_map(|r| r.get(channel)).collect();
            (channel, acc)
        })
        .collect();

    let active: BTreeMap<Channel, ActiveShare> = selection
        .active
        .iter()
        .map(|&channel| {
            let share = ActiveShare {
                active: readings.iter().filter(|r| r.is_active(channel)).count() as u64,
                total: readings.len() as u64,
            };
            (channel, share)
        })
        .collect();

    Some(DailySummary {
        date,
        readings: readings.len(),
        first: first.timestamp,
        last: last.timestamp,
        averages,
        active,
        energy: reconcile_window(readings),
    })
}

/// One summary per local date present in the stream, in date order
pub fn daily_summaries(stream: &CanonicalStream, selection: &DailySelection) -> Vec<DailySummary> {
    stream
        .days()
        .into_iter()
        .filter_map(|(date, readings)| summarize_day(date, readings, selection))
        .collect()
}
