//! Stream file to rollup, end to end

use chrono::{NaiveDate, NaiveDateTime};
use ecodan_common::daily::{daily_summaries, DailySelection};
use ecodan_common::model::{Energy, PeriodKey};
use ecodan_common::normalize::normalize;
use ecodan_common::rollup::{merge_parts, monthly_report, monthly_summaries, HistoricalBaseline};
use ecodan_common::segment::segment;
use ecodan_common::store::{load_records, CsvRecordStore, RecordSink};
use ecodan_common::{Channel, Reading};
use tempfile::TempDir;

fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 2, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// Hourly readings for one day; lifetime counters keep climbing across days
fn day_records(day: u32) -> Vec<Reading> {
    (0..24)
        .map(|h| {
            let t = ((day - 1) * 24 + h) as f64;
            Reading::new(at(day, h, 0))
                .with(Channel::OutsideTemp, -2.0 + (h % 6) as f64)
                .with(Channel::CompressorOn, if h % 3 == 0 { 0.0 } else { 1.0 })
                .with(Channel::HeatingConsumedKwh, 1000.0 + 0.5 * t)
                .with(Channel::HeatingDeliveredKwh, 3000.0 + 1.6 * t)
                .with(Channel::DhwConsumedKwh, 200.0 + 0.1 * t)
                .with(Channel::DhwDeliveredKwh, 500.0 + 0.25 * t)
                .with(Channel::DailyConsumedKwh, 0.6 * h as f64)
                .with(Channel::DailyProducedKwh, 1.85 * h as f64)
        })
        .collect()
}

#[test]
fn test_file_roundtrip_through_summaries() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ecodan_log.csv");
    let (mut store, _) = CsvRecordStore::open(&path).unwrap();
    for r in day_records(1).iter().chain(day_records(2).iter()) {
        store.append(r).unwrap();
    }
    // Overlapping collector wrote a duplicate of one row
    store.append(&day_records(1)[5]).unwrap();
    drop(store);

    let loaded = load_records(&path).unwrap();
    assert_eq!(loaded.records.len(), 49);
    let stream = normalize(loaded.records);
    assert_eq!(stream.len(), 48);

    let days = daily_summaries(&stream, &DailySelection::default());
    assert_eq!(days.len(), 2);
    let d1 = &days[0];
    assert_eq!(d1.readings, 24);
    assert_eq!(d1.energy.heating.consumed, Some(Energy::from_kwh(11.5)));
    assert_eq!(d1.energy.total.consumed, Some(Energy::from_kwh(13.8)));
    assert_eq!(d1.energy.attributed.consumed, None);
    assert_eq!(d1.active_percentage(Channel::CompressorOn).map(f64::round), Some(67.0));
}

#[test]
fn test_rollup_associativity_over_february() {
    let records: Vec<Reading> = (1..=28).flat_map(day_records).collect();
    let stream = normalize(records);
    let days = daily_summaries(&stream, &DailySelection::default());
    assert_eq!(days.len(), 28);

    let key = PeriodKey::Month { year: 2026, month: 2 };
    let whole = merge_parts(key, monthly_summaries(&days).values());
    let first = merge_parts(key, monthly_summaries(&days[..15]).values());
    let second = merge_parts(key, monthly_summaries(&days[15..]).values());

    let ab = merge_parts(key, [&first, &second]);
    let ba = merge_parts(key, [&second, &first]);
    assert_eq!(ab, whole);
    assert_eq!(ba, whole);

    let mut reversed = days.clone();
    reversed.reverse();
    assert_eq!(merge_parts(key, monthly_summaries(&reversed).values()), whole);
}

#[test]
fn test_normalizer_permutation_invariance() {
    let mut records: Vec<Reading> = (1..=3).flat_map(day_records).collect();
    let canonical = normalize(records.clone());
    records.reverse();
    assert_eq!(normalize(records), canonical);
}

#[test]
fn test_segment_coverage_matches_stream() {
    let stream = normalize((1..=2).flat_map(day_records).collect());
    let segs = segment(stream.as_slice(), Channel::CompressorOn);
    let minutes: f64 = segs.iter().map(|s| s.duration_minutes()).sum();
    assert_eq!(minutes, stream.duration().num_minutes() as f64);
}

#[test]
fn test_monthly_report_with_baseline() {
    let stream = normalize((1..=2).flat_map(day_records).collect());
    let days = daily_summaries(&stream, &DailySelection::default());
    let baseline = HistoricalBaseline::from_json_str(
        r#"{"2026-01": {"total_consumed_kwh": 400.0, "total_delivered_kwh": 1200.0}}"#,
    )
    .unwrap();

    let months = monthly_report(&days, &baseline);
    assert_eq!(months.len(), 2);
    assert_eq!(months[0].key.to_string(), "2026-01");
    assert_eq!(months[0].days, 0);
    assert_eq!(months[0].energy.heating.consumed, Some(Energy::from_kwh(400.0)));
    assert_eq!(months[1].key.to_string(), "2026-02");
    assert_eq!(months[1].days, 2);
}
