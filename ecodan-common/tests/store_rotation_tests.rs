//! Record stream persistence: rotation on header change and crash tolerance

use chrono::NaiveDate;
use ecodan_common::store::{header_line, load_records, CsvRecordStore, OpenOutcome, RecordSink};
use ecodan_common::{Channel, Reading};
use std::fs;
use tempfile::TempDir;

fn reading(minute: u32) -> Reading {
    let ts = NaiveDate::from_ymd_opt(2026, 2, 20)
        .unwrap()
        .and_hms_opt(7, minute, 0)
        .unwrap();
    Reading::new(ts)
        .with(Channel::FeedTemp, 35.5)
        .with(Channel::ReturnTemp, 31.0)
        .with(Channel::DeltaT, 4.5)
}

#[test]
fn test_header_change_rotates_old_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ecodan_log.csv");
    let old = "timestamp,outside_temp,feed_temp\n2026-01-01 00:00:00,1.0,30.0\n";
    fs::write(&path, old).unwrap();

    let (mut store, outcome) = CsvRecordStore::open(&path).unwrap();
    let rotated = match outcome {
        OpenOutcome::Rotated(p) => p,
        other => panic!("expected rotation, got {:?}", other),
    };

    // Old content preserved byte for byte
    assert_eq!(fs::read_to_string(&rotated).unwrap(), old);
    let name = rotated.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("ecodan_log_"));
    assert!(name.ends_with(".csv"));
    assert_eq!(name.len(), "ecodan_log_YYYYmmdd_HHMMSS.csv".len());

    store.append(&reading(0)).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().next().unwrap(), header_line());
    assert_eq!(text.lines().count(), 2);
}

#[test]
fn test_rotated_file_still_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ecodan_log.csv");
    fs::write(&path, "timestamp,outside_temp,feed_temp\n2026-01-01 00:00:00,1.0,30.0\n").unwrap();

    let (_store, outcome) = CsvRecordStore::open(&path).unwrap();
    let OpenOutcome::Rotated(rotated) = outcome else {
        panic!("expected rotation");
    };
    let loaded = load_records(&rotated).unwrap();
    assert_eq!(loaded.records.len(), 1);
    assert_eq!(loaded.records[0].get(Channel::FeedTemp), Some(30.0));
}

#[test]
fn test_empty_file_gets_header() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ecodan_log.csv");
    fs::write(&path, "").unwrap();

    let (_store, outcome) = CsvRecordStore::open(&path).unwrap();
    assert_eq!(outcome, OpenOutcome::Created);
    assert_eq!(fs::read_to_string(&path).unwrap(), format!("{}\n", header_line()));
}

#[test]
fn test_missing_parent_directory_created() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("data").join("ecodan_log.csv");
    let (mut store, _) = CsvRecordStore::open(&path).unwrap();
    store.append(&reading(1)).unwrap();
    assert_eq!(load_records(&path).unwrap().records, vec![reading(1)]);
}

#[test]
fn test_every_line_is_complete() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ecodan_log.csv");
    let (mut store, _) = CsvRecordStore::open(&path).unwrap();
    for m in 0..20 {
        store.append(&reading(m)).unwrap();
    }
    let text = fs::read_to_string(&path).unwrap();
    let width = header_line().split(',').count();
    assert!(text.ends_with('\n'));
    for line in text.lines() {
        assert_eq!(line.split(',').count(), width);
    }
}
