//! Runs the built binary against a record stream in a temporary data folder

use std::path::Path;
use std::process::{Command, Output};

use chrono::NaiveDate;
use ecodan_common::store::{CsvRecordStore, RecordSink};
use ecodan_common::{Channel, Reading};
use tempfile::TempDir;

fn write_stream(path: &Path) {
    let (mut store, _) = CsvRecordStore::open(path).unwrap();
    for day in 1..=2u32 {
        for h in 0..24u32 {
            let t = ((day - 1) * 24 + h) as f64;
            let ts = NaiveDate::from_ymd_opt(2026, 2, day)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap();
            let reading = Reading::new(ts)
                .with(Channel::OutsideTemp, 1.0)
                .with(Channel::CompressorOn, if h % 2 == 0 { 1.0 } else { 0.0 })
                .with(Channel::HeatingConsumedKwh, 1000.0 + 0.5 * t)
                .with(Channel::HeatingDeliveredKwh, 3000.0 + 1.5 * t)
                .with(Channel::DailyConsumedKwh, 0.5 * h as f64)
                .with(Channel::DailyProducedKwh, 1.5 * h as f64);
            store.append(&reading).unwrap();
        }
    }
}

/// Data folder with a config file pointing at it and a two-day stream
fn setup() -> TempDir {
    let dir = TempDir::new().unwrap();
    let config = format!("data_folder = '{}'\n", dir.path().display());
    std::fs::write(dir.path().join("config.toml"), config).unwrap();
    write_stream(&dir.path().join("ecodan_log.csv"));
    dir
}

fn run(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ecodan-report"))
        .arg("--config")
        .arg(dir.path().join("config.toml"))
        .args(args)
        .env_remove("ECODAN_DATA_FOLDER")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn test_daily_table() {
    let dir = setup();
    let output = run(&dir, &["daily"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2026-02-01"));
    assert!(stdout.contains("2026-02-02"));
}

#[test]
fn test_summary_lists_month_and_year() {
    let dir = setup();
    let output = run(&dir, &["summary"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2026-02"));
    assert!(stdout.contains("Yearly"));
}

#[test]
fn test_export_writes_file() {
    let dir = setup();
    let output = run(&dir, &["export"]);
    assert!(output.status.success());
    let text = std::fs::read_to_string(dir.path().join("daily_energy.csv")).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.starts_with("Date,"));
}

#[test]
fn test_cycles_rejects_continuous_channel() {
    let dir = setup();
    let output = run(&dir, &["cycles", "--channel", "feed_temp"]);
    assert!(!output.status.success());
}

#[test]
fn test_compare_splits_days() {
    let dir = setup();
    let output = run(&dir, &["compare", "--split", "2026-02-02"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("=== Before 2026-02-02 00:00:00 ==="));
    assert!(stdout.contains("24 readings"));
}
