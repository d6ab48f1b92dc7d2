//! Timestamp utilities
//!
//! Records are keyed by local wall-clock time at one-second resolution.

use chrono::{Local, NaiveDateTime, Timelike};

use crate::{Error, Result};

/// Persisted timestamp format
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Suffix format for rotated log files
pub const ROTATION_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Current local time truncated to whole seconds
pub fn now_local() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .map_err(|e| Error::Parse(format!("timestamp '{}': {}", raw, e)))
}

/// Parse a user-supplied instant: full timestamp, `YYYY-MM-DD HH:MM`, or a bare date
pub fn parse_instant(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
        return Ok(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
        return Ok(ts);
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::InvalidInput(format!("unrecognised date/time '{}'", raw)))
}

pub fn rotation_suffix(ts: &NaiveDateTime) -> String {
    ts.format(ROTATION_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_now_local_has_no_subseconds() {
        assert_eq!(now_local().nanosecond(), 0);
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let ts = NaiveDate::from_ymd_opt(2026, 2, 20)
            .unwrap()
            .and_hms_opt(5, 51, 9)
            .unwrap();
        let text = format_timestamp(&ts);
        assert_eq!(text, "2026-02-20 05:51:09");
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(matches!(parse_timestamp("yesterday"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_parse_instant_variants() {
        let d = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        assert_eq!(parse_instant("2026-02-20").unwrap(), d.and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(
            parse_instant("2026-02-20 13:45").unwrap(),
            d.and_hms_opt(13, 45, 0).unwrap()
        );
        assert!(parse_instant("20/02/2026").is_err());
    }

    #[test]
    fn test_rotation_suffix() {
        let ts = NaiveDate::from_ymd_opt(2026, 2, 20)
            .unwrap()
            .and_hms_opt(5, 51, 9)
            .unwrap();
        assert_eq!(rotation_suffix(&ts), "20260220_055109");
    }
}
