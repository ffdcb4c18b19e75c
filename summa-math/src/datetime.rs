//! Date and time handling for Summa
//!
//! All period boundaries and rate observations live in a single fixed
//! reference time zone. Unfrozen period bounds are normalized to whole days
//! (00:00:00 through 23:59:59) in that zone.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

/// Errors that can occur during date/time operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateTimeError {
    /// Invalid date or time format
    #[error("Invalid date format: {0}")]
    InvalidFormat(String),
    /// Date is outside the representable range
    #[error("Date out of range: {0}")]
    OutOfRange(String),
    /// Local time does not exist or is ambiguous in the reference zone
    #[error("Ambiguous or nonexistent local time: {0}")]
    AmbiguousTime(String),
}

/// Result type for date/time operations
pub type DateTimeResult<T> = Result<T, DateTimeError>;

/// The fixed reference time zone for all period and rate timestamps
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::UTC;

/// Timestamp in the reference time zone
pub type Timestamp = DateTime<Tz>;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// First instant of the given date (00:00:00) in the reference zone
pub fn day_start(date: NaiveDate) -> DateTimeResult<Timestamp> {
    at_time(date, 0, 0, 0)
}

/// Last whole second of the given date (23:59:59) in the reference zone
pub fn day_end(date: NaiveDate) -> DateTimeResult<Timestamp> {
    at_time(date, 23, 59, 59)
}

/// The calendar year a timestamp falls in, in the reference zone
pub fn year_of(timestamp: &Timestamp) -> i32 {
    timestamp.with_timezone(&DEFAULT_TIMEZONE).year()
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp in the reference zone
pub fn parse_timestamp(text: &str) -> DateTimeResult<Timestamp> {
    let naive = NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT)
        .map_err(|e| DateTimeError::InvalidFormat(format!("{}: {}", text, e)))?;
    resolve_local(naive)
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS` in the reference zone
pub fn format_timestamp(timestamp: &Timestamp) -> String {
    timestamp.with_timezone(&DEFAULT_TIMEZONE).format(TIMESTAMP_FORMAT).to_string()
}

fn at_time(date: NaiveDate, hour: u32, min: u32, sec: u32) -> DateTimeResult<Timestamp> {
    let naive = date
        .and_hms_opt(hour, min, sec)
        .ok_or_else(|| DateTimeError::OutOfRange(date.to_string()))?;
    resolve_local(naive)
}

fn resolve_local(naive: NaiveDateTime) -> DateTimeResult<Timestamp> {
    DEFAULT_TIMEZONE
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| DateTimeError::AmbiguousTime(naive.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
        let start = day_start(date).unwrap();
        let end = day_end(date).unwrap();
        assert_eq!((start.hour(), start.minute(), start.second()), (0, 0, 0));
        assert_eq!((end.hour(), end.minute(), end.second()), (23, 59, 59));
        assert!(start < end);
    }

    #[test]
    fn test_parse_and_format_round_trip() {
        let ts = parse_timestamp("2023-06-15 08:30:00").unwrap();
        assert_eq!(format_timestamp(&ts), "2023-06-15 08:30:00");
        assert_eq!(year_of(&ts), 2023);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_timestamp("June 2023"), Err(DateTimeError::InvalidFormat(_))));
    }
}
