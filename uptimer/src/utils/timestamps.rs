//! Timestamp parsing for freshness checks.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Errors that can occur during timestamp parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// The value is neither a string nor a number.
    #[error("Unsupported timestamp type: expected string or number")]
    UnsupportedType,

    /// The string matches none of the accepted formats.
    #[error("Invalid timestamp: {0}")]
    InvalidFormat(String),

    /// The number is outside the representable range.
    #[error("Timestamp out of range: {0}")]
    OutOfRange(String),
}

enum Layout {
    /// Offset is part of the text.
    Zoned(&'static str),
    /// No offset; read as UTC.
    Naive(&'static str),
    /// Date only; midnight UTC.
    Date(&'static str),
}

/// Accepted string layouts, tried in order.
const LAYOUTS: [Layout; 7] = [
    Layout::Naive("%Y-%m-%dT%H:%M:%S%.fZ"),
    Layout::Naive("%Y-%m-%dT%H:%M:%SZ"),
    Layout::Zoned("%Y-%m-%dT%H:%M:%S%.f%z"),
    Layout::Zoned("%Y-%m-%dT%H:%M:%S%z"),
    Layout::Naive("%Y-%m-%dT%H:%M:%S"),
    Layout::Naive("%Y-%m-%d %H:%M:%S"),
    Layout::Date("%Y-%m-%d"),
];

/// Returns the current UTC time.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Parses a timestamp string against the fixed layout list.
///
/// Layouts without an offset are read as UTC.
///
/// # Examples
///
/// ```
/// use uptimer::utils::parse_timestamp;
///
/// assert!(parse_timestamp("2024-03-01T12:00:00Z").is_ok());
/// assert!(parse_timestamp("2024-03-01").is_ok());
/// assert!(parse_timestamp("yesterday").is_err());
/// ```
pub fn parse_timestamp(input: &str) -> Result<Timestamp, TimestampError> {
    for layout in &LAYOUTS {
        let parsed = match layout {
            Layout::Zoned(fmt) => DateTime::parse_from_str(input, fmt)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::Naive(fmt) => NaiveDateTime::parse_from_str(input, fmt)
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive)),
            Layout::Date(fmt) => NaiveDate::parse_from_str(input, fmt)
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive)),
        };
        if let Some(dt) = parsed {
            return Ok(dt);
        }
    }
    Err(TimestampError::InvalidFormat(input.to_string()))
}

/// Parses a Unix timestamp in seconds, fractions allowed.
pub fn parse_unix_timestamp(value: f64) -> Result<Timestamp, TimestampError> {
    if !value.is_finite() {
        return Err(TimestampError::OutOfRange(value.to_string()));
    }
    #[allow(clippy::cast_possible_truncation)]
    let millis = (value * 1000.0).round() as i64;
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| TimestampError::OutOfRange(value.to_string()))
}

/// Parses a JSON value: numbers are Unix seconds, strings use
/// [`parse_timestamp`].
pub fn parse_timestamp_value(value: &Value) -> Result<Timestamp, TimestampError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or(TimestampError::UnsupportedType)
            .and_then(parse_unix_timestamp),
        Value::String(s) => parse_timestamp(s),
        _ => Err(TimestampError::UnsupportedType),
    }
}

/// Parses an ISO 8601 timestamp as reported by platform APIs.
///
/// Accepts RFC 3339 and offset-less forms with optional fractional seconds,
/// the latter read as UTC.
pub fn parse_iso8601(input: &str) -> Result<Timestamp, TimestampError> {
    let trimmed = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    parse_timestamp(trimmed)
}

/// Formats a timestamp as ISO 8601 with a `+00:00` offset.
#[must_use]
pub fn format_iso8601(dt: &Timestamp) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn test_parse_zulu_with_fraction() {
        let dt = parse_timestamp("2023-10-05T14:30:00.123Z").unwrap();
        assert_eq!(dt.year(), 2023);
        assert_eq!(dt.timestamp_subsec_millis(), 123);
    }

    #[test]
    fn test_parse_offset_is_normalised() {
        let dt = parse_timestamp("2023-10-05T14:30:00+02:00").unwrap();
        assert_eq!(dt.hour(), 12);
        let dt = parse_timestamp("2023-10-05T14:30:00+0200").unwrap();
        assert_eq!(dt.hour(), 12);
    }

    #[test]
    fn test_parse_naive_as_utc() {
        let dt = parse_timestamp("2023-10-05 14:30:00").unwrap();
        assert_eq!(dt.hour(), 14);
        let dt = parse_timestamp("2023-10-05").unwrap();
        assert_eq!(dt.day(), 5);
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn test_parse_rejects_other_layouts() {
        assert!(matches!(
            parse_timestamp("05/10/2023"),
            Err(TimestampError::InvalidFormat(_))
        ));
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_parse_value_numbers_are_unix_seconds() {
        let dt = parse_timestamp_value(&json!(1_696_512_000)).unwrap();
        assert_eq!(dt.year(), 2023);
        let dt = parse_timestamp_value(&json!(1_696_512_000.5)).unwrap();
        assert_eq!(dt.timestamp_subsec_millis(), 500);
        assert_eq!(
            parse_timestamp_value(&json!(true)),
            Err(TimestampError::UnsupportedType)
        );
    }

    #[test]
    fn test_parse_iso8601_platform_forms() {
        let dt = parse_iso8601("2024-01-15T10:30:00.000").unwrap();
        assert_eq!(dt.minute(), 30);
        let dt = parse_iso8601("2024-01-15T10:30:00Z").unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_format_iso8601() {
        let dt = parse_timestamp("2023-10-05T14:30:00Z").unwrap();
        assert_eq!(format_iso8601(&dt), "2023-10-05T14:30:00+00:00");
    }
}
