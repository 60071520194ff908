//! Field-level parsing for raw incident rows.
//!
//! Each parser is lenient about formatting and strict about meaning: a value
//! that cannot be interpreted is reported as missing or invalid rather than
//! guessed at.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use risk_map_incident_models::{DEFAULT_SEVERITY, DropReason};

/// Timestamp layouts carrying an explicit UTC offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

/// Timestamp layouts without an offset. These are interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses a timestamp into a UTC instant.
///
/// Accepts RFC 3339, ISO 8601 with a numeric offset, naive date-times
/// (taken as UTC) and bare dates (midnight UTC).
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    None
}

/// Parses the timestamp field, classifying why it is unusable.
///
/// # Errors
///
/// Returns [`DropReason::MissingTimestamp`] for an absent or blank field and
/// [`DropReason::InvalidTimestamp`] for text that is not a timestamp.
pub fn parse_timestamp_field(value: Option<&str>) -> Result<DateTime<Utc>, DropReason> {
    let value = non_blank(value).ok_or(DropReason::MissingTimestamp)?;
    parse_timestamp(value).ok_or(DropReason::InvalidTimestamp)
}

/// Parses a latitude or longitude field.
///
/// Zero is a legitimate coordinate and is kept.
///
/// # Errors
///
/// Returns [`DropReason::MissingCoordinate`] for an absent or blank field
/// and [`DropReason::InvalidCoordinate`] for non-numeric or non-finite text.
pub fn parse_coordinate(value: Option<&str>) -> Result<f64, DropReason> {
    let value = non_blank(value).ok_or(DropReason::MissingCoordinate)?;
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(DropReason::InvalidCoordinate)
}

/// Coerces the severity field to a float, falling back to
/// [`DEFAULT_SEVERITY`] when it is absent, blank, not a finite number, or
/// not positive. Every retained record therefore adds positive risk to its
/// cell.
#[must_use]
pub fn parse_severity(value: Option<&str>) -> f64 {
    non_blank(value)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(DEFAULT_SEVERITY)
}

/// Trims and lower-cases a category label. Absent categories become empty.
#[must_use]
pub fn normalize_category(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_lowercase()
}

/// Trims a source identifier. Absent sources become empty.
#[must_use]
pub fn normalize_source(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_with_offset() {
        let dt = parse_timestamp("2024-01-15T14:30:00+01:00").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 13:30:00 UTC");
    }

    #[test]
    fn parses_space_separated_with_offset() {
        let dt = parse_timestamp("2024-01-15 14:30:00+0200").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 12:30:00 UTC");
    }

    #[test]
    fn parses_naive_as_utc() {
        let dt = parse_timestamp("2024-01-15 14:30:00").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00 UTC");
    }

    #[test]
    fn parses_naive_with_fractional() {
        let dt = parse_timestamp("2024-01-15T14:30:00.250").unwrap();
        assert_eq!(dt.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn parses_bare_date_as_midnight() {
        let dt = parse_timestamp(" 2024-01-15 ").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 00:00:00 UTC");
    }

    #[test]
    fn classifies_timestamp_problems() {
        assert_eq!(parse_timestamp_field(None), Err(DropReason::MissingTimestamp));
        assert_eq!(parse_timestamp_field(Some("  ")), Err(DropReason::MissingTimestamp));
        assert_eq!(
            parse_timestamp_field(Some("yesterday")),
            Err(DropReason::InvalidTimestamp)
        );
        assert_eq!(
            parse_timestamp_field(Some("2024-02-30")),
            Err(DropReason::InvalidTimestamp)
        );
    }

    #[test]
    fn keeps_zero_coordinate() {
        assert!((parse_coordinate(Some("0")).unwrap()).abs() < f64::EPSILON);
    }

    #[test]
    fn classifies_coordinate_problems() {
        assert_eq!(parse_coordinate(None), Err(DropReason::MissingCoordinate));
        assert_eq!(parse_coordinate(Some("")), Err(DropReason::MissingCoordinate));
        assert_eq!(parse_coordinate(Some("north")), Err(DropReason::InvalidCoordinate));
        assert_eq!(parse_coordinate(Some("NaN")), Err(DropReason::InvalidCoordinate));
        assert_eq!(parse_coordinate(Some("inf")), Err(DropReason::InvalidCoordinate));
    }

    #[test]
    fn parses_negative_coordinate() {
        let v = parse_coordinate(Some(" -87.6298 ")).unwrap();
        assert!((v - -87.6298).abs() < f64::EPSILON);
    }

    #[test]
    fn severity_defaults_to_one() {
        assert!((parse_severity(None) - 1.0).abs() < f64::EPSILON);
        assert!((parse_severity(Some("")) - 1.0).abs() < f64::EPSILON);
        assert!((parse_severity(Some("high")) - 1.0).abs() < f64::EPSILON);
        assert!((parse_severity(Some("NaN")) - 1.0).abs() < f64::EPSILON);
        assert!((parse_severity(Some("2.5")) - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn non_positive_severity_defaults_to_one() {
        assert!((parse_severity(Some("0")) - 1.0).abs() < f64::EPSILON);
        assert!((parse_severity(Some("-0.0")) - 1.0).abs() < f64::EPSILON);
        assert!((parse_severity(Some("-3")) - 1.0).abs() < f64::EPSILON);
        assert!((parse_severity(Some("0.01")) - 0.01).abs() < f64::EPSILON);
    }

    #[test]
    fn category_is_trimmed_and_lowercased() {
        assert_eq!(normalize_category(Some("  Street Harassment ")), "street harassment");
        assert_eq!(normalize_category(None), "");
    }

    #[test]
    fn source_is_trimmed_only() {
        assert_eq!(normalize_source(Some(" App ")), "App");
    }
}
