#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident record types shared across the risk scoring pipeline.
//!
//! Raw feed rows arrive as [`RawIncident`] with every field optional and
//! untyped. The normalizer turns them into [`IncidentRecord`]s, and the
//! recency stage extends those into [`WeightedRecord`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Severity assigned when a record has no severity or it cannot be parsed.
pub const DEFAULT_SEVERITY: f64 = 1.0;

/// A single row as delivered by the input feed, before any validation.
///
/// All fields are kept as text so that malformed values can be handled by
/// the normalizer (dropped or defaulted) instead of failing the whole batch
/// at read time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawIncident {
    /// When the incident happened, in any supported timestamp format.
    pub timestamp: Option<String>,
    /// Latitude as text.
    pub lat: Option<String>,
    /// Longitude as text.
    pub lon: Option<String>,
    /// Free-form category label (e.g. `" Harassment "`).
    pub category: Option<String>,
    /// Reporting channel the incident came from.
    pub source: Option<String>,
    /// Optional numeric severity as text.
    pub severity: Option<String>,
}

impl From<&IncidentRecord> for RawIncident {
    fn from(record: &IncidentRecord) -> Self {
        Self {
            timestamp: Some(
                record
                    .timestamp
                    .to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
            ),
            lat: Some(record.lat.to_string()),
            lon: Some(record.lon.to_string()),
            category: Some(record.category.clone()),
            source: Some(record.source.clone()),
            severity: Some(record.severity.to_string()),
        }
    }
}

/// A validated, normalized incident.
///
/// Every record has a timezone-aware timestamp and finite coordinates.
/// Records are immutable once produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    /// When the incident happened.
    pub timestamp: DateTime<Utc>,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
    /// Trimmed, lower-cased category.
    pub category: String,
    /// Trimmed source identifier.
    pub source: String,
    /// Positive severity weight, [`DEFAULT_SEVERITY`] when absent, invalid,
    /// or not positive.
    pub severity: f64,
}

impl IncidentRecord {
    /// Returns the deduplication identity of this record.
    ///
    /// Two records with equal identities describe the same observation.
    #[must_use]
    pub fn identity(&self) -> IncidentIdentity {
        IncidentIdentity {
            timestamp: self.timestamp,
            lat_bits: coordinate_bits(self.lat),
            lon_bits: coordinate_bits(self.lon),
            category: self.category.clone(),
            source: self.source.clone(),
        }
    }
}

/// Hashable identity tuple `(timestamp, lat, lon, category, source)`.
///
/// Coordinates are compared by their bit pattern, with `-0.0` folded into
/// `0.0` so that numerically equal coordinates compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IncidentIdentity {
    timestamp: DateTime<Utc>,
    lat_bits: u64,
    lon_bits: u64,
    category: String,
    source: String,
}

fn coordinate_bits(value: f64) -> u64 {
    if value == 0.0 { 0.0_f64.to_bits() } else { value.to_bits() }
}

/// An [`IncidentRecord`] that survived the recency window, with its decay
/// weight attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedRecord {
    /// The underlying incident.
    #[serde(flatten)]
    pub record: IncidentRecord,
    /// Elapsed time between the incident and the reference instant, in
    /// fractional days. Never negative.
    pub age_days: f64,
    /// Exponential decay weight in `(0, 1]`.
    pub w_recency: f64,
}

impl WeightedRecord {
    /// Contribution of this record to its grid cell: `severity * w_recency`.
    #[must_use]
    pub fn risk(&self) -> f64 {
        self.record.severity * self.w_recency
    }
}

/// Why the normalizer excluded a raw record.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DropReason {
    /// The timestamp field was absent or blank.
    MissingTimestamp,
    /// The timestamp field could not be parsed.
    InvalidTimestamp,
    /// Latitude or longitude was absent or blank.
    MissingCoordinate,
    /// Latitude or longitude was not a finite number.
    InvalidCoordinate,
}

impl DropReason {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::MissingTimestamp,
            Self::InvalidTimestamp,
            Self::MissingCoordinate,
            Self::InvalidCoordinate,
        ]
    }
}
