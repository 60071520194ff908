#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record normalizer for the risk scoring pipeline.
//!
//! Turns a batch of [`RawIncident`] rows into deduplicated
//! [`IncidentRecord`]s. Malformed rows never fail the batch: a row with an
//! unusable timestamp or coordinate is excluded and counted, and a bad
//! severity falls back to the default.

pub mod parsing;

use std::collections::{BTreeMap, BTreeSet};

use risk_map_incident_models::{DropReason, IncidentRecord, RawIncident};

use crate::parsing::{
    normalize_category, normalize_source, parse_coordinate, parse_severity,
    parse_timestamp_field,
};

/// Result of normalizing one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeOutcome {
    /// Valid, deduplicated records in first-seen order.
    pub records: Vec<IncidentRecord>,
    /// Number of rows excluded, by reason.
    pub dropped: BTreeMap<DropReason, usize>,
    /// Number of valid rows discarded as duplicates of an earlier row.
    pub duplicates: usize,
}

impl NormalizeOutcome {
    /// Total rows excluded for being malformed.
    #[must_use]
    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}

/// Validates a single raw row.
///
/// # Errors
///
/// Returns the [`DropReason`] when the timestamp or a coordinate is missing
/// or unparseable.
pub fn normalize_record(raw: &RawIncident) -> Result<IncidentRecord, DropReason> {
    let timestamp = parse_timestamp_field(raw.timestamp.as_deref())?;
    let lat = parse_coordinate(raw.lat.as_deref())?;
    let lon = parse_coordinate(raw.lon.as_deref())?;

    Ok(IncidentRecord {
        timestamp,
        lat,
        lon,
        category: normalize_category(raw.category.as_deref()),
        source: normalize_source(raw.source.as_deref()),
        severity: parse_severity(raw.severity.as_deref()),
    })
}

/// Normalizes and deduplicates a batch of raw rows.
///
/// Deduplication uses [`IncidentRecord::identity`] computed after
/// normalization, so rows whose categories differ only by case or
/// surrounding whitespace collapse into one. The first occurrence wins.
#[must_use]
pub fn normalize<I>(rows: I) -> NormalizeOutcome
where
    I: IntoIterator<Item = RawIncident>,
{
    let mut outcome = NormalizeOutcome::default();
    let mut valid = Vec::new();
    let mut total = 0_usize;

    for raw in rows {
        total += 1;
        match normalize_record(&raw) {
            Ok(record) => valid.push(record),
            Err(reason) => {
                log::debug!("Dropping row {total}: {reason}");
                *outcome.dropped.entry(reason).or_insert(0) += 1;
            }
        }
    }

    let (records, duplicates) = dedup(valid);
    outcome.records = records;
    outcome.duplicates = duplicates;

    log::info!(
        "Normalized {total} rows: {} kept, {} dropped, {duplicates} duplicates",
        outcome.records.len(),
        outcome.dropped_total(),
    );

    outcome
}

/// Removes records whose identity was already seen, keeping the first.
///
/// Returns the surviving records and the number removed.
#[must_use]
pub fn dedup(records: Vec<IncidentRecord>) -> (Vec<IncidentRecord>, usize) {
    let before = records.len();
    let mut seen = BTreeSet::new();
    let kept: Vec<IncidentRecord> = records
        .into_iter()
        .filter(|record| seen.insert(record.identity()))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}
