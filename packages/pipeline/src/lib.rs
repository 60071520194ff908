#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! End-to-end incident risk scoring for one reference instant.
//!
//! Stages run strictly in order, each consuming only the previous stage's
//! output:
//!
//! 1. normalize and deduplicate raw rows
//! 2. keep the trailing window and attach recency weights
//! 3. aggregate weighted severity into sparse grid cells
//! 4. apply the run-wide night factor
//! 5. check that the score is predictable from its aggregate inputs
//!
//! The configuration is validated before any row is read, and the reference
//! instant is always supplied by the caller so runs are reproducible.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng as _};
use risk_map_config::{ConfigError, RiskMapConfig};
use risk_map_feed::{FeedError, IncidentFeed};
use risk_map_grid_models::{GridCell, ValidationResult};
use risk_map_incident_models::{DropReason, RawIncident};
use risk_map_scoring::{aggregate, apply_adjustment, apply_recency, temporal_adjustment};
use risk_map_validate::{Classifier, LogisticRegression, ValidateError, ValidationOptions};
use serde::Serialize;

/// Errors that abort a pipeline run. Each names the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The configuration was rejected before processing started.
    #[error("Configuration stage failed: {0}")]
    Config(#[from] ConfigError),

    /// The input feed could not be read.
    #[error("Input feed {feed} is unavailable: {source}")]
    Feed {
        /// Description of the feed.
        feed: String,
        /// Underlying feed error.
        source: FeedError,
    },

    /// The validation classifier could not be fit.
    #[error("Validation stage failed: {0}")]
    Validation(#[from] ValidateError),
}

/// Counts collected while the pipeline runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDiagnostics {
    /// Reference instant of the run.
    pub now: DateTime<Utc>,
    /// Rows received from the feed.
    pub raw_records: usize,
    /// Rows that survived normalization and deduplication.
    pub normalized_records: usize,
    /// Rows excluded as malformed, by reason.
    pub dropped: BTreeMap<DropReason, usize>,
    /// Valid rows discarded as duplicates.
    pub duplicates: usize,
    /// Records inside the recency window.
    pub weighted_records: usize,
    /// Records older than the window.
    pub outside_window: usize,
    /// Records dated after `now` whose age was clamped to zero.
    pub future_clamped: usize,
    /// Hour of `now` in the configured zone.
    pub local_hour: u32,
    /// Factor applied to every cell.
    pub night_factor: f64,
}

/// Output of one run: the scored cells plus diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMap {
    /// One entry per populated cell, ordered by cell coordinates.
    pub cells: Vec<GridCell>,
    /// Present only when enough cells existed to validate.
    pub validation: Option<ValidationResult>,
    /// Per-stage counts.
    pub diagnostics: RunDiagnostics,
}

/// Reads the feed and scores it.
///
/// The config is validated first, then the feed is read in full; no stage
/// runs if either fails.
///
/// # Errors
///
/// Returns [`PipelineError`] if the config is invalid, the feed cannot be
/// read, or validation fails.
pub fn run_feed(
    feed: &dyn IncidentFeed,
    config: &RiskMapConfig,
    now: DateTime<Utc>,
) -> Result<RiskMap, PipelineError> {
    config.validate()?;
    let rows = feed.read_batch().map_err(|source| PipelineError::Feed {
        feed: feed.describe(),
        source,
    })?;
    run(rows, config, now)
}

/// Scores a batch with the default classifier. The validation split is
/// seeded from `config.random_seed` when set.
///
/// # Errors
///
/// Returns [`PipelineError`] if the config is invalid or validation fails.
pub fn run(
    rows: Vec<RawIncident>,
    config: &RiskMapConfig,
    now: DateTime<Utc>,
) -> Result<RiskMap, PipelineError> {
    let mut rng = config
        .random_seed
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    let mut model = LogisticRegression::default();
    run_with(rows, config, now, &mut model, &mut rng)
}

/// Scores a batch with a caller-supplied classifier and random source.
///
/// # Errors
///
/// Returns [`PipelineError`] if the config is invalid or validation fails.
pub fn run_with<C, R>(
    rows: Vec<RawIncident>,
    config: &RiskMapConfig,
    now: DateTime<Utc>,
    classifier: &mut C,
    rng: &mut R,
) -> Result<RiskMap, PipelineError>
where
    C: Classifier + ?Sized,
    R: Rng + ?Sized,
{
    config.validate()?;
    let tz = config.tz()?;

    let raw_records = rows.len();
    let normalized = risk_map_normalize::normalize(rows);

    let recent = apply_recency(
        &normalized.records,
        now,
        config.window_days,
        config.half_life_days,
    );

    let aggregates = aggregate(&recent.records, config.cell_size);

    let adjustment = temporal_adjustment(now, tz, config.night_hours, config.night_factor);
    let cells = apply_adjustment(aggregates, &adjustment);

    let validation = risk_map_validate::validate_with(
        &cells,
        &ValidationOptions::from(config),
        classifier,
        rng,
    )?;

    log::info!(
        "Scored {} cells from {raw_records} rows at {now}",
        cells.len()
    );

    Ok(RiskMap {
        diagnostics: RunDiagnostics {
            now,
            raw_records,
            normalized_records: normalized.records.len(),
            dropped: normalized.dropped,
            duplicates: normalized.duplicates,
            weighted_records: recent.records.len(),
            outside_window: recent.outside_window,
            future_clamped: recent.future_clamped,
            local_hour: adjustment.local_hour,
            night_factor: adjustment.factor,
        },
        cells,
        validation,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::{Duration, TimeZone as _};

    use super::*;

    /// 12:00 CET, outside the night window.
    fn midday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 11, 0, 0).unwrap()
    }

    /// 23:30 CET, inside the night window.
    fn late_evening() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 22, 30, 0).unwrap()
    }

    fn row(timestamp: DateTime<Utc>, lat: f64, lon: f64, severity: Option<f64>) -> RawIncident {
        RawIncident {
            timestamp: Some(timestamp.to_rfc3339()),
            lat: Some(lat.to_string()),
            lon: Some(lon.to_string()),
            category: Some("Harassment".to_string()),
            source: Some("app".to_string()),
            severity: severity.map(|s| s.to_string()),
        }
    }

    fn seeded() -> RiskMapConfig {
        RiskMapConfig {
            random_seed: Some(11),
            ..RiskMapConfig::default()
        }
    }

    fn two_reports_in_one_cell(now: DateTime<Utc>) -> Vec<RawIncident> {
        vec![
            row(now, 0.0001, 0.0002, Some(2.0)),
            row(now - Duration::days(7), 0.0003, 0.0004, Some(1.0)),
        ]
    }

    #[test]
    fn daytime_run_matches_hand_computed_score() {
        let map = run(two_reports_in_one_cell(midday()), &seeded(), midday()).unwrap();

        assert_eq!(map.cells.len(), 1);
        let cell = &map.cells[0];
        assert_eq!((cell.cell_x, cell.cell_y), (0, 0));
        assert_eq!(cell.n_reports, 2);
        assert!((cell.risk_sum - 2.5).abs() < 1e-12);
        assert!((cell.risk_score - 2.5).abs() < 1e-12);
        assert_eq!(cell.last_seen, midday());
        assert!(map.validation.is_none());
        assert_eq!(map.diagnostics.local_hour, 12);
    }

    #[test]
    fn night_run_boosts_score() {
        let now = late_evening();
        let map = run(two_reports_in_one_cell(now), &seeded(), now).unwrap();
        let cell = &map.cells[0];
        assert!((cell.risk_sum - 2.5).abs() < 1e-12);
        assert!((cell.risk_score - 3.25).abs() < 1e-12);
        assert!((map.diagnostics.night_factor - 1.3).abs() < f64::EPSILON);
    }

    #[test]
    fn duplicates_and_malformed_rows_are_reported() {
        let now = midday();
        let mut rows = two_reports_in_one_cell(now);
        rows.push(rows[0].clone());
        rows.push(RawIncident {
            timestamp: Some("not a time".to_string()),
            ..rows[0].clone()
        });
        rows.push(row(now - Duration::days(45), 0.0001, 0.0002, None));

        let map = run(rows, &seeded(), now).unwrap();
        let diagnostics = &map.diagnostics;
        assert_eq!(diagnostics.raw_records, 5);
        assert_eq!(diagnostics.duplicates, 1);
        assert_eq!(diagnostics.dropped[&DropReason::InvalidTimestamp], 1);
        assert_eq!(diagnostics.normalized_records, 3);
        assert_eq!(diagnostics.outside_window, 1);
        assert_eq!(diagnostics.weighted_records, 2);
        assert_eq!(map.cells[0].n_reports, 2);
    }

    #[allow(clippy::cast_precision_loss)]
    fn rows_in_cells(now: DateTime<Utc>, n: usize) -> Vec<RawIncident> {
        (0..n)
            .map(|i| {
                let offset = i as f64 * 0.01;
                row(now - Duration::hours(1), 0.0001 + offset, 0.0001, Some(1.0 + offset * 100.0))
            })
            .collect()
    }

    #[test]
    fn four_cells_skip_validation_five_run_it() {
        let now = midday();
        let four = run(rows_in_cells(now, 4), &seeded(), now).unwrap();
        assert_eq!(four.cells.len(), 4);
        assert!(four.validation.is_none());

        let five = run(rows_in_cells(now, 5), &seeded(), now).unwrap();
        assert_eq!(five.cells.len(), 5);
        let validation = five.validation.unwrap();
        assert!((0.0..=1.0).contains(&validation.accuracy));
    }

    #[test]
    fn seeded_runs_are_identical() {
        let now = midday();
        let a = run(rows_in_cells(now, 25), &seeded(), now).unwrap();
        let b = run(rows_in_cells(now, 25), &seeded(), now).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_and_negative_severity_still_carry_risk() {
        let now = late_evening();
        let rows = vec![
            row(now, 0.0001, 0.0001, Some(0.0)),
            row(now, 0.1, 0.1, Some(-2.0)),
        ];
        let map = run(rows, &seeded(), now).unwrap();
        assert_eq!(map.cells.len(), 2);
        for cell in &map.cells {
            assert!((cell.risk_sum - 1.0).abs() < 1e-12);
            assert!((cell.risk_score / cell.risk_sum - 1.3).abs() < 1e-12);
        }
    }

    #[test]
    fn empty_batch_produces_no_cells() {
        let map = run(Vec::new(), &seeded(), midday()).unwrap();
        assert!(map.cells.is_empty());
        assert!(map.validation.is_none());
    }

    #[test]
    fn invalid_config_fails_before_reading_feed() {
        struct CountingFeed {
            reads: Cell<usize>,
        }

        impl IncidentFeed for CountingFeed {
            fn describe(&self) -> String {
                "counting".to_string()
            }

            fn read_batch(&self) -> Result<Vec<RawIncident>, FeedError> {
                self.reads.set(self.reads.get() + 1);
                Ok(Vec::new())
            }
        }

        let feed = CountingFeed {
            reads: Cell::new(0),
        };
        let config = RiskMapConfig {
            cell_size: -1.0,
            ..RiskMapConfig::default()
        };
        let err = run_feed(&feed, &config, midday()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Config(ConfigError::InvalidOption {
                option: "cell_size",
                ..
            })
        ));
        assert_eq!(feed.reads.get(), 0);
    }

    #[test]
    fn unreadable_feed_is_a_hard_failure() {
        let feed = risk_map_feed::FileFeed::new("/no/such/incidents.csv", None);
        let err = run_feed(&feed, &seeded(), midday()).unwrap_err();
        assert!(matches!(err, PipelineError::Feed { .. }));
        assert!(err.to_string().contains("/no/such/incidents.csv"));
    }

    #[test]
    fn risk_map_serializes_for_consumers() {
        let map = run(two_reports_in_one_cell(midday()), &seeded(), midday()).unwrap();
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["cells"][0]["nReports"], 2);
        assert!(json["validation"].is_null());
        assert_eq!(json["diagnostics"]["rawRecords"], 2);
    }
}
