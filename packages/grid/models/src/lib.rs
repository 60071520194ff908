#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Grid cell, aggregate, and validation result types for the risk map.
//!
//! Cells are sparse: only coordinates with at least one contributing record
//! exist. A [`CellAggregate`] is the raw per-cell sum produced by the grid
//! aggregator; a [`GridCell`] is the same cell after the temporal
//! adjustment has assigned its `risk_score`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Integer grid coordinates of a cell.
///
/// `cell_x` is derived from latitude and `cell_y` from longitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellKey {
    /// `floor(lat / cell_size)`.
    pub cell_x: i64,
    /// `floor(lon / cell_size)`.
    pub cell_y: i64,
}

impl std::fmt::Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.cell_x, self.cell_y)
    }
}

/// Weighted severity aggregated over the records that fall in one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellAggregate {
    /// Cell coordinates.
    pub key: CellKey,
    /// Sum of `severity * w_recency` over contributing records.
    pub risk_sum: f64,
    /// Number of contributing records. Always at least 1.
    pub n_reports: u64,
    /// Latest timestamp among contributing records.
    pub last_seen: DateTime<Utc>,
}

/// A scored grid cell, the unit of output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    /// `floor(lat / cell_size)`.
    pub cell_x: i64,
    /// `floor(lon / cell_size)`.
    pub cell_y: i64,
    /// Sum of `severity * w_recency` over contributing records.
    pub risk_sum: f64,
    /// Number of contributing records.
    pub n_reports: u64,
    /// Latest timestamp among contributing records.
    pub last_seen: DateTime<Utc>,
    /// `risk_sum` multiplied by the run's night factor.
    pub risk_score: f64,
}

impl GridCell {
    /// Scores an aggregate with the given multiplicative factor.
    #[must_use]
    pub fn from_aggregate(aggregate: CellAggregate, factor: f64) -> Self {
        Self {
            cell_x: aggregate.key.cell_x,
            cell_y: aggregate.key.cell_y,
            risk_sum: aggregate.risk_sum,
            n_reports: aggregate.n_reports,
            last_seen: aggregate.last_seen,
            risk_score: aggregate.risk_sum * factor,
        }
    }

    /// Returns the coordinates of this cell.
    #[must_use]
    pub const fn key(&self) -> CellKey {
        CellKey {
            cell_x: self.cell_x,
            cell_y: self.cell_y,
        }
    }
}

/// Outcome of the held-out self-consistency check.
///
/// Only produced when enough cells exist for a meaningful split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Fraction of held-out cells the classifier labelled correctly.
    pub accuracy: f64,
    /// Accuracy of always predicting the training set's majority label on
    /// the same held-out cells.
    pub baseline_accuracy: f64,
    /// Median `risk_score` used as the labelling threshold.
    pub median_score: f64,
    /// Number of cells used for fitting.
    pub n_train: usize,
    /// Number of held-out cells.
    pub n_test: usize,
}

impl ValidationResult {
    /// Returns how far the classifier beats the majority-class baseline.
    ///
    /// A value near or below zero means the score is no longer explained by
    /// its own aggregate inputs.
    #[must_use]
    pub fn lift(&self) -> f64 {
        self.accuracy - self.baseline_accuracy
    }
}
