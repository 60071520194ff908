#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Held-out self-consistency check of grid risk scores.
//!
//! Cells are labelled high-risk when their `risk_score` is strictly above
//! the median. A classifier is then fit on `(risk_sum, n_reports)` for a
//! random subset of cells and scored on the rest. High accuracy means the
//! engineered score is still explained by its own aggregate inputs; a drop
//! towards the majority-class baseline signals a pipeline regression.

pub mod classifier;
pub mod split;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng as _};
use risk_map_config::RiskMapConfig;
use risk_map_grid_models::{GridCell, ValidationResult};

pub use classifier::{Classifier, Features, LogisticRegression, MajorityClass};
pub use split::{HoldoutSplit, holdout_split};

/// Errors raised by the validation step.
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    /// A classifier was asked to fit zero samples.
    #[error("Cannot fit a classifier on an empty training set")]
    EmptyTrainingSet,

    /// Feature and label slices have different lengths.
    #[error("Got {features} feature rows but {labels} labels")]
    LengthMismatch {
        /// Number of feature rows.
        features: usize,
        /// Number of labels.
        labels: usize,
    },
}

/// Below this many cells one side of the holdout split would be empty.
pub const MIN_SPLITTABLE_CELLS: usize = 2;

/// Settings for [`validate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationOptions {
    /// Fraction of cells held out for evaluation.
    pub holdout_fraction: f64,
    /// Fewer cells than this skips validation. Values below
    /// [`MIN_SPLITTABLE_CELLS`] are raised to it.
    pub min_cells: usize,
    /// Seed for the split. `None` uses OS entropy.
    pub seed: Option<u64>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self::from(&RiskMapConfig::default())
    }
}

impl From<&RiskMapConfig> for ValidationOptions {
    fn from(config: &RiskMapConfig) -> Self {
        Self {
            holdout_fraction: config.holdout_fraction,
            min_cells: config.min_cells_for_validation,
            seed: config.random_seed,
        }
    }
}

/// Median of `values`, averaging the two middle values for even lengths.
/// `None` when empty.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(f64::midpoint(sorted[mid - 1], sorted[mid]))
    } else {
        Some(sorted[mid])
    }
}

/// Labels each cell `true` when its score is strictly above the median of
/// all scores. Ties with the median are labelled `false`.
///
/// Returns the median alongside the labels, or `None` for no cells.
#[must_use]
pub fn label_cells(cells: &[GridCell]) -> Option<(f64, Vec<bool>)> {
    let scores: Vec<f64> = cells.iter().map(|c| c.risk_score).collect();
    let threshold = median(&scores)?;
    let labels = scores.iter().map(|s| *s > threshold).collect();
    Some((threshold, labels))
}

/// Feature vector `[risk_sum, n_reports]` for a cell.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn features(cell: &GridCell) -> Features {
    [cell.risk_sum, cell.n_reports as f64]
}

/// Runs the check with the default [`LogisticRegression`] model.
///
/// Returns `Ok(None)` when there are fewer than `options.min_cells` cells,
/// or too few to hold out at least one cell on each side.
///
/// # Errors
///
/// Returns [`ValidateError`] if the classifier cannot be fit.
pub fn validate(
    cells: &[GridCell],
    options: &ValidationOptions,
) -> Result<Option<ValidationResult>, ValidateError> {
    let mut rng = options
        .seed
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    let mut model = LogisticRegression::default();
    validate_with(cells, options, &mut model, &mut rng)
}

/// Runs the check with a caller-supplied classifier and random source.
///
/// # Errors
///
/// Returns [`ValidateError`] if the classifier cannot be fit.
pub fn validate_with<C, R>(
    cells: &[GridCell],
    options: &ValidationOptions,
    classifier: &mut C,
    rng: &mut R,
) -> Result<Option<ValidationResult>, ValidateError>
where
    C: Classifier + ?Sized,
    R: Rng + ?Sized,
{
    let min_cells = options.min_cells.max(MIN_SPLITTABLE_CELLS);
    if cells.len() < min_cells {
        log::info!(
            "Skipping validation: {} cells is below the minimum of {min_cells}",
            cells.len(),
        );
        return Ok(None);
    }
    let Some((median_score, labels)) = label_cells(cells) else {
        return Ok(None);
    };
    let all_features: Vec<Features> = cells.iter().map(features).collect();

    let split = holdout_split(cells.len(), options.holdout_fraction, rng);
    if split.test.is_empty() || split.train.is_empty() {
        log::info!(
            "Skipping validation: holdout fraction {} leaves an empty side for {} cells",
            options.holdout_fraction,
            cells.len()
        );
        return Ok(None);
    }
    let pick = |indices: &[usize]| -> (Vec<Features>, Vec<bool>) {
        indices
            .iter()
            .map(|&i| (all_features[i], labels[i]))
            .unzip()
    };
    let (train_x, train_y) = pick(&split.train);
    let (test_x, test_y) = pick(&split.test);

    classifier.fit(&train_x, &train_y)?;
    let accuracy = classifier.score(&test_x, &test_y);

    let mut baseline = MajorityClass::default();
    baseline.fit(&train_x, &train_y)?;
    let baseline_accuracy = baseline.score(&test_x, &test_y);

    log::info!(
        "Validation accuracy {accuracy:.2} (baseline {baseline_accuracy:.2}) on {} held-out of {} cells",
        test_x.len(),
        cells.len()
    );

    Ok(Some(ValidationResult {
        accuracy,
        baseline_accuracy,
        median_score,
        n_train: train_x.len(),
        n_test: test_x.len(),
    }))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};

    use super::*;

    fn cell(i: i64, risk_sum: f64, n_reports: u64) -> GridCell {
        GridCell {
            cell_x: i,
            cell_y: 0,
            risk_sum,
            n_reports,
            last_seen: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            risk_score: risk_sum * 1.3,
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
    fn cells(n: i64) -> Vec<GridCell> {
        (0..n)
            .map(|i| cell(i, (i + 1) as f64, (i % 3 + 1) as u64))
            .collect()
    }

    fn seeded() -> ValidationOptions {
        ValidationOptions {
            seed: Some(7),
            ..ValidationOptions::default()
        }
    }

    #[test]
    fn median_of_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn ties_at_median_are_low() {
        let scored = vec![cell(0, 1.0, 1), cell(1, 1.0, 1), cell(2, 1.0, 1), cell(3, 2.0, 1)];
        let (threshold, labels) = label_cells(&scored).unwrap();
        assert!((threshold - 1.3).abs() < 1e-12);
        assert_eq!(labels, vec![false, false, false, true]);
    }

    #[test]
    fn four_cells_skip_validation() {
        assert!(validate(&cells(4), &seeded()).unwrap().is_none());
    }

    #[test]
    fn five_cells_produce_a_result() {
        let result = validate(&cells(5), &seeded()).unwrap().unwrap();
        assert!((0.0..=1.0).contains(&result.accuracy));
        assert!((0.0..=1.0).contains(&result.baseline_accuracy));
        assert_eq!(result.n_test, 2);
        assert_eq!(result.n_train, 3);
    }

    #[test]
    fn single_cell_is_never_scored_even_with_low_minimum() {
        let options = ValidationOptions {
            min_cells: 1,
            ..seeded()
        };
        assert!(validate(&cells(1), &options).unwrap().is_none());

        let no_minimum = ValidationOptions {
            min_cells: 0,
            ..seeded()
        };
        assert!(validate(&[], &no_minimum).unwrap().is_none());
    }

    #[test]
    fn two_cells_with_low_minimum_split_one_each() {
        let options = ValidationOptions {
            min_cells: 1,
            ..seeded()
        };
        let result = validate(&cells(2), &options).unwrap().unwrap();
        assert_eq!(result.n_train, 1);
        assert_eq!(result.n_test, 1);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let scored = cells(40);
        let a = validate(&scored, &seeded()).unwrap();
        let b = validate(&scored, &seeded()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn score_explained_by_risk_sum_is_learned() {
        let result = validate(&cells(60), &seeded()).unwrap().unwrap();
        assert!(result.accuracy >= 0.8, "accuracy {}", result.accuracy);
    }

    #[test]
    fn custom_classifier_is_used() {
        let mut model = MajorityClass::default();
        let mut rng = StdRng::seed_from_u64(3);
        let result = validate_with(&cells(20), &seeded(), &mut model, &mut rng)
            .unwrap()
            .unwrap();
        assert!((result.accuracy - result.baseline_accuracy).abs() < f64::EPSILON);
    }

    #[test]
    fn options_follow_config() {
        let config = RiskMapConfig {
            holdout_fraction: 0.25,
            min_cells_for_validation: 8,
            random_seed: Some(99),
            ..RiskMapConfig::default()
        };
        let options = ValidationOptions::from(&config);
        assert!((options.holdout_fraction - 0.25).abs() < f64::EPSILON);
        assert_eq!(options.min_cells, 8);
        assert_eq!(options.seed, Some(99));
    }
}
