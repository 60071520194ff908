//! Binary classifiers used by the validation check.
//!
//! The validator only needs fit/predict/score, captured by [`Classifier`].
//! [`LogisticRegression`] is the default model; [`MajorityClass`] is the
//! trivial baseline it is compared against.

use nalgebra::{Matrix3, Vector3};

use crate::ValidateError;

/// Feature vector for one cell: `[risk_sum, n_reports]`.
pub type Features = [f64; 2];

/// Minimal supervised binary classifier.
pub trait Classifier {
    /// Fits the model to labelled samples.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError`] if the inputs are empty or their lengths
    /// disagree.
    fn fit(&mut self, features: &[Features], labels: &[bool]) -> Result<(), ValidateError>;

    /// Predicts a label for each sample.
    fn predict(&self, features: &[Features]) -> Vec<bool>;

    /// Fraction of samples whose predicted label matches `labels`.
    fn score(&self, features: &[Features], labels: &[bool]) -> f64 {
        accuracy(&self.predict(features), labels)
    }
}

/// Fraction of positions where `predicted` and `actual` agree. Zero for
/// empty input.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn accuracy(predicted: &[bool], actual: &[bool]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(actual)
        .filter(|(p, a)| p == a)
        .count();
    correct as f64 / actual.len() as f64
}

fn check_inputs(features: &[Features], labels: &[bool]) -> Result<(), ValidateError> {
    if features.len() != labels.len() {
        return Err(ValidateError::LengthMismatch {
            features: features.len(),
            labels: labels.len(),
        });
    }
    if features.is_empty() {
        return Err(ValidateError::EmptyTrainingSet);
    }
    Ok(())
}

/// Predicts whichever label was most common in training. Ties go to
/// `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MajorityClass {
    label: bool,
}

impl Classifier for MajorityClass {
    fn fit(&mut self, features: &[Features], labels: &[bool]) -> Result<(), ValidateError> {
        check_inputs(features, labels)?;
        let positives = labels.iter().filter(|l| **l).count();
        self.label = positives * 2 > labels.len();
        Ok(())
    }

    fn predict(&self, features: &[Features]) -> Vec<bool> {
        vec![self.label; features.len()]
    }
}

/// L2-regularized logistic regression fit with damped Newton steps.
///
/// Minimizes `0.5 * |w|^2 + C * sum(log_loss)` where the intercept is not
/// penalized. When every training label is the same the model predicts that
/// label unconditionally.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    /// Inverse regularization strength.
    pub c: f64,
    /// Upper bound on Newton iterations.
    pub max_iter: usize,
    /// Convergence threshold on the largest parameter update.
    pub tolerance: f64,
    weights: Features,
    intercept: f64,
    constant: Option<bool>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tolerance: 1e-8,
            weights: [0.0; 2],
            intercept: 0.0,
            constant: None,
        }
    }
}

impl LogisticRegression {
    /// Fitted feature weights.
    #[must_use]
    pub const fn weights(&self) -> Features {
        self.weights
    }

    /// Fitted intercept.
    #[must_use]
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Probability that `x` belongs to the positive class.
    #[must_use]
    pub fn predict_proba(&self, x: &Features) -> f64 {
        match self.constant {
            Some(true) => 1.0,
            Some(false) => 0.0,
            None => sigmoid(linear(&self.packed(), x)),
        }
    }

    fn packed(&self) -> Vector3<f64> {
        Vector3::new(self.weights[0], self.weights[1], self.intercept)
    }

    fn objective(&self, theta: &Vector3<f64>, features: &[Features], labels: &[bool]) -> f64 {
        let penalty = 0.5 * theta.fixed_rows::<2>(0).norm_squared();
        let loss: f64 = features
            .iter()
            .zip(labels)
            .map(|(x, y)| {
                let z = linear(theta, x);
                if *y { softplus(-z) } else { softplus(z) }
            })
            .sum();
        self.c.mul_add(loss, penalty)
    }

    /// Gradient and Hessian of the objective at `theta`.
    fn derivatives(
        &self,
        theta: &Vector3<f64>,
        features: &[Features],
        labels: &[bool],
    ) -> (Vector3<f64>, Matrix3<f64>) {
        let mut gradient = Vector3::new(theta[0], theta[1], 0.0);
        let mut hessian = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, 0.0));

        for (x, y) in features.iter().zip(labels) {
            let row = design_row(x);
            let p = sigmoid(theta.dot(&row));
            let residual = p - f64::from(u8::from(*y));
            gradient += row * (self.c * residual);
            hessian += (row * row.transpose()) * (self.c * p * (1.0 - p));
        }

        (gradient, hessian)
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, features: &[Features], labels: &[bool]) -> Result<(), ValidateError> {
        check_inputs(features, labels)?;

        self.weights = [0.0; 2];
        self.intercept = 0.0;
        self.constant = None;

        if labels.iter().all(|l| *l == labels[0]) {
            log::debug!("Training labels are all {}; fitting a constant model", labels[0]);
            self.constant = Some(labels[0]);
            return Ok(());
        }

        let mut theta = Vector3::zeros();
        let mut current = self.objective(&theta, features, labels);

        for iteration in 0..self.max_iter {
            let (gradient, hessian) = self.derivatives(&theta, features, labels);
            let Some(step) = hessian.lu().solve(&gradient) else {
                log::warn!("Singular Hessian at iteration {iteration}; stopping early");
                break;
            };

            let mut scale: f64 = 1.0;
            let mut accepted = None;
            for _ in 0..30 {
                let candidate = theta - step * scale;
                let value = self.objective(&candidate, features, labels);
                if value <= current {
                    current = value;
                    accepted = Some(candidate);
                    break;
                }
                scale *= 0.5;
            }
            let Some(candidate) = accepted else {
                break;
            };

            let change = step.amax() * scale;
            theta = candidate;
            if change < self.tolerance {
                log::debug!("Logistic regression converged after {} iterations", iteration + 1);
                break;
            }
        }

        self.weights = [theta[0], theta[1]];
        self.intercept = theta[2];
        Ok(())
    }

    fn predict(&self, features: &[Features]) -> Vec<bool> {
        features.iter().map(|x| self.predict_proba(x) > 0.5).collect()
    }
}

/// `[risk_sum, n_reports, 1]`, the features extended with the intercept term.
fn design_row(x: &Features) -> Vector3<f64> {
    Vector3::new(x[0], x[1], 1.0)
}

fn linear(theta: &Vector3<f64>, x: &Features) -> f64 {
    theta.dot(&design_row(x))
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_counts_matches() {
        assert!((accuracy(&[true, false, true, true], &[true, true, true, false]) - 0.5).abs()
            < f64::EPSILON);
        assert!(accuracy(&[], &[]).abs() < f64::EPSILON);
    }

    #[test]
    fn majority_class_predicts_most_common_label() {
        let mut model = MajorityClass::default();
        model
            .fit(&[[0.0, 0.0]; 3], &[true, true, false])
            .unwrap();
        assert_eq!(model.predict(&[[5.0, 5.0]; 2]), vec![true, true]);
    }

    #[test]
    fn majority_class_tie_goes_to_false() {
        let mut model = MajorityClass::default();
        model.fit(&[[0.0, 0.0]; 2], &[true, false]).unwrap();
        assert_eq!(model.predict(&[[0.0, 0.0]]), vec![false]);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let mut model = LogisticRegression::default();
        let err = model.fit(&[[0.0, 0.0]; 2], &[true]).unwrap_err();
        assert!(matches!(
            err,
            ValidateError::LengthMismatch {
                features: 2,
                labels: 1
            }
        ));
    }

    #[test]
    fn rejects_empty_training_set() {
        let mut model = LogisticRegression::default();
        assert!(matches!(
            model.fit(&[], &[]),
            Err(ValidateError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn separates_linearly_separable_data() {
        let features: Vec<Features> = (0..20)
            .map(|i| {
                let v = f64::from(i);
                [v, 1.0]
            })
            .collect();
        let labels: Vec<bool> = (0..20).map(|i| i >= 10).collect();

        let mut model = LogisticRegression::default();
        model.fit(&features, &labels).unwrap();

        assert!(model.weights()[0] > 0.0);
        assert!((model.score(&features, &labels) - 1.0).abs() < f64::EPSILON);
        assert!(model.predict_proba(&[0.0, 1.0]) < 0.5);
        assert!(model.predict_proba(&[19.0, 1.0]) > 0.5);
    }

    #[test]
    fn single_class_training_predicts_that_class() {
        let mut model = LogisticRegression::default();
        model.fit(&[[1.0, 1.0], [2.0, 1.0]], &[true, true]).unwrap();
        assert_eq!(model.predict(&[[-100.0, 0.0]]), vec![true]);
    }

    #[test]
    fn refit_discards_previous_state() {
        let mut model = LogisticRegression::default();
        model.fit(&[[1.0, 1.0]], &[true]).unwrap();
        model
            .fit(&[[0.0, 1.0], [10.0, 1.0]], &[false, true])
            .unwrap();
        assert_eq!(model.predict(&[[0.0, 1.0], [10.0, 1.0]]), vec![false, true]);
    }

    #[test]
    fn penalty_keeps_collinear_features_solvable() {
        // n_reports is constant, so its column duplicates the intercept.
        let features: Vec<Features> = (0..12).map(|i| [f64::from(i), 1.0]).collect();
        let labels: Vec<bool> = (0..12).map(|i| i >= 6).collect();

        let mut model = LogisticRegression::default();
        model.fit(&features, &labels).unwrap();

        assert!(model.weights().iter().all(|w| w.is_finite()));
        assert!(model.intercept().is_finite());
        assert!((model.score(&features, &labels) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn gradient_vanishes_at_fitted_optimum() {
        let features = [[0.0, 1.0], [1.0, 1.0], [2.0, 2.0], [3.0, 1.0], [4.0, 2.0], [5.0, 1.0]];
        let labels = [false, true, false, true, false, true];

        let mut model = LogisticRegression::default();
        model.fit(&features, &labels).unwrap();

        let (gradient, _) = model.derivatives(&model.packed(), &features, &labels);
        assert!(gradient.amax() < 1e-6, "gradient {gradient}");
    }

    #[test]
    fn hessian_includes_penalty_on_weights_only() {
        let model = LogisticRegression::default();
        let (_, hessian) = model.derivatives(&Vector3::zeros(), &[[0.0, 0.0]], &[true]);
        // p = 0.5 at theta = 0, so the data term adds 0.25 to the intercept only.
        assert!((hessian[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((hessian[(1, 1)] - 1.0).abs() < 1e-12);
        assert!((hessian[(2, 2)] - 0.25).abs() < 1e-12);
    }
}
