//! Randomized train/held-out partition of sample indices.

use rand::Rng;
use rand::seq::SliceRandom as _;

/// Sample indices assigned to each side of a holdout split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldoutSplit {
    /// Indices used for fitting.
    pub train: Vec<usize>,
    /// Indices used for evaluation.
    pub test: Vec<usize>,
}

/// Number of held-out samples for `n` samples: `ceil(n * fraction)`, kept
/// within `1..n` so neither side is empty when `n >= 2`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#[must_use]
pub fn test_size(n: usize, holdout_fraction: f64) -> usize {
    if n < 2 {
        return 0;
    }
    let raw = (n as f64 * holdout_fraction).ceil() as usize;
    raw.clamp(1, n - 1)
}

/// Shuffles `0..n` with `rng` and cuts it into held-out and training
/// indices.
pub fn holdout_split<R: Rng + ?Sized>(n: usize, holdout_fraction: f64, rng: &mut R) -> HoldoutSplit {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);

    let train = indices.split_off(test_size(n, holdout_fraction));
    HoldoutSplit {
        train,
        test: indices,
    }
}
