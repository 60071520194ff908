//! Trailing-window filter and exponential recency weighting.

use chrono::{DateTime, Utc};
use risk_map_incident_models::{IncidentRecord, WeightedRecord};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Records retained by [`apply_recency`] plus what was filtered out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecencyOutcome {
    /// Records inside the window, in input order.
    pub records: Vec<WeightedRecord>,
    /// Records older than the window.
    pub outside_window: usize,
    /// Records dated after `now`, kept with their age clamped to zero.
    pub future_clamped: usize,
}

/// Decay weight `0.5 ^ (age_days / half_life_days)`.
///
/// Exactly `1.0` at age zero and `0.5` at one half-life. The result never
/// reaches zero, even for ages far beyond the window.
#[must_use]
pub fn recency_weight(age_days: f64, half_life_days: f64) -> f64 {
    0.5_f64
        .powf(age_days / half_life_days)
        .max(f64::MIN_POSITIVE)
}

/// Elapsed real time from `timestamp` to `now` in fractional days.
///
/// Negative when `timestamp` is after `now`.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn elapsed_days(now: DateTime<Utc>, timestamp: DateTime<Utc>) -> f64 {
    let delta = now.signed_duration_since(timestamp);
    let seconds = delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) * 1e-9;
    seconds / SECONDS_PER_DAY
}

/// Keeps records with `timestamp >= now - window_days` and weights each one
/// by its age.
///
/// Records dated after `now` are kept with `age_days = 0` (weight `1.0`).
#[must_use]
pub fn apply_recency(
    records: &[IncidentRecord],
    now: DateTime<Utc>,
    window_days: f64,
    half_life_days: f64,
) -> RecencyOutcome {
    let mut outcome = RecencyOutcome::default();

    for record in records {
        let elapsed = elapsed_days(now, record.timestamp);
        if elapsed > window_days {
            outcome.outside_window += 1;
            continue;
        }
        if elapsed < 0.0 {
            outcome.future_clamped += 1;
        }

        let age_days = elapsed.max(0.0);
        outcome.records.push(WeightedRecord {
            record: record.clone(),
            age_days,
            w_recency: recency_weight(age_days, half_life_days),
        });
    }

    if outcome.future_clamped > 0 {
        log::warn!(
            "{} records are dated after the reference instant {now}; their age was clamped to 0",
            outcome.future_clamped
        );
    }
    log::info!(
        "Recency window of {window_days} days kept {} of {} records ({} too old)",
        outcome.records.len(),
        records.len(),
        outcome.outside_window,
    );

    outcome
}
