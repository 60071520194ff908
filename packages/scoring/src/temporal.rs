//! Time-of-day adjustment of aggregated cell risk.
//!
//! A single factor is derived from the reference instant's local hour and
//! applied to every cell in the run.

use chrono::{DateTime, Timelike as _, Utc};
use chrono_tz::Tz;
use risk_map_config::NightHours;
use risk_map_grid_models::{CellAggregate, GridCell};

/// The factor chosen for one run and the local hour it was derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporalAdjustment {
    /// Hour of day (0-23) of `now` in the configured zone.
    pub local_hour: u32,
    /// Whether `local_hour` falls in the night window.
    pub is_night: bool,
    /// Multiplier applied to every cell's `risk_sum`.
    pub factor: f64,
}

/// Computes the run-wide adjustment for the reference instant `now`.
#[must_use]
pub fn temporal_adjustment(
    now: DateTime<Utc>,
    tz: Tz,
    night_hours: NightHours,
    night_factor: f64,
) -> TemporalAdjustment {
    let local_hour = now.with_timezone(&tz).hour();
    let is_night = night_hours.contains(local_hour);
    let factor = if is_night { night_factor } else { 1.0 };

    log::info!(
        "Reference instant {now} is hour {local_hour} in {}; applying factor {factor}",
        tz.name()
    );

    TemporalAdjustment {
        local_hour,
        is_night,
        factor,
    }
}

/// Scores every aggregate with the run's factor.
#[must_use]
pub fn apply_adjustment(
    aggregates: Vec<CellAggregate>,
    adjustment: &TemporalAdjustment,
) -> Vec<GridCell> {
    aggregates
        .into_iter()
        .map(|aggregate| GridCell::from_aggregate(aggregate, adjustment.factor))
        .collect()
}
