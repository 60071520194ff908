//! Sparse grid aggregation of weighted incident risk.
//!
//! Space is cut into square cells of `cell_size` degrees. A record at
//! `(lat, lon)` lands in cell `(floor(lat / cell_size), floor(lon /
//! cell_size))`, with true floor semantics for negative coordinates. Only
//! cells that receive at least one record are materialized.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use risk_map_grid_models::{CellAggregate, CellKey};
use risk_map_incident_models::WeightedRecord;

/// Returns the cell containing `(lat, lon)`.
///
/// Coordinates exactly on a cell boundary belong to the cell above/right of
/// the boundary. Values beyond the `i64` range saturate.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn cell_for(lat: f64, lon: f64, cell_size: f64) -> CellKey {
    CellKey {
        cell_x: (lat / cell_size).floor() as i64,
        cell_y: (lon / cell_size).floor() as i64,
    }
}

/// Running totals for one cell while records are folded in.
struct Accumulator {
    risk_sum: f64,
    n_reports: u64,
    last_seen: DateTime<Utc>,
}

/// Groups weighted records by cell and sums their risk contributions.
///
/// The result is ordered by [`CellKey`], which keeps downstream stages
/// deterministic for a given input.
#[must_use]
pub fn aggregate(records: &[WeightedRecord], cell_size: f64) -> Vec<CellAggregate> {
    let mut cells: BTreeMap<CellKey, Accumulator> = BTreeMap::new();

    for weighted in records {
        let key = cell_for(weighted.record.lat, weighted.record.lon, cell_size);
        let risk = weighted.risk();
        let timestamp = weighted.record.timestamp;

        cells
            .entry(key)
            .and_modify(|acc| {
                acc.risk_sum += risk;
                acc.n_reports += 1;
                if timestamp > acc.last_seen {
                    acc.last_seen = timestamp;
                }
            })
            .or_insert(Accumulator {
                risk_sum: risk,
                n_reports: 1,
                last_seen: timestamp,
            });
    }

    log::info!(
        "Aggregated {} records into {} cells (cell size {cell_size})",
        records.len(),
        cells.len()
    );

    cells
        .into_iter()
        .map(|(key, acc)| CellAggregate {
            key,
            risk_sum: acc.risk_sum,
            n_reports: acc.n_reports,
            last_seen: acc.last_seen,
        })
        .collect()
}
