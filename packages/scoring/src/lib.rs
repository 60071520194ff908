#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Risk scoring stages that sit between normalization and validation.
//!
//! - [`recency`] restricts records to a trailing window and attaches an
//!   exponential-decay weight.
//! - [`grid`] buckets weighted records into sparse grid cells.
//! - [`temporal`] derives the run's night factor from the reference instant
//!   and scores every cell with it.
//!
//! Every function here is pure: the reference instant and all tunables are
//! explicit parameters.

pub mod grid;
pub mod recency;
pub mod temporal;

pub use grid::{aggregate, cell_for};
pub use recency::{RecencyOutcome, apply_recency, recency_weight};
pub use temporal::{TemporalAdjustment, apply_adjustment, temporal_adjustment};
