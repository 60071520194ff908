#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Risk map pipeline configuration.
//!
//! [`RiskMapConfig`] holds every tunable constant of the scoring pipeline.
//! It can be built from defaults, loaded from a TOML file, or adjusted in
//! code, and must pass [`RiskMapConfig::validate`] before any record is
//! processed. The reference instant `now` is deliberately not part of the
//! config: it is always passed to the pipeline explicitly.

use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A numeric or named option is outside its valid domain.
    #[error("Invalid configuration option `{option}`: {reason}")]
    InvalidOption {
        /// Name of the offending option as it appears in the TOML file.
        option: &'static str,
        /// What is wrong with the supplied value.
        reason: String,
    },

    /// The TOML document could not be parsed.
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be rendered as TOML.
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that was being read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Local hours of day, inclusive on both ends, that count as night.
///
/// When `start > end` the range wraps past midnight, so the default
/// `22..=6` covers 22:00 through 06:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightHours {
    /// First night hour (0-23).
    pub start: u32,
    /// Last night hour (0-23).
    pub end: u32,
}

impl Default for NightHours {
    fn default() -> Self {
        Self { start: 22, end: 6 }
    }
}

impl NightHours {
    /// Returns whether `hour` falls inside the night window.
    #[must_use]
    pub const fn contains(&self, hour: u32) -> bool {
        if self.start <= self.end {
            hour >= self.start && hour <= self.end
        } else {
            hour >= self.start || hour <= self.end
        }
    }
}

/// All tunable options of the risk scoring pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskMapConfig {
    /// Length of the trailing window, in days, for records to be retained.
    pub window_days: f64,
    /// Age, in days, at which a record's recency weight halves.
    pub half_life_days: f64,
    /// Grid cell edge length, in the same units as lat/lon.
    pub cell_size: f64,
    /// Local hours that count as night.
    pub night_hours: NightHours,
    /// Multiplier applied to every cell when `now` falls in the night hours.
    pub night_factor: f64,
    /// IANA name of the local time zone used to read the hour of `now`.
    pub timezone: String,
    /// Fraction of cells held out for validation.
    pub holdout_fraction: f64,
    /// Minimum number of cells required before validation runs.
    pub min_cells_for_validation: usize,
    /// Seed for the validation split. `None` draws from OS entropy.
    pub random_seed: Option<u64>,
}

impl Default for RiskMapConfig {
    fn default() -> Self {
        Self {
            window_days: 30.0,
            half_life_days: 7.0,
            cell_size: 0.0015,
            night_hours: NightHours::default(),
            night_factor: 1.3,
            timezone: "Europe/Amsterdam".to_string(),
            holdout_fraction: 0.3,
            min_cells_for_validation: 5,
            random_seed: None,
        }
    }
}

impl RiskMapConfig {
    /// Parses a config from a TOML document. Missing keys keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed or a value
    /// has the wrong type.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if its contents are invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Renders this config as a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Resolves [`Self::timezone`] to a time zone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if the name is not a known
    /// IANA zone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidOption {
                option: "timezone",
                reason: format!("unknown IANA time zone {:?}", self.timezone),
            })
    }

    /// Checks every option against its valid domain.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::InvalidOption`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("window_days", self.window_days)?;
        require_positive("half_life_days", self.half_life_days)?;
        require_positive("cell_size", self.cell_size)?;
        require_positive("night_factor", self.night_factor)?;

        for (option, hour) in [
            ("night_hours.start", self.night_hours.start),
            ("night_hours.end", self.night_hours.end),
        ] {
            if hour > 23 {
                return Err(ConfigError::InvalidOption {
                    option,
                    reason: format!("hour {hour} is outside 0-23"),
                });
            }
        }

        if !(self.holdout_fraction > 0.0 && self.holdout_fraction < 1.0) {
            return Err(ConfigError::InvalidOption {
                option: "holdout_fraction",
                reason: format!("{} is not strictly between 0 and 1", self.holdout_fraction),
            });
        }

        if self.min_cells_for_validation < 2 {
            return Err(ConfigError::InvalidOption {
                option: "min_cells_for_validation",
                reason: format!(
                    "{} is too small to split into training and held-out cells",
                    self.min_cells_for_validation
                ),
            });
        }

        self.tz()?;

        Ok(())
    }
}

fn require_positive(option: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidOption {
            option,
            reason: format!("{value} must be a finite number greater than zero"),
        })
    }
}
