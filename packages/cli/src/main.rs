#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the incident risk map pipeline.
//!
//! Reads the configuration and an incident feed, scores it against a
//! reference instant, and writes the resulting grid cells.

mod output;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use risk_map_config::RiskMapConfig;
use risk_map_feed::{FeedFormat, FileFeed};
use risk_map_normalize::parsing::parse_timestamp;

use crate::output::{OutputFormat, write_map};

#[derive(Parser)]
#[command(name = "risk_map", about = "Incident risk map scoring tool")]
struct Cli {
    /// Path to a TOML config file. Defaults apply to any missing key.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score an incident feed into a grid risk map
    Score {
        /// Incident feed file (CSV, JSON array, or JSON lines)
        #[arg(long)]
        input: PathBuf,
        /// Feed format (`csv`, `json`, `jsonl`). Inferred from the extension
        /// when omitted.
        #[arg(long)]
        format: Option<FeedFormat>,
        /// Reference instant (RFC 3339). Defaults to the current time.
        #[arg(long)]
        now: Option<String>,
        /// Seed for the validation split, for reproducible output
        #[arg(long)]
        seed: Option<u64>,
        /// Override the grid cell size
        #[arg(long)]
        cell_size: Option<f64>,
        /// Override the recency window in days
        #[arg(long)]
        window_days: Option<f64>,
        /// Override the recency half-life in days
        #[arg(long)]
        half_life_days: Option<f64>,
        /// Output format (`json` or `csv`)
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,
        /// Write output here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn load_config(path: Option<&Path>) -> Result<RiskMapConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => RiskMapConfig::load(path)?,
        None => RiskMapConfig::default(),
    })
}

fn resolve_now(now: Option<&str>) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    match now {
        Some(s) => parse_timestamp(s)
            .ok_or_else(|| format!("Invalid --now value {s:?}: expected an RFC 3339 timestamp").into()),
        None => Ok(Utc::now()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Config => {
            config.validate()?;
            print!("{}", config.to_toml_string()?);
        }
        Commands::Score {
            input,
            format,
            now,
            seed,
            cell_size,
            window_days,
            half_life_days,
            output_format,
            output,
        } => {
            if seed.is_some() {
                config.random_seed = seed;
            }
            if let Some(cell_size) = cell_size {
                config.cell_size = cell_size;
            }
            if let Some(window_days) = window_days {
                config.window_days = window_days;
            }
            if let Some(half_life_days) = half_life_days {
                config.half_life_days = half_life_days;
            }

            let now = resolve_now(now.as_deref())?;
            let feed = FileFeed::new(input, format);
            let map = risk_map_pipeline::run_feed(&feed, &config, now)?;

            match &map.validation {
                Some(validation) => log::info!(
                    "Validation accuracy: {:.2} (baseline {:.2})",
                    validation.accuracy,
                    validation.baseline_accuracy
                ),
                None => log::info!("Validation skipped: too few cells"),
            }

            match output {
                Some(path) => {
                    let file = File::create(&path)?;
                    let mut writer = BufWriter::new(file);
                    write_map(&map, output_format, &mut writer)?;
                    writer.flush()?;
                    log::info!("Wrote {} cells to {}", map.cells.len(), path.display());
                }
                None => {
                    let stdout = std::io::stdout();
                    write_map(&map, output_format, stdout.lock())?;
                }
            }
        }
    }

    Ok(())
}
