#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident feed readers.
//!
//! A feed delivers one complete batch of [`RawIncident`] rows or fails as a
//! whole. Field-level problems (bad timestamps, missing coordinates) are not
//! the feed's concern and pass through untouched for the normalizer.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use risk_map_incident_models::RawIncident;
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};

/// Errors that make a feed unreadable.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The feed file could not be opened or read.
    #[error("Failed to read feed {path}: {source}")]
    Io {
        /// Path of the feed.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The CSV could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The JSON could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A JSON-lines row was not valid JSON.
    #[error("JSON error on line {line}: {source}")]
    JsonLine {
        /// One-based line number.
        line: usize,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// The JSON document did not have the expected shape.
    #[error("Unexpected JSON shape: {message}")]
    Shape {
        /// What was expected.
        message: String,
    },

    /// The format could not be inferred from the file name.
    #[error("Cannot infer feed format from {path}; pass the format explicitly")]
    UnknownFormat {
        /// Path of the feed.
        path: String,
    },
}

/// On-disk layout of a feed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FeedFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// A JSON array of objects.
    Json,
    /// One JSON object per line.
    #[strum(serialize = "jsonl", serialize = "ndjson")]
    JsonLines,
}

impl FeedFormat {
    /// Infers the format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "jsonl" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// A source of one batch of raw incident rows.
pub trait IncidentFeed {
    /// Human-readable description for log messages.
    fn describe(&self) -> String;

    /// Reads the full batch.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the feed cannot be read at all.
    fn read_batch(&self) -> Result<Vec<RawIncident>, FeedError>;
}

/// A feed backed by a local file.
#[derive(Debug, Clone)]
pub struct FileFeed {
    path: PathBuf,
    format: Option<FeedFormat>,
}

impl FileFeed {
    /// Creates a feed for `path`. When `format` is `None` it is inferred
    /// from the file extension at read time.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, format: Option<FeedFormat>) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    fn resolved_format(&self) -> Result<FeedFormat, FeedError> {
        self.format
            .or_else(|| FeedFormat::from_path(&self.path))
            .ok_or_else(|| FeedError::UnknownFormat {
                path: self.path.display().to_string(),
            })
    }
}

impl IncidentFeed for FileFeed {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_batch(&self) -> Result<Vec<RawIncident>, FeedError> {
        let format = self.resolved_format()?;
        let file = File::open(&self.path).map_err(|source| FeedError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        let reader = BufReader::new(file);

        let rows = match format {
            FeedFormat::Csv => read_csv(reader)?,
            FeedFormat::Json => read_json(reader)?,
            FeedFormat::JsonLines => read_json_lines(reader)?,
        };

        log::info!("Read {} rows from {} ({format})", rows.len(), self.path.display());
        Ok(rows)
    }
}

/// An in-memory batch, mainly for tests and embedding.
impl IncidentFeed for Vec<RawIncident> {
    fn describe(&self) -> String {
        format!("{} in-memory rows", self.len())
    }

    fn read_batch(&self) -> Result<Vec<RawIncident>, FeedError> {
        Ok(self.clone())
    }
}

/// Reads CSV rows with a header line. Unknown columns are ignored and
/// missing columns or empty cells become `None`.
///
/// # Errors
///
/// Returns [`FeedError::Csv`] if the CSV is structurally invalid.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<RawIncident>, FeedError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in csv_reader.deserialize::<RawIncident>() {
        rows.push(result?);
    }
    Ok(rows)
}

/// Reads a JSON array of objects.
///
/// # Errors
///
/// Returns [`FeedError`] if the document is not valid JSON or not an array
/// of objects.
pub fn read_json<R: Read>(reader: R) -> Result<Vec<RawIncident>, FeedError> {
    let value: Value = serde_json::from_reader(reader)?;
    let Value::Array(items) = value else {
        return Err(FeedError::Shape {
            message: "expected a top-level array of incident objects".to_string(),
        });
    };
    items.iter().map(raw_from_value).collect()
}

/// Reads one JSON object per line, skipping blank lines.
///
/// # Errors
///
/// Returns [`FeedError`] if a line cannot be read or parsed.
pub fn read_json_lines<R: BufRead>(reader: R) -> Result<Vec<RawIncident>, FeedError> {
    let mut rows = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| FeedError::Io {
            path: format!("line {}", i + 1),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .map_err(|source| FeedError::JsonLine { line: i + 1, source })?;
        rows.push(raw_from_value(&value)?);
    }
    Ok(rows)
}

/// Converts a JSON object into a [`RawIncident`], rendering scalar fields
/// as text.
///
/// # Errors
///
/// Returns [`FeedError::Shape`] if `value` is not an object.
pub fn raw_from_value(value: &Value) -> Result<RawIncident, FeedError> {
    let Value::Object(map) = value else {
        return Err(FeedError::Shape {
            message: format!("expected an incident object, got {value}"),
        });
    };
    let field = |name: &str| map.get(name).and_then(value_to_text);

    Ok(RawIncident {
        timestamp: field("timestamp"),
        lat: field("lat"),
        lon: field("lon"),
        category: field("category"),
        source: field("source"),
        severity: field("severity"),
    })
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
