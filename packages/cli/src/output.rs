//! Rendering of a [`RiskMap`] for external consumers.

use std::io::Write;

use risk_map_grid_models::GridCell;
use risk_map_pipeline::RiskMap;
use strum_macros::{AsRefStr, Display, EnumString};

/// How the scored map is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OutputFormat {
    /// The full map, including validation and diagnostics, as pretty JSON.
    #[default]
    Json,
    /// One CSV row per cell.
    Csv,
}

/// Writes `map` to `writer` in the requested format.
///
/// # Errors
///
/// Returns an error if serialization or the underlying write fails.
pub fn write_map<W: Write>(
    map: &RiskMap,
    format: OutputFormat,
    writer: W,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => write_json(map, writer),
        OutputFormat::Csv => write_cells_csv(&map.cells, writer),
    }
}

fn write_json<W: Write>(map: &RiskMap, mut writer: W) -> Result<(), Box<dyn std::error::Error>> {
    serde_json::to_writer_pretty(&mut writer, map)?;
    writeln!(writer)?;
    Ok(())
}

fn write_cells_csv<W: Write>(
    cells: &[GridCell],
    writer: W,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for cell in cells {
        csv_writer.serialize(cell)?;
    }
    csv_writer.flush()?;
    Ok(())
}
