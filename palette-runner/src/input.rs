//! Input loading
//!
//! Reads the record file and resolves every row into a [`Record`]. Any read
//! or parse failure aborts the run before a task is scheduled.

use anyhow::{Context, Result};
use palette_core::Locator;
use palette_core::domain::record::{InputRow, Record};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Loads and resolves all records of the input file
pub fn load_records(path: &Path, locator: &Locator) -> Result<Vec<Record>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file {}", path.display()))?;

    let rows = read_rows(file)
        .with_context(|| format!("Failed to parse input file {}", path.display()))?;

    info!("Loaded {} record(s) from {}", rows.len(), path.display());

    Ok(rows.into_iter().map(|row| locator.resolve(row)).collect())
}

/// Parses CSV rows with at least `serial` and `original_file_path` columns
///
/// Only headers are trimmed. Object keys may start or end with spaces, so
/// paths are kept byte for byte.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<InputRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let mut rows = Vec::new();

    for result in reader.deserialize::<InputRow>() {
        let row = result.context("Invalid input row")?;

        if row.serial.trim().is_empty() {
            anyhow::bail!("Input row {} has an empty serial", rows.len() + 1);
        }

        rows.push(row);
    }

    Ok(rows)
}
