//! Dataset splitter stage
//!
//! Loads the challenge CSV once, reports its shape, and persists one
//! label-homogeneous Parquet partition per class. Output files are
//! recreated on every run; there is no incremental mode.

use crate::table::EventTable;
use crate::Result;
use std::path::PathBuf;
use tracing::info;

/// Configuration for one splitter run
#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Delimited input file with a header row
    pub input: PathBuf,
    /// Column holding the class marker
    pub label_column: String,
    /// Marker value selecting signal rows
    pub signal_value: String,
    /// Marker value selecting background rows
    pub background_value: String,
    /// Output path for the signal partition
    pub signal_output: PathBuf,
    /// Collection name embedded in the signal partition
    pub signal_collection: String,
    /// Output path for the background partition
    pub background_output: PathBuf,
    /// Collection name embedded in the background partition
    pub background_collection: String,
}

/// What a splitter run observed and produced
#[derive(Debug, Clone)]
pub struct SplitterSummary {
    /// Rows in the input dataset
    pub total_rows: usize,
    /// Column names in file order
    pub column_names: Vec<String>,
    /// Rows written to the signal partition
    pub signal_rows: usize,
    /// Rows written to the background partition
    pub background_rows: usize,
    /// Rows matching neither class marker (written nowhere)
    pub unmatched_rows: usize,
}

/// Split the input dataset into signal and background partitions
///
/// Both partitions are snapshot to Parquet with their collection names
/// embedded, overwriting any previous files. A class with zero matching
/// rows still produces a valid empty partition.
///
/// # Errors
/// Returns error if the input cannot be read, the label column is missing
/// or non-string, or a partition cannot be written
pub fn split_dataset(config: &SplitterConfig) -> Result<SplitterSummary> {
    info!(input = %config.input.display(), "loading dataset");
    let table = EventTable::read_csv(&config.input, "events")?;
    let total_rows = table.num_rows();
    let column_names = table.column_names();
    info!(rows = total_rows, columns = column_names.len(), "dataset loaded");

    let signal = table.filter_equal(
        &config.label_column,
        &config.signal_value,
        config.signal_collection.clone(),
    )?;
    let background = table.filter_equal(
        &config.label_column,
        &config.background_value,
        config.background_collection.clone(),
    )?;
    let unmatched_rows = total_rows - signal.num_rows() - background.num_rows();

    signal.snapshot(&config.signal_output)?;
    info!(
        rows = signal.num_rows(),
        path = %config.signal_output.display(),
        "signal partition written"
    );
    background.snapshot(&config.background_output)?;
    info!(
        rows = background.num_rows(),
        path = %config.background_output.display(),
        "background partition written"
    );

    Ok(SplitterSummary {
        total_rows,
        column_names,
        signal_rows: signal.num_rows(),
        background_rows: background.num_rows(),
        unmatched_rows,
    })
}
