//! Split the ATLAS Higgs challenge dataset into class partitions.
//!
//! Reads the challenge CSV, prints its shape, and writes one Parquet
//! partition per class with the collection name embedded. Existing
//! partition files are replaced.

use clap::Parser;
use higgsml::splitter::{split_dataset, SplitterConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "prepare-dataset",
    about = "Split the Higgs challenge dataset into signal and background partitions"
)]
struct Cli {
    /// Challenge CSV with a header row.
    #[arg(long, default_value = "data/atlas-higgs-challenge-2014-v2.csv")]
    input: PathBuf,

    /// Column holding the class marker.
    #[arg(long, default_value = "Label")]
    label_column: String,

    /// Marker value selecting signal rows.
    #[arg(long, default_value = "s")]
    signal_value: String,

    /// Marker value selecting background rows.
    #[arg(long, default_value = "b")]
    background_value: String,

    /// Output path for the signal partition.
    #[arg(long, default_value = "data/higgs-signal.parquet")]
    signal_output: PathBuf,

    /// Collection name embedded in the signal partition.
    #[arg(long, default_value = "signal_events")]
    signal_collection: String,

    /// Output path for the background partition.
    #[arg(long, default_value = "data/higgs-background.parquet")]
    background_output: PathBuf,

    /// Collection name embedded in the background partition.
    #[arg(long, default_value = "background_events")]
    background_collection: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = SplitterConfig {
        input: cli.input,
        label_column: cli.label_column,
        signal_value: cli.signal_value,
        background_value: cli.background_value,
        signal_output: cli.signal_output,
        signal_collection: cli.signal_collection,
        background_output: cli.background_output,
        background_collection: cli.background_collection,
    };

    let summary = split_dataset(&config)?;
    println!("number of events: {}", summary.total_rows);
    for name in &summary.column_names {
        println!("{name}");
    }
    println!(
        "signal: {} events, background: {} events, unmatched: {}",
        summary.signal_rows, summary.background_rows, summary.unmatched_rows
    );
    Ok(())
}
