//! Integration tests for the dataset splitter stage
//!
//! Exercises the complete path:
//! 1. Load the challenge CSV
//! 2. Filter each class by the label column
//! 3. Persist both partitions as named Parquet collections
//! 4. Reload and verify values survived untouched

use higgsml::splitter::{split_dataset, SplitterConfig};
use higgsml::table::EventTable;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_csv(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).expect("create csv");
    for line in lines {
        writeln!(file, "{line}").expect("write csv line");
    }
    path
}

fn challenge_config(dir: &Path, input: PathBuf) -> SplitterConfig {
    SplitterConfig {
        input,
        label_column: "Label".to_string(),
        signal_value: "s".to_string(),
        background_value: "b".to_string(),
        signal_output: dir.join("higgs-signal.parquet"),
        signal_collection: "signal_events".to_string(),
        background_output: dir.join("higgs-background.parquet"),
        background_collection: "background_events".to_string(),
    }
}

#[test]
fn test_three_row_dataset_survives_bit_exact() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_csv(
        dir.path(),
        "events.csv",
        &[
            "EventId,DER_mass_MMC,PRI_tau_pt,Weight,Label",
            "100000,138.47,51.655,0.002653,s",
            "100001,160.937,68.768,2.233584,b",
            "100002,125.157,30.604,0.018636,s",
        ],
    );
    let config = challenge_config(dir.path(), input);

    let summary = split_dataset(&config).expect("split");
    assert_eq!(summary.total_rows, 3);
    assert_eq!(
        summary.column_names,
        vec!["EventId", "DER_mass_MMC", "PRI_tau_pt", "Weight", "Label"]
    );
    assert_eq!(summary.signal_rows, 2);
    assert_eq!(summary.background_rows, 1);
    assert_eq!(summary.unmatched_rows, 0);

    let signal =
        EventTable::open_parquet(&config.signal_output, "signal_events").expect("signal");
    let background =
        EventTable::open_parquet(&config.background_output, "background_events")
            .expect("background");

    // Row order and column layout are preserved within each class.
    assert_eq!(signal.column_names(), summary.column_names);
    assert_eq!(
        signal.column_as_f32("DER_mass_MMC").expect("mass"),
        vec![138.47, 125.157]
    );
    assert_eq!(
        signal.column_as_f32("PRI_tau_pt").expect("pt"),
        vec![51.655, 30.604]
    );
    assert_eq!(
        background.column_as_f32("DER_mass_MMC").expect("mass"),
        vec![160.937]
    );
}

#[test]
fn test_partitions_are_disjoint_and_exhaustive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut lines = vec!["EventId,DER_mass_MMC,PRI_tau_pt,Weight,Label".to_string()];
    for i in 0..50 {
        let label = if i % 3 == 0 { "s" } else { "b" };
        lines.push(format!("{i},{}.5,{}.25,1.0,{label}", 100 + i, 30 + i));
    }
    let borrowed: Vec<&str> = lines.iter().map(String::as_str).collect();
    let input = write_csv(dir.path(), "events.csv", &borrowed);
    let config = challenge_config(dir.path(), input);

    let summary = split_dataset(&config).expect("split");
    assert_eq!(
        summary.signal_rows + summary.background_rows + summary.unmatched_rows,
        summary.total_rows
    );
    assert_eq!(summary.unmatched_rows, 0);

    let signal = EventTable::open_parquet(&config.signal_output, "signal_events").expect("sig");
    let background =
        EventTable::open_parquet(&config.background_output, "background_events").expect("bkg");
    assert_eq!(
        signal.num_rows() + background.num_rows(),
        summary.total_rows
    );

    // No event id appears in both partitions.
    let signal_ids = signal.column_as_f32("EventId").expect("ids");
    let background_ids = background.column_as_f32("EventId").expect("ids");
    for id in &signal_ids {
        assert!(!background_ids.contains(id));
    }
}

#[test]
fn test_rows_matching_neither_class_are_dropped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_csv(
        dir.path(),
        "events.csv",
        &[
            "EventId,DER_mass_MMC,Weight,Label",
            "1,101.0,1.0,s",
            "2,102.0,1.0,t",
            "3,103.0,1.0,b",
            "4,104.0,1.0,v",
        ],
    );
    let config = challenge_config(dir.path(), input);

    let summary = split_dataset(&config).expect("split");
    assert_eq!(summary.signal_rows, 1);
    assert_eq!(summary.background_rows, 1);
    assert_eq!(summary.unmatched_rows, 2);
}

#[test]
fn test_rerun_replaces_existing_partitions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = write_csv(
        dir.path(),
        "first.csv",
        &["EventId,DER_mass_MMC,Label", "1,110.0,s", "2,120.0,b"],
    );
    let second = write_csv(
        dir.path(),
        "second.csv",
        &[
            "EventId,DER_mass_MMC,Label",
            "7,170.0,s",
            "8,180.0,s",
            "9,190.0,b",
        ],
    );

    let mut config = challenge_config(dir.path(), first);
    split_dataset(&config).expect("first split");
    config.input = second;
    split_dataset(&config).expect("second split");

    let signal = EventTable::open_parquet(&config.signal_output, "signal_events").expect("sig");
    assert_eq!(signal.num_rows(), 2);
    assert_eq!(
        signal.column_as_f32("DER_mass_MMC").expect("mass"),
        vec![170.0, 180.0]
    );
}

#[test]
fn test_missing_label_column_fails_before_writing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_csv(
        dir.path(),
        "events.csv",
        &["EventId,DER_mass_MMC,Tag", "1,110.0,s"],
    );
    let config = challenge_config(dir.path(), input);

    let result = split_dataset(&config);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Label"));
    assert!(!config.signal_output.exists());
    assert!(!config.background_output.exists());
}

#[test]
fn test_partition_with_no_matches_is_valid_and_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_csv(
        dir.path(),
        "events.csv",
        &["EventId,DER_mass_MMC,Label", "1,110.0,b", "2,120.0,b"],
    );
    let config = challenge_config(dir.path(), input);

    let summary = split_dataset(&config).expect("split");
    assert_eq!(summary.signal_rows, 0);

    let signal = EventTable::open_parquet(&config.signal_output, "signal_events").expect("sig");
    assert_eq!(signal.num_rows(), 0);
    assert_eq!(signal.column_names(), summary.column_names);
}

#[test]
fn test_reload_rejects_wrong_collection_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_csv(
        dir.path(),
        "events.csv",
        &["EventId,DER_mass_MMC,Label", "1,110.0,s", "2,120.0,b"],
    );
    let config = challenge_config(dir.path(), input);
    split_dataset(&config).expect("split");

    let result = EventTable::open_parquet(&config.signal_output, "background_events");
    let message = result.unwrap_err().to_string();
    assert!(message.contains("signal_events"), "{message}");
    assert!(message.contains("background_events"), "{message}");
}
