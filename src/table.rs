//! Columnar event storage (Arrow/Parquet)
//!
//! **Append-Only Design**:
//! - Event tables are loaded in bulk (CSV ingest or Parquet restore)
//! - Write pattern: whole-table snapshots (no random updates)
//! - Use case: partitioning a challenge dataset once, reading it many times
//!
//! A table is a *named collection*: the name travels with the Parquet file
//! in its key/value metadata, so a reader can verify it opened the
//! partition it asked for and fail fast otherwise.
//!
//! Toyota Way Principles:
//! - Poka-Yoke: collection-name check prevents silently training on the
//!   wrong partition
//! - Muda elimination: label filtering reuses Arrow compute kernels

use crate::{Error, Result};
use arrow::array::{
    Array, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::compute;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;

/// Parquet key/value metadata key under which the collection name is stored
const COLLECTION_KEY: &str = "higgsml.collection";

/// A named, immutable collection of event record batches
#[derive(Debug, Clone)]
pub struct EventTable {
    name: String,
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl EventTable {
    /// Create a table from existing batches
    ///
    /// Useful for testing and for synthetic training data.
    ///
    /// # Errors
    /// Returns error if any batch schema differs from `schema`
    pub fn from_batches(
        name: impl Into<String>,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Result<Self> {
        for batch in &batches {
            if batch.schema() != schema {
                return Err(Error::Storage(format!(
                    "Schema mismatch: expected {:?}, got {:?}",
                    schema,
                    batch.schema()
                )));
            }
        }
        Ok(Self {
            name: name.into(),
            schema,
            batches,
        })
    }

    /// Load a table from a delimited text file with a header row
    ///
    /// The schema is inferred from the full file, so a column whose early
    /// rows look integral but later rows carry decimals still comes out as
    /// a float column.
    ///
    /// # Errors
    /// Returns error if the file cannot be opened, inference fails, or any
    /// row fails to parse against the inferred schema
    pub fn read_csv<P: AsRef<Path>>(path: P, name: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| {
            Error::Storage(format!("Failed to open input file '{}': {e}", path.display()))
        })?;

        let format = Format::default().with_header(true);
        let (schema, _n_inferred) = format
            .infer_schema(&mut file, None)
            .map_err(|e| Error::Storage(format!("Failed to infer CSV schema: {e}")))?;
        file.rewind()?;

        let schema = Arc::new(schema);
        let reader = ReaderBuilder::new(schema.clone())
            .with_format(format)
            .build(file)
            .map_err(|e| Error::Storage(format!("Failed to create CSV reader: {e}")))?;

        let mut batches = Vec::new();
        for batch in reader {
            let batch =
                batch.map_err(|e| Error::Storage(format!("Failed to read CSV batch: {e}")))?;
            batches.push(batch);
        }

        Ok(Self {
            name: name.into(),
            schema,
            batches,
        })
    }

    /// Open a Parquet partition and verify its embedded collection name
    ///
    /// # Errors
    /// Returns error if the file cannot be read, carries no collection
    /// name, or carries a different one than `expected`
    pub fn open_parquet<P: AsRef<Path>>(path: P, expected: &str) -> Result<Self> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::Storage(format!(
                "Failed to open partition file '{}': {e}",
                path.display()
            ))
        })?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

        let found = builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .and_then(|pairs| pairs.iter().find(|kv| kv.key == COLLECTION_KEY))
            .and_then(|kv| kv.value.clone());
        match found {
            Some(ref name) if name == expected => {}
            Some(name) => {
                return Err(Error::Storage(format!(
                    "Collection '{expected}' not found in '{}': file contains '{name}'",
                    path.display()
                )))
            }
            None => {
                return Err(Error::Storage(format!(
                    "Collection '{expected}' not found in '{}': file carries no collection name",
                    path.display()
                )))
            }
        }

        let schema = builder.schema().clone();
        let reader = builder.build()?;

        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch?);
        }

        Ok(Self {
            name: expected.to_string(),
            schema,
            batches,
        })
    }

    /// Snapshot the table to a Parquet file, embedding the collection name
    ///
    /// An existing file at `path` is overwritten without confirmation
    /// (RECREATE semantics). An empty table writes a valid zero-row file
    /// with the full schema.
    ///
    /// # Errors
    /// Returns error if the file cannot be created or written
    pub fn snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        use parquet::arrow::ArrowWriter;
        use parquet::file::properties::WriterProperties;
        use parquet::format::KeyValue;

        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            Error::Storage(format!(
                "Failed to create partition file '{}': {e}",
                path.display()
            ))
        })?;

        let props = WriterProperties::builder()
            .set_key_value_metadata(Some(vec![KeyValue::new(
                COLLECTION_KEY.to_string(),
                self.name.clone(),
            )]))
            .build();

        let mut writer = ArrowWriter::try_new(file, self.schema.clone(), Some(props))?;
        for batch in &self.batches {
            writer.write(batch)?;
        }
        writer.close()?;
        Ok(())
    }

    /// Collection name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table schema
    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Total number of rows across all batches
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Column names in schema order
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Whether the table has a column with the given name
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.schema.index_of(column).is_ok()
    }

    /// All record batches
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Derive a new table keeping only rows whose string `column` equals
    /// `value`
    ///
    /// A zero-match filter yields an empty, still-valid table with the full
    /// schema. Null cells never match.
    ///
    /// # Errors
    /// Returns error if the column is missing or not a string column
    pub fn filter_equal(
        &self,
        column: &str,
        value: &str,
        name: impl Into<String>,
    ) -> Result<Self> {
        let idx = self.schema.index_of(column).map_err(|_| {
            Error::Storage(format!(
                "Column '{column}' not found in collection '{}'",
                self.name
            ))
        })?;
        if self.schema.field(idx).data_type() != &DataType::Utf8 {
            return Err(Error::Storage(format!(
                "Column '{column}' is not a string column (found {:?})",
                self.schema.field(idx).data_type()
            )));
        }

        let mut filtered = Vec::with_capacity(self.batches.len());
        for batch in &self.batches {
            let array = batch
                .column(idx)
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| {
                    Error::Storage("Failed to downcast to StringArray".to_string())
                })?;
            let mask: Vec<bool> = (0..array.len())
                .map(|i| !array.is_null(i) && array.value(i) == value)
                .collect();
            let mask = BooleanArray::from(mask);
            let batch = compute::filter_record_batch(batch, &mask)
                .map_err(|e| Error::Storage(format!("Failed to apply filter: {e}")))?;
            filtered.push(batch);
        }

        Ok(Self {
            name: name.into(),
            schema: self.schema.clone(),
            batches: filtered,
        })
    }

    /// Extract a numeric column as `f32` values in row order
    ///
    /// Accepts Int32, Int64, Float32 and Float64 columns; anything the
    /// CSV inference or Parquet restore can produce for an event feature.
    ///
    /// # Errors
    /// Returns error if the column is missing, non-numeric, or contains
    /// nulls
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn column_as_f32(&self, column: &str) -> Result<Vec<f32>> {
        let idx = self.schema.index_of(column).map_err(|_| {
            Error::Storage(format!(
                "Column '{column}' not found in collection '{}'",
                self.name
            ))
        })?;

        let mut values = Vec::with_capacity(self.num_rows());
        for batch in &self.batches {
            let array = batch.column(idx);
            if array.null_count() > 0 {
                return Err(Error::Storage(format!(
                    "Column '{column}' in collection '{}' contains nulls",
                    self.name
                )));
            }
            match array.data_type() {
                DataType::Float32 => {
                    let array = array
                        .as_any()
                        .downcast_ref::<Float32Array>()
                        .ok_or_else(|| {
                            Error::Storage("Failed to downcast to Float32Array".to_string())
                        })?;
                    values.extend(array.values().iter().copied());
                }
                DataType::Float64 => {
                    let array = array
                        .as_any()
                        .downcast_ref::<Float64Array>()
                        .ok_or_else(|| {
                            Error::Storage("Failed to downcast to Float64Array".to_string())
                        })?;
                    values.extend(array.values().iter().map(|&v| v as f32));
                }
                DataType::Int32 => {
                    let array = array
                        .as_any()
                        .downcast_ref::<Int32Array>()
                        .ok_or_else(|| {
                            Error::Storage("Failed to downcast to Int32Array".to_string())
                        })?;
                    values.extend(array.values().iter().map(|&v| v as f32));
                }
                DataType::Int64 => {
                    let array = array
                        .as_any()
                        .downcast_ref::<Int64Array>()
                        .ok_or_else(|| {
                            Error::Storage("Failed to downcast to Int64Array".to_string())
                        })?;
                    values.extend(array.values().iter().map(|&v| v as f32));
                }
                dt => {
                    return Err(Error::Storage(format!(
                        "Column '{column}' has non-numeric type {dt:?}"
                    )))
                }
            }
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{Field, Schema};
    use std::io::Write;

    fn event_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("mass", DataType::Float64, false),
            Field::new("njet", DataType::Int64, false),
            Field::new("label", DataType::Utf8, false),
        ]))
    }

    fn event_batch(rows: &[(f64, i64, &str)]) -> RecordBatch {
        let mass = Float64Array::from_iter_values(rows.iter().map(|r| r.0));
        let njet = Int64Array::from_iter_values(rows.iter().map(|r| r.1));
        let label = StringArray::from_iter_values(rows.iter().map(|r| r.2));
        RecordBatch::try_new(
            event_schema(),
            vec![Arc::new(mass), Arc::new(njet), Arc::new(label)],
        )
        .unwrap()
    }

    #[test]
    fn test_from_batches_rejects_schema_mismatch() {
        let other_schema = Arc::new(Schema::new(vec![Field::new(
            "different",
            DataType::Int32,
            false,
        )]));
        let batch = event_batch(&[(1.0, 2, "s")]);
        let result = EventTable::from_batches("events", other_schema, vec![batch]);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Schema mismatch"));
    }

    #[test]
    fn test_filter_equal_partitions_rows() {
        let batch = event_batch(&[(1.0, 0, "s"), (2.0, 1, "b"), (3.0, 2, "s")]);
        let table = EventTable::from_batches("events", event_schema(), vec![batch]).unwrap();

        let signal = table.filter_equal("label", "s", "signal_events").unwrap();
        let background = table.filter_equal("label", "b", "background_events").unwrap();

        assert_eq!(signal.num_rows(), 2);
        assert_eq!(background.num_rows(), 1);
        assert_eq!(signal.num_rows() + background.num_rows(), table.num_rows());
        assert_eq!(signal.column_as_f32("mass").unwrap(), vec![1.0, 3.0]);
        assert_eq!(background.column_as_f32("mass").unwrap(), vec![2.0]);
    }

    #[test]
    fn test_filter_equal_no_match_keeps_schema() {
        let batch = event_batch(&[(1.0, 0, "s")]);
        let table = EventTable::from_batches("events", event_schema(), vec![batch]).unwrap();

        let empty = table.filter_equal("label", "zz", "none").unwrap();
        assert_eq!(empty.num_rows(), 0);
        assert_eq!(empty.column_names(), vec!["mass", "njet", "label"]);
    }

    #[test]
    fn test_filter_equal_rejects_numeric_column() {
        let batch = event_batch(&[(1.0, 0, "s")]);
        let table = EventTable::from_batches("events", event_schema(), vec![batch]).unwrap();

        let result = table.filter_equal("mass", "1.0", "bad");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("not a string column"));
    }

    #[test]
    fn test_column_as_f32_handles_numeric_types() {
        let batch = event_batch(&[(1.5, 3, "s"), (2.5, 4, "b")]);
        let table = EventTable::from_batches("events", event_schema(), vec![batch]).unwrap();

        assert_eq!(table.column_as_f32("mass").unwrap(), vec![1.5, 2.5]);
        assert_eq!(table.column_as_f32("njet").unwrap(), vec![3.0, 4.0]);
    }

    #[test]
    fn test_column_as_f32_missing_column() {
        let batch = event_batch(&[(1.0, 0, "s")]);
        let table = EventTable::from_batches("events", event_schema(), vec![batch]).unwrap();

        let result = table.column_as_f32("no_such_column");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_column_as_f32_rejects_string_column() {
        let batch = event_batch(&[(1.0, 0, "s")]);
        let table = EventTable::from_batches("events", event_schema(), vec![batch]).unwrap();

        assert!(table.column_as_f32("label").is_err());
    }

    #[test]
    fn test_snapshot_open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signal.parquet");

        let batch = event_batch(&[(125.0, 2, "s"), (91.2, 1, "s")]);
        let table = EventTable::from_batches("signal_events", event_schema(), vec![batch]).unwrap();
        table.snapshot(&path).unwrap();

        let restored = EventTable::open_parquet(&path, "signal_events").unwrap();
        assert_eq!(restored.num_rows(), 2);
        assert_eq!(restored.name(), "signal_events");
        assert_eq!(restored.column_as_f32("mass").unwrap(), vec![125.0, 91.2]);
    }

    #[test]
    fn test_open_parquet_name_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signal.parquet");

        let batch = event_batch(&[(125.0, 2, "s")]);
        let table = EventTable::from_batches("signal_events", event_schema(), vec![batch]).unwrap();
        table.snapshot(&path).unwrap();

        let result = EventTable::open_parquet(&path, "background_events");
        assert!(result.is_err());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("background_events"));
        assert!(msg.contains("signal_events"));
    }

    #[test]
    fn test_open_parquet_missing_file() {
        let result = EventTable::open_parquet("/nonexistent/partition.parquet", "signal_events");
        assert!(result.is_err());
    }

    #[test]
    fn test_snapshot_empty_table_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.parquet");

        let table = EventTable::from_batches("empty_events", event_schema(), vec![]).unwrap();
        table.snapshot(&path).unwrap();

        let restored = EventTable::open_parquet(&path, "empty_events").unwrap();
        assert_eq!(restored.num_rows(), 0);
        assert_eq!(restored.column_names(), vec!["mass", "njet", "label"]);
    }

    #[test]
    fn test_read_csv_infers_schema_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "mass,njet,label").unwrap();
        writeln!(file, "125.0,2,s").unwrap();
        writeln!(file, "91.2,1,b").unwrap();
        writeln!(file, "80.4,0,s").unwrap();
        drop(file);

        let table = EventTable::read_csv(&path, "events").unwrap();
        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.column_names(), vec!["mass", "njet", "label"]);
        assert_eq!(table.column_as_f32("mass").unwrap(), vec![125.0, 91.2, 80.4]);
    }

    #[test]
    fn test_read_csv_missing_file() {
        let result = EventTable::read_csv("/nonexistent/events.csv", "events");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to open"));
    }

    // Property-based tests (EXTREME TDD - Toyota Way: Jidoka)
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: label partitions are disjoint and exhaustive over
            /// rows carrying one of the two markers
            #[test]
            fn prop_filter_partitions_are_disjoint_and_exhaustive(
                labels in prop::collection::vec(prop::sample::select(vec!["s", "b"]), 1..200)
            ) {
                let rows: Vec<(f64, i64, &str)> = labels
                    .iter()
                    .enumerate()
                    .map(|(i, l)| (i as f64, 0i64, *l))
                    .collect();
                let batch = event_batch(&rows);
                let table = EventTable::from_batches("events", event_schema(), vec![batch]).unwrap();

                let signal = table.filter_equal("label", "s", "sig").unwrap();
                let background = table.filter_equal("label", "b", "bkg").unwrap();

                prop_assert_eq!(
                    signal.num_rows() + background.num_rows(),
                    table.num_rows()
                );

                let expected_signal = labels.iter().filter(|l| **l == "s").count();
                prop_assert_eq!(signal.num_rows(), expected_signal);
            }

            /// Property: filtering preserves row order within a partition
            #[test]
            fn prop_filter_preserves_row_order(
                labels in prop::collection::vec(prop::sample::select(vec!["s", "b"]), 1..100)
            ) {
                let rows: Vec<(f64, i64, &str)> = labels
                    .iter()
                    .enumerate()
                    .map(|(i, l)| (i as f64, 0i64, *l))
                    .collect();
                let batch = event_batch(&rows);
                let table = EventTable::from_batches("events", event_schema(), vec![batch]).unwrap();

                let signal = table.filter_equal("label", "s", "sig").unwrap();
                let masses = signal.column_as_f32("mass").unwrap();
                let mut sorted = masses.clone();
                sorted.sort_by(f32::total_cmp);
                prop_assert_eq!(masses, sorted);
            }
        }
    }
}
