//! Integration tests for the classification pipeline
//!
//! Exercises the complete workflow on synthetic separable partitions:
//! 1. Declare variables and load both Parquet partitions
//! 2. Prepare the train/test split
//! 3. Register, train, test and evaluate all four method families
//! 4. Render the ROC canvas and reload the JSON report

use arrow::array::{Float32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use higgsml::dataset::SplitOptions;
use higgsml::eval::EvaluationReport;
use higgsml::method::MethodKind;
use higgsml::pipeline::ClassificationPipeline;
use higgsml::table::EventTable;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Write a two-variable partition clustered around `center`, with the
/// class column carried along like the real partitions carry theirs
#[allow(clippy::cast_precision_loss)]
fn write_partition(
    dir: &Path,
    file: &str,
    collection: &str,
    center: f32,
    label: &str,
    rows: usize,
) -> PathBuf {
    let schema = Arc::new(Schema::new(vec![
        Field::new("x", DataType::Float32, false),
        Field::new("y", DataType::Float32, false),
        Field::new("Label", DataType::Utf8, false),
    ]));
    let xs: Vec<f32> = (0..rows)
        .map(|i| center + ((i * 7) % 13) as f32 * 0.07 - 0.42)
        .collect();
    let ys: Vec<f32> = (0..rows)
        .map(|i| center + ((i * 5) % 11) as f32 * 0.08 - 0.40)
        .collect();
    let labels: Vec<&str> = (0..rows).map(|_| label).collect();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float32Array::from(xs)),
            Arc::new(Float32Array::from(ys)),
            Arc::new(StringArray::from(labels)),
        ],
    )
    .expect("batch");

    let table = EventTable::from_batches(collection, schema, vec![batch]).expect("table");
    let path = dir.join(file);
    table.snapshot(&path).expect("snapshot");
    path
}

fn loaded_pipeline(dir: &Path, signal_rows: usize, background_rows: usize) -> ClassificationPipeline {
    let signal = write_partition(dir, "signal.parquet", "signal_events", 2.0, "s", signal_rows);
    let background = write_partition(
        dir,
        "background.parquet",
        "background_events",
        -2.0,
        "b",
        background_rows,
    );

    let mut pipeline = ClassificationPipeline::new(dir.join("output"));
    pipeline.add_variable("x").expect("x");
    pipeline.add_variable("y").expect("y");
    pipeline
        .load_signal(&signal, "signal_events", 1.0)
        .expect("signal");
    pipeline
        .load_background(&background, "background_events", 1.0)
        .expect("background");
    pipeline
}

#[test]
fn test_four_method_families_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut pipeline = loaded_pipeline(dir.path(), 150, 150);
    pipeline
        .prepare_split(
            &SplitOptions::parse(
                "NTrain_Signal=100:NTrain_Background=100:NTest_Signal=0:NTest_Background=0:\
                 SplitMode=Random:NormMode=NumEvents:!V",
            )
            .expect("options"),
        )
        .expect("split");

    pipeline
        .book_method(
            MethodKind::Cuts,
            "Cuts",
            "!H:!V:FitMethod=MC:EffSel:SampleSize=2000:VarProp=FSmart",
        )
        .expect("book cuts");
    pipeline
        .book_method(
            MethodKind::Bdt,
            "BDT",
            "!H:!V:NTrees=20:MinNodeSize=2.5%:MaxDepth=3:BoostType=AdaBoost:AdaBoostBeta=0.5:\
             UseBaggedBoost:BaggedSampleFraction=0.5:SeparationType=GiniIndex:nCuts=20",
        )
        .expect("book bdt");
    pipeline
        .book_method(MethodKind::Fisher, "Fisher", "H:!V:Fisher:VarTransform=None")
        .expect("book fisher");
    pipeline
        .book_method(
            MethodKind::Mlp,
            "MLP",
            "!H:!V:NeuronType=tanh:VarTransform=N:NCycles=60:HiddenLayers=N+5:TestRate=5:\
             LearningRate=0.1:BatchSize=16:!UseRegulator",
        )
        .expect("book mlp");

    pipeline.train_all().expect("train");
    pipeline.test_all().expect("test");
    pipeline.evaluate_all().expect("evaluate");
    let canvas = pipeline.render_roc().expect("render");

    let report = pipeline.report().expect("report");
    assert_eq!(report.methods.len(), 4);
    assert_eq!(report.train.signal, 100);
    assert_eq!(report.train.background, 100);
    assert_eq!(report.test.signal, 50);
    assert_eq!(report.test.background, 50);
    for method in &report.methods {
        assert!(
            method.roc_integral > 0.8,
            "{} auc = {}",
            method.name,
            method.roc_integral
        );
        assert!(method.separation >= 0.0);
        assert!(method.training_seconds >= 0.0);
    }
    let names: Vec<&str> = report.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Cuts", "BDT", "Fisher", "MLP"]);

    // Artifacts land in the output directory and the report reloads.
    assert!(canvas.exists());
    let report_path = dir.path().join("output").join("evaluation.json");
    let restored = EvaluationReport::load(&report_path).expect("reload");
    assert_eq!(restored.methods.len(), 4);
    let svg = std::fs::read_to_string(&canvas).expect("svg");
    assert_eq!(svg.matches("<polyline").count(), 4);
}

#[test]
fn test_split_counts_follow_requests() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut pipeline = loaded_pipeline(dir.path(), 120, 140);
    pipeline
        .prepare_split(
            &SplitOptions::parse(
                "NTrain_Signal=60:NTrain_Background=80:NTest_Signal=20:NTest_Background=30",
            )
            .expect("options"),
        )
        .expect("split");
    pipeline
        .book_method(MethodKind::Fisher, "Fisher", "VarTransform=None")
        .expect("book");
    pipeline.train_all().expect("train");
    pipeline.test_all().expect("test");
    pipeline.evaluate_all().expect("evaluate");

    let report = pipeline.report().expect("report");
    assert_eq!(report.train.signal, 60);
    assert_eq!(report.train.background, 80);
    assert_eq!(report.test.signal, 20);
    assert_eq!(report.test.background, 30);
}

#[test]
fn test_zero_test_count_takes_the_remainder() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut pipeline = loaded_pipeline(dir.path(), 90, 70);
    pipeline
        .prepare_split(
            &SplitOptions::parse("NTrain_Signal=50:NTrain_Background=40").expect("options"),
        )
        .expect("split");
    pipeline
        .book_method(MethodKind::Fisher, "Fisher", "VarTransform=None")
        .expect("book");
    pipeline.train_all().expect("train");
    pipeline.test_all().expect("test");
    pipeline.evaluate_all().expect("evaluate");

    let report = pipeline.report().expect("report");
    assert_eq!(report.test.signal, 40);
    assert_eq!(report.test.background, 30);
}

#[test]
fn test_oversized_train_request_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut pipeline = loaded_pipeline(dir.path(), 30, 30);

    let result = pipeline.prepare_split(
        &SplitOptions::parse("NTrain_Signal=100:NTrain_Background=10").expect("options"),
    );
    let message = result.unwrap_err().to_string();
    assert!(message.contains("100"), "{message}");
    assert!(message.contains("30"), "{message}");
}

#[test]
fn test_unknown_hyperparameter_fails_at_training() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut pipeline = loaded_pipeline(dir.path(), 40, 40);
    pipeline
        .prepare_split(&SplitOptions::parse("NTrain_Signal=20:NTrain_Background=20").expect("o"))
        .expect("split");

    pipeline
        .book_method(MethodKind::Bdt, "BDT", "NTrees=5:NoSuchKnob=7")
        .expect("booking succeeds, validation is deferred");
    let message = pipeline.train_all().unwrap_err().to_string();
    assert!(message.contains("BDT"), "{message}");
    assert!(message.contains("NoSuchKnob"), "{message}");
}

#[test]
fn test_missing_declared_variable_fails_loading() {
    let dir = tempfile::tempdir().expect("tempdir");
    let signal = write_partition(dir.path(), "signal.parquet", "signal_events", 1.0, "s", 10);

    let mut pipeline = ClassificationPipeline::new(dir.path().join("output"));
    pipeline.add_variable("x").expect("x");
    pipeline.add_variable("missing_column").expect("declare");

    let result = pipeline.load_signal(&signal, "signal_events", 1.0);
    let message = result.unwrap_err().to_string();
    assert!(message.contains("missing_column"), "{message}");
}

#[test]
fn test_training_before_split_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut pipeline = loaded_pipeline(dir.path(), 20, 20);

    assert!(pipeline.train_all().is_err());
    assert!(pipeline
        .book_method(MethodKind::Fisher, "Fisher", "")
        .is_err());
}
