//! Classification pipeline
//!
//! Drives the whole training workflow as a strict stage sequence:
//! declare variables, load the signal and background partitions,
//! prepare the train/test split, register methods, then train, test,
//! evaluate and render. Every stage validates its prerequisites and any
//! violation is a fatal configuration error; there is no partial
//! recovery, rerunning the program is the retry path.

use crate::dataset::{DataLoader, PreparedSplit, SplitOptions};
use crate::eval::plot::render_roc_svg;
use crate::eval::{evaluate_method, EvaluationReport, SampleComposition};
use crate::method::{build_classifier, Classifier, MethodKind, MethodSpec};
use crate::table::EventTable;
use crate::{Error, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// JSON report file name inside the output directory
pub const REPORT_FILE: &str = "evaluation.json";
/// ROC canvas file name inside the output directory
pub const ROC_FILE: &str = "roc.svg";

struct TrainedMethod {
    spec: MethodSpec,
    classifier: Box<dyn Classifier>,
    training_seconds: f64,
}

/// Orchestrates loading, splitting, training and evaluation
pub struct ClassificationPipeline {
    loader: DataLoader,
    split: Option<PreparedSplit>,
    specs: Vec<MethodSpec>,
    trained: Vec<TrainedMethod>,
    scores: Vec<Vec<f64>>,
    report: Option<EvaluationReport>,
    output_dir: PathBuf,
}

impl ClassificationPipeline {
    /// Create a pipeline writing its artifacts under `output_dir`
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            loader: DataLoader::new(),
            split: None,
            specs: Vec::new(),
            trained: Vec::new(),
            scores: Vec::new(),
            report: None,
            output_dir: output_dir.into(),
        }
    }

    /// Declare the next input variable; order fixes the feature layout
    ///
    /// # Errors
    /// Returns error on duplicate names or once the split is prepared
    pub fn add_variable(&mut self, name: impl Into<String>) -> Result<()> {
        if self.split.is_some() {
            return Err(Error::Config(
                "Variables must be declared before the split is prepared".to_string(),
            ));
        }
        self.loader.add_variable(name)
    }

    /// Load the signal partition from a named Parquet collection
    ///
    /// # Errors
    /// Returns error if the file is unreadable, the collection name
    /// disagrees, a declared variable is missing, or the split is
    /// already prepared
    pub fn load_signal(&mut self, path: &Path, collection: &str, weight: f64) -> Result<()> {
        if self.split.is_some() {
            return Err(Error::Config(
                "Partitions must be loaded before the split is prepared".to_string(),
            ));
        }
        let table = EventTable::open_parquet(path, collection)?;
        info!(rows = table.num_rows(), collection, "signal partition loaded");
        self.loader.set_signal(table, weight)
    }

    /// Load the background partition from a named Parquet collection
    ///
    /// # Errors
    /// Same conditions as [`ClassificationPipeline::load_signal`]
    pub fn load_background(&mut self, path: &Path, collection: &str, weight: f64) -> Result<()> {
        if self.split.is_some() {
            return Err(Error::Config(
                "Partitions must be loaded before the split is prepared".to_string(),
            ));
        }
        let table = EventTable::open_parquet(path, collection)?;
        info!(rows = table.num_rows(), collection, "background partition loaded");
        self.loader.set_background(table, weight)
    }

    /// Draw the train/test split; runs exactly once
    ///
    /// # Errors
    /// Returns error if variables or partitions are missing, counts
    /// exceed a partition, a training class comes out empty, or the
    /// split was already prepared
    pub fn prepare_split(&mut self, options: &SplitOptions) -> Result<()> {
        if self.split.is_some() {
            return Err(Error::Config(
                "The split has already been prepared".to_string(),
            ));
        }
        let split = self.loader.prepare(options)?;
        info!(
            train = split.train().len(),
            test = split.test().len(),
            "split prepared"
        );
        self.split = Some(split);
        Ok(())
    }

    /// Register a method under a unique name with its raw option string
    ///
    /// Options are stored untouched and parsed when training starts.
    ///
    /// # Errors
    /// Returns error before the split is prepared, after training, or on
    /// a duplicate name
    pub fn book_method(
        &mut self,
        kind: MethodKind,
        name: impl Into<String>,
        options: impl Into<String>,
    ) -> Result<()> {
        if self.split.is_none() {
            return Err(Error::Config(
                "Prepare the split before registering methods".to_string(),
            ));
        }
        if !self.trained.is_empty() {
            return Err(Error::Config(
                "Methods cannot be registered after training".to_string(),
            ));
        }
        let name = name.into();
        if self.specs.iter().any(|s| s.name == name) {
            return Err(Error::Config(format!(
                "Method '{name}' is already registered"
            )));
        }
        let spec = MethodSpec::new(kind, name, options);
        info!(kind = %spec.kind, name = %spec.name, "method booked");
        self.specs.push(spec);
        Ok(())
    }

    /// Train every registered method on the training sample, in
    /// registration order
    ///
    /// Option strings are parsed here, so an unknown or malformed
    /// hyperparameter fails the run before any training starts for that
    /// method.
    ///
    /// # Errors
    /// Returns error if no methods are registered, training already ran,
    /// an option string is invalid, or a fit fails
    pub fn train_all(&mut self) -> Result<()> {
        let Some(split) = &self.split else {
            return Err(Error::Config(
                "Prepare the split before training".to_string(),
            ));
        };
        if self.specs.is_empty() {
            return Err(Error::Config("No methods are registered".to_string()));
        }
        if !self.trained.is_empty() {
            return Err(Error::Config(
                "Methods have already been trained".to_string(),
            ));
        }

        for spec in &self.specs {
            let mut classifier = build_classifier(spec, split.train().n_variables())?;
            info!(method = %spec.name, "training");
            let started = Instant::now();
            classifier.fit(split.train())?;
            let training_seconds = started.elapsed().as_secs_f64();
            info!(method = %spec.name, seconds = training_seconds, "trained");
            self.trained.push(TrainedMethod {
                spec: spec.clone(),
                classifier,
                training_seconds,
            });
        }
        Ok(())
    }

    /// Score every trained method over the test sample and cache the
    /// outputs for evaluation
    ///
    /// # Errors
    /// Returns error before training, on a second run, or if scoring
    /// fails
    pub fn test_all(&mut self) -> Result<()> {
        let Some(split) = &self.split else {
            return Err(Error::Config("Prepare the split before testing".to_string()));
        };
        if self.trained.is_empty() {
            return Err(Error::Config("Train the methods before testing".to_string()));
        }
        if !self.scores.is_empty() {
            return Err(Error::Config(
                "Methods have already been tested".to_string(),
            ));
        }

        let test = split.test();
        for method in &self.trained {
            let mut outputs = Vec::with_capacity(test.len());
            for i in 0..test.len() {
                outputs.push(method.classifier.output(test.row(i))?);
            }
            info!(method = %method.spec.name, events = outputs.len(), "tested");
            self.scores.push(outputs);
        }
        Ok(())
    }

    /// Compute per-method results over the test sample and write the
    /// JSON report into the output directory
    ///
    /// # Errors
    /// Returns error before testing, on a second run, or if a curve or
    /// the report file cannot be produced
    pub fn evaluate_all(&mut self) -> Result<()> {
        let Some(split) = &self.split else {
            return Err(Error::Config(
                "Prepare the split before evaluating".to_string(),
            ));
        };
        if self.scores.is_empty() {
            return Err(Error::Config(
                "Test the methods before evaluating".to_string(),
            ));
        }
        if self.report.is_some() {
            return Err(Error::Config(
                "Methods have already been evaluated".to_string(),
            ));
        }

        fs::create_dir_all(&self.output_dir)?;
        let test = split.test();
        let mut methods = Vec::with_capacity(self.trained.len());
        for (method, scores) in self.trained.iter().zip(&self.scores) {
            let curve = method.classifier.roc(test)?;
            let evaluation = evaluate_method(
                &method.spec.name,
                method.spec.kind,
                curve,
                scores,
                test,
                method.training_seconds,
            );
            info!(
                method = %evaluation.name,
                roc_integral = evaluation.roc_integral,
                separation = evaluation.separation,
                "evaluated"
            );
            methods.push(evaluation);
        }

        let report = EvaluationReport {
            created_at: Utc::now(),
            train: SampleComposition::of(split.train()),
            test: SampleComposition::of(test),
            methods,
        };
        report.save(&self.output_dir.join(REPORT_FILE))?;
        self.report = Some(report);
        Ok(())
    }

    /// Render the ROC canvas into the output directory
    ///
    /// # Errors
    /// Returns error before evaluation or if the file cannot be written
    pub fn render_roc(&self) -> Result<PathBuf> {
        let Some(report) = &self.report else {
            return Err(Error::Config(
                "Evaluate the methods before rendering".to_string(),
            ));
        };
        let path = self.output_dir.join(ROC_FILE);
        render_roc_svg(&report.methods, &path)?;
        info!(path = %path.display(), "ROC canvas rendered");
        Ok(path)
    }

    /// The evaluation report, once [`ClassificationPipeline::evaluate_all`]
    /// has run
    #[must_use]
    pub fn report(&self) -> Option<&EvaluationReport> {
        self.report.as_ref()
    }

    /// Directory the report and canvas are written to
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
