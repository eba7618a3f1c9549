//! Evaluation artifacts
//!
//! Turns trained classifiers and the test sample into a serializable
//! report: per-method ROC integral, signal efficiencies at reference
//! background levels, and the signal/background separation of the
//! output distribution. The report persists as pretty-printed JSON next
//! to the rendered ROC canvas.

pub mod plot;
pub mod roc;

pub use roc::{separation, RocCurve, RocPoint};

use crate::dataset::EventSample;
use crate::method::MethodKind;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Background efficiencies at which signal efficiency is reported
pub const BACKGROUND_EFF_POINTS: [f64; 3] = [0.01, 0.10, 0.30];

/// Signal efficiency read off a ROC curve at one background efficiency
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EfficiencyPoint {
    /// Background efficiency the curve was probed at
    pub background_eff: f64,
    /// Interpolated signal efficiency at that background level
    pub signal_eff: f64,
}

/// Evaluation results for one trained method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodEvaluation {
    /// Registered method name
    pub name: String,
    /// Method family
    pub kind: MethodKind,
    /// Area under the ROC curve
    pub roc_integral: f64,
    /// Signal efficiencies at [`BACKGROUND_EFF_POINTS`]
    pub signal_eff_at_background: Vec<EfficiencyPoint>,
    /// Separation of the signal and background output distributions
    pub separation: f64,
    /// Wall-clock training time
    pub training_seconds: f64,
    /// Full curve, for rendering and archival
    pub roc_curve: RocCurve,
}

/// Event counts of a prepared sample, by class
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SampleComposition {
    /// Signal events in the sample
    pub signal: usize,
    /// Background events in the sample
    pub background: usize,
}

impl SampleComposition {
    /// Count the classes of a sample
    #[must_use]
    pub fn of(sample: &EventSample) -> Self {
        Self {
            signal: sample.n_signal(),
            background: sample.n_background(),
        }
    }
}

/// The full evaluation run: sample composition plus one entry per method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// When the evaluation ran
    pub created_at: DateTime<Utc>,
    /// Training sample composition
    pub train: SampleComposition,
    /// Test sample composition
    pub test: SampleComposition,
    /// Per-method results, in registration order
    pub methods: Vec<MethodEvaluation>,
}

impl EvaluationReport {
    /// Write the report as pretty-printed JSON, replacing any previous file
    ///
    /// # Errors
    /// Returns error if serialization or the write fails
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read a report back from JSON
    ///
    /// # Errors
    /// Returns error if the file is missing or not a valid report
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Assemble the evaluation entry for one trained method
///
/// `curve` comes from the method's ROC over the test sample; `scores`
/// are its cached outputs on the same sample, used for the separation
/// of the output distributions.
#[must_use]
pub fn evaluate_method(
    name: &str,
    kind: MethodKind,
    curve: RocCurve,
    scores: &[f64],
    test: &EventSample,
    training_seconds: f64,
) -> MethodEvaluation {
    let signal_eff_at_background = BACKGROUND_EFF_POINTS
        .iter()
        .map(|&background_eff| EfficiencyPoint {
            background_eff,
            signal_eff: curve.signal_eff_at_background(background_eff),
        })
        .collect();
    MethodEvaluation {
        name: name.to_string(),
        kind,
        roc_integral: curve.auc(),
        signal_eff_at_background,
        separation: roc::separation(scores, test.is_signal(), test.weights()),
        training_seconds,
        roc_curve: curve,
    }
}
