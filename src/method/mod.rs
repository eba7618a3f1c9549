//! Multivariate classification methods
//!
//! Each method family is registered by kind, a unique name and a raw
//! option string. Registration stores the string untouched; parsing and
//! validation happen when training starts, so a malformed or unknown
//! hyperparameter surfaces as a configuration error naming the method,
//! not at registration time.
//!
//! Methods are independent of one another: each owns its parsed
//! configuration and trained state, and sees nothing but the read-only
//! training sample.

pub mod bdt;
pub mod cuts;
pub mod fisher;
pub mod mlp;
pub(crate) mod options;

use crate::dataset::EventSample;
use crate::eval::roc::RocCurve;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default RNG seed for methods that sample (matches the toolkit-wide
/// generator default the option strings assume)
pub const DEFAULT_SEED: u64 = 4357;

/// Supported method families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MethodKind {
    /// Rectangular cut optimization
    Cuts,
    /// Boosted decision trees
    Bdt,
    /// Fisher linear discriminant
    Fisher,
    /// Multilayer perceptron
    Mlp,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cuts => "Cuts",
            Self::Bdt => "BDT",
            Self::Fisher => "Fisher",
            Self::Mlp => "MLP",
        };
        write!(f, "{name}")
    }
}

/// A registered classifier: kind, unique name and raw, unvalidated
/// hyperparameter string
#[derive(Debug, Clone)]
pub struct MethodSpec {
    /// Method family
    pub kind: MethodKind,
    /// Registered name, unique within a pipeline
    pub name: String,
    /// Raw option string, parsed at train time
    pub options: String,
}

impl MethodSpec {
    /// Create a spec; no option validation happens here
    #[must_use]
    pub fn new(kind: MethodKind, name: impl Into<String>, options: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            options: options.into(),
        }
    }
}

/// A trainable, scoring classifier
pub trait Classifier: fmt::Debug {
    /// Fit on a weighted training sample
    ///
    /// # Errors
    /// Returns error on degenerate samples or a diverging fit
    fn fit(&mut self, train: &EventSample) -> Result<()>;

    /// Scalar output for one event, higher meaning more signal-like
    ///
    /// # Errors
    /// Returns error if the method has not been trained
    fn output(&self, event: &[f32]) -> Result<f64>;

    /// ROC curve over a sample, by default a threshold sweep over
    /// [`Classifier::output`]
    ///
    /// # Errors
    /// Returns error if scoring fails or the sample lacks a class
    fn roc(&self, sample: &EventSample) -> Result<RocCurve> {
        let mut scores = Vec::with_capacity(sample.len());
        for i in 0..sample.len() {
            scores.push(self.output(sample.row(i))?);
        }
        RocCurve::from_scores(&scores, sample.is_signal(), sample.weights())
    }
}

/// Parse a spec's options and build the untrained classifier
///
/// `n_variables` feeds layout expressions such as `HiddenLayers=N+5`.
/// Every option key must be consumed by the method; leftovers are
/// configuration errors naming the method.
///
/// # Errors
/// Returns error on malformed, unknown or unsupported options
pub fn build_classifier(spec: &MethodSpec, n_variables: usize) -> Result<Box<dyn Classifier>> {
    let opts = options::OptionMap::parse(&spec.name, &spec.options)?;
    let classifier: Box<dyn Classifier> = match spec.kind {
        MethodKind::Cuts => Box::new(cuts::CutsOptimizer::from_options(&spec.name, &opts)?),
        MethodKind::Bdt => Box::new(bdt::BoostedTrees::from_options(&spec.name, &opts)?),
        MethodKind::Fisher => {
            Box::new(fisher::FisherDiscriminant::from_options(&spec.name, &opts)?)
        }
        MethodKind::Mlp => Box::new(mlp::MultilayerPerceptron::from_options(
            &spec.name,
            &opts,
            n_variables,
        )?),
    };
    opts.ensure_all_consumed()?;
    Ok(classifier)
}
