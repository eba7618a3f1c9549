//! # HiggsML: Multivariate Classification for the ATLAS Higgs Challenge
//!
//! **Version**: 0.1.2
//!
//! HiggsML splits the ATLAS Higgs machine learning challenge dataset into
//! signal and background partitions, then trains and compares four
//! classifier families (rectangular cuts, boosted decision trees, a Fisher
//! discriminant and a multilayer perceptron) over a shared train/test
//! split, producing a JSON evaluation report and a ROC canvas.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: every configuration fault stops the run immediately;
//!   rerunning the program is the only retry path
//! - **Poka-Yoke safety**: pipeline stages refuse to run out of order or
//!   twice
//! - **Genchi Genbutsu**: method option strings are validated against what
//!   each method actually implements, unknown knobs are fatal
//! - **Muda elimination**: partitions persist as columnar Parquet and are
//!   read once per run
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use higgsml::dataset::SplitOptions;
//! use higgsml::method::MethodKind;
//! use higgsml::pipeline::ClassificationPipeline;
//! use std::path::Path;
//!
//! let mut pipeline = ClassificationPipeline::new("output");
//! pipeline.add_variable("DER_mass_MMC")?;
//! pipeline.load_signal(Path::new("data/higgs-signal.parquet"), "signal_events", 1.0)?;
//! pipeline.load_background(Path::new("data/higgs-background.parquet"), "background_events", 1.0)?;
//! pipeline.prepare_split(&SplitOptions::parse("NTrain_Signal=10000:NTrain_Background=20000")?)?;
//! pipeline.book_method(MethodKind::Fisher, "Fisher", "H:!V:Fisher:VarTransform=None")?;
//! pipeline.train_all()?;
//! pipeline.test_all()?;
//! pipeline.evaluate_all()?;
//! pipeline.render_roc()?;
//! # Ok::<(), higgsml::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod dataset;
pub mod error;
pub mod eval;
pub mod method;
pub mod pipeline;
pub mod splitter;
pub mod table;

pub use error::{Error, Result};
