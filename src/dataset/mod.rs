//! Variable declarations and training sample preparation
//!
//! The [`DataLoader`] owns the two class partitions and the ordered list
//! of declared feature variables. Declaration order is significant: it
//! fixes the column order of every feature matrix handed to the methods,
//! and the `N` in layout expressions like `HiddenLayers=N+5`.
//!
//! Missing columns are caught when a partition is attached, before any
//! training starts.

pub mod split;

pub use split::{NormMode, SplitMode, SplitOptions};

use crate::table::EventTable;
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

/// A flat, weighted, labelled event sample
///
/// Feature rows follow declaration order; signal rows precede background
/// rows. Methods must not rely on row order beyond that.
#[derive(Debug, Clone)]
pub struct EventSample {
    n_variables: usize,
    features: Vec<Vec<f32>>,
    is_signal: Vec<bool>,
    weights: Vec<f64>,
}

impl EventSample {
    /// Assemble a sample from parallel rows, labels and weights
    ///
    /// # Errors
    /// Returns error if lengths disagree or any row has the wrong width
    pub fn new(
        n_variables: usize,
        features: Vec<Vec<f32>>,
        is_signal: Vec<bool>,
        weights: Vec<f64>,
    ) -> Result<Self> {
        if features.len() != is_signal.len() || features.len() != weights.len() {
            return Err(Error::Config(format!(
                "Sample arrays disagree: {} rows, {} labels, {} weights",
                features.len(),
                is_signal.len(),
                weights.len()
            )));
        }
        if let Some(row) = features.iter().find(|row| row.len() != n_variables) {
            return Err(Error::Config(format!(
                "Sample row has {} values, expected {n_variables}",
                row.len()
            )));
        }
        Ok(Self {
            n_variables,
            features,
            is_signal,
            weights,
        })
    }

    /// Number of events
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the sample holds no events
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of feature variables per event
    #[must_use]
    pub fn n_variables(&self) -> usize {
        self.n_variables
    }

    /// Feature rows
    #[must_use]
    pub fn features(&self) -> &[Vec<f32>] {
        &self.features
    }

    /// One feature row
    #[must_use]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.features[i]
    }

    /// Class labels, `true` for signal
    #[must_use]
    pub fn is_signal(&self) -> &[bool] {
        &self.is_signal
    }

    /// Event weights
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of signal events
    #[must_use]
    pub fn n_signal(&self) -> usize {
        self.is_signal.iter().filter(|s| **s).count()
    }

    /// Number of background events
    #[must_use]
    pub fn n_background(&self) -> usize {
        self.len() - self.n_signal()
    }
}

/// The training and test samples one split produced
#[derive(Debug, Clone)]
pub struct PreparedSplit {
    train: EventSample,
    test: EventSample,
}

impl PreparedSplit {
    /// Training sample
    #[must_use]
    pub fn train(&self) -> &EventSample {
        &self.train
    }

    /// Held-out test sample
    #[must_use]
    pub fn test(&self) -> &EventSample {
        &self.test
    }
}

struct ClassSource {
    table: EventTable,
    weight: f64,
}

/// Declared variables plus the signal and background partitions
#[derive(Default)]
pub struct DataLoader {
    variables: Vec<String>,
    signal: Option<ClassSource>,
    background: Option<ClassSource>,
}

impl DataLoader {
    /// Create an empty loader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a feature variable; order is significant
    ///
    /// # Errors
    /// Returns error if the variable was already declared
    pub fn add_variable(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.variables.iter().any(|v| *v == name) {
            return Err(Error::Config(format!("Variable '{name}' already declared")));
        }
        self.variables.push(name);
        Ok(())
    }

    /// Declared variables in declaration order
    #[must_use]
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Attach the signal partition with a per-event class weight
    ///
    /// # Errors
    /// Returns error if the weight is not positive or any declared
    /// variable is missing from the partition
    pub fn set_signal(&mut self, table: EventTable, weight: f64) -> Result<()> {
        self.validate_source(&table, weight)?;
        self.signal = Some(ClassSource { table, weight });
        Ok(())
    }

    /// Attach the background partition with a per-event class weight
    ///
    /// # Errors
    /// Returns error if the weight is not positive or any declared
    /// variable is missing from the partition
    pub fn set_background(&mut self, table: EventTable, weight: f64) -> Result<()> {
        self.validate_source(&table, weight)?;
        self.background = Some(ClassSource { table, weight });
        Ok(())
    }

    fn validate_source(&self, table: &EventTable, weight: f64) -> Result<()> {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(Error::Config(format!(
                "Class weight for collection '{}' must be positive, got {weight}",
                table.name()
            )));
        }
        for variable in &self.variables {
            if !table.has_column(variable) {
                return Err(Error::Config(format!(
                    "Variable '{variable}' not present in collection '{}'",
                    table.name()
                )));
            }
        }
        Ok(())
    }

    /// Extract feature matrices, renormalize weights and split both
    /// classes into training and test samples
    ///
    /// # Errors
    /// Returns error if partitions or variables are missing, a count
    /// exceeds its partition, or either class ends with an empty
    /// training sample
    pub fn prepare(&self, options: &SplitOptions) -> Result<PreparedSplit> {
        if self.variables.is_empty() {
            return Err(Error::Config("No variables declared".to_string()));
        }
        let signal = self
            .signal
            .as_ref()
            .ok_or_else(|| Error::Config("No signal partition attached".to_string()))?;
        let background = self
            .background
            .as_ref()
            .ok_or_else(|| Error::Config("No background partition attached".to_string()))?;
        self.validate_source(&signal.table, signal.weight)?;
        self.validate_source(&background.table, background.weight)?;

        let signal_rows = extract_rows(&signal.table, &self.variables)?;
        let background_rows = extract_rows(&background.table, &self.variables)?;

        let mut signal_weights = vec![signal.weight; signal_rows.len()];
        let mut background_weights = vec![background.weight; background_rows.len()];
        split::renormalize(&mut signal_weights, &mut background_weights, options.norm);

        let mut rng = StdRng::seed_from_u64(options.seed);
        let signal_split = split::assign_indices(
            "signal",
            signal_rows.len(),
            options.n_train_signal,
            options.n_test_signal,
            options.mode,
            &mut rng,
        )?;
        let background_split = split::assign_indices(
            "background",
            background_rows.len(),
            options.n_train_background,
            options.n_test_background,
            options.mode,
            &mut rng,
        )?;
        if signal_split.train.is_empty() {
            return Err(Error::Config("Training sample holds no signal events".to_string()));
        }
        if background_split.train.is_empty() {
            return Err(Error::Config(
                "Training sample holds no background events".to_string(),
            ));
        }

        let train = gather(
            self.variables.len(),
            &signal_rows,
            &signal_weights,
            &signal_split.train,
            &background_rows,
            &background_weights,
            &background_split.train,
        )?;
        let test = gather(
            self.variables.len(),
            &signal_rows,
            &signal_weights,
            &signal_split.test,
            &background_rows,
            &background_weights,
            &background_split.test,
        )?;

        info!(
            train_signal = signal_split.train.len(),
            train_background = background_split.train.len(),
            test_signal = signal_split.test.len(),
            test_background = background_split.test.len(),
            "split prepared"
        );

        Ok(PreparedSplit { train, test })
    }
}

fn extract_rows(table: &EventTable, variables: &[String]) -> Result<Vec<Vec<f32>>> {
    let columns: Vec<Vec<f32>> = variables
        .iter()
        .map(|v| table.column_as_f32(v))
        .collect::<Result<_>>()?;
    let n_rows = columns.first().map_or(0, Vec::len);
    Ok((0..n_rows)
        .map(|row| columns.iter().map(|col| col[row]).collect())
        .collect())
}

fn gather(
    n_variables: usize,
    signal_rows: &[Vec<f32>],
    signal_weights: &[f64],
    signal_indices: &[usize],
    background_rows: &[Vec<f32>],
    background_weights: &[f64],
    background_indices: &[usize],
) -> Result<EventSample> {
    let n = signal_indices.len() + background_indices.len();
    let mut features = Vec::with_capacity(n);
    let mut is_signal = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    for &i in signal_indices {
        features.push(signal_rows[i].clone());
        is_signal.push(true);
        weights.push(signal_weights[i]);
    }
    for &i in background_indices {
        features.push(background_rows[i].clone());
        is_signal.push(false);
        weights.push(background_weights[i]);
    }
    EventSample::new(n_variables, features, is_signal, weights)
}
