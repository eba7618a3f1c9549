//! Fisher linear discriminant
//!
//! Projects events onto the axis separating the weighted class means,
//! scaled by the pooled within-class scatter. The output is signed so
//! that signal projects positive, with zero at the midpoint between the
//! class projections.

use crate::dataset::EventSample;
use crate::method::options::OptionMap;
use crate::method::Classifier;
use crate::{Error, Result};
use tracing::debug;

/// Fisher discriminant method
#[derive(Debug)]
pub struct FisherDiscriminant {
    name: String,
    coefficients: Vec<f64>,
    offset: f64,
    trained: bool,
}

impl FisherDiscriminant {
    pub(crate) fn from_options(name: &str, opts: &OptionMap) -> Result<Self> {
        // The method token may appear inside its own option string.
        let _ = opts.get_bool("Fisher")?;
        if let Some(transform) = opts.get_str("VarTransform")? {
            if !transform.eq_ignore_ascii_case("none") {
                return Err(Error::Config(format!(
                    "Method '{name}': unsupported variable transform '{transform}', \
                     only 'None' is available"
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            coefficients: Vec::new(),
            offset: 0.0,
            trained: false,
        })
    }

    fn training_error(&self, reason: impl Into<String>) -> Error {
        Error::Training {
            method: self.name.clone(),
            reason: reason.into(),
        }
    }
}

impl Classifier for FisherDiscriminant {
    fn fit(&mut self, train: &EventSample) -> Result<()> {
        let d = train.n_variables();
        if train.is_empty() || d == 0 {
            return Err(self.training_error("empty training sample"));
        }
        if train.n_signal() == 0 || train.n_background() == 0 {
            return Err(self.training_error("training sample lacks one of the classes"));
        }

        // Weighted class means.
        let mut signal_mean = vec![0.0_f64; d];
        let mut background_mean = vec![0.0_f64; d];
        let mut signal_weight = 0.0_f64;
        let mut background_weight = 0.0_f64;
        for i in 0..train.len() {
            let w = train.weights()[i];
            let (mean, total) = if train.is_signal()[i] {
                (&mut signal_mean, &mut signal_weight)
            } else {
                (&mut background_mean, &mut background_weight)
            };
            *total += w;
            for (m, &x) in mean.iter_mut().zip(train.row(i)) {
                *m += w * f64::from(x);
            }
        }
        if signal_weight <= 0.0 || background_weight <= 0.0 {
            return Err(self.training_error("one of the classes carries no weight"));
        }
        for m in &mut signal_mean {
            *m /= signal_weight;
        }
        for m in &mut background_mean {
            *m /= background_weight;
        }

        // Pooled within-class scatter, normalized by total weight.
        let total_weight = signal_weight + background_weight;
        let mut scatter = vec![vec![0.0_f64; d]; d];
        let mut centered = vec![0.0_f64; d];
        for i in 0..train.len() {
            let w = train.weights()[i];
            let mean = if train.is_signal()[i] {
                &signal_mean
            } else {
                &background_mean
            };
            for (c, (&x, m)) in centered.iter_mut().zip(train.row(i).iter().zip(mean)) {
                *c = f64::from(x) - m;
            }
            for j in 0..d {
                let wc = w * centered[j];
                for k in j..d {
                    scatter[j][k] += wc * centered[k];
                }
            }
        }
        for j in 0..d {
            for k in j..d {
                scatter[j][k] /= total_weight;
                scatter[k][j] = scatter[j][k];
            }
        }

        // Tiny diagonal ridge keeps constant columns solvable.
        let trace: f64 = (0..d).map(|j| scatter[j][j]).sum();
        #[allow(clippy::cast_precision_loss)]
        let mean_diag = trace / d as f64;
        if mean_diag <= 0.0 {
            return Err(self.training_error("all features are constant"));
        }
        for j in 0..d {
            scatter[j][j] += 1e-10 * mean_diag;
        }

        let rhs: Vec<f64> = signal_mean
            .iter()
            .zip(&background_mean)
            .map(|(s, b)| s - b)
            .collect();
        let mut coefficients = solve_linear(scatter, rhs)
            .ok_or_else(|| self.training_error("within-class scatter matrix is singular"))?;

        let project = |point: &[f64], coeff: &[f64]| -> f64 {
            coeff.iter().zip(point).map(|(c, x)| c * x).sum()
        };
        let signal_proj = project(&signal_mean, &coefficients);
        let background_proj = project(&background_mean, &coefficients);
        let mut offset = -0.5 * (signal_proj + background_proj);
        // Orient positive output toward signal.
        if signal_proj < background_proj {
            for c in &mut coefficients {
                *c = -*c;
            }
            offset = -offset;
        }

        debug!(
            method = %self.name,
            variables = d,
            "fisher coefficients solved"
        );
        self.coefficients = coefficients;
        self.offset = offset;
        self.trained = true;
        Ok(())
    }

    fn output(&self, event: &[f32]) -> Result<f64> {
        if !self.trained {
            return Err(self.training_error("method has not been trained"));
        }
        let dot: f64 = self
            .coefficients
            .iter()
            .zip(event)
            .map(|(c, &x)| c * f64::from(x))
            .sum();
        Ok(dot + self.offset)
    }
}

/// Gaussian elimination with partial pivoting; `None` on a singular system
fn solve_linear(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
    let n = rhs.len();
    for col in 0..n {
        let mut pivot = col;
        for row in col + 1..n {
            if matrix[row][col].abs() > matrix[pivot][col].abs() {
                pivot = row;
            }
        }
        if matrix[pivot][col] == 0.0 {
            return None;
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);
        let diag = matrix[col][col];
        for row in col + 1..n {
            let factor = matrix[row][col] / diag;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut solution = vec![0.0_f64; n];
    for col in (0..n).rev() {
        let mut sum = rhs[col];
        for k in col + 1..n {
            sum -= matrix[col][k] * solution[k];
        }
        solution[col] = sum / matrix[col][col];
    }
    if solution.iter().all(|v| v.is_finite()) {
        Some(solution)
    } else {
        None
    }
}
