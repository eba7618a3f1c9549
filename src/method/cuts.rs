//! Rectangular cut optimization
//!
//! Samples random cut boxes over the training ranges (Monte Carlo fit)
//! and keeps, per signal-efficiency bin, the box with the lowest
//! background efficiency. Unlike the continuous discriminants this
//! method yields one working point per box, so it overrides [`roc`]
//! instead of sweeping a score threshold.
//!
//! [`roc`]: Classifier::roc

use crate::dataset::EventSample;
use crate::eval::roc::{RocCurve, RocPoint};
use crate::method::options::OptionMap;
use crate::method::{Classifier, DEFAULT_SEED};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

// One retained cut box per signal-efficiency bin.
const EFFICIENCY_BINS: usize = 20;

#[derive(Debug, Clone)]
struct CutWindow {
    lower: Vec<f32>,
    upper: Vec<f32>,
    signal_eff: f64,
    background_eff: f64,
}

impl CutWindow {
    fn accepts(&self, event: &[f32]) -> bool {
        event
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .all(|(&v, (&lo, &hi))| v >= lo && v <= hi)
    }
}

/// Monte Carlo cut optimization method
#[derive(Debug)]
pub struct CutsOptimizer {
    name: String,
    sample_size: usize,
    smart_proportions: bool,
    seed: u64,
    windows: Vec<CutWindow>,
}

impl CutsOptimizer {
    pub(crate) fn from_options(name: &str, opts: &OptionMap) -> Result<Self> {
        if let Some(fit) = opts.get_str("FitMethod")? {
            if !fit.eq_ignore_ascii_case("mc") {
                return Err(Error::Config(format!(
                    "Method '{name}': unsupported fit method '{fit}', only 'MC' is \
                     available"
                )));
            }
        }
        // Efficiency-based selection is the one mode on offer.
        let _ = opts.get_bool("EffSel")?;
        let smart_proportions = match opts.get_str("VarProp")? {
            Some(p) if p.eq_ignore_ascii_case("fsmart") => true,
            Some(p) if p.eq_ignore_ascii_case("notenforced") => false,
            Some(p) => {
                return Err(Error::Config(format!(
                    "Method '{name}': unsupported VarProp '{p}', expected 'FSmart' or \
                     'NotEnforced'"
                )))
            }
            None => false,
        };

        let sample_size = opts.get_usize("SampleSize")?.unwrap_or(100_000);
        let seed = opts.get_u64("Seed")?.unwrap_or(DEFAULT_SEED);
        if sample_size == 0 {
            return Err(Error::Config(format!(
                "Method '{name}': SampleSize must be positive"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            sample_size,
            smart_proportions,
            seed,
            windows: Vec::new(),
        })
    }

    fn training_error(&self, reason: impl Into<String>) -> Error {
        Error::Training {
            method: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// Draw one candidate box over the per-variable training ranges
    fn draw_window(&self, ranges: &[(f32, f32)], rng: &mut StdRng) -> (Vec<f32>, Vec<f32>) {
        let mut lower = Vec::with_capacity(ranges.len());
        let mut upper = Vec::with_capacity(ranges.len());
        for &(min, max) in ranges {
            if max <= min {
                lower.push(min);
                upper.push(max);
                continue;
            }
            let side = if self.smart_proportions {
                rng.gen_range(0_u8..3)
            } else {
                2
            };
            match side {
                // Lower side open: cut from above only.
                0 => {
                    lower.push(min);
                    upper.push(rng.gen_range(min..max));
                }
                // Upper side open: cut from below only.
                1 => {
                    lower.push(rng.gen_range(min..max));
                    upper.push(max);
                }
                _ => {
                    let a = rng.gen_range(min..max);
                    let b = rng.gen_range(min..max);
                    lower.push(a.min(b));
                    upper.push(a.max(b));
                }
            }
        }
        (lower, upper)
    }
}

fn weighted_efficiencies(window: &CutWindow, sample: &EventSample) -> (f64, f64) {
    let mut passed_signal = 0.0;
    let mut passed_background = 0.0;
    let mut total_signal = 0.0;
    let mut total_background = 0.0;
    for i in 0..sample.len() {
        let w = sample.weights()[i];
        let passed = window.accepts(sample.row(i));
        if sample.is_signal()[i] {
            total_signal += w;
            if passed {
                passed_signal += w;
            }
        } else {
            total_background += w;
            if passed {
                passed_background += w;
            }
        }
    }
    let signal_eff = if total_signal > 0.0 {
        passed_signal / total_signal
    } else {
        0.0
    };
    let background_eff = if total_background > 0.0 {
        passed_background / total_background
    } else {
        0.0
    };
    (signal_eff, background_eff)
}

impl Classifier for CutsOptimizer {
    fn fit(&mut self, train: &EventSample) -> Result<()> {
        if train.is_empty() || train.n_variables() == 0 {
            return Err(self.training_error("empty training sample"));
        }
        if train.n_signal() == 0 || train.n_background() == 0 {
            return Err(self.training_error("training sample lacks one of the classes"));
        }

        let mut ranges = vec![(f32::INFINITY, f32::NEG_INFINITY); train.n_variables()];
        for i in 0..train.len() {
            for (range, &v) in ranges.iter_mut().zip(train.row(i)) {
                range.0 = range.0.min(v);
                range.1 = range.1.max(v);
            }
        }
        if ranges.iter().any(|r| !(r.0.is_finite() && r.1.is_finite())) {
            return Err(self.training_error("training sample has a non-finite variable range"));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        // The fully open box anchors the (1, 1) working point.
        let full_open = CutWindow {
            lower: ranges.iter().map(|r| r.0).collect(),
            upper: ranges.iter().map(|r| r.1).collect(),
            signal_eff: 1.0,
            background_eff: 1.0,
        };
        let mut best: Vec<Option<CutWindow>> = vec![None; EFFICIENCY_BINS];

        for _ in 0..self.sample_size {
            let (lower, upper) = self.draw_window(&ranges, &mut rng);
            let mut window = CutWindow {
                lower,
                upper,
                signal_eff: 0.0,
                background_eff: 0.0,
            };
            let (signal_eff, background_eff) = weighted_efficiencies(&window, train);
            if signal_eff <= 0.0 {
                continue;
            }
            window.signal_eff = signal_eff;
            window.background_eff = background_eff;

            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                clippy::cast_precision_loss
            )]
            let bin = ((signal_eff * EFFICIENCY_BINS as f64) as usize).min(EFFICIENCY_BINS - 1);
            let keep = match &best[bin] {
                Some(held) => window.background_eff < held.background_eff,
                None => true,
            };
            if keep {
                best[bin] = Some(window);
            }
        }

        let mut windows: Vec<CutWindow> = best.into_iter().flatten().collect();
        windows.push(full_open);
        windows.sort_by(|a, b| a.signal_eff.total_cmp(&b.signal_eff));
        debug!(method = %self.name, windows = windows.len(), "cut optimization finished");
        self.windows = windows;
        Ok(())
    }

    /// Fraction of retained cut boxes the event passes
    fn output(&self, event: &[f32]) -> Result<f64> {
        if self.windows.is_empty() {
            return Err(self.training_error("method has not been trained"));
        }
        let passed = self.windows.iter().filter(|w| w.accepts(event)).count();
        #[allow(clippy::cast_precision_loss)]
        Ok(passed as f64 / self.windows.len() as f64)
    }

    /// ROC from the retained boxes re-measured on `sample`
    fn roc(&self, sample: &EventSample) -> Result<RocCurve> {
        if self.windows.is_empty() {
            return Err(self.training_error("method has not been trained"));
        }
        let points = self
            .windows
            .iter()
            .map(|window| {
                let (signal_eff, background_eff) = weighted_efficiencies(window, sample);
                RocPoint {
                    signal_eff,
                    background_rej: 1.0 - background_eff,
                }
            })
            .collect();
        RocCurve::from_working_points(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cuts(options: &str) -> CutsOptimizer {
        let opts = OptionMap::parse("Cuts", options).unwrap();
        let method = CutsOptimizer::from_options("Cuts", &opts).unwrap();
        opts.ensure_all_consumed().unwrap();
        method
    }

    fn quadrant_sample(n_per_class: usize) -> EventSample {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n_per_class {
            #[allow(clippy::cast_precision_loss)]
            let jitter = (i % 11) as f32 * 0.03;
            features.push(vec![1.0 + jitter, 1.0 - jitter]);
            labels.push(true);
            features.push(vec![-1.0 - jitter, -1.0 + jitter]);
            labels.push(false);
        }
        let n = features.len();
        EventSample::new(2, features, labels, vec![1.0; n]).unwrap()
    }

    #[test]
    fn test_canonical_options_are_consumed() {
        let opts = OptionMap::parse(
            "Cuts",
            "!H:!V:FitMethod=MC:EffSel:SampleSize=20000:VarProp=FSmart",
        )
        .unwrap();
        let method = CutsOptimizer::from_options("Cuts", &opts).unwrap();
        opts.ensure_all_consumed().unwrap();
        assert_eq!(method.sample_size, 20000);
        assert!(method.smart_proportions);
    }

    #[test]
    fn test_separates_quadrants() {
        let sample = quadrant_sample(80);
        let mut method = cuts("FitMethod=MC:EffSel:SampleSize=2000:VarProp=FSmart:Seed=11");
        method.fit(&sample).unwrap();

        let curve = method.roc(&sample).unwrap();
        assert!(curve.auc() > 0.9, "auc = {}", curve.auc());
    }

    #[test]
    fn test_output_is_pass_fraction() {
        let sample = quadrant_sample(50);
        let mut method = cuts("FitMethod=MC:SampleSize=1000:VarProp=FSmart");
        method.fit(&sample).unwrap();

        let mut signal_mean = 0.0;
        let mut background_mean = 0.0;
        for i in 0..sample.len() {
            let out = method.output(sample.row(i)).unwrap();
            assert!((0.0..=1.0).contains(&out));
            if sample.is_signal()[i] {
                signal_mean += out;
            } else {
                background_mean += out;
            }
        }
        assert!(signal_mean > background_mean);
    }

    #[test]
    fn test_same_seed_reproduces_windows() {
        let sample = quadrant_sample(40);
        let options = "FitMethod=MC:SampleSize=500:VarProp=FSmart:Seed=3";
        let mut first = cuts(options);
        let mut second = cuts(options);
        first.fit(&sample).unwrap();
        second.fit(&sample).unwrap();

        let a = first.roc(&sample).unwrap();
        let b = second.roc(&sample).unwrap();
        assert_eq!(a.points().len(), b.points().len());
        for (pa, pb) in a.points().iter().zip(b.points()) {
            assert!((pa.signal_eff - pb.signal_eff).abs() < 1e-12);
            assert!((pa.background_rej - pb.background_rej).abs() < 1e-12);
        }
    }

    #[test]
    fn test_rejects_unsupported_fit_method() {
        let opts = OptionMap::parse("Cuts", "FitMethod=GA").unwrap();
        let result = CutsOptimizer::from_options("Cuts", &opts);
        assert!(result.unwrap_err().to_string().contains("GA"));
    }

    #[test]
    fn test_rejects_unknown_var_prop() {
        let opts = OptionMap::parse("Cuts", "VarProp=AllOpen").unwrap();
        assert!(CutsOptimizer::from_options("Cuts", &opts).is_err());
    }

    #[test]
    fn test_untrained_method_fails() {
        let method = cuts("FitMethod=MC:SampleSize=100");
        assert!(method.output(&[0.0, 0.0]).is_err());
        assert!(method.roc(&quadrant_sample(5)).is_err());
    }

    #[test]
    fn test_single_class_sample_fails() {
        let sample = EventSample::new(
            2,
            vec![vec![0.0, 0.0], vec![1.0, 1.0]],
            vec![true, true],
            vec![1.0; 2],
        )
        .unwrap();
        let mut method = cuts("FitMethod=MC:SampleSize=100");
        assert!(method.fit(&sample).is_err());
    }
}
