//! Train/test split options and index assignment
//!
//! Splitting happens per class: each partition hands over a fixed number
//! of training events, then test events (`0` meaning "all remaining").
//! Requesting more events than a partition holds is a configuration
//! error; the split never truncates silently.

use crate::method::options::OptionMap;
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// How events are assigned to the training and test sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Seeded shuffle, then slice
    Random,
    /// First events train, following events test
    Block,
    /// Events alternate between train and test
    Alternate,
}

impl std::str::FromStr for SplitMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "block" => Ok(Self::Block),
            "alternate" => Ok(Self::Alternate),
            _ => Err(Error::Config(format!("Unknown split mode '{s}'"))),
        }
    }
}

/// How per-class event weights are renormalized before training
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormMode {
    /// Weights are used as loaded
    None,
    /// Each class is scaled to an average event weight of one
    NumEvents,
    /// Signal is scaled to an average weight of one, background to the
    /// same weight sum as signal
    EqualNumEvents,
}

impl std::str::FromStr for NormMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "numevents" => Ok(Self::NumEvents),
            "equalnumevents" => Ok(Self::EqualNumEvents),
            _ => Err(Error::Config(format!("Unknown norm mode '{s}'"))),
        }
    }
}

/// Per-class train/test split request
#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// Signal events to train on
    pub n_train_signal: usize,
    /// Background events to train on
    pub n_train_background: usize,
    /// Signal events to test on; 0 takes all remaining
    pub n_test_signal: usize,
    /// Background events to test on; 0 takes all remaining
    pub n_test_background: usize,
    /// Assignment mode
    pub mode: SplitMode,
    /// Weight renormalization
    pub norm: NormMode,
    /// Shuffle seed for [`SplitMode::Random`]
    pub seed: u64,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            n_train_signal: 0,
            n_train_background: 0,
            n_test_signal: 0,
            n_test_background: 0,
            mode: SplitMode::Random,
            norm: NormMode::EqualNumEvents,
            seed: 100,
        }
    }
}

impl SplitOptions {
    /// Parse an option string such as
    /// `NTrain_Signal=10000:NTrain_Background=20000:SplitMode=Random:NormMode=NumEvents:!V`
    ///
    /// Unset keys keep their defaults; unknown keys are rejected.
    ///
    /// # Errors
    /// Returns error on malformed, duplicated or unknown keys
    pub fn parse(raw: &str) -> Result<Self> {
        let opts = OptionMap::parse("split", raw)?;
        let mut split = Self::default();
        if let Some(n) = opts.get_usize("NTrain_Signal")? {
            split.n_train_signal = n;
        }
        if let Some(n) = opts.get_usize("NTrain_Background")? {
            split.n_train_background = n;
        }
        if let Some(n) = opts.get_usize("NTest_Signal")? {
            split.n_test_signal = n;
        }
        if let Some(n) = opts.get_usize("NTest_Background")? {
            split.n_test_background = n;
        }
        if let Some(mode) = opts.get_str("SplitMode")? {
            split.mode = mode.parse()?;
        }
        if let Some(norm) = opts.get_str("NormMode")? {
            split.norm = norm.parse()?;
        }
        if let Some(seed) = opts.get_u64("SplitSeed")? {
            split.seed = seed;
        }
        opts.ensure_all_consumed()?;
        Ok(split)
    }
}

/// Row indices a class contributes to each sample
#[derive(Debug)]
pub(crate) struct ClassIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Assign the `n` rows of one class to train and test sets
///
/// `class` only labels error messages. A test request of 0 takes every
/// row left after the training draw.
pub(crate) fn assign_indices(
    class: &str,
    n: usize,
    n_train: usize,
    n_test: usize,
    mode: SplitMode,
    rng: &mut StdRng,
) -> Result<ClassIndices> {
    if n_train > n {
        return Err(Error::Config(format!(
            "Requested {n_train} training events for {class} but the partition holds {n}"
        )));
    }
    let n_test = if n_test == 0 { n - n_train } else { n_test };
    if n_train + n_test > n {
        return Err(Error::Config(format!(
            "Requested {n_train} training plus {n_test} test events for {class} \
             but the partition holds {n}"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    match mode {
        SplitMode::Random => {
            indices.shuffle(rng);
            Ok(ClassIndices {
                train: indices[..n_train].to_vec(),
                test: indices[n_train..n_train + n_test].to_vec(),
            })
        }
        SplitMode::Block => Ok(ClassIndices {
            train: indices[..n_train].to_vec(),
            test: indices[n_train..n_train + n_test].to_vec(),
        }),
        SplitMode::Alternate => {
            let mut train = Vec::with_capacity(n_train);
            let mut test = Vec::with_capacity(n_test);
            for i in indices {
                if train.len() == n_train && test.len() == n_test {
                    break;
                }
                let to_train = if train.len() == n_train {
                    false
                } else if test.len() == n_test {
                    true
                } else {
                    i % 2 == 0
                };
                if to_train {
                    train.push(i);
                } else {
                    test.push(i);
                }
            }
            Ok(ClassIndices { train, test })
        }
    }
}

/// Renormalize per-class event weights in place
pub(crate) fn renormalize(signal: &mut [f64], background: &mut [f64], norm: NormMode) {
    match norm {
        NormMode::None => {}
        NormMode::NumEvents => {
            scale_to_mean_one(signal);
            scale_to_mean_one(background);
        }
        NormMode::EqualNumEvents => {
            scale_to_mean_one(signal);
            let signal_sum: f64 = signal.iter().sum();
            let background_sum: f64 = background.iter().sum();
            if background_sum > 0.0 {
                let factor = signal_sum / background_sum;
                for w in background.iter_mut() {
                    *w *= factor;
                }
            }
        }
    }
}

fn scale_to_mean_one(weights: &mut [f64]) {
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 {
        #[allow(clippy::cast_precision_loss)]
        let factor = weights.len() as f64 / sum;
        for w in weights.iter_mut() {
            *w *= factor;
        }
    }
}
