//! Boosted decision trees
//!
//! AdaBoost over depth-limited binary trees. Split search scans evenly
//! spaced thresholds per feature (`nCuts` of them) and picks the split
//! with the highest weighted Gini separation gain. Optionally each tree
//! trains on a bagged subsample while boosting weights update on the
//! full sample.

use crate::dataset::EventSample;
use crate::method::options::OptionMap;
use crate::method::{Classifier, DEFAULT_SEED};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

// Weighted errors this close to 0 or 0.5 end the boosting loop.
const ERR_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone)]
enum TreeNode {
    Leaf {
        signal_like: bool,
    },
    Branch {
        feature: usize,
        threshold: f32,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn classify(&self, event: &[f32]) -> bool {
        match self {
            Self::Leaf { signal_like } => *signal_like,
            Self::Branch {
                feature,
                threshold,
                left,
                right,
            } => {
                if event[*feature] <= *threshold {
                    left.classify(event)
                } else {
                    right.classify(event)
                }
            }
        }
    }
}

/// Boosted decision tree method
#[derive(Debug)]
pub struct BoostedTrees {
    name: String,
    n_trees: usize,
    max_depth: usize,
    min_node_fraction: f64,
    ada_boost_beta: f64,
    use_bagged_boost: bool,
    bagged_sample_fraction: f64,
    n_cuts: usize,
    seed: u64,
    forest: Vec<(f64, TreeNode)>,
}

impl BoostedTrees {
    pub(crate) fn from_options(name: &str, opts: &OptionMap) -> Result<Self> {
        if let Some(boost) = opts.get_str("BoostType")? {
            if !boost.eq_ignore_ascii_case("adaboost") {
                return Err(Error::Config(format!(
                    "Method '{name}': unsupported boost type '{boost}', only 'AdaBoost' \
                     is available"
                )));
            }
        }
        if let Some(separation) = opts.get_str("SeparationType")? {
            if !separation.eq_ignore_ascii_case("giniindex") {
                return Err(Error::Config(format!(
                    "Method '{name}': unsupported separation type '{separation}', only \
                     'GiniIndex' is available"
                )));
            }
        }

        let n_trees = opts.get_usize("NTrees")?.unwrap_or(800);
        let max_depth = opts.get_usize("MaxDepth")?.unwrap_or(3);
        let min_node_fraction = opts.get_percent("MinNodeSize")?.unwrap_or(0.05);
        let ada_boost_beta = opts.get_f64("AdaBoostBeta")?.unwrap_or(0.5);
        let use_bagged_boost = opts.get_bool("UseBaggedBoost")?.unwrap_or(false);
        let bagged_sample_fraction = opts.get_f64("BaggedSampleFraction")?.unwrap_or(0.6);
        let n_cuts = opts.get_usize("NCuts")?.unwrap_or(20);
        let seed = opts.get_u64("Seed")?.unwrap_or(DEFAULT_SEED);

        if n_trees == 0 || max_depth == 0 || n_cuts == 0 {
            return Err(Error::Config(format!(
                "Method '{name}': NTrees, MaxDepth and nCuts must all be positive"
            )));
        }
        if !(0.0..=0.5).contains(&min_node_fraction) {
            return Err(Error::Config(format!(
                "Method '{name}': MinNodeSize must lie between 0% and 50%"
            )));
        }
        if ada_boost_beta <= 0.0 {
            return Err(Error::Config(format!(
                "Method '{name}': AdaBoostBeta must be positive"
            )));
        }
        if !(0.0..=1.0).contains(&bagged_sample_fraction) || bagged_sample_fraction == 0.0 {
            return Err(Error::Config(format!(
                "Method '{name}': BaggedSampleFraction must lie in (0, 1]"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            n_trees,
            max_depth,
            min_node_fraction,
            ada_boost_beta,
            use_bagged_boost,
            bagged_sample_fraction,
            n_cuts,
            seed,
            forest: Vec::new(),
        })
    }

    fn training_error(&self, reason: impl Into<String>) -> Error {
        Error::Training {
            method: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn grow_node(
        &self,
        train: &EventSample,
        boost_weights: &[f64],
        indices: &[usize],
        depth: usize,
        root_weight: f64,
    ) -> TreeNode {
        let (signal_weight, background_weight) = class_weights(train, boost_weights, indices);
        let node_weight = signal_weight + background_weight;
        let signal_like = signal_weight > background_weight;

        let pure = signal_weight == 0.0 || background_weight == 0.0;
        let too_small = node_weight < self.min_node_fraction * root_weight;
        if depth == self.max_depth || pure || too_small || indices.len() < 2 {
            return TreeNode::Leaf { signal_like };
        }

        let Some(split) = self.best_split(train, boost_weights, indices) else {
            return TreeNode::Leaf { signal_like };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| train.row(i)[split.feature] <= split.threshold);
        if left_indices.is_empty() || right_indices.is_empty() {
            return TreeNode::Leaf { signal_like };
        }

        TreeNode::Branch {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.grow_node(
                train,
                boost_weights,
                &left_indices,
                depth + 1,
                root_weight,
            )),
            right: Box::new(self.grow_node(
                train,
                boost_weights,
                &right_indices,
                depth + 1,
                root_weight,
            )),
        }
    }

    fn best_split(
        &self,
        train: &EventSample,
        boost_weights: &[f64],
        indices: &[usize],
    ) -> Option<SplitCandidate> {
        let mut best: Option<SplitCandidate> = None;
        for feature in 0..train.n_variables() {
            if let Some(candidate) =
                self.best_split_for_feature(train, boost_weights, indices, feature)
            {
                best = candidate_max(best.take(), candidate);
            }
        }
        best.filter(|c| c.gain > 0.0)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn best_split_for_feature(
        &self,
        train: &EventSample,
        boost_weights: &[f64],
        indices: &[usize],
        feature: usize,
    ) -> Option<SplitCandidate> {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &i in indices {
            let v = train.row(i)[feature];
            min = min.min(v);
            max = max.max(v);
        }
        if !(min.is_finite() && max.is_finite()) || max <= min {
            return None;
        }

        let bins = self.n_cuts + 1;
        let mut signal_hist = vec![0.0_f64; bins];
        let mut background_hist = vec![0.0_f64; bins];
        #[allow(clippy::cast_precision_loss)]
        let bins_f = bins as f32;
        let span = max - min;
        for &i in indices {
            let t = ((train.row(i)[feature] - min) / span).clamp(0.0, 1.0);
            let bin = ((t * bins_f) as usize).min(bins - 1);
            if train.is_signal()[i] {
                signal_hist[bin] += boost_weights[i];
            } else {
                background_hist[bin] += boost_weights[i];
            }
        }

        let total_signal: f64 = signal_hist.iter().sum();
        let total_background: f64 = background_hist.iter().sum();
        let parent = gini_impurity(total_signal, total_background);

        let mut best: Option<SplitCandidate> = None;
        let mut left_signal = 0.0;
        let mut left_background = 0.0;
        for split_bin in 0..bins - 1 {
            left_signal += signal_hist[split_bin];
            left_background += background_hist[split_bin];
            let right_signal = total_signal - left_signal;
            let right_background = total_background - left_background;
            if left_signal + left_background == 0.0 || right_signal + right_background == 0.0 {
                continue;
            }
            let gain = parent
                - gini_impurity(left_signal, left_background)
                - gini_impurity(right_signal, right_background);
            #[allow(clippy::cast_precision_loss)]
            let threshold = min + span * ((split_bin + 1) as f32) / bins_f;
            let candidate = SplitCandidate {
                feature,
                threshold,
                gain,
            };
            best = candidate_max(best.take(), candidate);
        }
        best
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f32,
    gain: f64,
}

fn candidate_max(
    current: Option<SplitCandidate>,
    candidate: SplitCandidate,
) -> Option<SplitCandidate> {
    match current {
        Some(current) if current.gain >= candidate.gain => Some(current),
        _ => Some(candidate),
    }
}

/// Weighted Gini node impurity `s·b / (s+b)`
fn gini_impurity(signal: f64, background: f64) -> f64 {
    let total = signal + background;
    if total > 0.0 {
        signal * background / total
    } else {
        0.0
    }
}

fn class_weights(train: &EventSample, boost_weights: &[f64], indices: &[usize]) -> (f64, f64) {
    let mut signal = 0.0;
    let mut background = 0.0;
    for &i in indices {
        if train.is_signal()[i] {
            signal += boost_weights[i];
        } else {
            background += boost_weights[i];
        }
    }
    (signal, background)
}

impl Classifier for BoostedTrees {
    fn fit(&mut self, train: &EventSample) -> Result<()> {
        if train.is_empty() || train.n_variables() == 0 {
            return Err(self.training_error("empty training sample"));
        }
        if train.n_signal() == 0 || train.n_background() == 0 {
            return Err(self.training_error("training sample lacks one of the classes"));
        }

        let n = train.len();
        let total: f64 = train.weights().iter().sum();
        if total <= 0.0 {
            return Err(self.training_error("training sample carries no weight"));
        }
        let mut boost_weights: Vec<f64> = train.weights().iter().map(|w| w / total).collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut all_indices: Vec<usize> = (0..n).collect();
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let bag_size = ((n as f64) * self.bagged_sample_fraction).round().max(1.0) as usize;

        let mut forest = Vec::with_capacity(self.n_trees);
        for tree_index in 0..self.n_trees {
            let tree = if self.use_bagged_boost {
                all_indices.shuffle(&mut rng);
                let bag = &all_indices[..bag_size.min(n)];
                let root_weight: f64 = bag.iter().map(|&i| boost_weights[i]).sum();
                self.grow_node(train, &boost_weights, bag, 0, root_weight)
            } else {
                let root_weight: f64 = boost_weights.iter().sum();
                self.grow_node(train, &boost_weights, &all_indices, 0, root_weight)
            };

            // Weighted error over the full sample, bagged or not.
            let mut err = 0.0;
            for i in 0..n {
                if tree.classify(train.row(i)) != train.is_signal()[i] {
                    err += boost_weights[i];
                }
            }
            let weight_sum: f64 = boost_weights.iter().sum();
            err /= weight_sum;

            if err >= 0.5 {
                if forest.is_empty() {
                    return Err(
                        self.training_error("first tree classifies no better than chance")
                    );
                }
                debug!(method = %self.name, tree = tree_index, err, "boosting stopped");
                break;
            }

            let bounded_err = err.max(ERR_FLOOR);
            let alpha = self.ada_boost_beta * ((1.0 - bounded_err) / bounded_err).ln();
            for i in 0..n {
                if tree.classify(train.row(i)) != train.is_signal()[i] {
                    boost_weights[i] *= alpha.exp();
                }
            }
            let sum: f64 = boost_weights.iter().sum();
            for w in &mut boost_weights {
                *w /= sum;
            }

            forest.push((alpha, tree));
            if err <= ERR_FLOOR {
                debug!(method = %self.name, tree = tree_index, "perfect tree, boosting stopped");
                break;
            }
        }

        debug!(method = %self.name, trees = forest.len(), "forest grown");
        self.forest = forest;
        Ok(())
    }

    fn output(&self, event: &[f32]) -> Result<f64> {
        if self.forest.is_empty() {
            return Err(self.training_error("method has not been trained"));
        }
        let mut vote = 0.0;
        let mut norm = 0.0;
        for (alpha, tree) in &self.forest {
            let sign = if tree.classify(event) { 1.0 } else { -1.0 };
            vote += alpha * sign;
            norm += alpha;
        }
        Ok(vote / norm)
    }
}
