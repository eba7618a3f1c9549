//! Multilayer perceptron
//!
//! A single hidden layer trained with minibatch gradient descent on a
//! weighted cross-entropy loss. Inputs are optionally rescaled to
//! `[-1, 1]` using the training sample's per-variable range
//! (`VarTransform=N`). The output neuron is a sigmoid, so scores fall
//! in `(0, 1)`.

use crate::dataset::EventSample;
use crate::method::options::OptionMap;
use crate::method::{Classifier, DEFAULT_SEED};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

const PROB_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    Tanh,
    Sigmoid,
    Relu,
}

impl Activation {
    fn parse(name: &str, raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "tanh" => Ok(Self::Tanh),
            "sigmoid" => Ok(Self::Sigmoid),
            "relu" => Ok(Self::Relu),
            other => Err(Error::Config(format!(
                "Method '{name}': unsupported neuron type '{other}', expected tanh, \
                 sigmoid or relu"
            ))),
        }
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Self::Tanh => x.tanh(),
            Self::Sigmoid => sigmoid(x),
            Self::Relu => x.max(0.0),
        }
    }

    /// Derivative expressed through the activation value itself
    fn derivative(self, activated: f64) -> f64 {
        match self {
            Self::Tanh => 1.0 - activated * activated,
            Self::Sigmoid => activated * (1.0 - activated),
            Self::Relu => {
                if activated > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug)]
struct Network {
    normalize: bool,
    lo: Vec<f32>,
    hi: Vec<f32>,
    hidden_w: Vec<Vec<f64>>,
    hidden_b: Vec<f64>,
    out_w: Vec<f64>,
    out_b: f64,
    activation: Activation,
}

impl Network {
    fn transform(&self, event: &[f32]) -> Vec<f64> {
        event
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                if self.normalize {
                    let span = self.hi[i] - self.lo[i];
                    if span > 0.0 {
                        f64::from(2.0 * (v - self.lo[i]) / span - 1.0)
                    } else {
                        0.0
                    }
                } else {
                    f64::from(v)
                }
            })
            .collect()
    }

    fn forward(&self, inputs: &[f64]) -> (Vec<f64>, f64) {
        let hidden: Vec<f64> = self
            .hidden_w
            .iter()
            .zip(&self.hidden_b)
            .map(|(weights, bias)| {
                let pre: f64 = weights.iter().zip(inputs).map(|(w, x)| w * x).sum::<f64>() + bias;
                self.activation.apply(pre)
            })
            .collect();
        let out_pre: f64 =
            self.out_w.iter().zip(&hidden).map(|(w, h)| w * h).sum::<f64>() + self.out_b;
        (hidden, sigmoid(out_pre))
    }
}

/// Neural network method with one hidden layer
#[derive(Debug)]
pub struct MultilayerPerceptron {
    name: String,
    hidden_layout: String,
    activation: Activation,
    normalize: bool,
    n_cycles: usize,
    test_rate: usize,
    learning_rate: f64,
    batch_size: usize,
    seed: u64,
    net: Option<Network>,
}

impl MultilayerPerceptron {
    pub(crate) fn from_options(name: &str, opts: &OptionMap, n_variables: usize) -> Result<Self> {
        let activation = match opts.get_str("NeuronType")? {
            Some(raw) => Activation::parse(name, &raw)?,
            None => Activation::Sigmoid,
        };
        let normalize = match opts.get_str("VarTransform")? {
            Some(t) if t.eq_ignore_ascii_case("n") || t.eq_ignore_ascii_case("norm") => true,
            Some(t) if t.eq_ignore_ascii_case("none") => false,
            Some(t) => {
                return Err(Error::Config(format!(
                    "Method '{name}': unsupported variable transform '{t}', expected \
                     'N' or 'None'"
                )))
            }
            None => false,
        };
        if opts.get_bool("UseRegulator")? == Some(true) {
            return Err(Error::Config(format!(
                "Method '{name}': the weight regulator is not supported, pass !UseRegulator"
            )));
        }

        let hidden_layout = opts
            .get_str("HiddenLayers")?
            .unwrap_or_else(|| "N+5".to_string());
        // Validate the layout now so booking mistakes surface before training.
        parse_hidden_layers(name, &hidden_layout, n_variables.max(1))?;

        let n_cycles = opts.get_usize("NCycles")?.unwrap_or(500);
        let test_rate = opts.get_usize("TestRate")?.unwrap_or(10);
        let learning_rate = opts.get_f64("LearningRate")?.unwrap_or(0.02);
        let batch_size = opts.get_usize("BatchSize")?.unwrap_or(32);
        let seed = opts.get_u64("Seed")?.unwrap_or(DEFAULT_SEED);

        if n_cycles == 0 || batch_size == 0 {
            return Err(Error::Config(format!(
                "Method '{name}': NCycles and BatchSize must be positive"
            )));
        }
        if learning_rate <= 0.0 || !learning_rate.is_finite() {
            return Err(Error::Config(format!(
                "Method '{name}': LearningRate must be a positive number"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            hidden_layout,
            activation,
            normalize,
            n_cycles,
            test_rate,
            learning_rate,
            batch_size,
            seed,
            net: None,
        })
    }

    fn training_error(&self, reason: impl Into<String>) -> Error {
        Error::Training {
            method: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn weighted_loss(&self, net: &Network, train: &EventSample) -> f64 {
        let mut loss = 0.0;
        let mut weight = 0.0;
        for i in 0..train.len() {
            let inputs = net.transform(train.row(i));
            let (_, y) = net.forward(&inputs);
            let y = y.clamp(PROB_FLOOR, 1.0 - PROB_FLOOR);
            let w = train.weights()[i];
            let t = if train.is_signal()[i] { 1.0 } else { 0.0 };
            loss -= w * (t * y.ln() + (1.0 - t) * (1.0 - y).ln());
            weight += w;
        }
        loss / weight
    }
}

impl Classifier for MultilayerPerceptron {
    #[allow(clippy::too_many_lines)]
    fn fit(&mut self, train: &EventSample) -> Result<()> {
        if train.is_empty() || train.n_variables() == 0 {
            return Err(self.training_error("empty training sample"));
        }
        if train.n_signal() == 0 || train.n_background() == 0 {
            return Err(self.training_error("training sample lacks one of the classes"));
        }

        let n_inputs = train.n_variables();
        let n_hidden = parse_hidden_layers(&self.name, &self.hidden_layout, n_inputs)?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut lo = vec![f32::INFINITY; n_inputs];
        let mut hi = vec![f32::NEG_INFINITY; n_inputs];
        for i in 0..train.len() {
            for (j, &v) in train.row(i).iter().enumerate() {
                lo[j] = lo[j].min(v);
                hi[j] = hi[j].max(v);
            }
        }

        let mut init = || (rng.gen::<f64>() - 0.5) * 0.1;
        let mut net = Network {
            normalize: self.normalize,
            lo,
            hi,
            hidden_w: (0..n_hidden)
                .map(|_| (0..n_inputs).map(|_| init()).collect())
                .collect(),
            hidden_b: (0..n_hidden).map(|_| init()).collect(),
            out_w: (0..n_hidden).map(|_| init()).collect(),
            out_b: init(),
            activation: self.activation,
        };

        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut grad_hidden_w = vec![vec![0.0_f64; n_inputs]; n_hidden];
        let mut grad_hidden_b = vec![0.0_f64; n_hidden];
        let mut grad_out_w = vec![0.0_f64; n_hidden];

        for cycle in 0..self.n_cycles {
            order.shuffle(&mut rng);
            for batch in order.chunks(self.batch_size) {
                for row in &mut grad_hidden_w {
                    row.fill(0.0);
                }
                grad_hidden_b.fill(0.0);
                grad_out_w.fill(0.0);
                let mut grad_out_b = 0.0;
                let mut batch_weight = 0.0;

                for &i in batch {
                    let inputs = net.transform(train.row(i));
                    let (hidden, y) = net.forward(&inputs);
                    let w = train.weights()[i];
                    let t = if train.is_signal()[i] { 1.0 } else { 0.0 };
                    // Sigmoid + cross-entropy: the output delta is just w·(y - t).
                    let delta_out = w * (y - t);

                    for (j, &h) in hidden.iter().enumerate() {
                        grad_out_w[j] += delta_out * h;
                        let delta_hidden =
                            delta_out * net.out_w[j] * self.activation.derivative(h);
                        for (g, &x) in grad_hidden_w[j].iter_mut().zip(&inputs) {
                            *g += delta_hidden * x;
                        }
                        grad_hidden_b[j] += delta_hidden;
                    }
                    grad_out_b += delta_out;
                    batch_weight += w;
                }

                if batch_weight <= 0.0 {
                    continue;
                }
                let scale = self.learning_rate / batch_weight;
                for (weights, grads) in net.hidden_w.iter_mut().zip(&grad_hidden_w) {
                    for (w, g) in weights.iter_mut().zip(grads) {
                        *w -= scale * g;
                    }
                }
                for (b, g) in net.hidden_b.iter_mut().zip(&grad_hidden_b) {
                    *b -= scale * g;
                }
                for (w, g) in net.out_w.iter_mut().zip(&grad_out_w) {
                    *w -= scale * g;
                }
                net.out_b -= scale * grad_out_b;
            }

            if (cycle + 1) % self.test_rate.max(1) == 0 || cycle + 1 == self.n_cycles {
                let loss = self.weighted_loss(&net, train);
                if !loss.is_finite() {
                    return Err(self.training_error(format!(
                        "training diverged at cycle {}",
                        cycle + 1
                    )));
                }
                debug!(method = %self.name, cycle = cycle + 1, loss, "training checkpoint");
            }
        }

        self.net = Some(net);
        Ok(())
    }

    fn output(&self, event: &[f32]) -> Result<f64> {
        let Some(net) = &self.net else {
            return Err(self.training_error("method has not been trained"));
        };
        let inputs = net.transform(event);
        let (_, y) = net.forward(&inputs);
        Ok(y)
    }
}

/// Resolve a `HiddenLayers` expression against the declared variable count
///
/// Accepts `N`, `N+k`, `N-k` or an absolute neuron count. Layouts with a
/// comma ask for several hidden layers, which this method does not offer.
fn parse_hidden_layers(name: &str, raw: &str, n_variables: usize) -> Result<usize> {
    if raw.contains(',') {
        return Err(Error::Config(format!(
            "Method '{name}': HiddenLayers '{raw}' requests several hidden layers, only \
             a single layer is available"
        )));
    }
    let trimmed = raw.trim();
    let malformed = || {
        Error::Config(format!(
            "Method '{name}': malformed HiddenLayers expression '{raw}'"
        ))
    };

    let count = if let Some(rest) = trimmed.strip_prefix(['N', 'n']) {
        if rest.is_empty() {
            n_variables
        } else if let Some(k) = rest.strip_prefix('+') {
            let k: usize = k.parse().map_err(|_| malformed())?;
            n_variables + k
        } else if let Some(k) = rest.strip_prefix('-') {
            let k: usize = k.parse().map_err(|_| malformed())?;
            n_variables.checked_sub(k).ok_or_else(|| {
                Error::Config(format!(
                    "Method '{name}': HiddenLayers '{raw}' leaves no neurons for \
                     {n_variables} variables"
                ))
            })?
        } else {
            return Err(malformed());
        }
    } else {
        trimmed.parse().map_err(|_| malformed())?
    };

    if count == 0 {
        return Err(Error::Config(format!(
            "Method '{name}': HiddenLayers '{raw}' resolves to an empty layer"
        )));
    }
    Ok(count)
}
