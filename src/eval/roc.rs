//! ROC curves and separation
//!
//! Curves are stored as (signal efficiency, background rejection) points
//! with signal efficiency ascending, fixed at (0, 1) and (1, 0). The ROC
//! integral over this parametrization equals the conventional area under
//! the TPR-over-FPR curve.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// One working point on a ROC curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    /// Fraction of signal weight accepted
    pub signal_eff: f64,
    /// One minus the fraction of background weight accepted
    pub background_rej: f64,
}

/// A ROC curve, ordered by ascending signal efficiency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocCurve {
    points: Vec<RocPoint>,
}

impl RocCurve {
    /// Build a curve by sweeping a threshold over scalar classifier
    /// outputs, higher output meaning more signal-like
    ///
    /// # Errors
    /// Returns error if array lengths disagree or either class carries no
    /// weight
    pub fn from_scores(scores: &[f64], is_signal: &[bool], weights: &[f64]) -> Result<Self> {
        if scores.len() != is_signal.len() || scores.len() != weights.len() {
            return Err(Error::Config(format!(
                "Score arrays disagree: {} scores, {} labels, {} weights",
                scores.len(),
                is_signal.len(),
                weights.len()
            )));
        }
        let signal_total: f64 = weights
            .iter()
            .zip(is_signal)
            .filter(|(_, s)| **s)
            .map(|(w, _)| *w)
            .sum();
        let background_total: f64 = weights
            .iter()
            .zip(is_signal)
            .filter(|(_, s)| !**s)
            .map(|(w, _)| *w)
            .sum();
        if signal_total <= 0.0 {
            return Err(Error::Config(
                "Evaluation sample carries no signal weight".to_string(),
            ));
        }
        if background_total <= 0.0 {
            return Err(Error::Config(
                "Evaluation sample carries no background weight".to_string(),
            ));
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let mut points = vec![RocPoint {
            signal_eff: 0.0,
            background_rej: 1.0,
        }];
        let mut signal_seen = 0.0;
        let mut background_seen = 0.0;
        let mut i = 0;
        while i < order.len() {
            // Events tied on the threshold pass or fail together.
            let threshold = scores[order[i]];
            while i < order.len() && scores[order[i]] == threshold {
                let event = order[i];
                if is_signal[event] {
                    signal_seen += weights[event];
                } else {
                    background_seen += weights[event];
                }
                i += 1;
            }
            points.push(RocPoint {
                signal_eff: signal_seen / signal_total,
                background_rej: 1.0 - background_seen / background_total,
            });
        }

        Self::from_working_points(points)
    }

    /// Build a curve from precomputed working points
    ///
    /// Points are clamped to the unit square, sorted by signal efficiency
    /// and completed with the (0, 1) and (1, 0) endpoints.
    ///
    /// # Errors
    /// Returns error if any point is not finite
    pub fn from_working_points(mut points: Vec<RocPoint>) -> Result<Self> {
        for point in &points {
            if !point.signal_eff.is_finite() || !point.background_rej.is_finite() {
                return Err(Error::Config(format!(
                    "Non-finite ROC point ({}, {})",
                    point.signal_eff, point.background_rej
                )));
            }
        }
        for point in &mut points {
            point.signal_eff = point.signal_eff.clamp(0.0, 1.0);
            point.background_rej = point.background_rej.clamp(0.0, 1.0);
        }
        points.push(RocPoint {
            signal_eff: 0.0,
            background_rej: 1.0,
        });
        points.push(RocPoint {
            signal_eff: 1.0,
            background_rej: 0.0,
        });
        points.sort_by(|a, b| {
            a.signal_eff
                .total_cmp(&b.signal_eff)
                .then(b.background_rej.total_cmp(&a.background_rej))
        });
        points.dedup_by(|a, b| a.signal_eff == b.signal_eff && a.background_rej == b.background_rej);
        Ok(Self { points })
    }

    /// Curve points, ascending in signal efficiency
    #[must_use]
    pub fn points(&self) -> &[RocPoint] {
        &self.points
    }

    /// ROC integral: background rejection integrated over signal
    /// efficiency by the trapezoid rule
    #[must_use]
    pub fn auc(&self) -> f64 {
        let mut area = 0.0;
        for pair in self.points.windows(2) {
            let width = pair[1].signal_eff - pair[0].signal_eff;
            area += width * (pair[0].background_rej + pair[1].background_rej) / 2.0;
        }
        area
    }

    /// Signal efficiency where the curve crosses the given background
    /// efficiency, linearly interpolated
    #[must_use]
    pub fn signal_eff_at_background(&self, background_eff: f64) -> f64 {
        let target_rej = 1.0 - background_eff.clamp(0.0, 1.0);
        // Rejection falls as efficiency grows; find the first point at or
        // below the target.
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if (b.background_rej <= target_rej) && (a.background_rej >= target_rej) {
                let span = a.background_rej - b.background_rej;
                if span <= 0.0 {
                    return b.signal_eff;
                }
                let t = (a.background_rej - target_rej) / span;
                return a.signal_eff + t * (b.signal_eff - a.signal_eff);
            }
        }
        1.0
    }
}

/// Signal/background separation of a classifier output distribution
///
/// `⟨S²⟩ = ½ Σ (ŝᵢ − b̂ᵢ)² / (ŝᵢ + b̂ᵢ)` over a 50-bin histogram of the
/// outputs, with each class normalized to unit weight. Zero for identical
/// distributions, one for disjoint ones.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn separation(scores: &[f64], is_signal: &[bool], weights: &[f64]) -> f64 {
    const BINS: usize = 50;

    let (min, max) = scores
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| {
            (lo.min(s), hi.max(s))
        });
    if !(min.is_finite() && max.is_finite()) || max <= min {
        return 0.0;
    }

    let mut signal_hist = [0.0_f64; BINS];
    let mut background_hist = [0.0_f64; BINS];
    let width = (max - min) / BINS as f64;
    for ((&score, &label), &weight) in scores.iter().zip(is_signal).zip(weights) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bin = (((score - min) / width) as usize).min(BINS - 1);
        if label {
            signal_hist[bin] += weight;
        } else {
            background_hist[bin] += weight;
        }
    }

    let signal_total: f64 = signal_hist.iter().sum();
    let background_total: f64 = background_hist.iter().sum();
    if signal_total <= 0.0 || background_total <= 0.0 {
        return 0.0;
    }

    let mut sum = 0.0;
    for bin in 0..BINS {
        let s = signal_hist[bin] / signal_total;
        let b = background_hist[bin] / background_total;
        if s + b > 0.0 {
            sum += (s - b) * (s - b) / (s + b);
        }
    }
    0.5 * sum
}
