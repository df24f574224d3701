//! Isolation Forest outlier detection (Liu, Ting and Zhou, 2008).
//!
//! Each tree isolates a random subsample by recursive random splits; points
//! that need few splits to isolate are anomalous. Fitting is fully driven by
//! a seeded RNG, so the same data and seed always give the same forest.
use crate::error::{PulseError, Result};
use crate::scaler::check_shape;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    n_estimators: usize,
    max_samples: usize,
    contamination: f64,
    random_state: u64,
    trees: Vec<Node>,
    sample_size: usize,
    offset: f64,
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new()
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile, `q` in [0, 1].
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

impl IsolationForest {
    #[must_use]
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            random_state: 0,
            trees: Vec::new(),
            sample_size: 0,
            offset: -0.5,
        }
    }

    #[must_use]
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    #[must_use]
    pub fn with_max_samples(mut self, n: usize) -> Self {
        self.max_samples = n;
        self
    }

    #[must_use]
    pub fn with_contamination(mut self, c: f64) -> Self {
        self.contamination = c;
        self
    }

    #[must_use]
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    #[must_use]
    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Builds the forest and sets the decision threshold so that roughly a
    /// `contamination` share of the training points score below zero.
    ///
    /// # Errors
    ///
    /// Returns an error for empty or ragged input, zero estimators, or a
    /// contamination outside (0, 0.5].
    pub fn fit(&mut self, x: &[Vec<f64>]) -> Result<()> {
        let n_features = check_shape(x)?;
        if self.n_estimators == 0 || self.max_samples == 0 {
            return Err(PulseError::Model(
                "n_estimators and max_samples must be positive".to_string(),
            ));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(PulseError::Model(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.random_state);
        self.sample_size = self.max_samples.min(x.len());
        let height_limit = (self.sample_size.max(2) as f64).log2().ceil() as usize;

        self.trees.clear();
        for _ in 0..self.n_estimators {
            let indices = sample(&mut rng, x.len(), self.sample_size).into_vec();
            let tree = grow(x, indices, 0, height_limit, n_features, &mut rng);
            self.trees.push(tree);
        }

        let scores = self.score_samples(x);
        self.offset = percentile(&scores, self.contamination);
        Ok(())
    }

    /// Opposite of the anomaly score from the paper: values near -1 are
    /// anomalous, values near -0.5 or above are normal.
    pub fn score_samples(&self, x: &[Vec<f64>]) -> Vec<f64> {
        let norm = average_path_length(self.sample_size);
        x.iter()
            .map(|row| {
                if self.trees.is_empty() || norm == 0.0 {
                    return -0.5;
                }
                let mean_depth = self
                    .trees
                    .iter()
                    .map(|t| path_length(t, row, 0))
                    .sum::<f64>()
                    / self.trees.len() as f64;
                -(2f64.powf(-mean_depth / norm))
            })
            .collect()
    }

    /// Shifted score: negative means outlier.
    pub fn decision_function(&self, x: &[Vec<f64>]) -> Vec<f64> {
        self.score_samples(x)
            .into_iter()
            .map(|s| s - self.offset)
            .collect()
    }

    /// 1 for inliers, -1 for outliers.
    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<i8> {
        self.decision_function(x)
            .into_iter()
            .map(|d| if d < 0.0 { -1 } else { 1 })
            .collect()
    }
}

fn grow(
    x: &[Vec<f64>],
    indices: Vec<usize>,
    depth: usize,
    height_limit: usize,
    n_features: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= height_limit || indices.len() <= 1 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Only features that still vary can split this node.
    let mut candidates = Vec::with_capacity(n_features);
    for f in 0..n_features {
        let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            (lo.min(x[i][f]), hi.max(x[i][f]))
        });
        if hi > lo {
            candidates.push((f, lo, hi));
        }
    }
    if candidates.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) =
        indices.into_iter().partition(|&i| x[i][feature] <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(grow(x, left, depth + 1, height_limit, n_features, rng)),
        right: Box::new(grow(x, right, depth + 1, height_limit, n_features, rng)),
    }
}

fn path_length(node: &Node, row: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] <= *threshold {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}
