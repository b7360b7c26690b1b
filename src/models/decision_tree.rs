//! CART decision tree
//!
//! Used directly as a classifier and as the regression base learner of the
//! boosted ensemble. Split search sorts each candidate feature once and
//! sweeps the boundaries with running statistics.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Impurity measure for split search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitCriterion {
    /// Gini impurity (classification)
    Gini,
    /// Shannon entropy (classification)
    Entropy,
    /// Variance reduction (regression)
    Variance,
}

impl SplitCriterion {
    fn is_classification(self) -> bool {
        !matches!(self, SplitCriterion::Variance)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Branch {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Binary CART tree over dense f64 matrices.
///
/// Classification leaves hold the majority class, regression leaves the
/// target mean. Rows route left when `x[feature] <= threshold`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<Node>,
    criterion: SplitCriterion,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: Option<usize>,
    seed: Option<u64>,
    n_features: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::classifier()
    }
}

impl DecisionTree {
    pub fn classifier() -> Self {
        Self {
            root: None,
            criterion: SplitCriterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: None,
            n_features: 0,
        }
    }

    pub fn regressor() -> Self {
        Self {
            criterion: SplitCriterion::Variance,
            ..Self::classifier()
        }
    }

    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n.max(1);
        self
    }

    /// Number of features sampled at each split (all when unset)
    pub fn with_max_features(mut self, n: usize) -> Self {
        self.max_features = Some(n.max(1));
        self
    }

    /// Seed for the per-split feature subsampling
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    /// Grow the tree. Refitting replaces any previous tree.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} targets", n_samples),
                actual: format!("{} targets", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::DataError(
                "cannot fit a tree on an empty matrix".to_string(),
            ));
        }

        self.n_features = x.ncols();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.unwrap_or(0));
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.grow(x, y, indices, 0, &mut rng));
        Ok(self)
    }

    fn grow(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> Node {
        let targets: Vec<f64> = indices.iter().map(|&i| y[i]).collect();

        let at_depth_limit = self.max_depth.map_or(false, |d| depth >= d);
        if at_depth_limit
            || indices.len() < self.min_samples_split
            || is_constant(&targets)
        {
            return Node::Leaf {
                value: self.leaf_value(&targets),
            };
        }

        let split = self.best_split(x, y, &indices, rng);
        let Some((feature, threshold)) = split else {
            return Node::Leaf {
                value: self.leaf_value(&targets),
            };
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[[i, feature]] <= threshold);

        if left_idx.len() < self.min_samples_leaf || right_idx.len() < self.min_samples_leaf {
            return Node::Leaf {
                value: self.leaf_value(&targets),
            };
        }

        let left = Box::new(self.grow(x, y, left_idx, depth + 1, rng));
        let right = Box::new(self.grow(x, y, right_idx, depth + 1, rng));
        Node::Branch {
            feature,
            threshold,
            left,
            right,
        }
    }

    /// Evaluate candidate features in parallel, each with a single
    /// sorted sweep, and keep the split with the largest impurity gain.
    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64)> {
        let candidates = self.candidate_features(x.ncols(), rng);
        let targets: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let parent = self.impurity(&targets);

        candidates
            .into_par_iter()
            .filter_map(|feature| {
                self.sweep_feature(x, y, indices, feature, parent)
                    .map(|(threshold, gain)| (feature, threshold, gain))
            })
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(feature, threshold, _)| (feature, threshold))
    }

    fn candidate_features(&self, n_features: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let k = self.max_features.unwrap_or(n_features).min(n_features);
        if k == n_features {
            return (0..n_features).collect();
        }
        let mut all: Vec<usize> = (0..n_features).collect();
        all.shuffle(rng);
        all.truncate(k);
        all
    }

    /// One sorted pass over a feature: move samples from the right
    /// partition to the left and score each distinct boundary.
    fn sweep_feature(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        feature: usize,
        parent_impurity: f64,
    ) -> Option<(f64, f64)> {
        let mut pairs: Vec<(f64, f64)> = indices
            .iter()
            .map(|&i| (x[[i, feature]], y[i]))
            .collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let n = pairs.len();
        let mut left = RunningStats::new();
        let mut right = RunningStats::new();
        for &(_, target) in &pairs {
            right.add(target);
        }

        let mut best: Option<(f64, f64)> = None;
        for i in 1..n {
            let (prev_value, prev_target) = pairs[i - 1];
            left.add(prev_target);
            right.remove(prev_target);

            let value = pairs[i].0;
            if value <= prev_value {
                continue;
            }
            if i < self.min_samples_leaf || n - i < self.min_samples_leaf {
                continue;
            }

            let weighted = (i as f64 * self.stats_impurity(&left)
                + (n - i) as f64 * self.stats_impurity(&right))
                / n as f64;
            let gain = parent_impurity - weighted;
            if gain > 1e-12 && best.map_or(true, |(_, g)| gain > g) {
                best = Some(((prev_value + value) / 2.0, gain));
            }
        }
        best
    }

    fn impurity(&self, targets: &[f64]) -> f64 {
        let mut stats = RunningStats::new();
        for &t in targets {
            stats.add(t);
        }
        self.stats_impurity(&stats)
    }

    fn stats_impurity(&self, stats: &RunningStats) -> f64 {
        match self.criterion {
            SplitCriterion::Gini => stats.gini(),
            SplitCriterion::Entropy => stats.entropy(),
            SplitCriterion::Variance => stats.variance(),
        }
    }

    fn leaf_value(&self, targets: &[f64]) -> f64 {
        if targets.is_empty() {
            return 0.0;
        }
        if self.criterion.is_classification() {
            let mut counts: HashMap<i64, usize> = HashMap::new();
            for &t in targets {
                *counts.entry(t.round() as i64).or_insert(0) += 1;
            }
            counts
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
                .map(|(class, _)| class as f64)
                .unwrap_or(0.0)
        } else {
            targets.iter().sum::<f64>() / targets.len() as f64
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(PipelineError::NotFitted("DecisionTree"))?;
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let out: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let row = x.row(i);
                let mut node = root;
                loop {
                    match node {
                        Node::Leaf { value } => break *value,
                        Node::Branch {
                            feature,
                            threshold,
                            left,
                            right,
                        } => {
                            node = if row[*feature] <= *threshold { left } else { right };
                        }
                    }
                }
            })
            .collect();
        Ok(Array1::from_vec(out))
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 1,
                Node::Branch { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root.as_ref().map_or(0, walk)
    }
}

/// Incremental per-partition statistics for the boundary sweep
#[derive(Debug, Clone, Default)]
struct RunningStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
    class_counts: HashMap<i64, usize>,
}

impl RunningStats {
    fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, target: f64) {
        self.count += 1;
        self.sum += target;
        self.sq_sum += target * target;
        *self.class_counts.entry(target.round() as i64).or_insert(0) += 1;
    }

    fn remove(&mut self, target: f64) {
        self.count -= 1;
        self.sum -= target;
        self.sq_sum -= target * target;
        if let Some(c) = self.class_counts.get_mut(&(target.round() as i64)) {
            *c -= 1;
        }
    }

    fn gini(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        1.0 - self
            .class_counts
            .values()
            .map(|&c| (c as f64 / n).powi(2))
            .sum::<f64>()
    }

    fn entropy(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        -self
            .class_counts
            .values()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / n;
                p * p.ln()
            })
            .sum::<f64>()
    }

    fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0)
    }
}

fn is_constant(targets: &[f64]) -> bool {
    targets
        .first()
        .map_or(true, |&first| targets.iter().all(|&t| (t - first).abs() < 1e-12))
}
