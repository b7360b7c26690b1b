//! Gradient boosted trees for binary classification
//!
//! Regression trees fit the log-loss gradient round by round; predictions
//! accumulate in log-odds space and pass through a sigmoid.

use crate::error::{PipelineError, Result};
use crate::models::decision_tree::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Binary gradient boosting classifier.
///
/// Labels may be any two distinct integers; internally the larger one is
/// the positive class and scores are its sigmoid probability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    trees: Vec<DecisionTree>,
    col_indices_per_tree: Vec<Vec<usize>>,
    n_estimators: usize,
    learning_rate: f64,
    max_depth: usize,
    min_samples_leaf: usize,
    subsample: f64,
    colsample: f64,
    seed: u64,
    initial_log_odds: f64,
    classes: Vec<i64>,
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self::new(100)
    }
}

impl GradientBoosting {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            col_indices_per_tree: Vec::new(),
            n_estimators: n_estimators.max(1),
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            colsample: 1.0,
            seed: 42,
            initial_log_odds: 0.0,
            classes: Vec::new(),
        }
    }

    pub fn with_learning_rate(mut self, rate: f64) -> Self {
        self.learning_rate = rate.clamp(1e-4, 1.0);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n.max(1);
        self
    }

    /// Row fraction drawn without replacement per round
    pub fn with_subsample(mut self, fraction: f64) -> Self {
        self.subsample = fraction.clamp(0.1, 1.0);
        self
    }

    /// Column fraction drawn per round
    pub fn with_colsample(mut self, fraction: f64) -> Self {
        self.colsample = fraction.clamp(0.1, 1.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Run the boosting rounds. Refitting discards the previous ensemble.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} labels", n_samples),
                actual: format!("{} labels", y.len()),
            });
        }

        let mut classes: Vec<i64> = y.iter().copied().collect();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() != 2 {
            return Err(PipelineError::DataError(format!(
                "gradient boosting requires exactly two classes, found {}",
                classes.len()
            )));
        }
        let positive = classes[1];
        self.classes = classes;
        self.trees.clear();
        self.col_indices_per_tree.clear();

        // Targets in {0, 1}
        let y01: Array1<f64> = y
            .iter()
            .map(|&v| if v == positive { 1.0 } else { 0.0 })
            .collect();

        let p = y01.mean().unwrap_or(0.5).clamp(1e-10, 1.0 - 1e-10);
        self.initial_log_odds = (p / (1.0 - p)).ln();

        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);

        for _ in 0..self.n_estimators {
            // Gradient of the log loss
            let residuals: Array1<f64> = y01
                .iter()
                .zip(log_odds.iter())
                .map(|(&yi, &lo)| yi - sigmoid(lo))
                .collect();

            let row_indices = sample_indices(n_samples, self.subsample, &mut rng);
            let col_indices = sample_indices(n_features, self.colsample, &mut rng);

            let x_rows = x.select(Axis(0), &row_indices);
            let x_sub = x_rows.select(Axis(1), &col_indices);
            let r_sub: Array1<f64> =
                Array1::from_vec(row_indices.iter().map(|&i| residuals[i]).collect());

            let mut tree = DecisionTree::regressor()
                .with_max_depth(self.max_depth)
                .with_min_samples_leaf(self.min_samples_leaf);
            tree.fit(&x_sub, &r_sub)?;

            let x_all_cols = x.select(Axis(1), &col_indices);
            let update = tree.predict(&x_all_cols)?;
            for i in 0..n_samples {
                log_odds[i] += self.learning_rate * update[i];
            }

            self.trees.push(tree);
            self.col_indices_per_tree.push(col_indices);
        }

        Ok(self)
    }

    fn raw_log_odds(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::NotFitted("GradientBoosting"));
        }
        let n = x.nrows();
        let mut log_odds = Array1::from_elem(n, self.initial_log_odds);
        for (tree, cols) in self.trees.iter().zip(self.col_indices_per_tree.iter()) {
            let x_sub = x.select(Axis(1), cols);
            let update = tree.predict(&x_sub)?;
            for i in 0..n {
                log_odds[i] += self.learning_rate * update[i];
            }
        }
        Ok(log_odds)
    }

    /// Positive-class probability per row
    pub fn predict_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.raw_log_odds(x)?.mapv(sigmoid))
    }

    /// Hard labels at the 0.5 probability threshold
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let scores = self.predict_scores(x)?;
        let (negative, positive) = (self.classes[0], self.classes[1]);
        Ok(scores.mapv(|p| if p >= 0.5 { positive } else { negative }))
    }
}

#[inline]
fn sigmoid(log_odds: f64) -> f64 {
    1.0 / (1.0 + (-log_odds).exp())
}

fn sample_indices(n: usize, fraction: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    let size = ((n as f64 * fraction).ceil() as usize).clamp(1, n);
    let mut indices: Vec<usize> = (0..n).collect();
    if size < n {
        indices.shuffle(rng);
        indices.truncate(size);
        indices.sort_unstable();
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn linearly_separable() -> (Array2<f64>, Array1<i64>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            let v = i as f64 * 0.1;
            data.push(v);
            data.push(v * 0.5);
            labels.push(if v > 1.45 { 1i64 } else { 0i64 });
        }
        (
            Array2::from_shape_vec((30, 2), data).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_binary_classification() {
        let (x, y) = linearly_separable();
        let mut model = GradientBoosting::new(20).with_max_depth(2).with_seed(42);
        model.fit(&x, &y).unwrap();

        let preds = model.predict(&x).unwrap();
        let correct = preds.iter().zip(y.iter()).filter(|(p, a)| p == a).count();
        assert!(correct >= 28, "only {} of 30 correct", correct);
    }

    #[test]
    fn test_scores_are_probabilities() {
        let (x, y) = linearly_separable();
        let mut model = GradientBoosting::new(10).with_seed(42);
        model.fit(&x, &y).unwrap();

        let scores = model.predict_scores(&x).unwrap();
        for &s in scores.iter() {
            assert!(s > 0.0 && s < 1.0);
        }
        // Deep in each cluster the ordering must hold
        assert!(scores[0] < scores[29]);
    }

    #[test]
    fn test_refit_replaces_ensemble() {
        let (x, y) = linearly_separable();
        let mut model = GradientBoosting::new(10).with_seed(42);
        model.fit(&x, &y).unwrap();
        let first = model.predict_scores(&x).unwrap();

        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_trees(), 10);
        assert_eq!(model.predict_scores(&x).unwrap(), first);
    }

    #[test]
    fn test_nonbinary_labels_rejected() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![0i64, 1, 2];
        let mut model = GradientBoosting::new(5);
        assert!(matches!(
            model.fit(&x, &y),
            Err(PipelineError::DataError(_))
        ));
    }

    #[test]
    fn test_arbitrary_label_pair() {
        let (x, y01) = linearly_separable();
        let y: Array1<i64> = y01.mapv(|v| if v == 1 { 7 } else { -3 });

        let mut model = GradientBoosting::new(20).with_max_depth(2).with_seed(42);
        model.fit(&x, &y).unwrap();

        let preds = model.predict(&x).unwrap();
        for &p in preds.iter() {
            assert!(p == 7 || p == -3);
        }
        assert_eq!(preds[29], 7);
        assert_eq!(preds[0], -3);
    }
}
