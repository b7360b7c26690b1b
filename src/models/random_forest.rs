//! Bagged ensemble of decision trees

use crate::error::{PipelineError, Result};
use crate::models::decision_tree::{DecisionTree, SplitCriterion};
use ndarray::{Array1, Array2, Axis};
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Random forest classifier.
///
/// Each tree trains on a bootstrap resample with sqrt-feature subsampling
/// at every split. Prediction is a majority vote; scores are the fraction
/// of trees voting the positive class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    criterion: SplitCriterion,
    bootstrap: bool,
    seed: u64,
    classes: Vec<i64>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators: n_estimators.max(1),
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: SplitCriterion::Gini,
            bootstrap: true,
            seed: 42,
            classes: Vec::new(),
        }
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

    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
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

    /// Train the ensemble. Trees grow in parallel with per-tree seeds, so
    /// refitting with the same seed rebuilds the identical forest.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} labels", n_samples),
                actual: format!("{} labels", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::DataError(
                "cannot fit a forest on an empty matrix".to_string(),
            ));
        }

        let mut classes: Vec<i64> = y.iter().copied().collect();
        classes.sort_unstable();
        classes.dedup();
        self.classes = classes;

        let y_f64: Array1<f64> = y.iter().map(|&v| v as f64).collect();
        let max_features = ((x.ncols() as f64).sqrt().ceil() as usize).max(1);
        let base_seed = self.seed;

        let trees: Result<Vec<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let tree_seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(tree_seed);

                let (x_boot, y_boot) = if self.bootstrap {
                    let indices: Vec<usize> = (0..n_samples)
                        .map(|_| (rng.next_u64() % n_samples as u64) as usize)
                        .collect();
                    (
                        x.select(Axis(0), &indices),
                        Array1::from_vec(indices.iter().map(|&i| y_f64[i]).collect()),
                    )
                } else {
                    (x.to_owned(), y_f64.clone())
                };

                let mut tree = DecisionTree::classifier()
                    .with_criterion(self.criterion)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_seed(tree_seed);
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        Ok(self)
    }

    fn tree_votes(&self, x: &Array2<f64>) -> Result<Vec<Array1<f64>>> {
        if self.trees.is_empty() {
            return Err(PipelineError::NotFitted("RandomForest"));
        }
        self.trees.par_iter().map(|tree| tree.predict(x)).collect()
    }

    /// Majority vote across trees, lowest class winning ties
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        let votes = self.tree_votes(x)?;
        let out: Vec<i64> = (0..x.nrows())
            .map(|i| {
                let mut counts: HashMap<i64, usize> = HashMap::new();
                for tree_preds in &votes {
                    *counts.entry(tree_preds[i].round() as i64).or_insert(0) += 1;
                }
                counts
                    .into_iter()
                    .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
                    .map(|(class, _)| class)
                    .unwrap_or(0)
            })
            .collect();
        Ok(Array1::from_vec(out))
    }

    /// Fraction of trees voting the highest class
    pub fn predict_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let votes = self.tree_votes(x)?;
        let positive = *self
            .classes
            .last()
            .ok_or(PipelineError::NotFitted("RandomForest"))?;
        let n_trees = votes.len() as f64;

        let out: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let hits = votes
                    .iter()
                    .filter(|preds| preds[i].round() as i64 == positive)
                    .count();
                hits as f64 / n_trees
            })
            .collect();
        Ok(Array1::from_vec(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_clusters() -> (Array2<f64>, Array1<i64>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.2],
            [0.2, 0.1],
            [0.3, 0.3],
            [5.0, 5.0],
            [5.1, 5.2],
            [5.2, 5.1],
            [5.3, 5.3],
        ];
        let y = array![0i64, 0, 0, 0, 1, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_separable_classification() {
        let (x, y) = two_clusters();
        let mut forest = RandomForest::new(25).with_seed(42);
        forest.fit(&x, &y).unwrap();

        let preds = forest.predict(&x).unwrap();
        assert_eq!(preds, y);
    }

    #[test]
    fn test_scores_track_votes() {
        let (x, y) = two_clusters();
        let mut forest = RandomForest::new(25).with_seed(42);
        forest.fit(&x, &y).unwrap();

        let scores = forest.predict_scores(&x).unwrap();
        for (i, &label) in y.iter().enumerate() {
            assert!(scores[i] >= 0.0 && scores[i] <= 1.0);
            if label == 1 {
                assert!(scores[i] > 0.5, "positive sample {} scored {}", i, scores[i]);
            } else {
                assert!(scores[i] < 0.5, "negative sample {} scored {}", i, scores[i]);
            }
        }
    }

    #[test]
    fn test_seeded_refit_is_deterministic() {
        let (x, y) = two_clusters();

        let mut a = RandomForest::new(10).with_seed(7);
        let mut b = RandomForest::new(10).with_seed(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict_scores(&x).unwrap(), b.predict_scores(&x).unwrap());
    }

    #[test]
    fn test_predict_requires_fit() {
        let forest = RandomForest::new(5);
        let x = array![[0.0, 0.0]];
        assert!(matches!(
            forest.predict(&x),
            Err(PipelineError::NotFitted(_))
        ));
    }

    #[test]
    fn test_classes_recorded_sorted() {
        let (x, _) = two_clusters();
        let y = array![1i64, 1, 1, 1, 0, 0, 0, 0];
        let mut forest = RandomForest::new(5).with_seed(1);
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.classes(), &[0, 1]);
    }
}
