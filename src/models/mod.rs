//! Model variants and the name-keyed factory
//!
//! Configuration selects a model by its public name and supplies
//! hyperparameters as JSON. Unknown names and unknown hyperparameter keys
//! are configuration errors, not silent defaults.

mod decision_tree;
mod gradient_boosting;
mod random_forest;

pub use decision_tree::{DecisionTree, SplitCriterion};
pub use gradient_boosting::GradientBoosting;
pub use random_forest::RandomForest;

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Model names accepted by the factory
pub const KNOWN_MODEL_NAMES: [&str; 3] = [
    "RandomForestClassifier",
    "DecisionTreeClassifier",
    "GradientBoostingClassifier",
];

fn parse_criterion(name: &str) -> Result<SplitCriterion> {
    match name {
        "gini" => Ok(SplitCriterion::Gini),
        "entropy" => Ok(SplitCriterion::Entropy),
        other => Err(PipelineError::ConfigError(format!(
            "unknown criterion '{}', expected 'gini' or 'entropy'",
            other
        ))),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RandomForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub criterion: String,
    pub bootstrap: bool,
    pub random_state: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: "gini".to_string(),
            bootstrap: true,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DecisionTreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub criterion: String,
}

impl Default for DecisionTreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: "gini".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GradientBoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub subsample: f64,
    pub random_state: u64,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

/// A configured classifier of one of the supported families.
///
/// The enum is the serialization boundary: a fitted variant carries its
/// whole trained state and round-trips through serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Classifier {
    RandomForest(RandomForest),
    DecisionTree {
        tree: DecisionTree,
        classes: Vec<i64>,
    },
    GradientBoosting(GradientBoosting),
}

impl Classifier {
    /// Build a classifier from its public name and a JSON parameter table.
    ///
    /// Unknown names and unrecognized parameter keys are rejected.
    pub fn from_config(name: &str, params: &serde_json::Value) -> Result<Self> {
        match name {
            "RandomForestClassifier" => {
                let p: RandomForestParams = serde_json::from_value(params.clone())
                    .map_err(|e| PipelineError::ConfigError(format!(
                        "invalid RandomForestClassifier parameters: {}",
                        e
                    )))?;
                let mut forest = RandomForest::new(p.n_estimators)
                    .with_min_samples_split(p.min_samples_split)
                    .with_min_samples_leaf(p.min_samples_leaf)
                    .with_criterion(parse_criterion(&p.criterion)?)
                    .with_bootstrap(p.bootstrap)
                    .with_seed(p.random_state);
                if let Some(d) = p.max_depth {
                    forest = forest.with_max_depth(d);
                }
                Ok(Classifier::RandomForest(forest))
            }
            "DecisionTreeClassifier" => {
                let p: DecisionTreeParams = serde_json::from_value(params.clone())
                    .map_err(|e| PipelineError::ConfigError(format!(
                        "invalid DecisionTreeClassifier parameters: {}",
                        e
                    )))?;
                let mut tree = DecisionTree::classifier()
                    .with_criterion(parse_criterion(&p.criterion)?)
                    .with_min_samples_split(p.min_samples_split)
                    .with_min_samples_leaf(p.min_samples_leaf);
                if let Some(d) = p.max_depth {
                    tree = tree.with_max_depth(d);
                }
                Ok(Classifier::DecisionTree {
                    tree,
                    classes: Vec::new(),
                })
            }
            "GradientBoostingClassifier" => {
                let p: GradientBoostingParams = serde_json::from_value(params.clone())
                    .map_err(|e| PipelineError::ConfigError(format!(
                        "invalid GradientBoostingClassifier parameters: {}",
                        e
                    )))?;
                Ok(Classifier::GradientBoosting(
                    GradientBoosting::new(p.n_estimators)
                        .with_learning_rate(p.learning_rate)
                        .with_max_depth(p.max_depth)
                        .with_min_samples_leaf(p.min_samples_leaf)
                        .with_subsample(p.subsample)
                        .with_seed(p.random_state),
                ))
            }
            other => Err(PipelineError::ConfigError(format!(
                "unknown model '{}', expected one of {:?}",
                other, KNOWN_MODEL_NAMES
            ))),
        }
    }

    /// Build a classifier with default hyperparameters
    pub fn from_name(name: &str) -> Result<Self> {
        Self::from_config(name, &serde_json::json!({}))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Classifier::RandomForest(_) => "RandomForestClassifier",
            Classifier::DecisionTree { .. } => "DecisionTreeClassifier",
            Classifier::GradientBoosting(_) => "GradientBoostingClassifier",
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        match self {
            Classifier::RandomForest(forest) => {
                forest.fit(x, y)?;
            }
            Classifier::DecisionTree { tree, classes } => {
                let mut sorted: Vec<i64> = y.iter().copied().collect();
                sorted.sort_unstable();
                sorted.dedup();
                *classes = sorted;
                let y_f64: Array1<f64> = y.iter().map(|&v| v as f64).collect();
                tree.fit(x, &y_f64)?;
            }
            Classifier::GradientBoosting(gb) => {
                gb.fit(x, y)?;
            }
        }
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<i64>> {
        match self {
            Classifier::RandomForest(forest) => forest.predict(x),
            Classifier::DecisionTree { tree, .. } => {
                let preds = tree.predict(x)?;
                Ok(preds.mapv(|v| v.round() as i64))
            }
            Classifier::GradientBoosting(gb) => gb.predict(x),
        }
    }

    /// Positive-class score per row, monotone in confidence.
    ///
    /// The forest reports its vote fraction, boosting its sigmoid
    /// probability, and the single tree an indicator of its hard label.
    pub fn predict_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Classifier::RandomForest(forest) => forest.predict_scores(x),
            Classifier::DecisionTree { tree, classes } => {
                let positive = *classes
                    .last()
                    .ok_or(PipelineError::NotFitted("DecisionTreeClassifier"))?;
                let preds = tree.predict(x)?;
                Ok(preds.mapv(|v| if v.round() as i64 == positive { 1.0 } else { 0.0 }))
            }
            Classifier::GradientBoosting(gb) => gb.predict_scores(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde_json::json;

    #[test]
    fn test_factory_known_names() {
        for name in KNOWN_MODEL_NAMES {
            let model = Classifier::from_name(name).unwrap();
            assert_eq!(model.name(), name);
        }
    }

    #[test]
    fn test_factory_unknown_name() {
        assert!(matches!(
            Classifier::from_name("SupportVectorClassifier"),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_factory_rejects_unknown_key() {
        let params = json!({ "n_estimators": 10, "n_jobs": 4 });
        assert!(matches!(
            Classifier::from_config("RandomForestClassifier", &params),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_factory_rejects_bad_criterion() {
        let params = json!({ "criterion": "log_loss" });
        assert!(matches!(
            Classifier::from_config("DecisionTreeClassifier", &params),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_each_variant_fits_and_predicts() {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.0],
            [0.3, 0.2],
            [4.0, 4.0],
            [4.1, 4.2],
            [4.2, 4.0],
            [4.3, 4.1],
        ];
        let y = array![0i64, 0, 0, 0, 1, 1, 1, 1];

        for name in KNOWN_MODEL_NAMES {
            let params = match name {
                "RandomForestClassifier" => json!({ "n_estimators": 10, "random_state": 1 }),
                "GradientBoostingClassifier" => json!({ "n_estimators": 20, "random_state": 1 }),
                _ => json!({}),
            };
            let mut model = Classifier::from_config(name, &params).unwrap();
            model.fit(&x, &y).unwrap();

            let preds = model.predict(&x).unwrap();
            assert_eq!(preds, y, "{} mispredicted", name);

            let scores = model.predict_scores(&x).unwrap();
            assert!(scores.iter().all(|&s| (0.0..=1.0).contains(&s)));
        }
    }

    #[test]
    fn test_scores_require_fit() {
        let model = Classifier::from_name("DecisionTreeClassifier").unwrap();
        let x = array![[0.0]];
        assert!(matches!(
            model.predict_scores(&x),
            Err(PipelineError::NotFitted(_))
        ));
    }
}
