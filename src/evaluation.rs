//! Model quality metrics
//!
//! Accuracy, a per-class precision/recall/F1 report, and ROC AUC computed
//! from ranking scores with the tie-corrected Mann-Whitney statistic.

use crate::data::LABEL_COLUMN;
use crate::error::{PipelineError, Result};
use crate::pipeline::TrainingPipeline;
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// Per-class entries of the classification report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class: i64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Aggregate evaluation output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub accuracy: f64,
    pub report: Vec<ClassMetrics>,
    pub roc_auc: f64,
}

/// Binary classification evaluator.
///
/// Requires both classes in the true labels; AUC over a single class is
/// undefined and reported as a data error rather than a silent default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    /// Score a fitted pipeline on a cleaned, labeled table.
    ///
    /// Test labels must all come from classes the pipeline saw in training.
    pub fn evaluate_pipeline(
        &self,
        pipeline: &TrainingPipeline,
        df: &DataFrame,
    ) -> Result<EvaluationResult> {
        let label = df
            .column(LABEL_COLUMN)
            .map_err(|_| PipelineError::ColumnNotFound(LABEL_COLUMN.to_string()))?
            .as_materialized_series()
            .cast(&DataType::Int64)
            .map_err(|e| PipelineError::DataError(e.to_string()))?;
        let ca = label
            .i64()
            .map_err(|e| PipelineError::DataError(e.to_string()))?;
        if ca.null_count() > 0 {
            return Err(PipelineError::DataError(
                "test labels contain nulls; clean the table first".to_string(),
            ));
        }
        let y_true: Array1<i64> = ca.into_iter().flatten().collect();

        for &class in y_true.iter() {
            if !pipeline.classes().contains(&class) {
                return Err(PipelineError::DataError(format!(
                    "test label {} was never seen during training",
                    class
                )));
            }
        }

        let y_pred = pipeline.predict(df)?;
        let scores = pipeline.predict_scores(df)?;
        let result = self.evaluate(&y_true, &y_pred, &scores)?;
        info!(
            accuracy = result.accuracy,
            roc_auc = result.roc_auc,
            rows = y_true.len(),
            "evaluation"
        );
        Ok(result)
    }

    pub fn evaluate(
        &self,
        y_true: &Array1<i64>,
        y_pred: &Array1<i64>,
        scores: &Array1<f64>,
    ) -> Result<EvaluationResult> {
        let n = y_true.len();
        if n == 0 {
            return Err(PipelineError::DataError(
                "cannot evaluate on an empty label set".to_string(),
            ));
        }
        if y_pred.len() != n || scores.len() != n {
            return Err(PipelineError::ShapeError {
                expected: format!("{} predictions and scores", n),
                actual: format!("{} predictions, {} scores", y_pred.len(), scores.len()),
            });
        }

        let true_classes: BTreeSet<i64> = y_true.iter().copied().collect();
        if true_classes.len() < 2 {
            return Err(PipelineError::DataError(
                "true labels contain a single class; AUC is undefined".to_string(),
            ));
        }
        if true_classes.len() > 2 {
            return Err(PipelineError::DataError(format!(
                "expected binary labels, found {} classes",
                true_classes.len()
            )));
        }

        let accuracy = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| t == p)
            .count() as f64
            / n as f64;

        // Report rows cover every class seen in either vector
        let mut all_classes: BTreeSet<i64> = true_classes.clone();
        all_classes.extend(y_pred.iter().copied());

        let report = all_classes
            .into_iter()
            .map(|class| {
                let tp = y_true
                    .iter()
                    .zip(y_pred.iter())
                    .filter(|(&t, &p)| t == class && p == class)
                    .count() as f64;
                let predicted = y_pred.iter().filter(|&&p| p == class).count() as f64;
                let support = y_true.iter().filter(|&&t| t == class).count();

                let precision = if predicted > 0.0 { tp / predicted } else { 0.0 };
                let recall = if support > 0 { tp / support as f64 } else { 0.0 };
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    class,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let positive = *true_classes.iter().next_back().expect("two classes");
        let roc_auc = roc_auc(y_true, scores, positive)?;

        Ok(EvaluationResult {
            accuracy,
            report,
            roc_auc,
        })
    }
}

/// Tie-corrected Mann-Whitney AUC: the probability that a random positive
/// outranks a random negative, with ties counted as half.
fn roc_auc(y_true: &Array1<i64>, scores: &Array1<f64>, positive: i64) -> Result<f64> {
    let n = y_true.len();
    let n_pos = y_true.iter().filter(|&&t| t == positive).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(PipelineError::DataError(
            "AUC requires both classes in the true labels".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Average ranks within tie groups (ranks are 1-based)
    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j + 2) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let rank_sum_pos: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(&t, _)| t == positive)
        .map(|(_, &r)| r)
        .sum();

    let u = rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Ok(u / (n_pos * n_neg) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_predictions() {
        let y = array![0i64, 0, 1, 1];
        let pred = array![0i64, 0, 1, 1];
        let scores = array![0.1, 0.2, 0.8, 0.9];

        let result = Evaluator::new().evaluate(&y, &pred, &scores).unwrap();
        assert!((result.accuracy - 1.0).abs() < 1e-12);
        assert!((result.roc_auc - 1.0).abs() < 1e-12);
        for metrics in &result.report {
            assert!((metrics.f1 - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_report_counts() {
        let y = array![0i64, 0, 0, 1, 1, 1];
        let pred = array![0i64, 0, 1, 1, 1, 0];
        let scores = array![0.2, 0.3, 0.6, 0.7, 0.8, 0.4];

        let result = Evaluator::new().evaluate(&y, &pred, &scores).unwrap();
        assert!((result.accuracy - 4.0 / 6.0).abs() < 1e-12);

        let positive = result.report.iter().find(|m| m.class == 1).unwrap();
        assert_eq!(positive.support, 3);
        // 2 true positives of 3 predicted positives
        assert!((positive.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((positive.recall - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_auc_with_ties() {
        // Tied scores count half; here every pair is tied
        let y = array![0i64, 1];
        let pred = array![0i64, 1];
        let scores = array![0.5, 0.5];

        let result = Evaluator::new().evaluate(&y, &pred, &scores).unwrap();
        assert!((result.roc_auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_auc_reversed_ranking() {
        let y = array![0i64, 0, 1, 1];
        let pred = array![1i64, 1, 0, 0];
        let scores = array![0.9, 0.8, 0.2, 0.1];

        let result = Evaluator::new().evaluate(&y, &pred, &scores).unwrap();
        assert!((result.roc_auc - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_rejected() {
        let y = array![1i64, 1, 1];
        let pred = array![1i64, 1, 1];
        let scores = array![0.5, 0.6, 0.7];
        assert!(matches!(
            Evaluator::new().evaluate(&y, &pred, &scores),
            Err(PipelineError::DataError(_))
        ));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let y = array![0i64, 1];
        let pred = array![0i64];
        let scores = array![0.1, 0.9];
        assert!(matches!(
            Evaluator::new().evaluate(&y, &pred, &scores),
            Err(PipelineError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_hard_label_scores() {
        // AUC degenerates gracefully when scores are 0/1 indicators
        let y = array![0i64, 0, 1, 1];
        let pred = array![0i64, 1, 1, 1];
        let scores = array![0.0, 1.0, 1.0, 1.0];

        let result = Evaluator::new().evaluate(&y, &pred, &scores).unwrap();
        // Positives: ranks of the two 1.0 among {0, 1, 1, 1}
        assert!((result.roc_auc - 0.75).abs() < 1e-12);
    }
}
