//! End-to-end training pipeline
//!
//! Chains the feature transformer, the oversampler, and a classifier into
//! one fit/predict unit whose entire fitted state persists as a single
//! versioned artifact.

use crate::data::LABEL_COLUMN;
use crate::error::{PipelineError, Result};
use crate::features::FeatureTransformer;
use crate::models::Classifier;
use crate::sampling::{Sampler, Smote};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Artifact layout version; bump on incompatible change
const ARTIFACT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct PipelineArtifact {
    format_version: u32,
    transformer: FeatureTransformer,
    sampler: Smote,
    model: Classifier,
    classes: Vec<i64>,
}

/// Trained insurance-sales pipeline.
///
/// `fit` learns on a cleaned table: the transformer is fitted on the real
/// data, oversampling balances the encoded matrix, and the model trains on
/// the balanced set. Prediction uses the frozen transformer, never the
/// oversampler.
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    transformer: FeatureTransformer,
    sampler: Smote,
    model: Classifier,
    classes: Vec<i64>,
    is_fitted: bool,
}

impl TrainingPipeline {
    pub fn new(model: Classifier) -> Self {
        Self {
            transformer: FeatureTransformer::insurance_defaults(),
            sampler: Smote::new(),
            model,
            classes: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn with_transformer(mut self, transformer: FeatureTransformer) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn with_sampler(mut self, sampler: Smote) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn model(&self) -> &Classifier {
        &self.model
    }

    pub fn transformer(&self) -> &FeatureTransformer {
        &self.transformer
    }

    /// Class labels seen during training, sorted
    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Train on a cleaned, labeled table
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let y = extract_labels(df)?;
        let features = df
            .drop(LABEL_COLUMN)
            .map_err(|e| PipelineError::DataError(e.to_string()))?;

        let x = self.transformer.fit(&features)?.transform(&features)?;

        let resampled = self.sampler.fit_resample(&x, &y)?;
        let n_synthetic: usize = resampled.n_synthetic.values().sum();
        info!(
            rows = x.nrows(),
            synthetic = n_synthetic,
            model = self.model.name(),
            "training"
        );

        self.model.fit(&resampled.x, &resampled.y)?;

        let mut classes: Vec<i64> = y.iter().copied().collect();
        classes.sort_unstable();
        classes.dedup();
        self.classes = classes;
        self.is_fitted = true;
        Ok(self)
    }

    fn feature_matrix(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::NotFitted("TrainingPipeline"));
        }
        // A label column may be present on evaluation tables
        let features = if df.column(LABEL_COLUMN).is_ok() {
            df.drop(LABEL_COLUMN)
                .map_err(|e| PipelineError::DataError(e.to_string()))?
        } else {
            df.clone()
        };
        self.transformer.transform(&features)
    }

    /// Hard class labels for a cleaned table
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<i64>> {
        let x = self.feature_matrix(df)?;
        self.model.predict(&x)
    }

    /// Positive-class scores for a cleaned table
    pub fn predict_scores(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let x = self.feature_matrix(df)?;
        self.model.predict_scores(&x)
    }

    /// Persist the fitted pipeline.
    ///
    /// Writes to a temporary sibling and renames, so a crash mid-write
    /// never leaves a truncated artifact at the target path.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if !self.is_fitted {
            return Err(PipelineError::NotFitted("TrainingPipeline"));
        }
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let artifact = PipelineArtifact {
            format_version: ARTIFACT_VERSION,
            transformer: self.transformer.clone(),
            sampler: self.sampler.clone(),
            model: self.model.clone(),
            classes: self.classes.clone(),
        };
        let bytes = bincode::serialize(&artifact)
            .map_err(|e| PipelineError::SerializationError(e.to_string()))?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        info!(path = %path.display(), bytes = bytes.len(), "saved pipeline");
        Ok(())
    }

    /// Load a previously saved pipeline
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        let artifact: PipelineArtifact = bincode::deserialize(&bytes)
            .map_err(|e| PipelineError::SerializationError(e.to_string()))?;

        if artifact.format_version != ARTIFACT_VERSION {
            return Err(PipelineError::SerializationError(format!(
                "unsupported artifact version {}, expected {}",
                artifact.format_version, ARTIFACT_VERSION
            )));
        }

        Ok(Self {
            transformer: artifact.transformer,
            sampler: artifact.sampler,
            model: artifact.model,
            classes: artifact.classes,
            is_fitted: true,
        })
    }
}

/// Pull the label column out as an integer vector, rejecting nulls
fn extract_labels(df: &DataFrame) -> Result<Array1<i64>> {
    let column = df
        .column(LABEL_COLUMN)
        .map_err(|_| PipelineError::ColumnNotFound(LABEL_COLUMN.to_string()))?
        .as_materialized_series();
    if column.null_count() > 0 {
        return Err(PipelineError::DataError(format!(
            "label column '{}' contains {} nulls; clean the table first",
            LABEL_COLUMN,
            column.null_count()
        )));
    }
    let cast = column
        .cast(&DataType::Int64)
        .map_err(|e| PipelineError::DataError(e.to_string()))?;
    let ca = cast
        .i64()
        .map_err(|e| PipelineError::DataError(e.to_string()))?;
    Ok(ca.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Classifier;

    fn cleaned_table() -> DataFrame {
        // Two well-separated groups, imbalanced 8:4
        let gender: Vec<&str> = (0..12).map(|i| if i % 2 == 0 { "Male" } else { "Female" }).collect();
        let accident: Vec<&str> = (0..12).map(|i| if i < 8 { "No" } else { "Yes" }).collect();
        let premium: Vec<f64> = (0..12).map(|i| if i < 8 { 900.0 + i as f64 * 10.0 } else { 2_400.0 + i as f64 * 10.0 }).collect();
        let age: Vec<f64> = (0..12).map(|i| if i < 8 { 25.0 + i as f64 } else { 55.0 + i as f64 }).collect();
        let region: Vec<f64> = (0..12).map(|i| (i % 5) as f64).collect();
        let license: Vec<f64> = vec![1.0; 12];
        let switch: Vec<f64> = vec![0.0; 12];
        let label: Vec<i64> = (0..12).map(|i| if i < 8 { 0 } else { 1 }).collect();

        df!(
            "Gender" => gender,
            "RegionID" => region,
            "PastAccident" => accident,
            "AnnualPremium" => premium,
            "Age" => age,
            "HasDrivingLicense" => license,
            "Switch" => switch,
            "Result" => label,
        )
        .unwrap()
    }

    fn fitted_pipeline() -> TrainingPipeline {
        let model = Classifier::from_config(
            "RandomForestClassifier",
            &serde_json::json!({ "n_estimators": 15, "random_state": 3 }),
        )
        .unwrap();
        let mut pipeline = TrainingPipeline::new(model).with_sampler(Smote::new().with_seed(3));
        pipeline.fit(&cleaned_table()).unwrap();
        pipeline
    }

    #[test]
    fn test_fit_then_predict_separable() {
        let pipeline = fitted_pipeline();
        let preds = pipeline.predict(&cleaned_table()).unwrap();

        let expected: Vec<i64> = (0..12).map(|i| if i < 8 { 0 } else { 1 }).collect();
        assert_eq!(preds.to_vec(), expected);
        assert_eq!(pipeline.classes(), &[0, 1]);
    }

    #[test]
    fn test_predict_without_label_column() {
        let pipeline = fitted_pipeline();
        let unlabeled = cleaned_table().drop("Result").unwrap();
        let preds = pipeline.predict(&unlabeled).unwrap();
        assert_eq!(preds.len(), 12);
    }

    #[test]
    fn test_predict_requires_fit() {
        let model = Classifier::from_name("DecisionTreeClassifier").unwrap();
        let pipeline = TrainingPipeline::new(model);
        assert!(matches!(
            pipeline.predict(&cleaned_table()),
            Err(PipelineError::NotFitted(_))
        ));
    }

    #[test]
    fn test_null_label_rejected() {
        let mut df = cleaned_table();
        let mut labels: Vec<Option<i64>> = (0..12).map(|i| Some(if i < 8 { 0 } else { 1 })).collect();
        labels[3] = None;
        df.with_column(Series::new("Result".into(), labels)).unwrap();

        let model = Classifier::from_name("DecisionTreeClassifier").unwrap();
        let mut pipeline = TrainingPipeline::new(model);
        assert!(matches!(
            pipeline.fit(&df),
            Err(PipelineError::DataError(_))
        ));
    }

    #[test]
    fn test_save_load_round_trip() {
        let pipeline = fitted_pipeline();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");

        pipeline.save(&path).unwrap();
        let loaded = TrainingPipeline::load(&path).unwrap();

        assert!(loaded.is_fitted());
        assert_eq!(
            pipeline.predict_scores(&cleaned_table()).unwrap(),
            loaded.predict_scores(&cleaned_table()).unwrap()
        );
    }

    #[test]
    fn test_save_requires_fit() {
        let model = Classifier::from_name("DecisionTreeClassifier").unwrap();
        let pipeline = TrainingPipeline::new(model);
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            pipeline.save(dir.path().join("model.bin")),
            Err(PipelineError::NotFitted(_))
        ));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        fs::write(&path, b"not an artifact").unwrap();
        assert!(matches!(
            TrainingPipeline::load(&path),
            Err(PipelineError::SerializationError(_))
        ));
    }
}
