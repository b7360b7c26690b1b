//! Insurance sales prediction pipeline
//!
//! Tabular ML pipeline for predicting insurance purchase outcomes:
//! - Raw table cleaning with column-specific imputation and IQR outlier capping
//! - Column-routed feature scaling and one-hot encoding
//! - SMOTE oversampling for the imbalanced positive class
//! - Tree-based classifiers behind a configuration-driven factory
//! - Accuracy, classification report, and ROC AUC evaluation
//!
//! # Modules
//! - [`data`] - Input schema and CSV loading
//! - [`cleaning`] - Raw record cleaning
//! - [`features`] - Column-wise feature transformation
//! - [`sampling`] - Class-imbalance correction
//! - [`models`] - Model variants and the name-keyed factory
//! - [`pipeline`] - End-to-end training pipeline with artifact persistence
//! - [`evaluation`] - Model quality metrics
//! - [`config`] - JSON application configuration

pub mod cleaning;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod models;
pub mod pipeline;
pub mod sampling;

pub use cleaning::Cleaner;
pub use config::AppConfig;
pub use data::DataLoader;
pub use error::{PipelineError, Result};
pub use evaluation::{EvaluationResult, Evaluator};
pub use features::FeatureTransformer;
pub use models::Classifier;
pub use pipeline::TrainingPipeline;
pub use sampling::{Sampler, Smote};
