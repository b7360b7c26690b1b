//! Error types for the insurance pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input table does not match the expected column schema
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// A cell could not be parsed into the expected type
    #[error("Parse error in column '{column}', row {row}: cannot parse {value:?}")]
    ParseError {
        column: String,
        row: usize,
        value: String,
    },

    /// Invalid configuration (unknown model name, bad hyperparameter key)
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Data is unusable for the requested operation
    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Not fitted: {0} must be fitted before use")]
    NotFitted(&'static str),
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}
