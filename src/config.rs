//! Application configuration
//!
//! The model choice, its hyperparameters, and the artifact directory come
//! from a JSON file so experiments swap models without a rebuild.

use crate::error::{PipelineError, Result};
use crate::models::KNOWN_MODEL_NAMES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Model selection block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Public model name, one of [`KNOWN_MODEL_NAMES`]
    pub name: String,
    /// Hyperparameters forwarded to the factory
    #[serde(default = "default_params")]
    pub params: serde_json::Value,
    /// Directory the trained artifact is written to
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_params() -> serde_json::Value {
    serde_json::json!({})
}

fn default_store_path() -> PathBuf {
    PathBuf::from("models")
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
}

impl AppConfig {
    /// Read and validate a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: AppConfig = serde_json::from_str(&text)
            .map_err(|e| PipelineError::ConfigError(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject unknown model names up front, before any data is touched
    pub fn validate(&self) -> Result<()> {
        if !KNOWN_MODEL_NAMES.contains(&self.model.name.as_str()) {
            return Err(PipelineError::ConfigError(format!(
                "unknown model '{}', expected one of {:?}",
                self.model.name, KNOWN_MODEL_NAMES
            )));
        }
        Ok(())
    }

    /// Path the trained pipeline artifact is saved to
    pub fn model_file_path(&self) -> PathBuf {
        self.model.store_path.join("model.bin")
    }
}
