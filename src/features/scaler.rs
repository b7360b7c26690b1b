//! Numeric column scaling parameters

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Fitted affine scaling for one column: `(x - center) / scale`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub center: f64,
    pub scale: f64,
}

impl ScalerParams {
    /// Min-max scaling: center = min, scale = max - min
    pub fn min_max(series: &Series) -> Result<Self> {
        let ca = as_f64(series)?;
        let min = ca.min().unwrap_or(0.0);
        let max = ca.max().unwrap_or(1.0);
        let range = max - min;
        Ok(Self {
            center: min,
            scale: if range == 0.0 { 1.0 } else { range },
        })
    }

    /// Z-score standardization: center = mean, scale = std (ddof 1)
    pub fn standard(series: &Series) -> Result<Self> {
        let ca = as_f64(series)?;
        let mean = ca.mean().unwrap_or(0.0);
        let std = ca.std(1).unwrap_or(1.0);
        Ok(Self {
            center: mean,
            scale: if std == 0.0 { 1.0 } else { std },
        })
    }

    /// Apply the fitted scaling to one value
    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        (value - self.center) / self.scale
    }
}

pub(crate) fn as_f64(series: &Series) -> Result<Float64Chunked> {
    let cast = series
        .cast(&DataType::Float64)
        .map_err(|e| PipelineError::DataError(e.to_string()))?;
    Ok(cast
        .f64()
        .map_err(|e| PipelineError::DataError(e.to_string()))?
        .clone())
}
