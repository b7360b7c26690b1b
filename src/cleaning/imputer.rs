//! Per-column missing value imputation

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Strategy for filling missing values in one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Replace with the column median (numeric only)
    Median,
    /// Replace with the most frequent value
    MostFrequent,
    /// Replace with a constant number
    Constant(f64),
    /// Replace with a constant string (categorical)
    ConstantString(String),
}

/// Fill value learned during fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FillValue {
    Numeric(f64),
    Text(String),
}

/// Imputer bound to a single column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnImputer {
    column: String,
    strategy: ImputeStrategy,
    fill: Option<FillValue>,
}

impl ColumnImputer {
    pub fn new(column: impl Into<String>, strategy: ImputeStrategy) -> Self {
        Self {
            column: column.into(),
            strategy,
            fill: None,
        }
    }

    /// Column this imputer operates on
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Learned fill value, if fitted
    pub fn fill_value(&self) -> Option<&FillValue> {
        self.fill.as_ref()
    }

    /// Learn the fill value from the data
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let series = df
            .column(&self.column)
            .map_err(|_| PipelineError::ColumnNotFound(self.column.clone()))?
            .as_materialized_series();

        let fill = match &self.strategy {
            ImputeStrategy::Median => {
                let ca = Self::as_f64(series)?;
                let median = ca.median().ok_or_else(|| {
                    PipelineError::DataError(format!(
                        "column '{}' has no values to take a median of",
                        self.column
                    ))
                })?;
                FillValue::Numeric(median)
            }
            ImputeStrategy::MostFrequent => {
                if series.dtype() == &DataType::String {
                    FillValue::Text(Self::mode_string(series)?)
                } else {
                    FillValue::Numeric(Self::mode_numeric(series)?)
                }
            }
            ImputeStrategy::Constant(v) => FillValue::Numeric(*v),
            ImputeStrategy::ConstantString(s) => FillValue::Text(s.clone()),
        };

        self.fill = Some(fill);
        Ok(self)
    }

    /// Fill nulls in the bound column, returning the new table
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let fill = self
            .fill
            .as_ref()
            .ok_or(PipelineError::NotFitted("ColumnImputer"))?;

        let series = df
            .column(&self.column)
            .map_err(|_| PipelineError::ColumnNotFound(self.column.clone()))?
            .as_materialized_series();

        let filled = match fill {
            FillValue::Numeric(v) => {
                let ca = Self::as_f64(series)?;
                let out: Float64Chunked = ca
                    .into_iter()
                    .map(|opt| Some(opt.unwrap_or(*v)))
                    .collect();
                out.with_name(series.name().clone()).into_series()
            }
            FillValue::Text(s) => {
                let ca = series
                    .str()
                    .map_err(|e| PipelineError::DataError(e.to_string()))?;
                let out: StringChunked = ca
                    .into_iter()
                    .map(|opt| Some(opt.unwrap_or(s.as_str()).to_string()))
                    .collect();
                out.with_name(series.name().clone()).into_series()
            }
        };

        let mut result = df.clone();
        result
            .with_column(filled)
            .map_err(|e| PipelineError::DataError(e.to_string()))?;
        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }

    fn as_f64(series: &Series) -> Result<Float64Chunked> {
        let cast = series
            .cast(&DataType::Float64)
            .map_err(|e| PipelineError::DataError(e.to_string()))?;
        Ok(cast
            .f64()
            .map_err(|e| PipelineError::DataError(e.to_string()))?
            .clone())
    }

    /// Mode of a numeric column, keyed on the float's bit pattern
    fn mode_numeric(series: &Series) -> Result<f64> {
        let ca = Self::as_f64(series)?;
        let mut counts: HashMap<u64, usize> = HashMap::new();
        for val in ca.into_iter().flatten() {
            *counts.entry(val.to_bits()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .max_by_key(|&(_, count)| count)
            .map(|(bits, _)| f64::from_bits(bits))
            .ok_or_else(|| {
                PipelineError::DataError(format!(
                    "column '{}' has no values to take a mode of",
                    series.name()
                ))
            })
    }

    fn mode_string(series: &Series) -> Result<String> {
        let ca = series
            .str()
            .map_err(|e| PipelineError::DataError(e.to_string()))?;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for val in ca.into_iter().flatten() {
            *counts.entry(val).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .max_by_key(|&(_, count)| count)
            .map(|(s, _)| s.to_string())
            .ok_or_else(|| {
                PipelineError::DataError(format!(
                    "column '{}' has no values to take a mode of",
                    series.name()
                ))
            })
    }
}
