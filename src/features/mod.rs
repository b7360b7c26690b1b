//! Column-wise feature transformation
//!
//! A declarative routing table maps each input column to a scaling or
//! encoding strategy. Fitted parameters are held per column and are frozen
//! after `fit`: `transform` applies them unchanged to any later table.

mod encoder;
mod scaler;

pub use encoder::OneHotVocabulary;
pub use scaler::ScalerParams;

use crate::error::{PipelineError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Transformation strategy for a set of columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformStrategy {
    /// `(x - min) / (max - min)`
    MinMax,
    /// `(x - mean) / std`
    Standardize,
    /// One slot per known category, all-zero for unknowns
    OneHot,
}

/// One (column set, strategy) binding in the routing table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBinding {
    pub columns: Vec<String>,
    pub strategy: TransformStrategy,
}

impl ColumnBinding {
    pub fn new<S: Into<String>>(columns: Vec<S>, strategy: TransformStrategy) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            strategy,
        }
    }
}

/// Fitted state for one bound column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedColumn {
    Scaled(ScalerParams),
    Encoded(OneHotVocabulary),
}

impl FittedColumn {
    fn width(&self) -> usize {
        match self {
            FittedColumn::Scaled(_) => 1,
            FittedColumn::Encoded(vocab) => vocab.width(),
        }
    }
}

/// Column-routing feature transformer.
///
/// Columns without a binding are dropped from the output, so the matrix
/// width is fully determined by the fitted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTransformer {
    bindings: Vec<ColumnBinding>,
    // (column name, fitted state), in binding order
    fitted: Vec<(String, FittedColumn)>,
    is_fitted: bool,
}

impl FeatureTransformer {
    pub fn new(bindings: Vec<ColumnBinding>) -> Self {
        Self {
            bindings,
            fitted: Vec::new(),
            is_fitted: false,
        }
    }

    /// Routing table for the cleaned insurance schema: min-max on the
    /// capped premium, standardization on age and region, one-hot on the
    /// nominal categories. Remaining columns are dropped.
    pub fn insurance_defaults() -> Self {
        Self::new(vec![
            ColumnBinding::new(vec!["AnnualPremium"], TransformStrategy::MinMax),
            ColumnBinding::new(vec!["Age", "RegionID"], TransformStrategy::Standardize),
            ColumnBinding::new(vec!["Gender", "PastAccident"], TransformStrategy::OneHot),
        ])
    }

    /// The routing table this transformer was built with
    pub fn bindings(&self) -> &[ColumnBinding] {
        &self.bindings
    }

    /// Fitted per-column state, in binding order
    pub fn fitted_columns(&self) -> &[(String, FittedColumn)] {
        &self.fitted
    }

    /// Width of the output matrix (requires fit)
    pub fn output_width(&self) -> Result<usize> {
        if !self.is_fitted {
            return Err(PipelineError::NotFitted("FeatureTransformer"));
        }
        Ok(self.fitted.iter().map(|(_, f)| f.width()).sum())
    }

    /// Names of output features, one per matrix column
    pub fn output_feature_names(&self) -> Result<Vec<String>> {
        if !self.is_fitted {
            return Err(PipelineError::NotFitted("FeatureTransformer"));
        }
        let mut names = Vec::new();
        for (col, fitted) in &self.fitted {
            match fitted {
                FittedColumn::Scaled(_) => names.push(col.clone()),
                FittedColumn::Encoded(vocab) => {
                    for cat in vocab.categories() {
                        names.push(format!("{}_{}", col, cat));
                    }
                }
            }
        }
        Ok(names)
    }

    /// Learn per-column parameters from the training table.
    ///
    /// Refitting discards all previously learned state.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let mut fitted = Vec::new();

        for binding in &self.bindings {
            for col in &binding.columns {
                let series = df
                    .column(col)
                    .map_err(|_| PipelineError::ColumnNotFound(col.clone()))?
                    .as_materialized_series();

                let state = match binding.strategy {
                    TransformStrategy::MinMax => {
                        FittedColumn::Scaled(ScalerParams::min_max(series)?)
                    }
                    TransformStrategy::Standardize => {
                        FittedColumn::Scaled(ScalerParams::standard(series)?)
                    }
                    TransformStrategy::OneHot => {
                        FittedColumn::Encoded(OneHotVocabulary::fit(series)?)
                    }
                };
                fitted.push((col.clone(), state));
            }
        }

        self.fitted = fitted;
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform a table into a dense feature matrix using the frozen state.
    ///
    /// Deterministic and repeatable: one output row per input row, fixed
    /// column count regardless of which categories appear.
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::NotFitted("FeatureTransformer"));
        }

        let n_rows = df.height();
        let width = self.output_width()?;
        let mut matrix = Array2::zeros((n_rows, width));

        let mut offset = 0;
        for (col, fitted) in &self.fitted {
            let series = df
                .column(col)
                .map_err(|_| PipelineError::ColumnNotFound(col.clone()))?
                .as_materialized_series();

            match fitted {
                FittedColumn::Scaled(params) => {
                    let ca = scaler::as_f64(series)?;
                    for (i, opt) in ca.into_iter().enumerate() {
                        let v = opt.ok_or_else(|| {
                            PipelineError::DataError(format!(
                                "null value in numeric column '{}' at row {}",
                                col, i
                            ))
                        })?;
                        matrix[[i, offset]] = params.apply(v);
                    }
                    offset += 1;
                }
                FittedColumn::Encoded(vocab) => {
                    let ca = series
                        .str()
                        .map_err(|e| PipelineError::DataError(e.to_string()))?;
                    let w = vocab.width();
                    let mut slots = vec![0.0; w];
                    for (i, opt) in ca.into_iter().enumerate() {
                        vocab.encode_into(opt, &mut slots);
                        for (j, &v) in slots.iter().enumerate() {
                            matrix[[i, offset + j]] = v;
                        }
                    }
                    offset += w;
                }
            }
        }

        Ok(matrix)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.transform(df)
    }
}
