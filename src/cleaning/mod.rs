//! Raw record cleaning
//!
//! Normalizes raw insurance-sales tables: drops uninformative columns,
//! removes unlabeled rows, parses the currency-formatted premium, imputes
//! missing values with column-specific rules, and filters high outliers.

mod imputer;
mod outlier;

pub use imputer::{ColumnImputer, FillValue, ImputeStrategy};
pub use outlier::IqrBound;

use crate::data::{validate_schema, DROPPED_COLUMNS, LABEL_COLUMN, PREMIUM_COLUMN};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use tracing::{debug, info};

/// Table cleaner.
///
/// Stateless by policy: imputation statistics and the outlier bound are
/// recomputed from each table passed to [`Cleaner::clean`], as the upstream
/// system does for train, test, and production data alike.
#[derive(Debug, Clone)]
pub struct Cleaner {
    iqr_factor: f64,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl Cleaner {
    pub fn new() -> Self {
        Self { iqr_factor: 1.5 }
    }

    /// Set the IQR whisker factor (default 1.5)
    pub fn with_iqr_factor(mut self, factor: f64) -> Self {
        self.iqr_factor = factor;
        self
    }

    /// Clean a raw (or already-cleaned) table.
    ///
    /// The input is not mutated; a new table is returned.
    pub fn clean(&self, df: &DataFrame) -> Result<DataFrame> {
        validate_schema(df)?;
        let rows_in = df.height();

        // Uninformative columns carry no signal; absent means already cleaned
        let mut data = df.clone();
        for col in DROPPED_COLUMNS {
            if data.column(col).is_ok() {
                data = data
                    .drop(col)
                    .map_err(|e| PipelineError::DataError(e.to_string()))?;
            }
        }

        data = self.drop_unlabeled(&data)?;
        data = self.parse_premium(&data)?;
        data = self.impute(&data)?;

        let bound = IqrBound::from_column(&data, PREMIUM_COLUMN, self.iqr_factor)?;
        debug!(
            q1 = bound.q1,
            q3 = bound.q3,
            upper = bound.upper,
            "premium outlier bound"
        );
        let cleaned = bound.filter(&data, PREMIUM_COLUMN)?;

        info!(
            rows_in,
            rows_out = cleaned.height(),
            "cleaned table"
        );
        Ok(cleaned)
    }

    /// Rows without a label cannot be used for fitting or scoring
    fn drop_unlabeled(&self, df: &DataFrame) -> Result<DataFrame> {
        let label = df
            .column(LABEL_COLUMN)
            .map_err(|_| PipelineError::ColumnNotFound(LABEL_COLUMN.to_string()))?
            .as_materialized_series();
        let mask = label.is_not_null();

        let filtered = df
            .filter(&mask)
            .map_err(|e| PipelineError::DataError(e.to_string()))?;
        if filtered.height() == 0 {
            return Err(PipelineError::DataError(
                "no labeled rows remain after dropping missing labels".to_string(),
            ));
        }
        Ok(filtered)
    }

    /// Parse the currency-formatted premium into Float64.
    ///
    /// Strips the pound sign and thousands separators. Null cells stay null
    /// (the outlier mask removes them later); any other unparseable value is
    /// a hard error. An already-numeric column is cast and passed through,
    /// which keeps cleaning idempotent.
    fn parse_premium(&self, df: &DataFrame) -> Result<DataFrame> {
        let series = df
            .column(PREMIUM_COLUMN)
            .map_err(|_| PipelineError::ColumnNotFound(PREMIUM_COLUMN.to_string()))?
            .as_materialized_series();

        let parsed: Series = if series.dtype() == &DataType::String {
            let ca = series
                .str()
                .map_err(|e| PipelineError::DataError(e.to_string()))?;
            let mut values: Vec<Option<f64>> = Vec::with_capacity(ca.len());
            for (row, opt) in ca.into_iter().enumerate() {
                match opt {
                    None => values.push(None),
                    Some(raw) => {
                        let stripped = raw.replace('£', "").replace(',', "");
                        let value = stripped.trim().parse::<f64>().map_err(|_| {
                            PipelineError::ParseError {
                                column: PREMIUM_COLUMN.to_string(),
                                row,
                                value: raw.to_string(),
                            }
                        })?;
                        values.push(Some(value));
                    }
                }
            }
            Series::new(PREMIUM_COLUMN.into(), values)
        } else {
            series
                .cast(&DataType::Float64)
                .map_err(|e| PipelineError::DataError(e.to_string()))?
        };

        let mut result = df.clone();
        result
            .with_column(parsed)
            .map_err(|e| PipelineError::DataError(e.to_string()))?;
        Ok(result)
    }

    /// Column-specific imputation rules, fit on the table being cleaned
    fn impute(&self, df: &DataFrame) -> Result<DataFrame> {
        let rules = [
            ColumnImputer::new("Gender", ImputeStrategy::MostFrequent),
            ColumnImputer::new("RegionID", ImputeStrategy::MostFrequent),
            ColumnImputer::new("Age", ImputeStrategy::Median),
            ColumnImputer::new("HasDrivingLicense", ImputeStrategy::Constant(1.0)),
            ColumnImputer::new("Switch", ImputeStrategy::Constant(-1.0)),
            ColumnImputer::new(
                "PastAccident",
                ImputeStrategy::ConstantString("Unknown".to_string()),
            ),
        ];

        let mut data = df.clone();
        for mut rule in rules {
            data = rule.fit_transform(&data)?;
        }
        Ok(data)
    }
}
