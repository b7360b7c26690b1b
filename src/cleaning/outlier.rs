//! IQR-based outlier bound for right-skewed cost columns

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Upper whisker computed from one numeric column.
///
/// Only the high side is bounded: the premium distribution is right-skewed,
/// so low values are ordinary and only extreme costs are filtered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IqrBound {
    pub q1: f64,
    pub q3: f64,
    pub upper: f64,
}

impl IqrBound {
    /// Compute Q1/Q3 (linear interpolation) and `Q3 + factor * IQR`
    pub fn from_column(df: &DataFrame, column: &str, factor: f64) -> Result<Self> {
        let series = df
            .column(column)
            .map_err(|_| PipelineError::ColumnNotFound(column.to_string()))?
            .as_materialized_series();
        let ca = series
            .cast(&DataType::Float64)
            .map_err(|e| PipelineError::DataError(e.to_string()))?
            .f64()
            .map_err(|e| PipelineError::DataError(e.to_string()))?
            .clone();

        let q1 = ca
            .quantile(0.25, QuantileMethod::Linear)
            .map_err(|e| PipelineError::DataError(e.to_string()))?
            .ok_or_else(|| Self::empty_column(column))?;
        let q3 = ca
            .quantile(0.75, QuantileMethod::Linear)
            .map_err(|e| PipelineError::DataError(e.to_string()))?
            .ok_or_else(|| Self::empty_column(column))?;

        let iqr = q3 - q1;
        Ok(Self {
            q1,
            q3,
            upper: q3 + factor * iqr,
        })
    }

    /// Keep only rows whose value is at or below the upper bound.
    ///
    /// Null values fail the comparison and are removed with the outliers.
    pub fn filter(&self, df: &DataFrame, column: &str) -> Result<DataFrame> {
        let series = df
            .column(column)
            .map_err(|_| PipelineError::ColumnNotFound(column.to_string()))?
            .as_materialized_series();
        let ca = series
            .cast(&DataType::Float64)
            .map_err(|e| PipelineError::DataError(e.to_string()))?
            .f64()
            .map_err(|e| PipelineError::DataError(e.to_string()))?
            .clone();

        let mask: BooleanChunked = ca
            .into_iter()
            .map(|opt| Some(opt.map(|v| v <= self.upper).unwrap_or(false)))
            .collect();

        let filtered = df
            .filter(&mask)
            .map_err(|e| PipelineError::DataError(e.to_string()))?;

        if filtered.height() == 0 {
            return Err(PipelineError::DataError(format!(
                "all rows removed as outliers in '{}' (upper bound {})",
                column, self.upper
            )));
        }

        Ok(filtered)
    }

    fn empty_column(column: &str) -> PipelineError {
        PipelineError::DataError(format!("column '{}' has no values for quantiles", column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_computation() {
        // Sorted: 900 980 1050 1100 1150 1300; interpolated at 1.25 and 3.75
        let df = df!("p" => &[1100.0, 980.0, 1300.0, 900.0, 1150.0, 1050.0]).unwrap();
        let bound = IqrBound::from_column(&df, "p", 1.5).unwrap();

        assert!((bound.q1 - 997.5).abs() < 1e-9);
        assert!((bound.q3 - 1137.5).abs() < 1e-9);
        assert!((bound.upper - (1137.5 + 1.5 * 140.0)).abs() < 1e-9);
    }

    #[test]
    fn test_filter_removes_only_high_outliers() {
        let df =
            df!("p" => &[1100.0, 980.0, 5_000_000.0, 900.0, 1150.0, 1050.0, 1300.0]).unwrap();
        let bound = IqrBound::from_column(&df, "p", 1.5).unwrap();
        let filtered = bound.filter(&df, "p").unwrap();

        assert_eq!(filtered.height(), 6);
        let col = filtered.column("p").unwrap().f64().unwrap();
        assert!(col.into_iter().flatten().all(|v| v <= bound.upper));
        // low values untouched
        assert!(col.into_iter().flatten().any(|v| (v - 900.0).abs() < 1e-9));
    }

    #[test]
    fn test_filter_drops_nulls() {
        let df = df!("p" => &[Some(100.0), None, Some(110.0)]).unwrap();
        let bound = IqrBound::from_column(&df, "p", 1.5).unwrap();
        let filtered = bound.filter(&df, "p").unwrap();
        assert_eq!(filtered.height(), 2);
    }

    #[test]
    fn test_all_rows_filtered_is_error() {
        let df = df!("p" => &[Some(f64::NAN)]).unwrap();
        // NaN comparisons fail, so every row is dropped
        let bound = IqrBound {
            q1: 0.0,
            q3: 1.0,
            upper: 2.5,
        };
        assert!(matches!(
            bound.filter(&df, "p"),
            Err(PipelineError::DataError(_))
        ));
    }
}
