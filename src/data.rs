//! Input schema and data loading

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;

/// Name of the binary label column
pub const LABEL_COLUMN: &str = "Result";

/// Currency-formatted premium column
pub const PREMIUM_COLUMN: &str = "AnnualPremium";

/// Columns with no predictive signal, dropped during cleaning
pub const DROPPED_COLUMNS: [&str; 4] = ["id", "SalesChannelID", "VehicleAge", "DaysSinceCreated"];

/// Columns that survive cleaning (label included)
pub const RETAINED_COLUMNS: [&str; 8] = [
    "Gender",
    "RegionID",
    "PastAccident",
    PREMIUM_COLUMN,
    "Age",
    "HasDrivingLicense",
    "Switch",
    LABEL_COLUMN,
];

/// Validate a table against the expected schema.
///
/// Every retained column must be present; the four droppable columns may be
/// present (raw table) or absent (already-cleaned table); anything else is a
/// schema mismatch.
pub fn validate_schema(df: &DataFrame) -> Result<()> {
    let present: HashSet<&str> = df
        .get_column_names()
        .iter()
        .map(|s| s.as_str())
        .collect();

    let missing: Vec<&str> = RETAINED_COLUMNS
        .iter()
        .filter(|c| !present.contains(**c))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::SchemaError(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }

    let known: HashSet<&str> = RETAINED_COLUMNS
        .iter()
        .chain(DROPPED_COLUMNS.iter())
        .copied()
        .collect();
    let extra: Vec<&str> = present.difference(&known).copied().collect();
    if !extra.is_empty() {
        let mut extra = extra;
        extra.sort_unstable();
        return Err(PipelineError::SchemaError(format!(
            "unexpected columns: {}",
            extra.join(", ")
        )));
    }

    Ok(())
}

/// CSV loader for raw tables
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    infer_schema_length: Option<usize>,
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(100),
        }
    }

    /// Set the number of rows used for dtype inference
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = Some(n);
        self
    }

    /// Load a CSV file and validate its schema
    pub fn load_csv(&self, path: &str) -> Result<DataFrame> {
        let file = File::open(path)
            .map_err(|e| PipelineError::DataError(format!("{}: {}", path, e)))?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| PipelineError::DataError(format!("{}: {}", path, e)))?;

        validate_schema(&df)?;
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame() -> DataFrame {
        df!(
            "id" => &[1i64, 2],
            "SalesChannelID" => &[10i64, 11],
            "VehicleAge" => &["new", "old"],
            "DaysSinceCreated" => &[100i64, 200],
            "Gender" => &["Male", "Female"],
            "RegionID" => &[3.0, 8.0],
            "PastAccident" => &["Yes", "No"],
            "AnnualPremium" => &["£1,200", "£980"],
            "Age" => &[34.0, 51.0],
            "HasDrivingLicense" => &[1i64, 1],
            "Switch" => &[0i64, 1],
            "Result" => &[0i64, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_raw_schema_valid() {
        assert!(validate_schema(&raw_frame()).is_ok());
    }

    #[test]
    fn test_cleaned_schema_valid() {
        let mut df = raw_frame();
        for col in DROPPED_COLUMNS {
            df = df.drop(col).unwrap();
        }
        assert!(validate_schema(&df).is_ok());
    }

    #[test]
    fn test_missing_column_rejected() {
        let df = raw_frame().drop("Age").unwrap();
        let err = validate_schema(&df).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaError(_)));
        assert!(err.to_string().contains("Age"));
    }

    #[test]
    fn test_extra_column_rejected() {
        let mut df = raw_frame();
        df.with_column(Series::new("Bonus".into(), &[1.0, 2.0]))
            .unwrap();
        let err = validate_schema(&df).unwrap_err();
        assert!(err.to_string().contains("Bonus"));
    }
}
