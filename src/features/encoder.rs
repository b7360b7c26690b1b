//! One-hot vocabulary for categorical columns

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fitted one-hot vocabulary for one column.
///
/// Categories are sorted so the encoding layout is deterministic across
/// fits. A value absent from the vocabulary (or null) encodes as all zeros,
/// which keeps inference alive on novel categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotVocabulary {
    categories: Vec<String>,
}

impl OneHotVocabulary {
    /// Learn the sorted category set from a string column
    pub fn fit(series: &Series) -> Result<Self> {
        let ca = series
            .str()
            .map_err(|e| PipelineError::DataError(e.to_string()))?;

        let set: BTreeSet<&str> = ca.into_iter().flatten().collect();
        Ok(Self {
            categories: set.into_iter().map(str::to_string).collect(),
        })
    }

    /// Number of output slots
    pub fn width(&self) -> usize {
        self.categories.len()
    }

    /// Known categories, sorted
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Slot index for a value, if known
    pub fn slot(&self, value: &str) -> Option<usize> {
        self.categories.binary_search_by(|c| c.as_str().cmp(value)).ok()
    }

    /// Write the encoding of `value` into `out` (length [`Self::width`])
    pub fn encode_into(&self, value: Option<&str>, out: &mut [f64]) {
        out.fill(0.0);
        if let Some(idx) = value.and_then(|v| self.slot(v)) {
            out[idx] = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_vocabulary() {
        let s = Series::new("g".into(), &["Male", "Female", "Male"]);
        let vocab = OneHotVocabulary::fit(&s).unwrap();
        assert_eq!(vocab.categories(), &["Female".to_string(), "Male".to_string()]);
        assert_eq!(vocab.width(), 2);
    }

    #[test]
    fn test_encode_known_and_unknown() {
        let s = Series::new("g".into(), &["Male", "Female"]);
        let vocab = OneHotVocabulary::fit(&s).unwrap();

        let mut out = vec![0.0; vocab.width()];
        vocab.encode_into(Some("Male"), &mut out);
        assert_eq!(out, vec![0.0, 1.0]);

        vocab.encode_into(Some("Other"), &mut out);
        assert_eq!(out, vec![0.0, 0.0]);

        vocab.encode_into(None, &mut out);
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn test_null_values_not_in_vocabulary() {
        let s = Series::new("g".into(), &[Some("Yes"), None, Some("No")]);
        let vocab = OneHotVocabulary::fit(&s).unwrap();
        assert_eq!(vocab.width(), 2);
    }
}
