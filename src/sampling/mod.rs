//! Class-imbalance correction
//!
//! Oversampling runs between encoding and model fitting, on purely numeric
//! feature matrices, and only ever during training.

mod smote;

pub use smote::Smote;

use crate::error::Result;
use ndarray::{Array1, Array2};
use std::collections::HashMap;

/// Result of resampling: originals first, synthetic rows appended
#[derive(Debug, Clone)]
pub struct ResampleResult {
    pub x: Array2<f64>,
    pub y: Array1<i64>,
    /// Synthetic rows generated per class
    pub n_synthetic: HashMap<i64, usize>,
}

/// Trait for oversamplers
pub trait Sampler {
    /// Learn target class counts from the label distribution
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()>;

    /// Produce a resampled copy; inputs are never modified
    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult>;

    /// Fit and resample in one step
    fn fit_resample(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        self.fit(x, y)?;
        self.resample(x, y)
    }
}

/// Count rows per class
pub fn class_counts(y: &Array1<i64>) -> HashMap<i64, usize> {
    let mut counts = HashMap::new();
    for &label in y.iter() {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Row indices per class
pub fn class_indices(y: &Array1<i64>) -> HashMap<i64, Vec<usize>> {
    let mut indices: HashMap<i64, Vec<usize>> = HashMap::new();
    for (i, &label) in y.iter().enumerate() {
        indices.entry(label).or_default().push(i);
    }
    indices
}
