//! SMOTE minority oversampling

use crate::error::{PipelineError, Result};
use crate::sampling::{class_counts, class_indices, ResampleResult, Sampler};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Ordered (distance, index) pair for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// Synthetic Minority Over-sampling Technique.
///
/// New minority rows are interpolated between a random minority sample and
/// one of its k nearest same-class neighbors until each class reaches
/// `sampling_strategy` times the majority count (1.0 balances exactly).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Smote {
    k_neighbors: usize,
    sampling_strategy: f64,
    seed: Option<u64>,
    target_counts: Option<HashMap<i64, usize>>,
}

impl Default for Smote {
    fn default() -> Self {
        Self::new()
    }
}

impl Smote {
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            sampling_strategy: 1.0,
            seed: None,
            target_counts: None,
        }
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    /// Target minority-to-majority ratio
    pub fn with_sampling_strategy(mut self, ratio: f64) -> Self {
        self.sampling_strategy = ratio.clamp(0.1, 1.0);
        self
    }

    /// Seed for reproducible interpolation
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    fn distance(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// k nearest same-class neighbors of `point`, excluding itself
    fn find_neighbors(point_idx: usize, samples: &[Vec<f64>], k: usize) -> Vec<usize> {
        let point = &samples[point_idx];
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);

        for (i, candidate) in samples.iter().enumerate() {
            if i == point_idx {
                continue;
            }
            let dist = Self::distance(point, candidate);
            if heap.len() < k {
                heap.push(DistIdx(dist, i));
            } else if let Some(&DistIdx(max_dist, _)) = heap.peek() {
                if dist < max_dist {
                    heap.pop();
                    heap.push(DistIdx(dist, i));
                }
            }
        }

        heap.into_iter().map(|DistIdx(_, i)| i).collect()
    }

    fn interpolate(point: &[f64], neighbor: &[f64], rng: &mut StdRng) -> Vec<f64> {
        let gap: f64 = rng.gen();
        point
            .iter()
            .zip(neighbor.iter())
            .map(|(&p, &n)| p + gap * (n - p))
            .collect()
    }
}

impl Sampler for Smote {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        let counts = class_counts(y);
        if counts.len() < 2 {
            return Err(PipelineError::DataError(
                "resampling needs at least two classes".to_string(),
            ));
        }

        let max_count = *counts.values().max().expect("non-empty counts");
        let target = (max_count as f64 * self.sampling_strategy).round() as usize;

        let targets = counts
            .iter()
            .map(|(&class, &count)| (class, target.max(count).min(max_count.max(count))))
            .collect();
        self.target_counts = Some(targets);
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let targets = self
            .target_counts
            .as_ref()
            .ok_or(PipelineError::NotFitted("Smote"))?;

        if x.nrows() != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let indices = class_indices(y);
        let counts = class_counts(y);
        let n_features = x.ncols();

        let mut synthetic_x: Vec<Vec<f64>> = Vec::new();
        let mut synthetic_y: Vec<i64> = Vec::new();
        let mut n_synthetic: HashMap<i64, usize> = HashMap::new();

        let mut classes: Vec<i64> = targets.keys().copied().collect();
        classes.sort_unstable();

        for class in classes {
            let target_count = targets[&class];
            let current_count = counts.get(&class).copied().unwrap_or(0);
            let n_to_generate = target_count.saturating_sub(current_count);
            n_synthetic.insert(class, n_to_generate);
            if n_to_generate == 0 {
                continue;
            }

            let class_idx = indices
                .get(&class)
                .ok_or_else(|| PipelineError::DataError(format!("class {} absent", class)))?;
            let class_samples: Vec<Vec<f64>> = class_idx
                .iter()
                .map(|&i| x.row(i).iter().copied().collect())
                .collect();

            if class_samples.len() == 1 {
                // A lone sample has no neighbor to interpolate toward
                for _ in 0..n_to_generate {
                    synthetic_x.push(class_samples[0].clone());
                    synthetic_y.push(class);
                }
                continue;
            }

            let k = self.k_neighbors.min(class_samples.len() - 1);
            for _ in 0..n_to_generate {
                let idx = rng.gen_range(0..class_samples.len());
                let neighbors = Self::find_neighbors(idx, &class_samples, k);
                let neighbor_idx = neighbors[rng.gen_range(0..neighbors.len())];
                synthetic_x.push(Self::interpolate(
                    &class_samples[idx],
                    &class_samples[neighbor_idx],
                    &mut rng,
                ));
                synthetic_y.push(class);
            }
        }

        let n_original = x.nrows();
        let n_total = n_original + synthetic_x.len();
        let result_x = Array2::from_shape_fn((n_total, n_features), |(i, j)| {
            if i < n_original {
                x[[i, j]]
            } else {
                synthetic_x[i - n_original][j]
            }
        });

        let mut all_y: Vec<i64> = y.iter().copied().collect();
        all_y.extend_from_slice(&synthetic_y);

        Ok(ResampleResult {
            x: result_x,
            y: Array1::from_vec(all_y),
            n_synthetic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imbalanced_data() -> (Array2<f64>, Array1<i64>) {
        // 20 majority around the origin, 5 minority around (10, 10)
        let mut data = Vec::new();
        let mut labels = Vec::new();

        for i in 0..20 {
            data.push((i % 5) as f64);
            data.push((i / 5) as f64);
            labels.push(0i64);
        }
        for i in 0..5 {
            data.push(10.0 + (i % 3) as f64);
            data.push(10.0 + (i / 3) as f64);
            labels.push(1i64);
        }

        (
            Array2::from_shape_vec((25, 2), data).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_balances_exactly() {
        let (x, y) = imbalanced_data();
        let mut smote = Smote::new().with_k_neighbors(3).with_seed(42);
        let result = smote.fit_resample(&x, &y).unwrap();

        let counts = class_counts(&result.y);
        assert_eq!(counts[&0], counts[&1]);
        assert_eq!(counts[&1], 20);
        assert_eq!(result.n_synthetic[&1], 15);
        assert_eq!(result.n_synthetic[&0], 0);
    }

    #[test]
    fn test_originals_preserved_and_inputs_untouched() {
        let (x, y) = imbalanced_data();
        let x_before = x.clone();
        let y_before = y.clone();

        let mut smote = Smote::new().with_seed(42);
        let result = smote.fit_resample(&x, &y).unwrap();

        assert_eq!(x, x_before);
        assert_eq!(y, y_before);
        for i in 0..x.nrows() {
            for j in 0..x.ncols() {
                assert_eq!(result.x[[i, j]], x[[i, j]]);
            }
        }
    }

    #[test]
    fn test_synthetic_rows_interpolate_minority() {
        let (x, y) = imbalanced_data();
        let mut smote = Smote::new().with_k_neighbors(3).with_seed(7);
        let result = smote.fit_resample(&x, &y).unwrap();

        // Synthetic minority rows must lie in the minority cluster's hull
        for i in x.nrows()..result.x.nrows() {
            assert!(result.x[[i, 0]] >= 10.0 && result.x[[i, 0]] <= 12.0);
            assert!(result.x[[i, 1]] >= 10.0 && result.x[[i, 1]] <= 12.0);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let (x, y) = imbalanced_data();

        let mut a = Smote::new().with_seed(99);
        let mut b = Smote::new().with_seed(99);
        let ra = a.fit_resample(&x, &y).unwrap();
        let rb = b.fit_resample(&x, &y).unwrap();

        assert_eq!(ra.x, rb.x);
        assert_eq!(ra.y, rb.y);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = Array2::zeros((4, 2));
        let y = Array1::from_vec(vec![1i64, 1, 1, 1]);
        let mut smote = Smote::new();
        assert!(matches!(
            smote.fit(&x, &y),
            Err(PipelineError::DataError(_))
        ));
    }

    #[test]
    fn test_lone_minority_sample_duplicated() {
        let x = Array2::from_shape_vec(
            (4, 1),
            vec![0.0, 1.0, 2.0, 50.0],
        )
        .unwrap();
        let y = Array1::from_vec(vec![0i64, 0, 0, 1]);

        let mut smote = Smote::new().with_seed(1);
        let result = smote.fit_resample(&x, &y).unwrap();

        let counts = class_counts(&result.y);
        assert_eq!(counts[&1], 3);
        // Duplicates of the single sample
        for i in 4..result.x.nrows() {
            assert_eq!(result.x[[i, 0]], 50.0);
        }
    }
}
