//! Initial partition for refinement: Lloyd's k-means over the binary rows.
//!
//! Initial centroids are `k` distinct records drawn uniformly at random. Distances
//! are computed from the attribute-presence lists, so each one costs
//! O(attributes set in the record) after a per-centroid norm.

use crate::dataset::Dataset;
use rand::RngExt;
use tracing::debug;

// sklearn KMeans defaults
pub const MAX_ITER: usize = 300;
pub const CONVERGENCE_TOLERANCE: f32 = 1e-4;

/// Number of initial clusters used when the caller does not pick one.
pub fn default_num_clusters(num_instances: usize) -> usize {
    (num_instances / 2).max(1)
}

#[derive(Debug)]
pub struct Partition {
    /// Cluster id in `0..k` for every record.
    pub assignments: Vec<usize>,
    pub iterations: usize,
    pub converged: bool,
}

/// Row-major `k × num_attributes` centroids with cached squared norms.
#[derive(Debug, Clone)]
struct Centroids {
    values: Vec<f32>,
    norms: Vec<f32>,
    num_attributes: usize,
}

impl Centroids {
    fn zeroed(k: usize, num_attributes: usize) -> Self {
        Centroids {
            values: vec![0.0; k * num_attributes],
            norms: vec![0.0; k],
            num_attributes,
        }
    }

    fn centroid(&self, c: usize) -> &[f32] {
        &self.values[c * self.num_attributes..(c + 1) * self.num_attributes]
    }

    fn set_to_record(&mut self, c: usize, ds: &Dataset, instance: usize) {
        let n = self.num_attributes;
        let centroid = &mut self.values[c * n..(c + 1) * n];
        centroid.fill(0.0);
        for &a in ds.attributes_set(instance) {
            centroid[a] = 1.0;
        }
        self.norms[c] = ds.attributes_set(instance).len() as f32;
    }
}

/// Squared euclidean distance between a 0/1 record and a centroid:
/// `|c|² - 2·x·c + |x|²`, where `|x|²` is the number of attributes set.
#[inline(always)]
fn squared_distance(centroid: &[f32], norm: f32, present: &[usize]) -> f32 {
    let dot: f32 = present.iter().map(|&a| centroid[a]).sum();
    norm - 2.0 * dot + present.len() as f32
}

/// `k` distinct indices from `0..n`, by a partial Fisher-Yates shuffle.
fn sample_distinct(rng: &mut impl RngExt, n: usize, k: usize) -> Vec<usize> {
    assert!(k <= n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.random_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

fn assign_points(ds: &Dataset, centroids: &Centroids, assignments: &mut [usize]) {
    let k = centroids.norms.len();
    for (i, assignment) in assignments.iter_mut().enumerate() {
        let present = ds.attributes_set(i);
        let mut min = f32::MAX;
        let mut min_idx = 0;
        for c in 0..k {
            let d = squared_distance(centroids.centroid(c), centroids.norms[c], present);
            if d < min {
                min = d;
                min_idx = c;
            }
        }
        *assignment = min_idx;
    }
}

#[derive(Debug)]
struct UpdateResult {
    shift_squared: f32,
    counts: Vec<usize>,
}

fn update_centroids(
    ds: &Dataset,
    assignments: &[usize],
    centroids: &mut Centroids,
) -> UpdateResult {
    let k = centroids.norms.len();
    let n = centroids.num_attributes;
    let mut counts = vec![0usize; k];
    let mut sums = vec![0f32; k * n];

    for (i, &c) in assignments.iter().enumerate() {
        assert!(c < k);
        counts[c] += 1;
        for &a in ds.attributes_set(i) {
            sums[c * n + a] += 1.0;
        }
    }

    let mut shift_squared = 0f32;
    for c in 0..k {
        if counts[c] == 0 {
            // It's an empty cluster, it gets reseeded by the caller
            continue;
        }

        let count = counts[c] as f32;
        let mut norm = 0f32;
        for a in 0..n {
            let new = sums[c * n + a] / count;
            let old = std::mem::replace(&mut centroids.values[c * n + a], new);
            let d = old - new;
            shift_squared = d.mul_add(d, shift_squared);
            norm = new.mul_add(new, norm);
        }
        centroids.norms[c] = norm;
    }

    UpdateResult {
        shift_squared,
        counts,
    }
}

/// Partition `ds` into at most `k` clusters. `k` is clamped to `1..=num_instances`.
pub fn initial_partition(rng: &mut impl RngExt, ds: &Dataset, k: usize) -> Partition {
    let n = ds.num_instances();
    let k = k.clamp(1, n);

    let mut centroids = Centroids::zeroed(k, ds.num_attributes());
    for (c, instance) in sample_distinct(rng, n, k).into_iter().enumerate() {
        centroids.set_to_record(c, ds, instance);
    }

    let mut assignments = vec![0usize; n];
    for i in 0..MAX_ITER {
        assign_points(ds, &centroids, &mut assignments);
        let update_result = update_centroids(ds, &assignments, &mut centroids);

        for (c, count) in update_result.counts.iter().copied().enumerate() {
            if count == 0 {
                let random_point = rng.random_range(0..n);
                centroids.set_to_record(c, ds, random_point);
            }
        }

        if update_result.shift_squared < CONVERGENCE_TOLERANCE {
            debug!(k, iterations = i + 1, "k-means converged");
            return Partition {
                assignments,
                iterations: i + 1,
                converged: true,
            };
        }
    }

    debug!(k, iterations = MAX_ITER, "k-means hit the iteration limit");
    Partition {
        assignments,
        iterations: MAX_ITER,
        converged: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng;
    use pretty_assertions::{assert_eq, assert_ne};

    fn two_groups() -> Dataset {
        let a = [true, true, false, false, true];
        let b = [false, false, true, true, false];
        Dataset::from_rows(&[a, b, a, b, a, b, a, b]).unwrap()
    }

    #[test]
    fn default_is_half_the_instances() {
        assert_eq!(default_num_clusters(10), 5);
        assert_eq!(default_num_clusters(3), 1);
        assert_eq!(default_num_clusters(1), 1);
        assert_eq!(default_num_clusters(0), 1);
    }

    #[test]
    fn sparse_distance_matches_dense() {
        let centroid = [0.5, 0.0, 1.0, 0.25];
        let norm: f32 = centroid.iter().map(|c| c * c).sum();
        let row = [1.0f32, 1.0, 0.0, 1.0];
        let dense: f32 = centroid
            .iter()
            .zip(row)
            .map(|(c, x)| (c - x) * (c - x))
            .sum();
        let sparse = squared_distance(&centroid, norm, &[0, 1, 3]);
        assert!((dense - sparse).abs() < 1e-6, "{dense} != {sparse}");
    }

    #[test]
    fn sample_distinct_has_no_repeats() {
        let mut rng = rng::new();
        let mut picked = sample_distinct(&mut rng, 10, 10);
        picked.sort();
        assert_eq!(picked, (0..10).collect::<Vec<_>>());
        assert_eq!(sample_distinct(&mut rng, 10, 3).len(), 3);
    }

    #[test]
    fn separates_two_groups() {
        let ds = two_groups();
        let mut rng = rng::new();
        let result = initial_partition(&mut rng, &ds, 2);
        assert!(result.converged);

        let labels = &result.assignments;
        for i in (0..8).step_by(2) {
            assert_eq!(labels[i], labels[0]);
            assert_eq!(labels[i + 1], labels[1]);
        }
        assert_ne!(labels[0], labels[1]);
    }

    #[test]
    fn assignments_are_in_range() {
        let ds = two_groups();
        let mut rng = rng::new();
        for k in [1, 3, 4, 8, 100] {
            let result = initial_partition(&mut rng, &ds, k);
            assert_eq!(result.assignments.len(), 8);
            let bound = k.min(8);
            assert!(result.assignments.iter().all(|&c| c < bound));
            assert!(result.iterations >= 1);
        }
    }

    #[test]
    fn seeded_runs_agree() {
        let ds = two_groups();
        let a = initial_partition(&mut rng::with_seed(7), &ds, 4).assignments;
        let b = initial_partition(&mut rng::with_seed(7), &ds, 4).assignments;
        assert_eq!(a, b);
    }

    #[test]
    fn update_moves_centroid_to_mean() {
        let ds = Dataset::from_rows(&[[true, false], [true, true]]).unwrap();
        let mut centroids = Centroids::zeroed(1, 2);
        let result = update_centroids(&ds, &[0, 0], &mut centroids);
        assert_eq!(centroids.centroid(0), &[1.0, 0.5]);
        assert!((centroids.norms[0] - 1.25).abs() < 1e-6);
        assert!((result.shift_squared - 1.25).abs() < 1e-6);
        assert_eq!(result.counts, vec![2]);
    }
}
