//! The pattern-concentration objective.
//!
//! For a cluster with `c` members having attribute `a`, the attribute contributes
//!
//! ```text
//! ((c * M + 1) / (total_a * M + K)) ^ P
//! ```
//!
//! where `total_a` is the dataset-wide positive count, `K` the number of live
//! clusters, `M` the multiplier and `P` the power. Only attributes set in a record
//! change when that record moves, so deltas are computed over
//! [`Dataset::attributes_set`] alone.

use crate::cluster::Cluster;
use crate::dataset::Dataset;

/// Direction of a hypothetical membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Add,
    Remove,
}

#[inline(always)]
fn concentration(count: usize, multiplier: f64, denom: f64, power: f64) -> f64 {
    ((count as f64 * multiplier + 1.0) / denom).powf(power)
}

#[inline(always)]
fn denominator(ds: &Dataset, attribute: usize, num_clusters: usize, multiplier: f64) -> f64 {
    let denom = ds.positive_count(attribute) as f64 * multiplier + num_clusters as f64;
    assert!(
        denom != 0.0,
        "zero denominator for attribute {attribute} with {num_clusters} clusters"
    );
    denom
}

/// Change in the score of `cluster` if `instance` were added to it or removed from it.
///
/// `num_clusters` must be the current number of live clusters. A record with no
/// attributes set always yields exactly `0.0`.
pub fn compute_delta(
    ds: &Dataset,
    cluster: &Cluster,
    instance: usize,
    num_clusters: usize,
    multiplier: f64,
    power: f64,
    change: Change,
) -> f64 {
    let mut delta = 0.0;

    for &attribute in ds.attributes_set(instance) {
        let count = cluster.attribute_count(attribute);
        let new_count = match change {
            Change::Add => count + 1,
            Change::Remove => {
                assert!(
                    count > 0,
                    "removing instance {instance} from a cluster with no members having attribute {attribute}"
                );
                count - 1
            }
        };

        let denom = denominator(ds, attribute, num_clusters, multiplier);
        delta -= concentration(count, multiplier, denom, power);
        delta += concentration(new_count, multiplier, denom, power);
    }

    delta
}

/// Score of a single cluster summed over every attribute.
pub fn cluster_score(
    ds: &Dataset,
    cluster: &Cluster,
    num_clusters: usize,
    multiplier: f64,
    power: f64,
) -> f64 {
    (0..ds.num_attributes())
        .map(|attribute| {
            let denom = denominator(ds, attribute, num_clusters, multiplier);
            concentration(cluster.attribute_count(attribute), multiplier, denom, power)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cluster_of(ds: &Dataset, instances: &[usize]) -> Cluster {
        let mut c = Cluster::new(ds.num_attributes());
        for &i in instances {
            c.add_instance(i);
            for &a in ds.attributes_set(i) {
                c.increment_attribute_count(a);
            }
        }
        c
    }

    fn dataset() -> Dataset {
        Dataset::from_rows(&[
            [true, false, true],
            [true, true, false],
            [false, false, false],
            [true, false, true],
        ])
        .unwrap()
    }

    #[test]
    fn record_without_attributes_has_zero_delta() {
        let ds = dataset();
        let c = cluster_of(&ds, &[0, 1, 2]);
        for k in 1..4 {
            assert_eq!(compute_delta(&ds, &c, 2, k, 1000.0, 10.0, Change::Add), 0.0);
            assert_eq!(compute_delta(&ds, &c, 2, k, 1000.0, 10.0, Change::Remove), 0.0);
        }
    }

    #[test]
    fn matches_hand_computation() {
        let ds = dataset();
        let c = cluster_of(&ds, &[1]);
        // Instance 0 has attributes 0 and 2. Counts in c: a0 = 1, a2 = 0.
        // Totals: a0 = 3, a2 = 2. M = 2, P = 2, K = 3.
        let (m, p, k) = (2.0, 2.0, 3);
        let d0 = 3.0 * m + k as f64;
        let d2 = 2.0 * m + k as f64;
        let expected = ((2.0 * m + 1.0) / d0).powf(p) - ((1.0 * m + 1.0) / d0).powf(p)
            + ((1.0 * m + 1.0) / d2).powf(p)
            - (1.0 / d2).powf(p);
        let delta = compute_delta(&ds, &c, 0, k, m, p, Change::Add);
        assert!((delta - expected).abs() < 1e-12, "{delta} != {expected}");
    }

    #[test]
    fn delta_equals_change_in_cluster_score() {
        let ds = dataset();
        let (m, p, k) = (1000.0, 10.0, 2);
        let mut c = cluster_of(&ds, &[0, 1]);

        let before = cluster_score(&ds, &c, k, m, p);
        let predicted = compute_delta(&ds, &c, 3, k, m, p, Change::Add);
        c.add_instance(3);
        for &a in ds.attributes_set(3) {
            c.increment_attribute_count(a);
        }
        let after = cluster_score(&ds, &c, k, m, p);
        assert!((after - before - predicted).abs() < 1e-9);

        // Removing it again undoes exactly the same amount
        let removal = compute_delta(&ds, &c, 3, k, m, p, Change::Remove);
        assert!((removal + predicted).abs() < 1e-9);
    }

    #[test]
    fn concentrating_an_attribute_is_rewarded() {
        let ds = dataset();
        // Instance 3 matches instance 0 exactly, and shares only a0 with instance 1
        let with_twin = cluster_of(&ds, &[0]);
        let with_other = cluster_of(&ds, &[1]);
        let twin = compute_delta(&ds, &with_twin, 3, 2, 1000.0, 10.0, Change::Add);
        let other = compute_delta(&ds, &with_other, 3, 2, 1000.0, 10.0, Change::Add);
        assert!(twin > other);
        assert!(other > 0.0);
    }

    #[test]
    #[should_panic(expected = "zero denominator")]
    fn zero_clusters_with_unused_attribute_panics() {
        let ds = Dataset::from_rows(&[[true, false]]).unwrap();
        let c = cluster_of(&ds, &[0]);
        cluster_score(&ds, &c, 0, 1000.0, 10.0);
    }

    #[test]
    #[should_panic(expected = "no members having attribute")]
    fn removing_from_wrong_cluster_panics() {
        let ds = dataset();
        let c = cluster_of(&ds, &[2]);
        compute_delta(&ds, &c, 0, 1, 1000.0, 10.0, Change::Remove);
    }
}
