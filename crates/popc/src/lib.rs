//! Pattern-oriented clustering (POPC) of binary attribute matrices.
//!
//! Every record is assigned to exactly one cluster. Starting from an initial
//! partition, records are greedily moved between clusters while a move increases
//! how concentrated each attribute's positive records are inside clusters. The
//! result is a local optimum: no single-record move improves the score.
//!
//! ```
//! let ds = popc::Dataset::from_rows(&[
//!     [true, false],
//!     [true, false],
//!     [false, true],
//!     [false, true],
//! ])
//! .unwrap();
//!
//! let labels = popc::labels(&ds, &[0, 1, 0, 1]).unwrap();
//!
//! assert_eq!(labels[0], labels[1]);
//! assert_eq!(labels[2], labels[3]);
//! ```

pub mod cluster;
pub mod dataset;
#[cfg(feature = "_debug")]
pub mod kmeans;
#[cfg(not(feature = "_debug"))]
mod kmeans;
pub mod partition;
pub mod refine;
#[cfg(feature = "_debug")]
pub mod rng;
#[cfg(not(feature = "_debug"))]
mod rng;
pub mod score;

pub use cluster::Cluster;
pub use dataset::{Dataset, DatasetError};
pub use partition::{read_assignments, PartitionError};
pub use rng::DEFAULT_SEED;
pub use refine::{
    refine, CancelFlag, ClusterId, Clustering, Move, Observer, Params, PassSummary, RefineError,
    Refinement, Termination, DEFAULT_MULTIPLIER, DEFAULT_POWER,
};

use rand::RngExt;

/// Refine `initial` (one cluster id per record) with the default multiplier and
/// power, and return one dense cluster label per record.
///
/// Labels number the surviving clusters in the order of their initial ids; they are
/// otherwise unrelated to the initial ids.
pub fn labels(ds: &Dataset, initial: &[usize]) -> Result<Vec<usize>, RefineError> {
    labels_extra(ds, initial, DEFAULT_MULTIPLIER, DEFAULT_POWER)
}

/// Like [`labels`], with an explicit `multiplier` (M) and `power` (P) for the score.
pub fn labels_extra(
    ds: &Dataset,
    initial: &[usize],
    multiplier: f64,
    power: f64,
) -> Result<Vec<usize>, RefineError> {
    labels_extra_debug(ds, initial, &Params::new(multiplier, power), &mut ()).map(|r| r.labels)
}

/// Like [`labels_extra`], with a pass limit, an observer, and the run statistics.
pub fn labels_extra_debug(
    ds: &Dataset,
    initial: &[usize],
    params: &Params,
    observer: &mut impl Observer,
) -> Result<Refinement, RefineError> {
    let mut clustering = Clustering::from_assignments(ds, initial)?;
    refine(ds, &mut clustering, params, observer)
}

/// Initial partition from k-means with `num_instances / 2` clusters and the fixed seed.
pub fn initial_assignments(ds: &Dataset) -> Vec<usize> {
    initial_assignments_with(
        &mut rng::new(),
        ds,
        kmeans::default_num_clusters(ds.num_instances()),
    )
}

pub fn initial_assignments_with(rng: &mut impl RngExt, ds: &Dataset, k: usize) -> Vec<usize> {
    kmeans::initial_partition(rng, ds, k).assignments
}

/// Initial assignments from a generator seeded with `seed`.
pub fn initial_assignments_seeded(ds: &Dataset, k: usize, seed: u64) -> Vec<usize> {
    initial_assignments_with(&mut rng::with_seed(seed), ds, k)
}

/// Number of initial clusters the k-means initializer uses by default.
pub fn default_num_clusters(num_instances: usize) -> usize {
    kmeans::default_num_clusters(num_instances)
}
