//! Greedy move-based refinement of a partition.
//!
//! Each pass walks every live cluster in order and, for each member, looks for
//! the other live cluster whose gain from receiving it most exceeds the loss of
//! its current cluster. Strictly positive moves are applied immediately, and a
//! cluster that ends its scan empty is dropped for good. Refinement stops after
//! a pass without moves, or earlier on a pass limit or an observer's request.

use crate::cluster::{Cluster, Cursor};
use crate::dataset::Dataset;
use crate::score::{cluster_score, compute_delta, Change};
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

pub const DEFAULT_MULTIPLIER: f64 = 1000.0;
pub const DEFAULT_POWER: f64 = 10.0;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum RefineError {
    #[snafu(display("refinement requires at least one non-empty cluster"))]
    EmptyClustering,

    #[snafu(display("got {found} initial assignments for {expected} instances"))]
    AssignmentLengthMismatch { expected: usize, found: usize },

    #[snafu(display("clustering tracks {found} attributes, dataset has {expected}"))]
    AttributeCountMismatch { expected: usize, found: usize },

    #[snafu(display("multiplier must be positive and finite, got {value}"))]
    InvalidMultiplier { value: f64 },

    #[snafu(display("power must be positive and finite, got {value}"))]
    InvalidPower { value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    pub multiplier: f64,
    pub power: f64,
    /// Stop after this many passes even if moves are still being found.
    pub max_passes: Option<usize>,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            multiplier: DEFAULT_MULTIPLIER,
            power: DEFAULT_POWER,
            max_passes: None,
        }
    }
}

impl Params {
    pub fn new(multiplier: f64, power: f64) -> Self {
        Params {
            multiplier,
            power,
            max_passes: None,
        }
    }

    fn validate(&self) -> Result<(), RefineError> {
        ensure!(
            self.multiplier.is_finite() && self.multiplier > 0.0,
            InvalidMultiplierSnafu {
                value: self.multiplier
            }
        );
        ensure!(
            self.power.is_finite() && self.power > 0.0,
            InvalidPowerSnafu { value: self.power }
        );
        Ok(())
    }
}

/// Stable handle of a cluster. Handles are never reused, so a handle of a dropped
/// cluster can never alias a live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(usize);

impl ClusterId {
    /// Position of the cluster in the initial partition, counting only used ids.
    pub fn index(self) -> usize {
        self.0
    }
}

/// The live clusters being refined, in a fixed iteration order.
#[derive(Debug, Clone)]
pub struct Clustering {
    // Dropped clusters leave a `None` behind so handles stay put
    arena: Vec<Option<Cluster>>,
    live: Vec<ClusterId>,
    num_instances: usize,
}

impl Clustering {
    /// Build clusters from one initial cluster id per record.
    ///
    /// Ids need not be dense or small: only ids some record uses get a cluster,
    /// and live clusters keep the order of their ids.
    pub fn from_assignments(ds: &Dataset, assignments: &[usize]) -> Result<Self, RefineError> {
        ensure!(
            assignments.len() == ds.num_instances(),
            AssignmentLengthMismatchSnafu {
                expected: ds.num_instances(),
                found: assignments.len()
            }
        );

        // One cluster per id actually used, in ascending id order
        let mut positions: BTreeMap<usize, usize> =
            assignments.iter().map(|&cluster_id| (cluster_id, 0)).collect();
        for (position, slot) in positions.values_mut().enumerate() {
            *slot = position;
        }

        let mut clusters = vec![Cluster::new(ds.num_attributes()); positions.len()];
        for (instance, cluster_id) in assignments.iter().enumerate() {
            let cluster = &mut clusters[positions[cluster_id]];
            cluster.add_instance(instance);
            for &attribute in ds.attributes_set(instance) {
                cluster.increment_attribute_count(attribute);
            }
        }

        Ok(Self::from_clusters(ds.num_instances(), clusters))
    }

    /// Take over clusters assembled by the caller. Empty clusters are discarded.
    ///
    /// The caller guarantees that the clusters partition `0..num_instances` and that
    /// their attribute counts match their members.
    pub fn from_clusters(num_instances: usize, clusters: Vec<Cluster>) -> Self {
        let mut arena = Vec::with_capacity(clusters.len());
        let mut live = Vec::with_capacity(clusters.len());
        for (i, cluster) in clusters.into_iter().enumerate() {
            if cluster.is_empty() {
                arena.push(None);
            } else {
                arena.push(Some(cluster));
                live.push(ClusterId(i));
            }
        }

        Clustering {
            arena,
            live,
            num_instances,
        }
    }

    #[inline]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn num_instances(&self) -> usize {
        self.num_instances
    }

    /// Handles of the live clusters in iteration order.
    pub fn live(&self) -> &[ClusterId] {
        &self.live
    }

    /// The cluster behind `id`, or `None` once it has been dropped.
    pub fn get(&self, id: ClusterId) -> Option<&Cluster> {
        self.arena.get(id.0).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClusterId, &Cluster)> + '_ {
        self.live.iter().map(|&id| (id, self.cluster(id)))
    }

    fn cluster(&self, id: ClusterId) -> &Cluster {
        match &self.arena[id.0] {
            Some(cluster) => cluster,
            None => panic!("cluster {} has been dropped", id.0),
        }
    }

    /// One label per record: the position of its cluster among the live clusters.
    pub fn labels(&self) -> Vec<usize> {
        let mut labels = vec![0; self.num_instances];
        for (label, (_, cluster)) in self.iter().enumerate() {
            for instance in cluster {
                labels[instance] = label;
            }
        }
        labels
    }

    /// Total objective over all live clusters and attributes.
    pub fn score(&self, ds: &Dataset, multiplier: f64, power: f64) -> f64 {
        let k = self.live_count();
        self.iter()
            .map(|(_, cluster)| cluster_score(ds, cluster, k, multiplier, power))
            .sum()
    }

    /// Best destination for the record at `instance` of cluster `from`, with its gain.
    ///
    /// On equal gains the earliest live cluster wins. `None` when there is no other
    /// live cluster.
    fn best_move(
        &self,
        ds: &Dataset,
        from: ClusterId,
        instance: usize,
        params: &Params,
    ) -> Option<(ClusterId, f64)> {
        let k = self.live_count();
        let Params {
            multiplier, power, ..
        } = *params;

        let base = compute_delta(
            ds,
            self.cluster(from),
            instance,
            k,
            multiplier,
            power,
            Change::Remove,
        );

        let mut best: Option<(ClusterId, f64)> = None;
        for &to in self.live.iter().filter(|&&id| id != from) {
            let gain = base
                + compute_delta(
                    ds,
                    self.cluster(to),
                    instance,
                    k,
                    multiplier,
                    power,
                    Change::Add,
                );
            if best.is_none_or(|(_, largest)| gain > largest) {
                best = Some((to, gain));
            }
        }
        best
    }

    /// Move the record at `cursor` of `from` into `to`, returning the cursor to
    /// continue walking `from` with.
    fn move_instance(
        &mut self,
        ds: &Dataset,
        from: ClusterId,
        cursor: Cursor,
        to: ClusterId,
    ) -> Cursor {
        assert_ne!(from, to);
        let [Some(source), Some(destination)] = self
            .arena
            .get_disjoint_mut([from.0, to.0])
            .unwrap_or_else(|e| panic!("bad move from {} to {}: {e}", from.0, to.0))
        else {
            panic!("move between dropped clusters {} and {}", from.0, to.0);
        };

        let instance = source.get(cursor).expect("cursor points at a member");
        let next = source.remove_instance_at(cursor);
        destination.add_instance(instance);
        for &attribute in ds.attributes_set(instance) {
            source.decrement_attribute_count(attribute);
            destination.increment_attribute_count(attribute);
        }
        next
    }

    /// Run a single pass and return the number of moves made.
    fn pass(&mut self, ds: &Dataset, params: &Params, observer: &mut impl Observer) -> usize {
        let mut moves = 0;
        let mut position = 0;

        while position < self.live.len() {
            let from = self.live[position];
            let mut cursor = self.cluster(from).begin();

            while let Some(instance) = self.cluster(from).get(cursor) {
                match self.best_move(ds, from, instance, params) {
                    Some((to, gain)) if gain > 0.0 => {
                        cursor = self.move_instance(ds, from, cursor, to);
                        moves += 1;
                        trace!(instance, from = from.0, to = to.0, gain, "moved instance");
                        observer.on_move(
                            self,
                            &Move {
                                instance,
                                from,
                                to,
                                gain,
                            },
                        );
                    }
                    _ => cursor = self.cluster(from).advance(cursor),
                }
            }

            if self.cluster(from).is_empty() {
                self.live.remove(position);
                self.arena[from.0] = None;
                trace!(cluster = from.0, live = self.live.len(), "dropped empty cluster");
            } else {
                position += 1;
            }
        }

        moves
    }

    /// Check that the live clusters partition the records and that every attribute
    /// count matches the members. Returns a description of the first violation.
    ///
    /// The cluster being scanned may be empty until its scan ends, so empty live
    /// clusters are not a violation here.
    pub fn check_invariants(&self, ds: &Dataset) -> Result<(), String> {
        let mut seen = vec![false; self.num_instances];
        for (id, cluster) in self.iter() {
            let mut counts = vec![0usize; ds.num_attributes()];
            for instance in cluster {
                if std::mem::replace(&mut seen[instance], true) {
                    return Err(format!("instance {instance} is in more than one cluster"));
                }
                for &attribute in ds.attributes_set(instance) {
                    counts[attribute] += 1;
                }
            }
            for (attribute, &count) in counts.iter().enumerate() {
                if cluster.attribute_count(attribute) != count {
                    return Err(format!(
                        "cluster {} counts {} for attribute {attribute}, members have {count}",
                        id.0,
                        cluster.attribute_count(attribute)
                    ));
                }
            }
        }
        match seen.iter().position(|&s| !s) {
            Some(instance) => Err(format!("instance {instance} is not in any cluster")),
            None => Ok(()),
        }
    }
}

/// An accepted move of one record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Move {
    pub instance: usize,
    pub from: ClusterId,
    pub to: ClusterId,
    pub gain: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    /// 1-based number of the pass that just finished.
    pub pass: usize,
    pub moves: usize,
    pub live_clusters: usize,
}

/// Hooks called by [`refine`] while it runs.
pub trait Observer {
    /// Called after every accepted move, with the clustering already updated.
    fn on_move(&mut self, _clustering: &Clustering, _step: &Move) {}

    /// Called after every pass that made at least one move. Returning
    /// `ControlFlow::Break` stops refinement before the next pass.
    fn on_pass(&mut self, _clustering: &Clustering, _summary: &PassSummary) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

impl Observer for () {}

/// Cancels refinement at the next pass boundary once the flag is set.
#[derive(Debug, Clone, Copy)]
pub struct CancelFlag<'a>(pub &'a AtomicBool);

impl Observer for CancelFlag<'_> {
    fn on_pass(&mut self, _clustering: &Clustering, _summary: &PassSummary) -> ControlFlow<()> {
        if self.0.load(Ordering::Relaxed) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The last pass made no moves.
    Converged,
    PassLimit,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub labels: Vec<usize>,
    pub passes: usize,
    pub moves: usize,
    pub termination: Termination,
}

impl Refinement {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// Refine `clustering` in place until no single-record move improves the score.
pub fn refine(
    ds: &Dataset,
    clustering: &mut Clustering,
    params: &Params,
    observer: &mut impl Observer,
) -> Result<Refinement, RefineError> {
    params.validate()?;
    ensure!(clustering.live_count() > 0, EmptyClusteringSnafu);
    ensure!(
        clustering.num_instances == ds.num_instances(),
        AssignmentLengthMismatchSnafu {
            expected: ds.num_instances(),
            found: clustering.num_instances
        }
    );
    let tracked = clustering.cluster(clustering.live[0]).num_attributes();
    ensure!(
        tracked == ds.num_attributes(),
        AttributeCountMismatchSnafu {
            expected: ds.num_attributes(),
            found: tracked
        }
    );

    let mut passes = 0;
    let mut moves = 0;
    let termination = loop {
        if params.max_passes.is_some_and(|max| passes >= max) {
            break Termination::PassLimit;
        }

        let pass_moves = clustering.pass(ds, params, observer);
        passes += 1;
        moves += pass_moves;
        debug!(
            pass = passes,
            moves = pass_moves,
            live_clusters = clustering.live_count(),
            "finished pass"
        );

        if pass_moves == 0 {
            break Termination::Converged;
        }

        let summary = PassSummary {
            pass: passes,
            moves: pass_moves,
            live_clusters: clustering.live_count(),
        };
        if observer.on_pass(clustering, &summary).is_break() {
            break Termination::Cancelled;
        }
    };

    debug!(
        passes,
        moves,
        ?termination,
        live_clusters = clustering.live_count(),
        "refinement finished"
    );

    Ok(Refinement {
        labels: clustering.labels(),
        passes,
        moves,
        termination,
    })
}
