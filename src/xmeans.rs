//! X-Means: K-Means that discovers the number of clusters.
//!
//! Starting from `lower_k`, each **sweep** does two things:
//!
//! 1. *improve params*: run K-Means over the whole dataset, seeded with the
//!    current centroids (random ones on the first sweep).
//! 2. *improve structure*: for every cluster `i` in ascending order, try to
//!    bisect it with a 2-means run on a copy of its members and keep the
//!    split only if its BIC beats the unsplit cluster's BIC. An accepted
//!    split moves one side to a brand-new cluster id taken from a running
//!    counter, so later splits in the same sweep get higher ids.
//!
//! Each sweep records a [`Candidate`] (BIC of the whole partition plus
//! snapshots of assignments and centroids). Sweeps repeat while a split was
//! accepted and `K` is still within `upper_k`; the best-scoring candidate
//! over all sweeps is the result.
//!
//! # Example
//!
//! ```
//! use u_xmeans::dataset::Dataset;
//! use u_xmeans::xmeans::{xmeans, XMeansConfig};
//!
//! let mut points = Vec::new();
//! for (g, (cx, cy)) in [(0.0, 0.0), (20.0, 0.0), (0.0, 20.0)].into_iter().enumerate() {
//!     for (i, (dx, dy)) in [(0.0, 0.0), (0.2, 0.1), (-0.1, 0.3), (0.3, -0.2), (-0.2, -0.1)]
//!         .into_iter()
//!         .enumerate()
//!     {
//!         points.push((format!("g{g}p{i}"), vec![cx + dx, cy + dy]));
//!     }
//! }
//! let data = Dataset::from_points(points).unwrap();
//! let config = XMeansConfig::new(1, 6).seed(Some(42));
//! let result = xmeans(data, &config).unwrap();
//!
//! assert!(result.best.k >= 1);
//! assert_eq!(result.best.data.len(), 15);
//! ```

use std::collections::BTreeMap;

use rand::Rng;
use tracing::{debug, info};

use crate::bic::{bic_score, bic_score_single};
use crate::dataset::{CentroidSet, Dataset};
use crate::error::{ClusterError, Result};
use crate::kmeans::{make_rng, KMeans};
use crate::monitor::{ExecutionMonitor, NoopMonitor, Progress};

/// Default iteration cap for every K-Means run inside X-Means.
pub const DEFAULT_MAX_ITERATIONS: usize = 100_000;

// ── Configuration ─────────────────────────────────────────────────────

/// Configuration for an X-Means search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XMeansConfig {
    /// Number of clusters the search starts from. Default: 3.
    pub lower_k: usize,
    /// Sweeps stop once `K` exceeds this bound. Default: 15.
    pub upper_k: usize,
    /// Iteration cap for each K-Means run. Default: 100,000.
    pub max_iterations: usize,
    /// Random seed (None for entropy). Default: None.
    pub seed: Option<u64>,
}

impl XMeansConfig {
    /// Creates a config searching from `lower_k` up to `upper_k`.
    pub fn new(lower_k: usize, upper_k: usize) -> Self {
        Self {
            lower_k,
            upper_k,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: None,
        }
    }

    /// Sets the per-run iteration cap.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Checks that every parameter is in range.
    pub fn validate(&self) -> Result<()> {
        if self.lower_k == 0 {
            return Err(ClusterError::invalid("lower_k", "must be at least 1"));
        }
        if self.lower_k >= self.upper_k {
            return Err(ClusterError::invalid(
                "lower_k",
                format!(
                    "Lower K must be lower than upper K (got {} >= {})",
                    self.lower_k, self.upper_k
                ),
            ));
        }
        if self.max_iterations == 0 {
            return Err(ClusterError::invalid("max_iterations", "must be at least 1"));
        }
        Ok(())
    }
}

impl Default for XMeansConfig {
    fn default() -> Self {
        Self::new(3, 15)
    }
}

// ── Results ───────────────────────────────────────────────────────────

/// Snapshot taken at the end of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// BIC of the whole dataset partitioned into `k` clusters.
    pub score: f64,
    /// Number of clusters after the sweep.
    pub k: usize,
    /// Rows with their assignments at the end of the sweep.
    pub data: Dataset,
    /// Centroids at the end of the sweep.
    pub centroids: CentroidSet,
}

impl Candidate {
    /// Cluster id per row key.
    pub fn assignments(&self) -> BTreeMap<String, usize> {
        self.data
            .iter()
            .filter_map(|(key, row)| row.assignment().map(|c| (key.to_string(), c)))
            .collect()
    }
}

/// One line of the sweep history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepRecord {
    /// Number of clusters going into the sweep.
    pub k_before: usize,
    /// Number of clusters after the sweep's accepted splits.
    pub k_after: usize,
    /// BIC of the whole dataset at `k_after`.
    pub score: f64,
}

/// What happened to one cluster during a structure sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitOutcome {
    /// The split won; one half moved to `new_cluster`.
    Accepted {
        cluster: usize,
        new_cluster: usize,
        parent_score: f64,
        split_score: f64,
    },
    /// The unsplit cluster scored at least as well.
    Rejected {
        cluster: usize,
        parent_score: f64,
        split_score: f64,
    },
    /// The cluster had no members.
    Skipped { cluster: usize },
}

/// Running state of one structure sweep.
///
/// Cluster ids for accepted splits are handed out from `next_k` in the
/// order the splits are accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepAccumulator {
    next_k: usize,
    outcomes: Vec<SplitOutcome>,
}

impl SweepAccumulator {
    /// Starts a sweep over `k` clusters.
    pub fn new(k: usize) -> Self {
        Self {
            next_k: k,
            outcomes: Vec::with_capacity(k),
        }
    }

    /// Number of clusters once the splits accepted so far are applied.
    pub fn next_k(&self) -> usize {
        self.next_k
    }

    /// Reserves the id for a newly accepted split.
    pub fn allocate(&mut self) -> usize {
        let id = self.next_k;
        self.next_k += 1;
        id
    }

    /// Appends the outcome for one cluster.
    pub fn record(&mut self, outcome: SplitOutcome) {
        self.outcomes.push(outcome);
    }

    /// Outcomes in the order clusters were visited.
    pub fn outcomes(&self) -> &[SplitOutcome] {
        &self.outcomes
    }

    /// Number of accepted splits.
    pub fn accepted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SplitOutcome::Accepted { .. }))
            .count()
    }
}

// ── Engine ────────────────────────────────────────────────────────────

/// X-Means search over an owned dataset.
#[derive(Debug, Clone)]
pub struct XMeans {
    data: Dataset,
    config: XMeansConfig,
    centroids: CentroidSet,
    candidates: Vec<Candidate>,
    history: Vec<SweepRecord>,
    finished: bool,
}

impl XMeans {
    /// Creates an engine; fails on invalid configuration or empty data.
    pub fn new(data: Dataset, config: XMeansConfig) -> Result<Self> {
        config.validate()?;
        if data.is_empty() {
            return Err(ClusterError::DegenerateData {
                reason: "no data points provided".into(),
            });
        }
        let centroids = CentroidSet::new(data.dim());
        Ok(Self {
            data,
            config,
            centroids,
            candidates: Vec::new(),
            history: Vec::new(),
            finished: false,
        })
    }

    /// Sweeps until no split is accepted or `K` exceeds `upper_k`.
    pub fn run<R, M>(&mut self, rng: &mut R, monitor: &mut M) -> Result<()>
    where
        R: Rng + ?Sized,
        M: ExecutionMonitor + ?Sized,
    {
        self.finished = false;
        self.candidates.clear();
        self.history.clear();
        self.centroids = CentroidSet::new(self.data.dim());
        self.data.reset_assignments();

        let mut k = self.config.lower_k;
        let mut sweep = 0;
        loop {
            monitor.checkpoint(&Progress::Sweep { sweep, k })?;
            self.improve_params(k, rng, monitor)?;
            let new_k = self.improve_structure(k, rng, monitor)?;
            let changed = new_k != k;
            k = new_k;
            sweep += 1;
            if !changed || k > self.config.upper_k {
                break;
            }
        }

        self.finished = true;
        info!(
            sweeps = sweep,
            final_k = k,
            candidates = self.candidates.len(),
            "x-means finished"
        );
        Ok(())
    }

    /// Runs K-Means over the whole dataset at `k` clusters.
    ///
    /// Seeds with the current centroids, or samples random ones when there
    /// are none yet.
    pub fn improve_params<R, M>(&mut self, k: usize, rng: &mut R, monitor: &mut M) -> Result<()>
    where
        R: Rng + ?Sized,
        M: ExecutionMonitor + ?Sized,
    {
        debug!(k, "improving parameters");
        let mut engine = KMeans::new(&mut self.data, k, self.config.max_iterations)?;
        if !self.centroids.is_empty() {
            engine.seed_centroids(self.centroids.clone())?;
        }
        engine.run(rng, monitor)?;
        self.centroids = engine.into_centroids()?;
        Ok(())
    }

    /// Tries to split each of the `k` clusters in turn and records a
    /// candidate. Returns the new number of clusters.
    pub fn improve_structure<R, M>(
        &mut self,
        k: usize,
        rng: &mut R,
        monitor: &mut M,
    ) -> Result<usize>
    where
        R: Rng + ?Sized,
        M: ExecutionMonitor + ?Sized,
    {
        debug!(k, "improving structure");
        let mut acc = SweepAccumulator::new(k);
        for cluster in 0..k {
            let outcome = self.try_split(cluster, &mut acc, rng, monitor)?;
            acc.record(outcome);
        }

        let new_k = acc.next_k();
        let score = bic_score(&self.data, new_k);
        self.candidates.push(Candidate {
            score,
            k: new_k,
            data: self.data.clone(),
            centroids: self.centroids.clone(),
        });
        self.history.push(SweepRecord {
            k_before: k,
            k_after: new_k,
            score,
        });
        info!(
            k_before = k,
            k_after = new_k,
            accepted = acc.accepted(),
            score,
            "structure sweep recorded"
        );
        Ok(new_k)
    }

    fn try_split<R, M>(
        &mut self,
        cluster: usize,
        acc: &mut SweepAccumulator,
        rng: &mut R,
        monitor: &mut M,
    ) -> Result<SplitOutcome>
    where
        R: Rng + ?Sized,
        M: ExecutionMonitor + ?Sized,
    {
        let mut subset = self.data.subset(cluster);
        let parent = self
            .centroids
            .get(cluster)
            .ok_or_else(|| {
                ClusterError::invalid("cluster", format!("no centroid for cluster {cluster}"))
            })?
            .to_vec();

        let Some(sample) = subset.sample(rng) else {
            debug!(cluster, "empty cluster, nothing to split");
            return Ok(SplitOutcome::Skipped { cluster });
        };
        let child0 = sample.features().to_vec();
        let child1: Vec<f64> = child0
            .iter()
            .zip(&parent)
            .map(|(&s, &p)| 2.0 * p - s)
            .collect();

        let parent_score = bic_score_single(&subset);

        let mut engine = KMeans::new(&mut subset, 2, self.config.max_iterations)?;
        engine.seed_centroids(CentroidSet::from_coords(
            self.data.dim(),
            vec![child0, child1],
        )?)?;
        engine.run(rng, monitor)?;
        let children = engine.into_centroids()?.into_inner();
        let split_score = bic_score(&subset, 2);

        if split_score <= parent_score {
            debug!(cluster, parent_score, split_score, "split rejected");
            return Ok(SplitOutcome::Rejected {
                cluster,
                parent_score,
                split_score,
            });
        }

        let mut children = children.into_iter();
        let (Some(left), Some(right)) = (children.next(), children.next()) else {
            return Err(ClusterError::DegenerateData {
                reason: format!("2-means on cluster {cluster} produced fewer than 2 centroids"),
            });
        };

        let new_cluster = acc.allocate();
        for (key, row) in subset.iter() {
            if row.assignment() == Some(1) {
                self.data.set_assignment(key, new_cluster);
            }
        }
        self.centroids.set(cluster, left)?;
        let pushed = self.centroids.push(right)?;
        debug_assert_eq!(pushed, new_cluster);

        debug!(
            cluster,
            new_cluster, parent_score, split_score, "split accepted"
        );
        Ok(SplitOutcome::Accepted {
            cluster,
            new_cluster,
            parent_score,
            split_score,
        })
    }

    /// Best-scoring candidate across all sweeps; the earliest wins on ties.
    pub fn best(&self) -> Result<&Candidate> {
        if !self.finished {
            return Err(ClusterError::not_run("best candidate"));
        }
        best_of(&self.candidates).ok_or_else(|| ClusterError::not_run("best candidate"))
    }

    /// All candidates, one per sweep, in sweep order.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Per-sweep cluster counts and scores.
    pub fn history(&self) -> &[SweepRecord] {
        &self.history
    }

    /// Current working dataset.
    pub fn data(&self) -> &Dataset {
        &self.data
    }

    /// Consumes the engine and returns the best candidate and the history.
    pub fn into_result(mut self) -> Result<XMeansResult> {
        if !self.finished {
            return Err(ClusterError::not_run("best candidate"));
        }
        let idx = best_index(&self.candidates)
            .ok_or_else(|| ClusterError::not_run("best candidate"))?;
        let best = self.candidates.swap_remove(idx);
        Ok(XMeansResult {
            best,
            history: self.history,
        })
    }
}

fn best_index(candidates: &[Candidate]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, c) in candidates.iter().enumerate() {
        match best {
            Some(b) if candidates[b].score >= c.score => {}
            _ => best = Some(i),
        }
    }
    best
}

fn best_of(candidates: &[Candidate]) -> Option<&Candidate> {
    best_index(candidates).map(|i| &candidates[i])
}

// ── Convenience entry point ───────────────────────────────────────────

/// Result of [`xmeans`].
#[derive(Debug, Clone, PartialEq)]
pub struct XMeansResult {
    /// Best-scoring candidate over all sweeps.
    pub best: Candidate,
    /// Cluster counts and scores for every sweep.
    pub history: Vec<SweepRecord>,
}

/// Runs X-Means with a fresh RNG built from `config.seed`.
pub fn xmeans(data: Dataset, config: &XMeansConfig) -> Result<XMeansResult> {
    xmeans_with_monitor(data, config, &mut NoopMonitor)
}

/// Like [`xmeans`], reporting progress to `monitor`.
pub fn xmeans_with_monitor<M>(
    data: Dataset,
    config: &XMeansConfig,
    monitor: &mut M,
) -> Result<XMeansResult>
where
    M: ExecutionMonitor + ?Sized,
{
    let mut rng = make_rng(config.seed);
    let mut engine = XMeans::new(data, config.clone())?;
    engine.run(&mut rng, monitor)?;
    engine.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeSet;
    use std::ops::ControlFlow;

    const OFFSETS: [(f64, f64); 6] = [
        (0.0, 0.0),
        (0.2, 0.1),
        (-0.1, 0.3),
        (0.3, -0.2),
        (-0.2, -0.1),
        (0.1, 0.2),
    ];

    fn group(name: &str, cx: f64, cy: f64) -> Vec<(String, Vec<f64>)> {
        OFFSETS
            .iter()
            .enumerate()
            .map(|(i, (dx, dy))| (format!("{name}{i}"), vec![cx + dx, cy + dy]))
            .collect()
    }

    fn labels_of(ds: &Dataset, prefix: &str) -> BTreeSet<usize> {
        ds.iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .filter_map(|(_, r)| r.assignment())
            .collect()
    }

    /// Builds an engine whose data and centroids are already partitioned.
    fn prepared(groups: &[(&str, f64, f64, usize)]) -> XMeans {
        let points: Vec<(String, Vec<f64>)> = groups
            .iter()
            .flat_map(|&(name, cx, cy, _)| group(name, cx, cy))
            .collect();
        let mut data = Dataset::from_points(points).unwrap();
        let k = groups.iter().map(|g| g.3).max().unwrap() + 1;
        for &(name, cx, cy, cluster) in groups {
            for (key, _) in group(name, cx, cy) {
                data.set_assignment(&key, cluster);
            }
        }

        let mut centroids = CentroidSet::new(2);
        for c in 0..k {
            let members: Vec<&[f64]> = data.members(c).map(|r| r.features()).collect();
            let n = members.len() as f64;
            let mean = (0..2)
                .map(|j| members.iter().map(|m| m[j]).sum::<f64>() / n)
                .collect();
            centroids.push(mean).unwrap();
        }

        let mut engine = XMeans::new(data, XMeansConfig::new(1, 10)).unwrap();
        engine.centroids = centroids;
        engine
    }

    // ── Accumulator ──────────────────────────────────────────────

    #[test]
    fn accumulator_hands_out_sequential_ids() {
        let mut acc = SweepAccumulator::new(3);
        assert_eq!(acc.next_k(), 3);
        assert_eq!(acc.allocate(), 3);
        acc.record(SplitOutcome::Accepted {
            cluster: 0,
            new_cluster: 3,
            parent_score: -2.0,
            split_score: -1.0,
        });
        acc.record(SplitOutcome::Skipped { cluster: 1 });
        assert_eq!(acc.allocate(), 4);
        assert_eq!(acc.next_k(), 5);
        assert_eq!(acc.accepted(), 1);
        assert_eq!(acc.outcomes().len(), 2);
    }

    // ── Structure sweep ──────────────────────────────────────────

    #[test]
    fn both_splits_accepted_in_cluster_order() {
        let mut engine = prepared(&[
            ("a", 0.0, 0.0, 0),
            ("b", 0.0, 10.0, 0),
            ("c", 10.0, 0.0, 1),
            ("d", 10.0, 10.0, 1),
        ]);
        let mut rng = StdRng::seed_from_u64(17);
        let new_k = engine
            .improve_structure(2, &mut rng, &mut NoopMonitor)
            .unwrap();
        assert_eq!(new_k, 4);

        let ds = engine.data();
        let first: BTreeSet<usize> = labels_of(ds, "a").union(&labels_of(ds, "b")).copied().collect();
        let second: BTreeSet<usize> = labels_of(ds, "c").union(&labels_of(ds, "d")).copied().collect();
        assert_eq!(first, BTreeSet::from([0, 2]));
        assert_eq!(second, BTreeSet::from([1, 3]));
        for g in ["a", "b", "c", "d"] {
            assert_eq!(labels_of(ds, g).len(), 1, "group {g} must stay together");
        }
        assert_eq!(engine.centroids.len(), 4);
        assert_eq!(engine.candidates().len(), 1);
        assert_eq!(engine.candidates()[0].k, 4);
    }

    #[test]
    fn new_id_follows_running_counter() {
        // cluster 0 is five copies of one point and can never split
        let mut engine = prepared(&[("c", 10.0, 0.0, 1), ("d", 10.0, 10.0, 1)]);
        for i in 0..5 {
            engine.data.insert(format!("z{i}"), vec![50.0, 50.0]).unwrap();
            engine.data.set_assignment(&format!("z{i}"), 0);
        }
        engine.centroids = CentroidSet::from_coords(
            2,
            vec![vec![50.0, 50.0], engine.centroids.get(1).unwrap().to_vec()],
        )
        .unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        let new_k = engine
            .improve_structure(2, &mut rng, &mut NoopMonitor)
            .unwrap();
        assert_eq!(new_k, 3);

        let ds = engine.data();
        assert_eq!(labels_of(ds, "z"), BTreeSet::from([0]));
        let split: BTreeSet<usize> = labels_of(ds, "c").union(&labels_of(ds, "d")).copied().collect();
        assert_eq!(split, BTreeSet::from([1, 2]));
    }

    #[test]
    fn bimodal_cluster_is_split() {
        let points: Vec<(String, Vec<f64>)> = group("l", 0.0, 0.0)
            .into_iter()
            .chain(group("r", 8.0, 8.0))
            .collect();
        let data = Dataset::from_points(points).unwrap();
        let mut engine = XMeans::new(data, XMeansConfig::new(1, 4)).unwrap();
        let mut rng = StdRng::seed_from_u64(5);

        engine.improve_params(1, &mut rng, &mut NoopMonitor).unwrap();
        let new_k = engine
            .improve_structure(1, &mut rng, &mut NoopMonitor)
            .unwrap();
        assert_eq!(new_k, 2);
        assert_ne!(labels_of(engine.data(), "l"), labels_of(engine.data(), "r"));
    }

    #[test]
    fn empty_cluster_is_skipped() {
        let mut engine = prepared(&[("a", 0.0, 0.0, 0)]);
        engine.centroids.push(vec![99.0, 99.0]).unwrap();
        let mut acc = SweepAccumulator::new(2);
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = engine
            .try_split(1, &mut acc, &mut rng, &mut NoopMonitor)
            .unwrap();
        assert_eq!(outcome, SplitOutcome::Skipped { cluster: 1 });
        assert_eq!(acc.next_k(), 2);
    }

    // ── Full search ──────────────────────────────────────────────

    fn five_clusters() -> Dataset {
        let points: Vec<(String, Vec<f64>)> = [
            ("a", 0.0, 0.0),
            ("b", 20.0, 0.0),
            ("c", 0.0, 20.0),
            ("d", 20.0, 20.0),
            ("e", 10.0, 40.0),
        ]
        .iter()
        .flat_map(|&(n, x, y)| group(n, x, y))
        .collect();
        Dataset::from_points(points).unwrap()
    }

    fn assert_sweep_bounds(history: &[SweepRecord], upper_k: usize) {
        let (last, earlier) = history.split_last().expect("at least one sweep");
        for rec in earlier {
            assert!(rec.k_after > rec.k_before, "non-final sweep must split: {rec:?}");
            assert!(rec.k_after <= upper_k, "non-final sweep within bound: {rec:?}");
        }
        assert!(last.k_after == last.k_before || last.k_after > upper_k);
    }

    #[test]
    fn keeps_sweeping_while_splits_are_accepted() {
        for seed in 0..5 {
            let result =
                xmeans(five_clusters(), &XMeansConfig::new(3, 4).seed(Some(seed))).unwrap();
            assert_eq!(result.history[0].k_before, 3);
            assert_sweep_bounds(&result.history, 4);
            assert!(result.best.k >= 3);
            assert!(result.best.k <= result.history.last().unwrap().k_after);
        }
    }

    #[test]
    fn best_is_maximum_not_last() {
        let mut engine = prepared(&[("a", 0.0, 0.0, 0)]);
        let snapshot = |score: f64, k: usize| Candidate {
            score,
            k,
            data: engine.data.clone(),
            centroids: engine.centroids.clone(),
        };
        let cands = vec![
            snapshot(-10.0, 3),
            snapshot(-2.0, 4),
            snapshot(-2.0, 5),
            snapshot(-7.0, 6),
        ];
        engine.candidates = cands;
        engine.finished = true;
        assert_eq!(engine.best().unwrap().k, 4);
        assert_eq!(engine.into_result().unwrap().best.k, 4);
    }

    #[test]
    fn best_before_run_fails() {
        let engine = XMeans::new(five_clusters(), XMeansConfig::default()).unwrap();
        assert!(matches!(engine.best(), Err(ClusterError::NotRun { .. })));
        assert!(matches!(engine.into_result(), Err(ClusterError::NotRun { .. })));
    }

    #[test]
    fn cancellation_between_sweeps() {
        let mut monitor = |p: &Progress| match p {
            Progress::Sweep { sweep, .. } if *sweep >= 1 => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        };
        let mut engine = XMeans::new(five_clusters(), XMeansConfig::new(1, 10)).unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        match engine.run(&mut rng, &mut monitor) {
            Err(ClusterError::Cancelled { .. }) => {
                assert!(engine.best().is_err());
                assert_eq!(engine.candidates().len(), 1);
            }
            // the first sweep accepted nothing, so no second sweep was requested
            Ok(()) => assert_eq!(engine.history().len(), 1),
            Err(e) => panic!("unexpected error {e}"),
        }
    }

    // ── Validation ───────────────────────────────────────────────

    #[test]
    fn invalid_bounds_rejected() {
        assert!(XMeansConfig::new(4, 4).validate().is_err());
        assert!(XMeansConfig::new(5, 4).validate().is_err());
        assert!(XMeansConfig::new(0, 4).validate().is_err());
        assert!(XMeansConfig::new(1, 4).max_iterations(0).validate().is_err());
        let d = XMeansConfig::default();
        assert_eq!((d.lower_k, d.upper_k, d.max_iterations), (3, 15, 100_000));
        assert!(XMeans::new(Dataset::new(2), XMeansConfig::default()).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn best_k_never_below_lower_bound(
            points in prop::collection::vec(prop::collection::vec(-20.0f64..20.0, 2), 6..30),
            lower_k in 1usize..4,
            span in 1usize..4,
            seed in any::<u64>(),
        ) {
            let data = Dataset::from_points(
                points.into_iter().enumerate().map(|(i, p)| (format!("Row{i}"), p)),
            ).unwrap();
            let upper_k = lower_k + span;
            let config = XMeansConfig::new(lower_k, upper_k).max_iterations(200).seed(Some(seed));
            let result = xmeans(data, &config).unwrap();
            prop_assert!(result.best.k >= lower_k);
            prop_assert!(result.best.k <= result.history.last().unwrap().k_after);
            prop_assert!(!result.best.score.is_nan());
        }
    }
}
