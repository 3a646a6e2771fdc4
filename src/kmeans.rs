//! K-Means clustering with Lloyd's algorithm.
//!
//! The engine walks through explicit phases:
//!
//! ```text
//! Uninitialized → Initialized → (Assigned ⇄ Recalculated) → Terminated
//! ```
//!
//! - **initialize**: unless centroids were seeded, sample `K` rows uniformly
//!   *with replacement* and copy their coordinates; every row becomes
//!   unassigned.
//! - **assign**: move every row to its nearest centroid (ties go to the
//!   lowest cluster id) and report whether any row moved.
//! - **recalculate**: replace each centroid by the mean of its members. A
//!   cluster with no members keeps its previous coordinates.
//! - **run**: alternate assign/recalculate until an assign moves nothing or
//!   the iteration cap is reached. The converging iteration still
//!   recalculates, so the final centroids match the final assignment.
//!
//! # Example
//!
//! ```
//! use u_xmeans::dataset::Dataset;
//! use u_xmeans::kmeans::{kmeans, KMeansConfig};
//!
//! let mut data = Dataset::from_points(vec![
//!     ("a", vec![0.0, 0.0]), ("b", vec![0.0, 1.0]),
//!     ("c", vec![10.0, 0.0]), ("d", vec![10.0, 1.0]),
//! ]).unwrap();
//! let result = kmeans(&mut data, &KMeansConfig::new(2).seed(Some(7))).unwrap();
//!
//! assert_eq!(result.centroids.len(), 2);
//! assert!(result.iterations <= 1_000_000);
//! assert!(data.rows().all(|r| r.assignment().is_some()));
//! ```

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::dataset::{CentroidSet, Dataset};
use crate::error::{ClusterError, Result};
use crate::monitor::{ExecutionMonitor, NoopMonitor, Progress};

/// Default iteration cap for a stand-alone K-Means run.
pub const DEFAULT_MAX_ITERATIONS: usize = 1_000_000;

// ── Configuration ─────────────────────────────────────────────────────

/// Configuration for a K-Means run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KMeansConfig {
    /// Number of clusters. Default: 3.
    pub k: usize,
    /// Upper bound on assign/recalculate iterations. Default: 1,000,000.
    pub max_iterations: usize,
    /// Random seed (None for entropy). Default: None.
    pub seed: Option<u64>,
}

impl KMeansConfig {
    /// Creates a config for `k` clusters with default parameters.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: None,
        }
    }

    /// Sets the iteration cap.
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
        validate_params(self.k, self.max_iterations)
    }
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

fn validate_params(k: usize, max_iterations: usize) -> Result<()> {
    if k == 0 {
        return Err(ClusterError::invalid("k", "must be at least 1"));
    }
    if max_iterations == 0 {
        return Err(ClusterError::invalid("max_iterations", "must be at least 1"));
    }
    Ok(())
}

// ── Engine ────────────────────────────────────────────────────────────

/// Lifecycle phase of a [`KMeans`] engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initialized,
    Assigned,
    Recalculated,
    Terminated,
}

/// Outcome of [`KMeans::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of assign/recalculate iterations executed.
    pub iterations: usize,
    /// `true` if the last assign moved no row.
    pub converged: bool,
}

/// Lloyd's algorithm over a borrowed dataset.
///
/// Assignments are written into the dataset in place; centroids are owned
/// by the engine until taken with [`KMeans::into_centroids`].
#[derive(Debug)]
pub struct KMeans<'a> {
    data: &'a mut Dataset,
    k: usize,
    max_iterations: usize,
    centroids: CentroidSet,
    phase: Phase,
    summary: RunSummary,
}

impl<'a> KMeans<'a> {
    /// Creates an engine for `k` clusters.
    pub fn new(data: &'a mut Dataset, k: usize, max_iterations: usize) -> Result<Self> {
        validate_params(k, max_iterations)?;
        if data.is_empty() {
            return Err(ClusterError::DegenerateData {
                reason: "no data points provided".into(),
            });
        }
        let dim = data.dim();
        Ok(Self {
            data,
            k,
            max_iterations,
            centroids: CentroidSet::new(dim),
            phase: Phase::Uninitialized,
            summary: RunSummary {
                iterations: 0,
                converged: false,
            },
        })
    }

    /// Creates an engine from a [`KMeansConfig`]. The seed is not used here.
    pub fn with_config(data: &'a mut Dataset, config: &KMeansConfig) -> Result<Self> {
        Self::new(data, config.k, config.max_iterations)
    }

    /// Supplies starting centroids, bypassing random sampling.
    pub fn seed_centroids(&mut self, centroids: CentroidSet) -> Result<()> {
        if centroids.len() != self.k {
            return Err(ClusterError::invalid(
                "centroids",
                format!("expected {} seed centroids, got {}", self.k, centroids.len()),
            ));
        }
        if centroids.dim() != self.data.dim() {
            return Err(ClusterError::DimensionMismatch {
                expected: self.data.dim(),
                actual: centroids.dim(),
            });
        }
        self.centroids = centroids;
        Ok(())
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Samples starting centroids if none were seeded and clears assignments.
    pub fn initialize<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        if self.centroids.is_empty() {
            for _ in 0..self.k {
                let row = self.data.sample(rng).ok_or_else(|| ClusterError::DegenerateData {
                    reason: "no data points provided".into(),
                })?;
                self.centroids.push(row.features().to_vec())?;
            }
            debug!(k = self.k, dim = self.data.dim(), "sampled k-means centroids");
        } else {
            debug!(k = self.k, dim = self.data.dim(), "using seeded k-means centroids");
        }
        self.data.reset_assignments();
        self.phase = Phase::Initialized;
        Ok(())
    }

    /// Moves every row to its nearest centroid.
    ///
    /// Returns `true` if at least one row changed cluster.
    pub fn assign(&mut self) -> Result<bool> {
        if self.phase == Phase::Uninitialized {
            return Err(ClusterError::Uninitialized {
                operation: "assign".into(),
            });
        }
        let centroids = self.centroids.as_slice();
        let changed = self.data.reassign(|features| nearest(features, centroids));
        self.phase = Phase::Assigned;
        Ok(changed)
    }

    /// Sets each centroid to the mean of its members.
    pub fn recalculate(&mut self) -> Result<()> {
        if self.phase == Phase::Uninitialized {
            return Err(ClusterError::Uninitialized {
                operation: "recalculate".into(),
            });
        }
        let d = self.data.dim();
        let mut sums = vec![vec![0.0; d]; self.k];
        let mut counts = vec![0usize; self.k];

        for row in self.data.rows() {
            if let Some(c) = row.assignment() {
                counts[c] += 1;
                for (s, &v) in sums[c].iter_mut().zip(row.features()) {
                    *s += v;
                }
            }
        }

        for (c, (mut sum, count)) in sums.into_iter().zip(counts).enumerate() {
            if count == 0 {
                trace!(cluster = c, "empty cluster keeps its centroid");
                continue;
            }
            for s in &mut sum {
                *s /= count as f64;
            }
            self.centroids.set(c, sum)?;
        }
        self.phase = Phase::Recalculated;
        Ok(())
    }

    /// Runs to convergence or the iteration cap.
    pub fn run<R, M>(&mut self, rng: &mut R, monitor: &mut M) -> Result<RunSummary>
    where
        R: Rng + ?Sized,
        M: ExecutionMonitor + ?Sized,
    {
        self.initialize(rng)?;
        let mut iterations = 0;
        let converged = loop {
            monitor.checkpoint(&Progress::Iteration {
                iteration: iterations,
                max: self.max_iterations,
            })?;
            let changed = self.assign()?;
            self.recalculate()?;
            iterations += 1;
            if !changed {
                break true;
            }
            if iterations >= self.max_iterations {
                break false;
            }
        };

        self.summary = RunSummary {
            iterations,
            converged,
        };
        self.phase = Phase::Terminated;
        debug!(k = self.k, iterations, converged, "k-means finished");
        Ok(self.summary)
    }

    /// Final centroids. Fails until [`run`](Self::run) has completed.
    pub fn centroids(&self) -> Result<&CentroidSet> {
        self.ensure_terminated("centroids")?;
        Ok(&self.centroids)
    }

    /// Final cluster id of every row, keyed by row key.
    pub fn assignments(&self) -> Result<BTreeMap<String, usize>> {
        self.ensure_terminated("assignments")?;
        Ok(self
            .data
            .iter()
            .filter_map(|(key, row)| row.assignment().map(|c| (key.to_string(), c)))
            .collect())
    }

    /// Summary of the completed run.
    pub fn summary(&self) -> Result<RunSummary> {
        self.ensure_terminated("summary")?;
        Ok(self.summary)
    }

    /// Takes ownership of the final centroids.
    pub fn into_centroids(self) -> Result<CentroidSet> {
        self.ensure_terminated("centroids")?;
        Ok(self.centroids)
    }

    fn ensure_terminated(&self, operation: &str) -> Result<()> {
        if self.phase == Phase::Terminated {
            Ok(())
        } else {
            Err(ClusterError::not_run(operation))
        }
    }
}

/// Index of the closest centroid; the first one wins on ties.
pub(crate) fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let dist = euclidean_dist_sq(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = c;
        }
    }
    best
}

#[inline]
pub(crate) fn euclidean_dist_sq(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&ai, &bi)| {
            let diff = ai - bi;
            diff * diff
        })
        .sum()
}

pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

// ── Convenience entry point ───────────────────────────────────────────

/// Result of [`kmeans`].
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Final centroids, indexed by cluster id.
    pub centroids: CentroidSet,
    /// Iterations executed.
    pub iterations: usize,
    /// `true` if the run stopped because no row moved.
    pub converged: bool,
    /// Member count per cluster.
    pub cluster_sizes: Vec<usize>,
}

/// Runs K-Means on `data` with a fresh RNG built from `config.seed`.
///
/// Assignments are written into `data`.
pub fn kmeans(data: &mut Dataset, config: &KMeansConfig) -> Result<KMeansResult> {
    kmeans_with_monitor(data, config, &mut NoopMonitor)
}

/// Like [`kmeans`], reporting progress to `monitor`.
pub fn kmeans_with_monitor<M>(
    data: &mut Dataset,
    config: &KMeansConfig,
    monitor: &mut M,
) -> Result<KMeansResult>
where
    M: ExecutionMonitor + ?Sized,
{
    config.validate()?;
    let mut rng = make_rng(config.seed);
    let mut engine = KMeans::with_config(data, config)?;
    let summary = engine.run(&mut rng, monitor)?;
    let centroids = engine.into_centroids()?;
    let cluster_sizes = data.cluster_sizes(config.k);
    Ok(KMeansResult {
        centroids,
        iterations: summary.iterations,
        converged: summary.converged,
        cluster_sizes,
    })
}
