//! Keyed feature vectors and centroid sets shared by the clustering engines.
//!
//! A [`Dataset`] maps unique string keys to [`Row`]s of a fixed
//! dimensionality `D`. The only mutable part of a row is its cluster
//! assignment, and every change to it bumps the dataset's revision counter,
//! so a caller can tell whether a phase touched the partition.
//!
//! Rows are kept in key order, which makes random sampling reproducible for
//! a given RNG state regardless of how the rows were inserted.

use std::collections::BTreeMap;

use rand::Rng;

use crate::error::{ClusterError, Result};

// ── Row ───────────────────────────────────────────────────────────────

/// One observation: a feature vector and its current cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    features: Vec<f64>,
    assignment: Option<usize>,
}

impl Row {
    /// Creates an unassigned row.
    pub fn new(features: Vec<f64>) -> Self {
        Self {
            features,
            assignment: None,
        }
    }

    /// Feature values.
    #[inline]
    pub fn features(&self) -> &[f64] {
        &self.features
    }

    /// Current cluster id, or `None` while unassigned.
    #[inline]
    pub fn assignment(&self) -> Option<usize> {
        self.assignment
    }
}

// ── Dataset ───────────────────────────────────────────────────────────

/// Keyed rows of equal dimensionality.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    rows: BTreeMap<String, Row>,
    dim: usize,
    revision: u64,
}

impl Dataset {
    /// Creates an empty dataset whose rows will have `dim` features.
    pub fn new(dim: usize) -> Self {
        Self {
            rows: BTreeMap::new(),
            dim,
            revision: 0,
        }
    }

    /// Builds a dataset from `(key, features)` pairs.
    ///
    /// The dimensionality is taken from the first pair; every later pair
    /// must match it.
    ///
    /// ```
    /// use u_xmeans::dataset::Dataset;
    ///
    /// let ds = Dataset::from_points(vec![("a", vec![0.0, 1.0]), ("b", vec![2.0, 3.0])]).unwrap();
    /// assert_eq!(ds.len(), 2);
    /// assert_eq!(ds.dim(), 2);
    /// assert!(Dataset::from_points(vec![("a", vec![0.0]), ("b", vec![1.0, 2.0])]).is_err());
    /// ```
    pub fn from_points<I, K>(points: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Vec<f64>)>,
        K: Into<String>,
    {
        let mut iter = points.into_iter().peekable();
        let dim = match iter.peek() {
            Some((_, features)) => features.len(),
            None => {
                return Err(ClusterError::DegenerateData {
                    reason: "no rows provided".into(),
                })
            }
        };
        if dim == 0 {
            return Err(ClusterError::DegenerateData {
                reason: "rows have 0 features".into(),
            });
        }

        let mut dataset = Self::new(dim);
        for (key, features) in iter {
            dataset.insert(key, features)?;
        }
        Ok(dataset)
    }

    /// Adds an unassigned row.
    pub fn insert(&mut self, key: impl Into<String>, features: Vec<f64>) -> Result<()> {
        let key = key.into();
        if features.len() != self.dim {
            return Err(ClusterError::DimensionMismatch {
                expected: self.dim,
                actual: features.len(),
            });
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(ClusterError::NonFinite { key });
        }
        if self.rows.contains_key(&key) {
            return Err(ClusterError::DuplicateKey { key });
        }
        self.rows.insert(key, Row::new(features));
        Ok(())
    }

    /// Number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if there are no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Feature dimensionality `D`.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of assignment changes applied so far.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Looks up a row by key.
    pub fn get(&self, key: &str) -> Option<&Row> {
        self.rows.get(key)
    }

    /// Iterates over `(key, row)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Row)> {
        self.rows.iter().map(|(k, r)| (k.as_str(), r))
    }

    /// Iterates over rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    /// Rows currently assigned to `cluster`.
    pub fn members(&self, cluster: usize) -> impl Iterator<Item = &Row> {
        self.rows
            .values()
            .filter(move |r| r.assignment == Some(cluster))
    }

    /// Member counts for clusters `0..k`. Rows outside that range are ignored.
    pub fn cluster_sizes(&self, k: usize) -> Vec<usize> {
        let mut sizes = vec![0usize; k];
        for c in self.rows.values().filter_map(|r| r.assignment) {
            if c < k {
                sizes[c] += 1;
            }
        }
        sizes
    }

    /// Deep copy of the rows assigned to `cluster`, assignments preserved.
    ///
    /// Sub-clustering the copy never touches this dataset.
    pub fn subset(&self, cluster: usize) -> Dataset {
        let rows = self
            .rows
            .iter()
            .filter(|(_, r)| r.assignment == Some(cluster))
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect();
        Dataset {
            rows,
            dim: self.dim,
            revision: 0,
        }
    }

    /// Picks a row uniformly at random.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Row> {
        if self.rows.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.rows.len());
        self.rows.values().nth(idx)
    }

    /// Marks every row as unassigned.
    pub fn reset_assignments(&mut self) {
        let mut changed = false;
        for row in self.rows.values_mut() {
            changed |= row.assignment.take().is_some();
        }
        if changed {
            self.revision += 1;
        }
    }

    /// Moves one row to `cluster`. Returns `false` if the key is unknown.
    pub fn set_assignment(&mut self, key: &str, cluster: usize) -> bool {
        match self.rows.get_mut(key) {
            Some(row) => {
                if row.assignment != Some(cluster) {
                    row.assignment = Some(cluster);
                    self.revision += 1;
                }
                true
            }
            None => false,
        }
    }

    /// Recomputes every row's assignment with `choose`, in key order.
    ///
    /// Returns `true` if any row changed cluster.
    pub(crate) fn reassign(&mut self, mut choose: impl FnMut(&[f64]) -> usize) -> bool {
        let mut changed = false;
        for row in self.rows.values_mut() {
            let cluster = choose(&row.features);
            if row.assignment != Some(cluster) {
                row.assignment = Some(cluster);
                changed = true;
            }
        }
        if changed {
            self.revision += 1;
        }
        changed
    }
}

// ── CentroidSet ───────────────────────────────────────────────────────

/// Dense centroid coordinates indexed by cluster id `0..K`.
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidSet {
    dim: usize,
    coords: Vec<Vec<f64>>,
}

impl CentroidSet {
    /// Creates an empty set for `dim`-dimensional centroids.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            coords: Vec::new(),
        }
    }

    /// Builds a set from explicit coordinates; all must share one length.
    pub fn from_coords(dim: usize, coords: Vec<Vec<f64>>) -> Result<Self> {
        let mut set = Self::new(dim);
        for c in coords {
            set.push(c)?;
        }
        Ok(set)
    }

    /// Appends a centroid and returns its id.
    pub fn push(&mut self, coord: Vec<f64>) -> Result<usize> {
        if coord.len() != self.dim {
            return Err(ClusterError::DimensionMismatch {
                expected: self.dim,
                actual: coord.len(),
            });
        }
        self.coords.push(coord);
        Ok(self.coords.len() - 1)
    }

    /// Replaces the coordinates of an existing centroid.
    pub fn set(&mut self, id: usize, coord: Vec<f64>) -> Result<()> {
        if coord.len() != self.dim {
            return Err(ClusterError::DimensionMismatch {
                expected: self.dim,
                actual: coord.len(),
            });
        }
        let len = self.coords.len();
        let slot = self.coords.get_mut(id).ok_or_else(|| {
            ClusterError::invalid("centroid id", format!("{id} out of range 0..{len}"))
        })?;
        *slot = coord;
        Ok(())
    }

    /// Coordinates of centroid `id`.
    pub fn get(&self, id: usize) -> Option<&[f64]> {
        self.coords.get(id).map(Vec::as_slice)
    }

    /// Number of centroids (`K`).
    #[inline]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Centroid dimensionality.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// All centroids, indexed by cluster id.
    pub fn as_slice(&self) -> &[Vec<f64>] {
        &self.coords
    }

    /// Consumes the set and returns the coordinate rows.
    pub fn into_inner(self) -> Vec<Vec<f64>> {
        self.coords
    }
}
