//! Table-in, tables-out clustering.
//!
//! A run goes through these stages:
//!
//! ```text
//! DataFrame ─standardize─▶ z-scored DataFrame ─numeric columns─▶ Dataset
//!           ─engine─▶ (assignment table, centroid table)
//! ```
//!
//! - The **assignment table** is the input table, unchanged and in input row
//!   order, with one extra integer column named [`CLUSTER_COLUMN`].
//! - The **centroid table** has one row per cluster keyed `"0"`, `"1"`, …,
//!   with one numeric column per feature column. Coordinates are in
//!   standardized units.
//!
//! Text columns are carried through to the assignment table but never used
//! as features.
//!
//! # Example
//!
//! ```
//! use u_xmeans::dataframe::{Column, DataFrame};
//! use u_xmeans::kmeans::KMeansConfig;
//! use u_xmeans::pipeline::cluster_kmeans;
//!
//! let keys = (0..6).map(|i| format!("Row{i}")).collect();
//! let mut table = DataFrame::with_keys(keys).unwrap();
//! table.add_column("x".into(), Column::numeric_dense(vec![0.0, 0.1, 0.2, 9.0, 9.1, 9.2])).unwrap();
//! table.add_column("y".into(), Column::integer_dense(vec![0, 1, 0, 5, 6, 5])).unwrap();
//!
//! let out = cluster_kmeans(&table, &KMeansConfig::new(2).seed(Some(1))).unwrap();
//! assert_eq!(out.assignments.column_names(), ["x", "y", "k"]);
//! assert_eq!(out.centroids.keys(), ["0", "1"]);
//! ```

use tracing::info;

use crate::dataframe::{Column, DataFrame, DataType, ValidityBitmap};
use crate::dataset::{CentroidSet, Dataset};
use crate::error::{ClusterError, Result};
use crate::kmeans::{kmeans_with_monitor, KMeansConfig};
use crate::monitor::{ExecutionMonitor, NoopMonitor};
use crate::standardize::{standardize, Standardizer};
use crate::xmeans::{xmeans_with_monitor, SweepRecord, XMeansConfig};

/// Name of the cluster id column appended to the assignment table.
pub const CLUSTER_COLUMN: &str = "k";

// ── Schemas ───────────────────────────────────────────────────────────

/// Column layout of the two output tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSchema {
    pub assignments: Vec<(String, DataType)>,
    pub centroids: Vec<(String, DataType)>,
}

/// Derives the output layout from an input layout without running anything.
///
/// ```
/// use u_xmeans::dataframe::DataType;
/// use u_xmeans::pipeline::output_schema;
///
/// let schema = output_schema(&[("id", DataType::Text), ("x", DataType::Integer)]).unwrap();
/// assert_eq!(schema.assignments.last().unwrap(), &("k".to_string(), DataType::Integer));
/// assert_eq!(schema.centroids, vec![("x".to_string(), DataType::Numeric)]);
/// ```
pub fn output_schema(input: &[(&str, DataType)]) -> Result<OutputSchema> {
    if input.iter().any(|(name, _)| *name == CLUSTER_COLUMN) {
        return Err(ClusterError::invalid(
            "input table",
            format!("column '{CLUSTER_COLUMN}' is reserved for cluster ids"),
        ));
    }
    let centroids: Vec<(String, DataType)> = input
        .iter()
        .filter(|(_, ty)| ty.is_numeric())
        .map(|(name, _)| (name.to_string(), DataType::Numeric))
        .collect();
    if centroids.is_empty() {
        return Err(ClusterError::DegenerateData {
            reason: "input table has no numeric columns".into(),
        });
    }

    let mut assignments: Vec<(String, DataType)> = input
        .iter()
        .map(|(name, ty)| (name.to_string(), *ty))
        .collect();
    assignments.push((CLUSTER_COLUMN.to_string(), DataType::Integer));
    Ok(OutputSchema {
        assignments,
        centroids,
    })
}

// ── Outputs ───────────────────────────────────────────────────────────

/// Output of [`cluster_kmeans`].
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansOutput {
    pub assignments: DataFrame,
    pub centroids: DataFrame,
    pub scaler: Standardizer,
    pub iterations: usize,
    pub converged: bool,
}

/// Output of [`cluster_xmeans`].
#[derive(Debug, Clone, PartialEq)]
pub struct XMeansOutput {
    pub assignments: DataFrame,
    pub centroids: DataFrame,
    pub scaler: Standardizer,
    /// BIC of the chosen partition.
    pub best_score: f64,
    /// Number of clusters in the chosen partition.
    pub best_k: usize,
    pub history: Vec<SweepRecord>,
}

// ── Entry points ──────────────────────────────────────────────────────

/// Standardizes `table` and clusters it with K-Means.
pub fn cluster_kmeans(table: &DataFrame, config: &KMeansConfig) -> Result<KMeansOutput> {
    cluster_kmeans_with_monitor(table, config, &mut NoopMonitor)
}

/// Like [`cluster_kmeans`], reporting progress to `monitor`.
pub fn cluster_kmeans_with_monitor<M>(
    table: &DataFrame,
    config: &KMeansConfig,
    monitor: &mut M,
) -> Result<KMeansOutput>
where
    M: ExecutionMonitor + ?Sized,
{
    config.validate()?;
    let (scaled, scaler) = prepare(table)?;
    let mut data = feature_dataset(&scaled)?;
    let result = kmeans_with_monitor(&mut data, config, monitor)?;

    let assignments = assignment_table(table, &data)?;
    let centroids = centroid_table(&scaled, &result.centroids)?;
    info!(
        rows = table.row_count(),
        k = config.k,
        iterations = result.iterations,
        "k-means pipeline finished"
    );
    Ok(KMeansOutput {
        assignments,
        centroids,
        scaler,
        iterations: result.iterations,
        converged: result.converged,
    })
}

/// Standardizes `table` and clusters it with X-Means.
pub fn cluster_xmeans(table: &DataFrame, config: &XMeansConfig) -> Result<XMeansOutput> {
    cluster_xmeans_with_monitor(table, config, &mut NoopMonitor)
}

/// Like [`cluster_xmeans`], reporting progress to `monitor`.
pub fn cluster_xmeans_with_monitor<M>(
    table: &DataFrame,
    config: &XMeansConfig,
    monitor: &mut M,
) -> Result<XMeansOutput>
where
    M: ExecutionMonitor + ?Sized,
{
    config.validate()?;
    let (scaled, scaler) = prepare(table)?;
    let data = feature_dataset(&scaled)?;
    let result = xmeans_with_monitor(data, config, monitor)?;
    let best = result.best;

    let assignments = assignment_table(table, &best.data)?;
    let centroids = centroid_table(&scaled, &best.centroids)?;
    info!(
        rows = table.row_count(),
        best_k = best.k,
        best_score = best.score,
        "x-means pipeline finished"
    );
    Ok(XMeansOutput {
        assignments,
        centroids,
        scaler,
        best_score: best.score,
        best_k: best.k,
        history: result.history,
    })
}

// ── Building blocks ───────────────────────────────────────────────────

fn prepare(table: &DataFrame) -> Result<(DataFrame, Standardizer)> {
    output_schema(&table.schema())?;
    if table.row_count() == 0 {
        return Err(ClusterError::DegenerateData {
            reason: "input table has no rows".into(),
        });
    }
    standardize(table)
}

/// Builds a dataset from the numeric columns of `table`, keyed by row key.
///
/// Values are taken as they are; standardize the table first if needed.
pub fn feature_dataset(table: &DataFrame) -> Result<Dataset> {
    let features: Vec<(&str, &Column)> = table
        .iter()
        .filter(|(_, col)| col.data_type().is_numeric())
        .collect();
    if features.is_empty() {
        return Err(ClusterError::DegenerateData {
            reason: "input table has no numeric columns".into(),
        });
    }
    for (name, col) in &features {
        let missing = col.null_count();
        if missing > 0 {
            return Err(ClusterError::MissingValues {
                column: name.to_string(),
                count: missing,
            });
        }
    }

    let mut data = Dataset::new(features.len());
    for (i, key) in table.keys().iter().enumerate() {
        let row = features
            .iter()
            .map(|(_, col)| col.value_f64(i).unwrap_or(f64::NAN))
            .collect();
        data.insert(key.clone(), row)?;
    }
    Ok(data)
}

/// Copies `table` and appends each row's cluster id from `data`.
///
/// Rows missing from `data` or still unassigned get a missing id.
pub fn assignment_table(table: &DataFrame, data: &Dataset) -> Result<DataFrame> {
    let mut ids = Vec::with_capacity(table.row_count());
    let mut validity = ValidityBitmap::all_valid(table.row_count());
    for (i, key) in table.keys().iter().enumerate() {
        match data.get(key).and_then(|r| r.assignment()) {
            Some(c) => ids.push(c as i64),
            None => {
                ids.push(0);
                validity.set_invalid(i);
            }
        }
    }

    let mut out = table.clone();
    out.add_column(
        CLUSTER_COLUMN.to_string(),
        Column::Integer {
            values: ids,
            validity,
        },
    )?;
    Ok(out)
}

/// One row per centroid, keyed by cluster id, named after the numeric
/// columns of `features`.
pub fn centroid_table(features: &DataFrame, centroids: &CentroidSet) -> Result<DataFrame> {
    let names: Vec<String> = features
        .numeric_column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    if names.len() != centroids.dim() {
        return Err(ClusterError::DimensionMismatch {
            expected: names.len(),
            actual: centroids.dim(),
        });
    }
    let keys = (0..centroids.len()).map(|c| c.to_string()).collect();
    DataFrame::from_rows(keys, names, centroids.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn blobs() -> DataFrame {
        let xs = [0.0, 0.2, 0.1, 0.3, 10.0, 10.2, 9.9, 10.1];
        let ys = [0.0, 0.1, 0.3, 0.2, 5.0, 5.2, 5.1, 4.9];
        // keys deliberately out of lexical order
        let keys: Vec<String> = ["h", "b", "g", "a", "f", "c", "e", "d"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut df = DataFrame::with_keys(keys).unwrap();
        df.add_column(
            "name".into(),
            Column::text_dense((0..8).map(|i| format!("item{i}")).collect()),
        )
        .unwrap();
        df.add_column("x".into(), Column::numeric_dense(xs.to_vec())).unwrap();
        df.add_column("y".into(), Column::numeric_dense(ys.to_vec())).unwrap();
        df
    }

    fn ids(df: &DataFrame) -> Vec<i64> {
        let col = df.column_by_name(CLUSTER_COLUMN).unwrap();
        (0..df.row_count()).map(|i| col.value_i64(i).unwrap()).collect()
    }

    // ── Schema ───────────────────────────────────────────────────

    #[test]
    fn schema_appends_cluster_column() {
        let schema = output_schema(&[
            ("name", DataType::Text),
            ("x", DataType::Numeric),
            ("n", DataType::Integer),
        ])
        .unwrap();
        assert_eq!(schema.assignments.len(), 4);
        assert_eq!(schema.assignments[0], ("name".into(), DataType::Text));
        assert_eq!(
            schema.centroids,
            vec![
                ("x".to_string(), DataType::Numeric),
                ("n".to_string(), DataType::Numeric)
            ]
        );
    }

    #[test]
    fn schema_rejects_reserved_or_textual_input() {
        assert!(matches!(
            output_schema(&[("k", DataType::Numeric)]),
            Err(ClusterError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            output_schema(&[("name", DataType::Text)]),
            Err(ClusterError::DegenerateData { .. })
        ));
    }

    // ── K-Means pipeline ─────────────────────────────────────────

    #[test]
    fn kmeans_tables_follow_input_order() {
        let table = blobs();
        let out = cluster_kmeans(&table, &KMeansConfig::new(2).seed(Some(4))).unwrap();

        assert_eq!(out.assignments.keys(), table.keys());
        assert_eq!(out.assignments.column_names(), ["name", "x", "y", "k"]);
        assert_eq!(
            out.assignments.column_by_name("x"),
            table.column_by_name("x")
        );
        assert_eq!(out.assignments.column_by_name("name").unwrap().text_at(3), Some("item3"));
        assert!(ids(&out.assignments).iter().all(|&c| c == 0 || c == 1));

        assert_eq!(out.centroids.keys(), ["0", "1"]);
        assert_eq!(out.centroids.column_names(), ["x", "y"]);
        assert!(out.iterations >= 1);
    }

    #[test]
    fn kmeans_separates_blobs() {
        let table = blobs();
        let mut separated = false;
        for seed in 0..10 {
            let out = cluster_kmeans(&table, &KMeansConfig::new(2).seed(Some(seed))).unwrap();
            let labels = ids(&out.assignments);
            if labels[..4].iter().all(|&c| c == labels[0])
                && labels[4..].iter().all(|&c| c == labels[4])
                && labels[0] != labels[4]
            {
                // centroid of the low blob, mapped back to original units
                let row = labels[0].to_string();
                let r = out.centroids.keys().iter().position(|k| *k == row).unwrap();
                let zx = out.centroids.column_by_name("x").unwrap().value_f64(r).unwrap();
                let x = out.scaler.scaling("x").unwrap().unscale(zx);
                assert_abs_diff_eq!(x, 0.15, epsilon = 1e-9);
                separated = true;
            }
        }
        assert!(separated);
    }

    #[test]
    fn missing_feature_cells_rejected() {
        let mut df = DataFrame::with_keys(vec!["a".into(), "b".into(), "c".into()]).unwrap();
        df.add_column(
            "x".into(),
            Column::numeric(
                vec![1.0, 0.0, 3.0],
                ValidityBitmap::from_flags(&[true, false, true]),
            ),
        )
        .unwrap();
        assert!(matches!(
            cluster_kmeans(&df, &KMeansConfig::new(1)),
            Err(ClusterError::MissingValues { .. })
        ));
    }

    #[test]
    fn empty_table_rejected() {
        let mut df = DataFrame::with_keys(Vec::new()).unwrap();
        df.add_column("x".into(), Column::numeric_dense(Vec::new())).unwrap();
        assert!(matches!(
            cluster_kmeans(&df, &KMeansConfig::new(1)),
            Err(ClusterError::DegenerateData { .. })
        ));
    }

    // ── X-Means pipeline ─────────────────────────────────────────

    #[test]
    fn xmeans_reports_best_candidate() {
        let table = blobs();
        let out = cluster_xmeans(&table, &XMeansConfig::new(1, 4).seed(Some(2))).unwrap();

        assert!(out.best_k >= 1);
        assert_eq!(out.centroids.row_count(), out.best_k);
        assert_eq!(out.centroids.column_names(), ["x", "y"]);
        assert!(!out.history.is_empty());
        assert!(out
            .history
            .iter()
            .any(|r| r.k_after == out.best_k && r.score == out.best_score));
        let k = out.best_k as i64;
        assert!(ids(&out.assignments).iter().all(|&c| (0..k).contains(&c)));
    }

    #[test]
    fn xmeans_config_checked_first() {
        assert!(matches!(
            cluster_xmeans(&blobs(), &XMeansConfig::new(3, 3)),
            Err(ClusterError::InvalidConfiguration { .. })
        ));
    }

    // ── Building blocks ──────────────────────────────────────────

    #[test]
    fn unassigned_rows_get_missing_ids() {
        let table = blobs();
        let mut data = feature_dataset(&table).unwrap();
        assert_eq!(data.dim(), 2);
        data.set_assignment("a", 1);
        let out = assignment_table(&table, &data).unwrap();
        let col = out.column_by_name(CLUSTER_COLUMN).unwrap();
        assert_eq!(col.null_count(), 7);
        assert_eq!(col.value_i64(3), Some(1));
    }

    #[test]
    fn centroid_table_checks_width() {
        let table = blobs();
        let one_dim = CentroidSet::from_coords(1, vec![vec![0.0]]).unwrap();
        assert!(matches!(
            centroid_table(&table, &one_dim),
            Err(ClusterError::DimensionMismatch { .. })
        ));
    }
}
