//! # u-xmeans
//!
//! K-Means and X-Means clustering with z-score standardization and C FFI
//! bindings.
//!
//! X-Means starts from a lower bound on the number of clusters and grows it
//! by splitting clusters whenever the Bayesian Information Criterion says
//! the split describes the data better, keeping the best-scoring partition
//! it saw along the way.
//!
//! ## Modules
//!
//! - [`dataframe`] — Keyed, column-major table (DataFrame, Column, DataType)
//! - [`standardize`] — Z-score standardization with sample standard deviation
//! - [`dataset`] — Keyed feature vectors with cluster assignments, centroid sets
//! - [`kmeans`] — Lloyd's K-Means with explicit phases and seedable centroids
//! - [`bic`] — Bayesian Information Criterion of a partition
//! - [`xmeans`] — X-Means search over `K` with BIC split decisions
//! - [`pipeline`] — Table in, assignment and centroid tables out
//! - [`monitor`] — Cooperative progress reporting and cancellation
//! - [`ffi`] — C FFI bindings (auto-generated C header via cbindgen)
//! - [`error`] — Error types
//!
//! ## Quick Start
//!
//! ```
//! use u_xmeans::dataframe::{Column, DataFrame};
//! use u_xmeans::pipeline::cluster_xmeans;
//! use u_xmeans::xmeans::XMeansConfig;
//!
//! let xs = vec![0.0, 0.2, 0.1, 0.3, 0.15, 8.0, 8.2, 8.1, 8.3, 8.15];
//! let ys = vec![0.0, 0.1, 0.3, 0.2, 0.25, 8.0, 8.1, 8.3, 8.2, 8.05];
//! let keys = (0..xs.len()).map(|i| format!("Row{i}")).collect();
//! let mut table = DataFrame::with_keys(keys).unwrap();
//! table.add_column("x".into(), Column::numeric_dense(xs)).unwrap();
//! table.add_column("y".into(), Column::numeric_dense(ys)).unwrap();
//!
//! let out = cluster_xmeans(&table, &XMeansConfig::new(1, 5).seed(Some(42))).unwrap();
//!
//! assert!(out.best_k >= 1);
//! assert_eq!(out.assignments.column_names().last().unwrap(), "k");
//! assert_eq!(out.centroids.row_count(), out.best_k);
//! ```

pub mod bic;
pub mod dataframe;
pub mod dataset;
pub mod error;
pub mod ffi;
pub mod kmeans;
pub mod monitor;
pub mod pipeline;
pub mod standardize;
pub mod xmeans;
