//! Z-score standardization of numeric table columns.
//!
//! Every numeric (or integer) column is rescaled to `(value − mean) / sd`,
//! where `sd` is the sample standard deviation (denominator `N − 1`).
//! Text columns pass through unchanged. Two passes are made over the data,
//! one for the mean and one for the deviation, so the whole table is held
//! in memory.
//!
//! A column whose values are all equal, or whose standard deviation is
//! undefined (as with a single row), cannot be rescaled and yields
//! [`ClusterError::Standardization`] instead of a column of `NaN`s.
//!
//! # Example
//!
//! ```
//! use u_xmeans::dataframe::{Column, DataFrame};
//! use u_xmeans::standardize::Standardizer;
//!
//! let keys = (0..8).map(|i| format!("Row{i}")).collect();
//! let mut df = DataFrame::with_keys(keys).unwrap();
//! df.add_column(
//!     "x".into(),
//!     Column::numeric_dense(vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]),
//! ).unwrap();
//!
//! let scaler = Standardizer::fit(&df).unwrap();
//! let z = scaler.transform(&df).unwrap();
//! let first = z.column(0).and_then(|c| c.value_f64(0)).unwrap();
//! assert!((first + 1.403).abs() < 1e-3);
//! ```

use tracing::debug;

use crate::dataframe::{Column, DataFrame};
use crate::error::{ClusterError, Result};

/// Mean and sample standard deviation of one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnScaling {
    pub mean: f64,
    pub std_dev: f64,
}

impl ColumnScaling {
    /// Maps a raw value to its z-score.
    #[inline]
    pub fn scale(&self, value: f64) -> f64 {
        (value - self.mean) / self.std_dev
    }

    /// Maps a z-score back to the original units.
    #[inline]
    pub fn unscale(&self, z: f64) -> f64 {
        z * self.std_dev + self.mean
    }
}

/// Per-column scaling parameters fitted on a table.
///
/// `scalings[i]` is `Some` exactly when column `i` is numeric.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    names: Vec<String>,
    scalings: Vec<Option<ColumnScaling>>,
}

impl Standardizer {
    /// Computes mean and sample standard deviation for every numeric column.
    pub fn fit(table: &DataFrame) -> Result<Self> {
        let n = table.row_count();
        let mut names = Vec::with_capacity(table.column_count());
        let mut scalings = Vec::with_capacity(table.column_count());

        for (name, column) in table.iter() {
            names.push(name.to_string());
            if !column.data_type().is_numeric() {
                scalings.push(None);
                continue;
            }

            let missing = column.null_count();
            if missing > 0 {
                return Err(ClusterError::MissingValues {
                    column: name.to_string(),
                    count: missing,
                });
            }
            let values: Vec<f64> = (0..n).filter_map(|i| column.value_f64(i)).collect();
            scalings.push(Some(fit_column(name, &values)?));
        }

        debug!(
            columns = names.len(),
            numeric = scalings.iter().filter(|s| s.is_some()).count(),
            rows = n,
            "fitted standardizer"
        );
        Ok(Self { names, scalings })
    }

    /// Scaling parameters of the named column, if it is numeric.
    pub fn scaling(&self, name: &str) -> Option<ColumnScaling> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.scalings[i])
    }

    /// Produces a new table where every numeric cell is a z-score.
    ///
    /// Integer columns become numeric columns; text columns are copied.
    pub fn transform(&self, table: &DataFrame) -> Result<DataFrame> {
        self.map_numeric(table, ColumnScaling::scale)
    }

    /// Maps a standardized table back to original units.
    pub fn inverse(&self, table: &DataFrame) -> Result<DataFrame> {
        self.map_numeric(table, ColumnScaling::unscale)
    }

    fn map_numeric(
        &self,
        table: &DataFrame,
        f: impl Fn(&ColumnScaling, f64) -> f64,
    ) -> Result<DataFrame> {
        if table.column_count() != self.names.len() {
            return Err(ClusterError::DimensionMismatch {
                expected: self.names.len(),
                actual: table.column_count(),
            });
        }

        let mut out = DataFrame::with_keys(table.keys().to_vec())?;
        for ((name, column), scaling) in table.iter().zip(&self.scalings) {
            let mapped = match scaling {
                Some(s) => {
                    let values = (0..table.row_count())
                        .map(|i| column.value_f64(i).map_or(0.0, |v| f(s, v)))
                        .collect();
                    Column::numeric(values, column.validity().clone())
                }
                None => column.clone(),
            };
            out.add_column(name.to_string(), mapped)?;
        }
        Ok(out)
    }
}

/// Fits a standardizer and applies it in one step.
pub fn standardize(table: &DataFrame) -> Result<(DataFrame, Standardizer)> {
    let scaler = Standardizer::fit(table)?;
    let scaled = scaler.transform(table)?;
    Ok((scaled, scaler))
}

fn fit_column(name: &str, values: &[f64]) -> Result<ColumnScaling> {
    let undefined = |reason: &str| ClusterError::Standardization {
        column: name.to_string(),
        reason: reason.to_string(),
    };

    let mean = u_numflow::stats::mean(values).ok_or_else(|| undefined("column is empty"))?;
    if values.len() < 2 {
        return Err(undefined("sample standard deviation needs at least 2 rows"));
    }

    if values.iter().all(|&v| v == values[0]) {
        return Err(undefined("zero variance"));
    }

    let sum_sq: f64 = values.iter().map(|&v| (v - mean) * (v - mean)).sum();
    let std_dev = (sum_sq / (values.len() - 1) as f64).sqrt();

    if !std_dev.is_finite() {
        return Err(undefined("standard deviation is not finite"));
    }
    if std_dev == 0.0 {
        return Err(undefined("zero variance"));
    }
    Ok(ColumnScaling { mean, std_dev })
}
