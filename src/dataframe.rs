//! Keyed, column-major table used at the host boundary.
//!
//! A [`DataFrame`] is what the host hands to the clustering pipeline and
//! what it gets back: every row carries a unique string key, every column
//! is typed and tracks missing cells in a [`ValidityBitmap`].
//!
//! # Column Types
//!
//! | Type | Storage | Counts as a feature |
//! |------|---------|---------------------|
//! | [`Numeric`](Column::Numeric) | `Vec<f64>` + bitmap | yes |
//! | [`Integer`](Column::Integer) | `Vec<i64>` + bitmap | yes |
//! | [`Text`](Column::Text) | `Vec<String>` + bitmap | no, passed through |
//!
//! # Example
//!
//! ```
//! use u_xmeans::dataframe::{Column, DataFrame};
//!
//! let mut df = DataFrame::with_keys(vec!["a".into(), "b".into(), "c".into()]).unwrap();
//! df.add_column("temperature".into(), Column::numeric_dense(vec![20.5, 21.3, 19.8]))
//!     .unwrap();
//! assert_eq!(df.row_count(), 3);
//! assert_eq!(df.column_count(), 1);
//! assert_eq!(df.key(1), Some("b"));
//! ```

use std::collections::HashSet;

use crate::error::{ClusterError, Result};

// ── ValidityBitmap ────────────────────────────────────────────────────

/// Bit-packed validity flags, one bit per row (1 = present, 0 = missing).
#[derive(Debug, Clone, PartialEq)]
pub struct ValidityBitmap {
    words: Vec<u64>,
    len: usize,
}

impl ValidityBitmap {
    /// Creates a bitmap where all `len` positions are valid.
    pub fn all_valid(len: usize) -> Self {
        let mut bitmap = Self {
            words: vec![u64::MAX; len.div_ceil(64)],
            len,
        };
        let trailing = len % 64;
        if trailing != 0 {
            if let Some(last) = bitmap.words.last_mut() {
                *last = (1u64 << trailing) - 1;
            }
        }
        bitmap
    }

    /// Builds a bitmap from per-row flags.
    pub fn from_flags(flags: &[bool]) -> Self {
        let mut bitmap = Self {
            words: Vec::with_capacity(flags.len().div_ceil(64)),
            len: 0,
        };
        for &flag in flags {
            bitmap.push(flag);
        }
        bitmap
    }

    /// Returns `true` if the cell at `idx` is present.
    #[inline]
    pub fn is_valid(&self, idx: usize) -> bool {
        debug_assert!(idx < self.len, "index {idx} out of bounds (len={})", self.len);
        (self.words[idx / 64] >> (idx % 64)) & 1 == 1
    }

    /// Marks position `idx` as missing.
    #[inline]
    pub fn set_invalid(&mut self, idx: usize) {
        debug_assert!(idx < self.len, "index {idx} out of bounds (len={})", self.len);
        self.words[idx / 64] &= !(1u64 << (idx % 64));
    }

    /// Appends one position.
    pub fn push(&mut self, valid: bool) {
        let idx = self.len;
        self.len += 1;
        if idx / 64 >= self.words.len() {
            self.words.push(0);
        }
        if valid {
            self.words[idx / 64] |= 1u64 << (idx % 64);
        }
    }

    /// Number of tracked positions.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no positions are tracked.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Counts missing positions.
    pub fn null_count(&self) -> usize {
        let valid: usize = self.words.iter().map(|w| w.count_ones() as usize).sum();
        self.len - valid
    }
}

// ── DataType ──────────────────────────────────────────────────────────

/// Cell type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Floating-point values.
    Numeric,
    /// Whole-number values.
    Integer,
    /// Free-form strings.
    Text,
}

impl DataType {
    /// Returns `true` for types that take part in distance computations.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Numeric | Self::Integer)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "Numeric"),
            Self::Integer => write!(f, "Integer"),
            Self::Text => write!(f, "Text"),
        }
    }
}

// ── Column ────────────────────────────────────────────────────────────

/// A typed column. Missing positions hold a default value that must be
/// ignored (0.0, 0, or an empty string).
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric {
        values: Vec<f64>,
        validity: ValidityBitmap,
    },
    Integer {
        values: Vec<i64>,
        validity: ValidityBitmap,
    },
    Text {
        values: Vec<String>,
        validity: ValidityBitmap,
    },
}

impl Column {
    /// Creates a numeric column.
    pub fn numeric(values: Vec<f64>, validity: ValidityBitmap) -> Self {
        Self::Numeric { values, validity }
    }

    /// Creates a numeric column with no missing cells.
    pub fn numeric_dense(values: Vec<f64>) -> Self {
        let validity = ValidityBitmap::all_valid(values.len());
        Self::Numeric { values, validity }
    }

    /// Creates an integer column with no missing cells.
    pub fn integer_dense(values: Vec<i64>) -> Self {
        let validity = ValidityBitmap::all_valid(values.len());
        Self::Integer { values, validity }
    }

    /// Creates a text column with no missing cells.
    pub fn text_dense(values: Vec<String>) -> Self {
        let validity = ValidityBitmap::all_valid(values.len());
        Self::Text { values, validity }
    }

    /// Returns the cell type of this column.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Numeric { .. } => DataType::Numeric,
            Self::Integer { .. } => DataType::Integer,
            Self::Text { .. } => DataType::Text,
        }
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.validity().len()
    }

    /// Returns `true` if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the validity bitmap.
    pub fn validity(&self) -> &ValidityBitmap {
        match self {
            Self::Numeric { validity, .. }
            | Self::Integer { validity, .. }
            | Self::Text { validity, .. } => validity,
        }
    }

    /// Returns the number of missing cells.
    pub fn null_count(&self) -> usize {
        self.validity().null_count()
    }

    /// Reads a present numeric or integer cell as `f64`.
    pub fn value_f64(&self, idx: usize) -> Option<f64> {
        match self {
            Self::Numeric { values, validity } if validity.is_valid(idx) => Some(values[idx]),
            Self::Integer { values, validity } if validity.is_valid(idx) => {
                Some(values[idx] as f64)
            }
            _ => None,
        }
    }

    /// Reads a present integer cell.
    pub fn value_i64(&self, idx: usize) -> Option<i64> {
        match self {
            Self::Integer { values, validity } if validity.is_valid(idx) => Some(values[idx]),
            _ => None,
        }
    }

    /// Reads a present text cell.
    pub fn text_at(&self, idx: usize) -> Option<&str> {
        match self {
            Self::Text { values, validity } if validity.is_valid(idx) => Some(&values[idx]),
            _ => None,
        }
    }
}

// ── DataFrame ─────────────────────────────────────────────────────────

/// Column-major table whose rows are identified by unique string keys.
///
/// The key vector fixes the row count; every column added afterwards must
/// match it.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    keys: Vec<String>,
    names: Vec<String>,
    columns: Vec<Column>,
}

impl DataFrame {
    /// Creates a table with the given row keys and no columns.
    ///
    /// Fails with [`ClusterError::DuplicateKey`] if a key repeats.
    pub fn with_keys(keys: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !seen.insert(key.as_str()) {
                return Err(ClusterError::DuplicateKey { key: key.clone() });
            }
        }
        Ok(Self {
            keys,
            names: Vec::new(),
            columns: Vec::new(),
        })
    }

    /// Builds an all-numeric table from row-major values.
    ///
    /// ```
    /// use u_xmeans::dataframe::DataFrame;
    ///
    /// let df = DataFrame::from_rows(
    ///     vec!["r0".into(), "r1".into()],
    ///     vec!["x".into(), "y".into()],
    ///     &[vec![1.0, 2.0], vec![3.0, 4.0]],
    /// ).unwrap();
    /// assert_eq!(df.column_by_name("y").and_then(|c| c.value_f64(1)), Some(4.0));
    /// ```
    pub fn from_rows(keys: Vec<String>, names: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
        if rows.len() != keys.len() {
            return Err(ClusterError::DimensionMismatch {
                expected: keys.len(),
                actual: rows.len(),
            });
        }
        let mut df = Self::with_keys(keys)?;
        let width = names.len();
        for row in rows {
            if row.len() != width {
                return Err(ClusterError::DimensionMismatch {
                    expected: width,
                    actual: row.len(),
                });
            }
        }
        for (j, name) in names.into_iter().enumerate() {
            let values = rows.iter().map(|r| r[j]).collect();
            df.add_column(name, Column::numeric_dense(values))?;
        }
        Ok(df)
    }

    /// Appends a named column.
    pub fn add_column(&mut self, name: String, column: Column) -> Result<()> {
        if column.len() != self.keys.len() {
            return Err(ClusterError::DimensionMismatch {
                expected: self.keys.len(),
                actual: column.len(),
            });
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Returns the number of rows.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.keys.len()
    }

    /// Returns the number of columns.
    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the row keys in table order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Returns the key of row `idx`.
    pub fn key(&self, idx: usize) -> Option<&str> {
        self.keys.get(idx).map(String::as_str)
    }

    /// Returns column names.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Returns the column at `index`.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns the column with the given `name`.
    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    /// Returns an iterator over (name, column) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Returns (name, type) pairs for every column.
    pub fn schema(&self) -> Vec<(&str, DataType)> {
        self.iter().map(|(name, col)| (name, col.data_type())).collect()
    }

    /// Names of the columns that take part in distance computations.
    pub fn numeric_column_names(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, col)| col.data_type().is_numeric())
            .map(|(name, _)| name)
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Row{i}")).collect()
    }

    // ── ValidityBitmap ───────────────────────────────────────────

    #[test]
    fn bitmap_all_valid_boundary() {
        let bm = ValidityBitmap::all_valid(65);
        assert_eq!(bm.len(), 65);
        assert_eq!(bm.null_count(), 0);
        assert!(bm.is_valid(64));
    }

    #[test]
    fn bitmap_flags_and_invalidation() {
        let mut bm = ValidityBitmap::from_flags(&[true, false, true]);
        assert_eq!(bm.null_count(), 1);
        assert!(!bm.is_valid(1));
        bm.set_invalid(2);
        assert_eq!(bm.null_count(), 2);
    }

    #[test]
    fn bitmap_push_across_words() {
        let flags: Vec<bool> = (0..130).map(|i| i % 5 != 0).collect();
        let bm = ValidityBitmap::from_flags(&flags);
        assert_eq!(bm.len(), 130);
        assert_eq!(bm.null_count(), 26);
    }

    // ── Column ───────────────────────────────────────────────────

    #[test]
    fn integer_cells_read_as_f64() {
        let col = Column::integer_dense(vec![1, -2, 3]);
        assert_eq!(col.data_type(), DataType::Integer);
        assert_eq!(col.value_f64(1), Some(-2.0));
        assert_eq!(col.value_i64(2), Some(3));
    }

    #[test]
    fn missing_cells_read_as_none() {
        let col = Column::numeric(
            vec![1.0, 0.0],
            ValidityBitmap::from_flags(&[true, false]),
        );
        assert_eq!(col.value_f64(0), Some(1.0));
        assert_eq!(col.value_f64(1), None);
        assert_eq!(col.null_count(), 1);
    }

    #[test]
    fn text_is_not_numeric() {
        let col = Column::text_dense(vec!["a".into()]);
        assert!(!col.data_type().is_numeric());
        assert_eq!(col.value_f64(0), None);
        assert_eq!(col.text_at(0), Some("a"));
    }

    // ── DataFrame ────────────────────────────────────────────────

    #[test]
    fn duplicate_keys_rejected() {
        let err = DataFrame::with_keys(vec!["a".into(), "a".into()]).unwrap_err();
        assert_eq!(err, ClusterError::DuplicateKey { key: "a".into() });
    }

    #[test]
    fn column_length_must_match_keys() {
        let mut df = DataFrame::with_keys(keys(2)).unwrap();
        let err = df
            .add_column("x".into(), Column::numeric_dense(vec![1.0, 2.0, 3.0]))
            .unwrap_err();
        assert_eq!(
            err,
            ClusterError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn from_rows_builds_columns() {
        let df = DataFrame::from_rows(
            keys(3),
            vec!["x".into(), "y".into()],
            &[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
        )
        .unwrap();
        assert_eq!(df.column_count(), 2);
        assert_eq!(df.column(0).and_then(|c| c.value_f64(2)), Some(5.0));
        assert_eq!(df.column_by_name("y").and_then(|c| c.value_f64(0)), Some(2.0));
    }

    #[test]
    fn from_rows_ragged_rejected() {
        let res = DataFrame::from_rows(
            keys(2),
            vec!["x".into(), "y".into()],
            &[vec![1.0, 2.0], vec![3.0]],
        );
        assert!(res.is_err());
    }

    #[test]
    fn schema_and_numeric_names() {
        let mut df = DataFrame::with_keys(keys(1)).unwrap();
        df.add_column("x".into(), Column::numeric_dense(vec![1.0])).unwrap();
        df.add_column("label".into(), Column::text_dense(vec!["a".into()]))
            .unwrap();
        df.add_column("n".into(), Column::integer_dense(vec![4])).unwrap();

        let schema = df.schema();
        assert_eq!(schema[1], ("label", DataType::Text));
        assert_eq!(df.numeric_column_names(), vec!["x", "n"]);
    }
}
