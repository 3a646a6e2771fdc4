//! C FFI bindings for u-xmeans.
//!
//! Exposes K-Means and X-Means over row-major `f64` buffers.
//!
//! # Design
//!
//! - **`#[repr(C)]`** result struct owning two heap arrays, released with
//!   `xm_free_result`
//! - **Integer error codes**: 0 = success, negative = error
//! - **Thread-local error message**: `xm_last_error()`
//! - **`catch_unwind`**: every entry point is wrapped so panics never cross
//!   the boundary
//!
//! Rows are keyed internally as `Row0`, `Row1`, … and labels are returned
//! in input row order.
//!
//! # Safety
//!
//! Null pointer arguments return [`XM_ERR_NULL_PTR`].

use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::panic;
use std::ptr;
use std::slice;

use crate::dataframe::DataFrame;
use crate::dataset::{CentroidSet, Dataset};
use crate::error::{ClusterError, Result};
use crate::kmeans::{kmeans, KMeansConfig};
use crate::pipeline::feature_dataset;
use crate::standardize::standardize;
use crate::xmeans::{xmeans, XMeansConfig};

// ── Error handling ────────────────────────────────────────────────────

/// Error codes returned by FFI functions.
pub const XM_OK: i32 = 0;
pub const XM_ERR_NULL_PTR: i32 = -1;
pub const XM_ERR_INVALID_INPUT: i32 = -2;
pub const XM_ERR_CLUSTER_FAILED: i32 = -4;
pub const XM_ERR_PANIC: i32 = -99;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = CString::new(msg).ok();
    });
}

fn error_code(err: &ClusterError) -> i32 {
    match err {
        ClusterError::InvalidConfiguration { .. }
        | ClusterError::DimensionMismatch { .. }
        | ClusterError::NonFinite { .. }
        | ClusterError::DuplicateKey { .. }
        | ClusterError::MissingValues { .. } => XM_ERR_INVALID_INPUT,
        _ => XM_ERR_CLUSTER_FAILED,
    }
}

/// Returns the last error message, or null if no error.
/// The returned string is valid until the next FFI call on this thread.
///
/// # Safety
/// The caller must not free the returned pointer.
#[no_mangle]
pub extern "C" fn xm_last_error() -> *const c_char {
    LAST_ERROR.with(|cell| {
        let borrow = cell.borrow();
        match borrow.as_ref() {
            Some(cstr) => cstr.as_ptr(),
            None => ptr::null(),
        }
    })
}

/// Clears the last error message.
#[no_mangle]
pub extern "C" fn xm_clear_error() {
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = None;
    });
}

/// Returns the version string of u-xmeans.
///
/// # Safety
/// The returned string is a static string literal. Do not free it.
#[no_mangle]
pub extern "C" fn xm_version() -> *const c_char {
    c"0.1.0".as_ptr()
}

// ── Result struct ─────────────────────────────────────────────────────

/// C-compatible clustering result.
#[repr(C)]
pub struct CClusterResult {
    /// Number of clusters.
    pub k: u32,
    /// Number of feature columns per centroid.
    pub n_cols: u32,
    /// K-Means iterations, or X-Means sweeps.
    pub iterations: u32,
    /// BIC of the chosen partition (X-Means), NaN for K-Means.
    pub score: f64,
    /// Cluster label per input row (length = n_labels).
    pub labels: *mut u32,
    /// Number of labels.
    pub n_labels: u32,
    /// Row-major centroid coordinates (length = k * n_cols).
    pub centroids: *mut f64,
}

impl CClusterResult {
    fn empty() -> Self {
        Self {
            k: 0,
            n_cols: 0,
            iterations: 0,
            score: f64::NAN,
            labels: ptr::null_mut(),
            n_labels: 0,
            centroids: ptr::null_mut(),
        }
    }
}

/// Hands ownership of `v` to the caller; capacity equals length.
fn leak<T>(v: Vec<T>) -> *mut T {
    Box::into_raw(v.into_boxed_slice()) as *mut T
}

fn build_result(
    data: &Dataset,
    keys: &[String],
    centroids: &CentroidSet,
    iterations: usize,
    score: f64,
) -> CClusterResult {
    let labels: Vec<u32> = keys
        .iter()
        .map(|key| {
            data.get(key)
                .and_then(|r| r.assignment())
                .map_or(u32::MAX, |c| c as u32)
        })
        .collect();
    let coords: Vec<f64> = centroids.as_slice().iter().flatten().copied().collect();
    CClusterResult {
        k: centroids.len() as u32,
        n_cols: centroids.dim() as u32,
        iterations: iterations as u32,
        score,
        n_labels: labels.len() as u32,
        labels: leak(labels),
        centroids: leak(coords),
    }
}

/// Copies a row-major buffer into a keyed dataset, optionally z-scored.
///
/// # Safety
/// `data` must point to `n_rows * n_cols` contiguous f64 values.
unsafe fn load(
    data: *const f64,
    n_rows: u32,
    n_cols: u32,
    standardized: bool,
) -> Result<(Dataset, Vec<String>)> {
    let n = n_rows as usize;
    let d = n_cols as usize;
    let len = n.checked_mul(d).ok_or_else(|| {
        ClusterError::invalid("n_rows * n_cols", "buffer size overflows usize")
    })?;
    let raw = unsafe { slice::from_raw_parts(data, len) };

    let keys: Vec<String> = (0..n).map(|i| format!("Row{i}")).collect();
    let names: Vec<String> = (0..d).map(|j| format!("x{j}")).collect();
    let rows: Vec<Vec<f64>> = (0..n).map(|i| raw[i * d..(i + 1) * d].to_vec()).collect();
    let table = DataFrame::from_rows(keys.clone(), names, &rows)?;

    let dataset = if standardized {
        let (scaled, _) = standardize(&table)?;
        feature_dataset(&scaled)?
    } else {
        feature_dataset(&table)?
    };
    Ok((dataset, keys))
}

fn seed_arg(seed: u64, use_seed: i32) -> Option<u64> {
    (use_seed != 0).then_some(seed)
}

// ── K-Means ───────────────────────────────────────────────────────────

/// Runs K-Means on row-major data.
///
/// # Parameters
///
/// - `standardized`: nonzero to z-score every column before clustering.
/// - `use_seed`: nonzero to seed the RNG with `seed`, zero for entropy.
///
/// # Safety
/// - `data` must point to `n_rows * n_cols` contiguous f64 values (row-major).
/// - `out` must point to a valid `CClusterResult`.
/// - The caller must release `out` with `xm_free_result`.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn xm_kmeans(
    data: *const f64,
    n_rows: u32,
    n_cols: u32,
    k: u32,
    max_iterations: u32,
    standardized: i32,
    seed: u64,
    use_seed: i32,
    out: *mut CClusterResult,
) -> i32 {
    let result = panic::catch_unwind(|| {
        if data.is_null() || out.is_null() {
            set_last_error("null pointer");
            return XM_ERR_NULL_PTR;
        }

        let run = || -> Result<CClusterResult> {
            let (mut dataset, keys) = unsafe { load(data, n_rows, n_cols, standardized != 0)? };
            let config = KMeansConfig::new(k as usize)
                .max_iterations(max_iterations as usize)
                .seed(seed_arg(seed, use_seed));
            let res = kmeans(&mut dataset, &config)?;
            Ok(build_result(
                &dataset,
                &keys,
                &res.centroids,
                res.iterations,
                f64::NAN,
            ))
        };

        match run() {
            Ok(r) => {
                unsafe { *out = r };
                XM_OK
            }
            Err(e) => {
                set_last_error(&format!("kmeans error: {e}"));
                error_code(&e)
            }
        }
    });

    match result {
        Ok(code) => code,
        Err(_) => {
            set_last_error("panic in xm_kmeans");
            XM_ERR_PANIC
        }
    }
}

// ── X-Means ───────────────────────────────────────────────────────────

/// Runs X-Means on row-major data.
///
/// `out.k` is the number of clusters in the best-scoring candidate and
/// `out.score` its BIC. `out.iterations` counts sweeps.
///
/// # Safety
/// - `data` must point to `n_rows * n_cols` contiguous f64 values (row-major).
/// - `out` must point to a valid `CClusterResult`.
/// - The caller must release `out` with `xm_free_result`.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn xm_xmeans(
    data: *const f64,
    n_rows: u32,
    n_cols: u32,
    lower_k: u32,
    upper_k: u32,
    max_iterations: u32,
    standardized: i32,
    seed: u64,
    use_seed: i32,
    out: *mut CClusterResult,
) -> i32 {
    let result = panic::catch_unwind(|| {
        if data.is_null() || out.is_null() {
            set_last_error("null pointer");
            return XM_ERR_NULL_PTR;
        }

        let run = || -> Result<CClusterResult> {
            let config = XMeansConfig::new(lower_k as usize, upper_k as usize)
                .max_iterations(max_iterations as usize)
                .seed(seed_arg(seed, use_seed));
            config.validate()?;
            let (dataset, keys) = unsafe { load(data, n_rows, n_cols, standardized != 0)? };
            let res = xmeans(dataset, &config)?;
            let best = &res.best;
            Ok(build_result(
                &best.data,
                &keys,
                &best.centroids,
                res.history.len(),
                best.score,
            ))
        };

        match run() {
            Ok(r) => {
                unsafe { *out = r };
                XM_OK
            }
            Err(e) => {
                set_last_error(&format!("xmeans error: {e}"));
                error_code(&e)
            }
        }
    });

    match result {
        Ok(code) => code,
        Err(_) => {
            set_last_error("panic in xm_xmeans");
            XM_ERR_PANIC
        }
    }
}

/// Frees the arrays owned by a result and resets it.
///
/// # Safety
/// `result` must be null or point to a `CClusterResult` filled by
/// `xm_kmeans` or `xm_xmeans` and not yet freed.
#[no_mangle]
pub unsafe extern "C" fn xm_free_result(result: *mut CClusterResult) {
    if result.is_null() {
        return;
    }
    let r = unsafe { &mut *result };
    if !r.labels.is_null() {
        let n = r.n_labels as usize;
        let _ = unsafe { Vec::from_raw_parts(r.labels, n, n) };
    }
    if !r.centroids.is_null() {
        let n = r.k as usize * r.n_cols as usize;
        let _ = unsafe { Vec::from_raw_parts(r.centroids, n, n) };
    }
    *r = CClusterResult::empty();
}
