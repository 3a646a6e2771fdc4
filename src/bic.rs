//! Bayesian Information Criterion for a partition of rows.
//!
//! For a set of `N` rows split into `K` clusters of sizes `R_k` over `D`
//! features (higher is better):
//!
//! ```text
//! q     = D · (K + 1)
//! score = −(q/2)·ln N
//!       + Σ_k [ −(R_k/2)·ln 2π − (R_k·D/2)·ln σ²_k − (R_k − K)/2
//!               + R_k·ln R_k − R_k·ln N ]
//! ```
//!
//! `σ²_k` is the cluster dispersion: the sum over members of the Euclidean
//! distance to the cluster mean, divided by `R_k − D`.
//!
//! The score is `−∞` whenever a term is undefined: an empty cluster, a
//! cluster with `R_k ≤ D`, or a dispersion that is not strictly positive.
//! A split scored `−∞` can never beat its parent, so these cases reject the
//! split instead of poisoning the comparison with `NaN`.

use std::f64::consts::PI;

use crate::dataset::Dataset;

/// Scores `data` as a partition into clusters `0..k` by current assignment.
///
/// Rows assigned outside `0..k` (or unassigned) still count toward `N`.
///
/// ```
/// use u_xmeans::bic::{bic_score, bic_score_single};
/// use u_xmeans::dataset::Dataset;
///
/// let mut data = Dataset::from_points(vec![
///     ("a", vec![0.0]), ("b", vec![1.0]), ("c", vec![2.0]),
///     ("d", vec![10.0]), ("e", vec![11.0]), ("f", vec![12.0]),
/// ]).unwrap();
/// for (key, cluster) in [("a", 0), ("b", 0), ("c", 0), ("d", 1), ("e", 1), ("f", 1)] {
///     data.set_assignment(key, cluster);
/// }
/// assert!(bic_score(&data, 2) > bic_score_single(&data));
/// ```
pub fn bic_score(data: &Dataset, k: usize) -> f64 {
    let mut groups: Vec<Vec<&[f64]>> = vec![Vec::new(); k];
    for row in data.rows() {
        if let Some(c) = row.assignment().filter(|&c| c < k) {
            groups[c].push(row.features());
        }
    }
    score_groups(&groups, data.len(), data.dim())
}

/// Scores `data` as a single cluster, ignoring current assignments.
pub fn bic_score_single(data: &Dataset) -> f64 {
    let members: Vec<&[f64]> = data.rows().map(|r| r.features()).collect();
    score_groups(&[members], data.len(), data.dim())
}

/// Dispersion of one cluster, or `None` when it is undefined (`R_k ≤ D`).
pub fn cluster_dispersion(members: &[&[f64]], dim: usize) -> Option<f64> {
    let r = members.len();
    if r <= dim {
        return None;
    }

    let mut mean = vec![0.0; dim];
    for m in members {
        for (acc, &v) in mean.iter_mut().zip(m.iter()) {
            *acc += v;
        }
    }
    for v in &mut mean {
        *v /= r as f64;
    }

    let spread: f64 = members
        .iter()
        .map(|m| {
            m.iter()
                .zip(&mean)
                .map(|(&v, &mu)| (v - mu) * (v - mu))
                .sum::<f64>()
                .sqrt()
        })
        .sum();
    Some(spread / (r - dim) as f64)
}

fn score_groups(groups: &[Vec<&[f64]>], n: usize, dim: usize) -> f64 {
    if n == 0 || groups.is_empty() {
        return f64::NEG_INFINITY;
    }
    let k = groups.len() as f64;
    let d = dim as f64;
    let n_f = n as f64;
    let q = d * (k + 1.0);

    let mut score = -(q / 2.0) * n_f.ln();
    for members in groups {
        let variance = match cluster_dispersion(members, dim) {
            Some(v) if v > 0.0 && v.is_finite() => v,
            _ => return f64::NEG_INFINITY,
        };
        let r = members.len() as f64;
        score += -(r / 2.0) * (2.0 * PI).ln() - (r * d / 2.0) * variance.ln() - (r - k) / 2.0
            + r * r.ln()
            - r * n_f.ln();
    }

    if score.is_finite() {
        score
    } else {
        f64::NEG_INFINITY
    }
}
