//! Derived matrices built once from the interaction matrix before training.
use nalgebra::DMatrix;

use crate::error::Result;
use crate::utils::validation::{validate_alpha, validate_matrix};

/// Canonical "no value" marker. A literal `0.0` is read the same way, so
/// zero is never a genuine rating.
pub const MISSING: f64 = f64::NAN;

#[inline]
pub fn is_missing(value: f64) -> bool {
    value == 0.0 || value.is_nan()
}

/// Binary observation mask `W`: `1` where a rating is present.
pub fn make_weight_matrix(q: &DMatrix<f64>) -> DMatrix<f64> {
    q.map(|v| if is_missing(v) { 0.0 } else { 1.0 })
}

/// Implicit-feedback preference matrix `P`. Same indicator as `W`, used as
/// the regression target rather than the weight.
pub fn make_preference_matrix(q: &DMatrix<f64>) -> DMatrix<f64> {
    make_weight_matrix(q)
}

/// Confidence matrix `C`: `1` where unobserved, `1 + α·r` otherwise.
pub fn make_confidence_matrix(q: &DMatrix<f64>, alpha: f64) -> Result<DMatrix<f64>> {
    validate_matrix(q)?;
    validate_alpha(alpha)?;

    Ok(q.map(|v| if is_missing(v) { 1.0 } else { 1.0 + alpha * v }))
}

/// Copy of `q` with `NaN` cells zeroed so masked products stay finite.
pub fn observed_values(q: &DMatrix<f64>) -> DMatrix<f64> {
    q.map(|v| if v.is_nan() { 0.0 } else { v })
}

/// Largest observed value, `0.0` when nothing is observed.
pub fn max_observed(q: &DMatrix<f64>) -> f64 {
    q.iter()
        .copied()
        .filter(|&v| !is_missing(v))
        .fold(0.0, f64::max)
}

pub fn observed_count(q: &DMatrix<f64>) -> usize {
    q.iter().filter(|&&v| !is_missing(v)).count()
}
