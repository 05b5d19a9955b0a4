use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{AlsError, Result};
use crate::utils::validation::validate_same_shape;

/// `Σ weights ⊙ (targets − X·Y)²`.
///
/// With a binary mask this is the masked sum of squared residuals; with
/// confidences it is the confidence-weighted implicit loss (without the
/// ridge term).
pub fn weighted_error(
    weights: &DMatrix<f64>,
    targets: &DMatrix<f64>,
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
) -> Result<f64> {
    validate_same_shape("error weights", targets, weights)?;
    if x.ncols() != y.nrows() || (x.nrows(), y.ncols()) != targets.shape() {
        return Err(AlsError::DimensionMismatch {
            context: "reconstruction",
            expected: targets.shape(),
            actual: (x.nrows(), y.ncols()),
        });
    }

    let reconstruction = x * y;
    let error: f64 = weights
        .iter()
        .zip(targets.iter())
        .zip(reconstruction.iter())
        .map(|((&w, &t), &r)| w * (t - r).powi(2))
        .sum();

    Ok(error)
}

/// Per-iteration error values in the order they were produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorHistory {
    values: Vec<f64>,
}

impl ErrorHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn first(&self) -> Option<f64> {
        self.values.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Whether the latest error is below the first one.
    pub fn improved(&self) -> bool {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => last < first,
            _ => false,
        }
    }

    pub fn has_converged(&self, threshold: f64) -> bool {
        self.last().map_or(false, |last| last <= threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_error_masks_unobserved() {
        let q = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 2.0]);
        let w = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let x = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
        let y = DMatrix::from_row_slice(1, 2, &[2.0, 2.0]);

        // Residuals on observed cells: (1 - 2)^2 + (2 - 2)^2
        let error = weighted_error(&w, &q, &x, &y).unwrap();
        assert!((error - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_error_dimension_mismatch() {
        let q = DMatrix::<f64>::zeros(2, 2);
        let w = DMatrix::<f64>::zeros(2, 2);
        let x = DMatrix::<f64>::zeros(3, 1);
        let y = DMatrix::<f64>::zeros(1, 2);
        assert!(matches!(
            weighted_error(&w, &q, &x, &y),
            Err(AlsError::DimensionMismatch { .. })
        ));

        let w = DMatrix::<f64>::zeros(2, 3);
        let x = DMatrix::<f64>::zeros(2, 1);
        assert!(weighted_error(&w, &q, &x, &y).is_err());
    }

    #[test]
    fn test_error_history() {
        let mut history = ErrorHistory::new();
        assert!(!history.improved());
        assert!(!history.has_converged(1.0));

        history.push(4.0);
        history.push(2.5);
        history.push(0.5);
        assert_eq!(history.len(), 3);
        assert_eq!(history.first(), Some(4.0));
        assert_eq!(history.last(), Some(0.5));
        assert!(history.improved());
        assert!(history.has_converged(0.5));
        assert!(!history.has_converged(0.1));
    }
}
