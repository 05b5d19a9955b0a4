use nalgebra::DMatrix;
use tracing::warn;

use crate::config::TrainingConfig;
use crate::error::{AlsError, Result};

pub fn validate_matrix(q: &DMatrix<f64>) -> Result<()> {
    if q.nrows() == 0 || q.ncols() == 0 {
        return Err(AlsError::InvalidInput(format!(
            "interaction matrix cannot be empty ({}x{})",
            q.nrows(),
            q.ncols()
        )));
    }

    if q.iter().any(|v| v.is_infinite()) {
        return Err(AlsError::InvalidInput(
            "interaction matrix contains infinite values".to_string(),
        ));
    }

    Ok(())
}

pub fn validate_alpha(alpha: f64) -> Result<()> {
    if !alpha.is_finite() || alpha < 0.0 {
        return Err(AlsError::InvalidInput(format!(
            "confidence scale must be a non-negative finite number, got {}",
            alpha
        )));
    }

    Ok(())
}

pub fn validate_training_config(config: &TrainingConfig) -> Result<()> {
    if config.factors == 0 {
        return Err(AlsError::InvalidInput(
            "number of latent factors must be at least 1".to_string(),
        ));
    }

    if !config.lambda.is_finite() || config.lambda < 0.0 {
        return Err(AlsError::InvalidInput(format!(
            "regularization must be a non-negative finite number, got {}",
            config.lambda
        )));
    }

    if let Some(threshold) = config.error_threshold {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(AlsError::InvalidInput(format!(
                "error threshold must be a non-negative finite number, got {}",
                threshold
            )));
        }
    }

    if let Some(scale) = config.init_scale {
        validate_init_scale(scale)?;
    }

    Ok(())
}

pub fn validate_init_scale(scale: f64) -> Result<()> {
    if !scale.is_finite() || scale < 0.0 {
        return Err(AlsError::InvalidInput(format!(
            "initialization scale must be a non-negative finite number, got {}",
            scale
        )));
    }

    Ok(())
}

/// `k > min(rows, cols)` is allowed but rarely useful.
pub fn check_factor_rank(factors: usize, rows: usize, cols: usize) {
    let limit = rows.min(cols);
    if factors > limit {
        warn!(
            "Number of factors ({}) exceeds min(rows, cols) = {}",
            factors, limit
        );
    }
}

pub fn validate_same_shape(
    context: &'static str,
    expected: &DMatrix<f64>,
    actual: &DMatrix<f64>,
) -> Result<()> {
    if expected.shape() != actual.shape() {
        return Err(AlsError::DimensionMismatch {
            context,
            expected: expected.shape(),
            actual: actual.shape(),
        });
    }

    Ok(())
}

pub fn validate_labels(labels: Option<&[String]>, cols: usize) -> Result<()> {
    if let Some(labels) = labels {
        if labels.len() != cols {
            return Err(AlsError::DimensionMismatch {
                context: "item labels",
                expected: (1, cols),
                actual: (1, labels.len()),
            });
        }
    }

    Ok(())
}
