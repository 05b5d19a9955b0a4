//! Alternating least squares.
//!
//! Both feedback kinds run through the same engine. Each half-step solves,
//! for every user `u` (and symmetrically every item `i`), the weighted ridge
//! regression
//!
//! ```text
//! X[u,:] = (Y·diag(w_u)·Yᵗ + λI)⁻¹ · Y·diag(w_u)·t_u
//! Y[:,i] = (Xᵗ·diag(w_i)·X + λI)⁻¹ · Xᵗ·diag(w_i)·t_i
//! ```
//!
//! where the weights are the observation mask `W` and the targets the
//! ratings `Q` in the explicit case, and the confidences `C` and the
//! preferences `P` in the implicit case. The column pass always uses the
//! freshly solved `X`.
use nalgebra::{DMatrix, DVector};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::convergence::{weighted_error, ErrorHistory};
use super::initializer::init_factors;
use super::preprocessing::{
    make_confidence_matrix, make_preference_matrix, make_weight_matrix, max_observed,
    observed_count, observed_values,
};
use crate::config::TrainingConfig;
use crate::error::{AlsError, Axis, Result};
use crate::models::{AlsModel, Feedback, SolveWarning, StopReason, TrainingReport};
use crate::utils::validation::{
    check_factor_rank, validate_matrix, validate_same_shape, validate_training_config,
};

/// Initialization upper bound used for implicit feedback when the config
/// does not set one.
pub const DEFAULT_IMPLICIT_INIT_SCALE: f64 = 5.0;

/// Shared flag for stopping a training run between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct AlsTrainer {
    config: TrainingConfig,
    cancellation: Option<CancellationToken>,
}

/// Per-pass settings shared by the row and column solves.
struct Pass<'a> {
    weights: &'a DMatrix<f64>,
    targets: &'a DMatrix<f64>,
    regularization: &'a DMatrix<f64>,
    iteration: usize,
    strict: bool,
}

impl AlsTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn fit_explicit(&self, q: &DMatrix<f64>) -> Result<AlsModel> {
        self.fit(q, Feedback::Explicit)
    }

    pub fn fit_implicit(&self, q: &DMatrix<f64>, alpha: f64) -> Result<AlsModel> {
        self.fit(q, Feedback::Implicit { alpha })
    }

    pub fn fit(&self, q: &DMatrix<f64>, feedback: Feedback) -> Result<AlsModel> {
        validate_matrix(q)?;
        validate_training_config(&self.config)?;
        check_factor_rank(self.config.factors, q.nrows(), q.ncols());

        let mask = make_weight_matrix(q);
        let max_rating = max_observed(q);

        let (weights, targets, scale) = match feedback {
            Feedback::Explicit => (
                mask.clone(),
                observed_values(q),
                self.config.init_scale.unwrap_or(max_rating),
            ),
            Feedback::Implicit { alpha } => (
                make_confidence_matrix(q, alpha)?,
                make_preference_matrix(q),
                self.config.init_scale.unwrap_or(DEFAULT_IMPLICIT_INIT_SCALE),
            ),
        };

        let (x, y) = init_factors(
            q.nrows(),
            q.ncols(),
            self.config.factors,
            scale,
            self.config.seed,
        )?;

        info!(
            "Training ALS ({:?}) on {}x{} matrix with {} observed cells: factors={}, iterations={}, lambda={}",
            feedback,
            q.nrows(),
            q.ncols(),
            observed_count(q),
            self.config.factors,
            self.config.iterations,
            self.config.lambda
        );

        let (x, y, report) = self.run(&weights, &targets, x, y, feedback)?;

        match report.errors.last() {
            Some(error) => info!(
                "Final error value of {} after {} iterations ({:?})",
                error, report.iterations_run, report.stop_reason
            ),
            None => info!("Training stopped before the first iteration"),
        }

        Ok(AlsModel::new(x, y, mask, max_rating, report))
    }

    /// Runs the alternating passes over prepared weights and targets,
    /// starting from the given factors.
    pub fn run(
        &self,
        weights: &DMatrix<f64>,
        targets: &DMatrix<f64>,
        mut x: DMatrix<f64>,
        mut y: DMatrix<f64>,
        feedback: Feedback,
    ) -> Result<(DMatrix<f64>, DMatrix<f64>, TrainingReport)> {
        validate_same_shape("weights", targets, weights)?;
        let k = self.config.factors;
        if x.shape() != (targets.nrows(), k) {
            return Err(AlsError::DimensionMismatch {
                context: "user factors",
                expected: (targets.nrows(), k),
                actual: x.shape(),
            });
        }
        if y.shape() != (k, targets.ncols()) {
            return Err(AlsError::DimensionMismatch {
                context: "item factors",
                expected: (k, targets.ncols()),
                actual: y.shape(),
            });
        }

        let start = Instant::now();
        let regularization = DMatrix::<f64>::identity(k, k) * self.config.lambda;
        let mut errors = ErrorHistory::new();
        let mut warnings = Vec::new();
        let mut stop_reason = StopReason::Completed;
        let mut iterations_run = 0;

        for iteration in 0..self.config.iterations {
            if self.is_cancelled() {
                warn!("Training cancelled after {} iterations", iterations_run);
                stop_reason = StopReason::Cancelled;
                break;
            }

            let pass = Pass {
                weights,
                targets,
                regularization: &regularization,
                iteration,
                strict: self.config.strict,
            };
            solve_rows(&pass, &y, &mut x, &mut warnings)?;
            solve_columns(&pass, &x, &mut y, &mut warnings)?;

            let error = weighted_error(weights, targets, &x, &y)?;
            debug!("Iteration {}: error {}", iteration + 1, error);
            errors.push(error);
            iterations_run += 1;

            if let Some(threshold) = self.config.error_threshold {
                if errors.has_converged(threshold) {
                    debug!("Error {} reached threshold {}", error, threshold);
                    stop_reason = StopReason::Converged;
                    break;
                }
            }
        }

        let report = TrainingReport {
            feedback,
            errors,
            iterations_run,
            stop_reason,
            warnings,
            elapsed: start.elapsed(),
        };

        Ok((x, y, report))
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map_or(false, CancellationToken::is_cancelled)
    }
}

/// Rewrites every row of `x` against the current `y`.
fn solve_rows(
    pass: &Pass<'_>,
    y: &DMatrix<f64>,
    x: &mut DMatrix<f64>,
    warnings: &mut Vec<SolveWarning>,
) -> Result<()> {
    let y_t = y.transpose();

    for u in 0..x.nrows() {
        let mut y_w = y.clone();
        for (j, mut column) in y_w.column_iter_mut().enumerate() {
            column *= pass.weights[(u, j)];
        }

        let lhs = &y_w * &y_t + pass.regularization;
        let rhs = &y_w * pass.targets.row(u).transpose();

        match solve_regularized(lhs, &rhs) {
            Some(row) => x.set_row(u, &row.transpose()),
            None => record_singular(pass, Axis::Row, u, warnings)?,
        }
    }

    Ok(())
}

/// Rewrites every column of `y` against the freshly solved `x`.
fn solve_columns(
    pass: &Pass<'_>,
    x: &DMatrix<f64>,
    y: &mut DMatrix<f64>,
    warnings: &mut Vec<SolveWarning>,
) -> Result<()> {
    let x_t = x.transpose();

    for i in 0..y.ncols() {
        let mut x_t_w = x_t.clone();
        for (u, mut column) in x_t_w.column_iter_mut().enumerate() {
            column *= pass.weights[(u, i)];
        }

        let lhs = &x_t_w * x + pass.regularization;
        let rhs = &x_t_w * pass.targets.column(i);

        match solve_regularized(lhs, &rhs) {
            Some(column) => y.set_column(i, &column),
            None => record_singular(pass, Axis::Column, i, warnings)?,
        }
    }

    Ok(())
}

fn record_singular(
    pass: &Pass<'_>,
    axis: Axis,
    index: usize,
    warnings: &mut Vec<SolveWarning>,
) -> Result<()> {
    if pass.strict {
        return Err(AlsError::SingularSystem { axis, index });
    }

    warn!(
        "Singular system for {} {} in iteration {}, keeping previous factor",
        axis,
        index,
        pass.iteration + 1
    );
    warnings.push(SolveWarning {
        iteration: pass.iteration,
        axis,
        index,
    });

    Ok(())
}

/// Solves the symmetric `k×k` system, Cholesky first and LU as fallback.
/// `None` means the system has no usable solution.
fn solve_regularized(lhs: DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(cholesky) = lhs.clone().cholesky() {
        let solution = cholesky.solve(rhs);
        if is_finite(&solution) {
            return Some(solution);
        }
    }

    lhs.lu().solve(rhs).filter(is_finite)
}

fn is_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Explicit-feedback training with default seed and lenient solves.
/// Returns `Qhat` and the error of the last iteration.
pub fn train(
    q: &DMatrix<f64>,
    factors: usize,
    iterations: usize,
    lambda: f64,
) -> Result<(DMatrix<f64>, Option<f64>)> {
    let model = AlsTrainer::new(TrainingConfig::new(factors, iterations, lambda)).fit_explicit(q)?;
    let error = model.final_error();
    Ok((model.predictions, error))
}

/// Implicit-feedback counterpart of [`train`].
pub fn train_implicit(
    q: &DMatrix<f64>,
    factors: usize,
    iterations: usize,
    lambda: f64,
    alpha: f64,
) -> Result<(DMatrix<f64>, Option<f64>)> {
    let model =
        AlsTrainer::new(TrainingConfig::new(factors, iterations, lambda)).fit_implicit(q, alpha)?;
    let error = model.final_error();
    Ok((model.predictions, error))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratings() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 2, &[5.0, 3.0, 0.0, 0.0, 4.0, 2.0])
    }

    /// One alternating pass written out with explicit diagonal matrices.
    fn reference_pass(
        weights: &DMatrix<f64>,
        targets: &DMatrix<f64>,
        lambda: f64,
        y: &DMatrix<f64>,
    ) -> (DMatrix<f64>, DMatrix<f64>) {
        let k = y.nrows();
        let reg = DMatrix::<f64>::identity(k, k) * lambda;

        let mut x = DMatrix::zeros(weights.nrows(), k);
        for u in 0..weights.nrows() {
            let d = DMatrix::from_diagonal(&weights.row(u).transpose());
            let lhs = y * &d * y.transpose() + &reg;
            let rhs = y * &d * targets.row(u).transpose();
            x.set_row(u, &lhs.lu().solve(&rhs).unwrap().transpose());
        }

        let mut y_new = DMatrix::zeros(k, weights.ncols());
        for i in 0..weights.ncols() {
            let d = DMatrix::from_diagonal(&weights.column(i).clone_owned());
            let lhs = x.transpose() * &d * &x + &reg;
            let rhs = x.transpose() * &d * targets.column(i).clone_owned();
            y_new.set_column(i, &lhs.lu().solve(&rhs).unwrap());
        }

        (x, y_new)
    }

    fn assert_pass_matches(weights: &DMatrix<f64>, targets: &DMatrix<f64>) {
        let lambda = 0.3;
        let (mut x, mut y) = init_factors(weights.nrows(), weights.ncols(), 2, 4.0, 3).unwrap();
        let (expected_x, expected_y) = reference_pass(weights, targets, lambda, &y);

        let regularization = DMatrix::<f64>::identity(2, 2) * lambda;
        let pass = Pass {
            weights,
            targets,
            regularization: &regularization,
            iteration: 0,
            strict: true,
        };
        let mut warnings = Vec::new();
        solve_rows(&pass, &y, &mut x, &mut warnings).unwrap();
        solve_columns(&pass, &x, &mut y, &mut warnings).unwrap();

        assert!(warnings.is_empty());
        assert!((&x - &expected_x).amax() < 1e-9, "X differs: {} vs {}", x, expected_x);
        assert!((&y - &expected_y).amax() < 1e-9, "Y differs: {} vs {}", y, expected_y);
    }

    #[rustfmt::skip]
    fn wide_counts() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 4, &[
            4.0, 0.0, 1.0, 0.0,
            0.0, 2.0, 0.0, 5.0,
            3.0, 1.0, 0.0, 2.0,
        ])
    }

    #[test]
    fn test_explicit_pass_matches_normal_equations() {
        let q = wide_counts();
        assert_pass_matches(&make_weight_matrix(&q), &observed_values(&q));
    }

    #[test]
    fn test_implicit_pass_matches_normal_equations() {
        let q = wide_counts();
        let c = make_confidence_matrix(&q, 10.0).unwrap();
        assert_pass_matches(&c, &make_preference_matrix(&q));
    }

    #[test]
    fn test_solve_regularized() {
        let lhs = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let rhs = DVector::from_vec(vec![1.0, 2.0]);
        let solution = solve_regularized(lhs.clone(), &rhs).unwrap();
        let residual = &lhs * &solution - &rhs;
        assert!(residual.norm() < 1e-12);
    }

    #[test]
    fn test_solve_regularized_singular() {
        let lhs = DMatrix::<f64>::zeros(2, 2);
        let rhs = DVector::from_vec(vec![0.0, 0.0]);
        assert!(solve_regularized(lhs, &rhs).is_none());
    }

    #[test]
    fn test_strict_mode_surfaces_singular_row() {
        let config = TrainingConfig::new(1, 3, 0.0).with_strict(true);
        let result = AlsTrainer::new(config).fit_explicit(&ratings());
        match result {
            Err(AlsError::SingularSystem { axis, index }) => {
                assert_eq!(axis, Axis::Row);
                assert_eq!(index, 1);
            }
            other => panic!("expected singular system, got {:?}", other.map(|m| m.report)),
        }
    }

    #[test]
    fn test_lenient_mode_keeps_previous_row() {
        let config = TrainingConfig::new(1, 3, 0.0);
        let (initial_x, _) = init_factors(3, 2, 1, 5.0, config.seed).unwrap();
        let model = AlsTrainer::new(config).fit_explicit(&ratings()).unwrap();

        let row_warnings: Vec<_> = model
            .report
            .warnings
            .iter()
            .filter(|w| w.axis == Axis::Row)
            .collect();
        assert_eq!(row_warnings.len(), 3);
        assert!(row_warnings.iter().all(|w| w.index == 1));
        assert_eq!(model.user_factors[(1, 0)], initial_x[(1, 0)]);
        assert_eq!(model.report.iterations_run, 3);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let model = AlsTrainer::new(TrainingConfig::new(1, 5, 0.1))
            .with_cancellation(token)
            .fit_explicit(&ratings())
            .unwrap();

        assert_eq!(model.report.stop_reason, StopReason::Cancelled);
        assert_eq!(model.report.iterations_run, 0);
        assert_eq!(model.final_error(), None);
        assert_eq!(model.predictions.shape(), (3, 2));
    }

    #[test]
    fn test_error_threshold_stops_early() {
        let config = TrainingConfig::new(1, 50, 0.01).with_error_threshold(1e6);
        let model = AlsTrainer::new(config).fit_explicit(&ratings()).unwrap();
        assert_eq!(model.report.stop_reason, StopReason::Converged);
        assert_eq!(model.report.iterations_run, 1);
    }

    #[test]
    fn test_run_rejects_mismatched_factors() {
        let trainer = AlsTrainer::new(TrainingConfig::new(2, 1, 0.1));
        let q = ratings();
        let w = make_weight_matrix(&q);
        let x = DMatrix::zeros(3, 3);
        let y = DMatrix::zeros(2, 2);
        assert!(matches!(
            trainer.run(&w, &q, x, y, Feedback::Explicit),
            Err(AlsError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let q = ratings();
        assert!(matches!(
            AlsTrainer::new(TrainingConfig::new(0, 1, 0.1)).fit_explicit(&q),
            Err(AlsError::InvalidInput(_))
        ));
        assert!(matches!(
            AlsTrainer::new(TrainingConfig::new(1, 1, -0.5)).fit_explicit(&q),
            Err(AlsError::InvalidInput(_))
        ));
        assert!(matches!(
            AlsTrainer::new(TrainingConfig::new(1, 1, 0.1)).fit_implicit(&q, -2.0),
            Err(AlsError::InvalidInput(_))
        ));
    }
}
