use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::algorithms::convergence::ErrorHistory;
use crate::algorithms::ranking;
use crate::error::{Axis, Result};

/// Kind of signal stored in the interaction matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Feedback {
    /// Directly observed ratings.
    Explicit,
    /// Counts turned into confidence weights `1 + α·r`.
    Implicit { alpha: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Ran the configured number of iterations.
    Completed,
    /// The error reached the configured threshold.
    Converged,
    Cancelled,
}

/// A normal-equation system that could not be solved in lenient mode. The
/// affected factor kept its previous value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveWarning {
    pub iteration: usize,
    pub axis: Axis,
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub feedback: Feedback,
    pub errors: ErrorHistory,
    pub iterations_run: usize,
    pub stop_reason: StopReason,
    pub warnings: Vec<SolveWarning>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item: usize,
    pub label: String,
    pub score: f64,
}

/// Result of a training run: both factor matrices, their product and the
/// observation mask of the data they were fitted to.
#[derive(Debug, Clone)]
pub struct AlsModel {
    /// `X`, users × k.
    pub user_factors: DMatrix<f64>,
    /// `Y`, k × items.
    pub item_factors: DMatrix<f64>,
    /// `Qhat = X·Y`.
    pub predictions: DMatrix<f64>,
    pub report: TrainingReport,
    observed: DMatrix<f64>,
    max_rating: f64,
}

impl AlsModel {
    pub(crate) fn new(
        user_factors: DMatrix<f64>,
        item_factors: DMatrix<f64>,
        observed: DMatrix<f64>,
        max_rating: f64,
        report: TrainingReport,
    ) -> Self {
        let predictions = &user_factors * &item_factors;
        Self {
            user_factors,
            item_factors,
            predictions,
            report,
            observed,
            max_rating,
        }
    }

    pub fn num_users(&self) -> usize {
        self.predictions.nrows()
    }

    pub fn num_items(&self) -> usize {
        self.predictions.ncols()
    }

    pub fn num_factors(&self) -> usize {
        self.user_factors.ncols()
    }

    /// Error after the last completed iteration, `None` if none ran.
    pub fn final_error(&self) -> Option<f64> {
        self.report.errors.last()
    }

    pub fn predict(&self, user: usize, item: usize) -> Result<f64> {
        ranking::predict(&self.predictions, user, item)
    }

    pub fn top_n(
        &self,
        user: usize,
        n: usize,
        labels: Option<&[String]>,
    ) -> Result<Vec<Recommendation>> {
        ranking::top_n(&self.observed, &self.predictions, user, n, labels)
    }

    pub fn top_n_labels(
        &self,
        user: usize,
        n: usize,
        labels: Option<&[String]>,
    ) -> Result<Vec<String>> {
        ranking::top_n_labels(&self.observed, &self.predictions, user, n, labels)
    }

    pub fn recommend_all(
        &self,
        n: usize,
        labels: Option<&[String]>,
    ) -> Result<Vec<Vec<Recommendation>>> {
        ranking::recommend_all(&self.observed, &self.predictions, n, labels)
    }

    pub fn best_items(&self) -> Result<Vec<usize>> {
        ranking::best_items_scaled(&self.observed, &self.predictions, self.max_rating)
    }
}
