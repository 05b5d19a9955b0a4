use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::algorithms::preprocessing::is_missing;
use crate::error::{AlsError, Result};
use crate::utils::validation::validate_same_shape;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingMetrics {
    pub precision_at_k: f64,
    pub recall_at_k: f64,
    pub f1_score: f64,
    pub ndcg_at_k: f64,
}

/// Root-mean-square error of `qhat` over the cells observed in `test`.
pub fn rmse(test: &DMatrix<f64>, qhat: &DMatrix<f64>) -> Result<f64> {
    validate_same_shape("test matrix", qhat, test)?;

    let (sum, count) = test
        .iter()
        .zip(qhat.iter())
        .filter(|&(&t, _)| !is_missing(t))
        .fold((0.0, 0usize), |(sum, count), (&t, &p)| {
            (sum + (t - p).powi(2), count + 1)
        });

    if count == 0 {
        return Err(AlsError::InvalidInput(
            "test matrix has no observed entries".to_string(),
        ));
    }

    Ok((sum / count as f64).sqrt())
}

#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    k: usize,
}

impl MetricsCalculator {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    pub fn calculate_precision_at_k(&self, recommended: &[usize], relevant: &[usize]) -> f64 {
        if recommended.is_empty() || self.k == 0 {
            return 0.0;
        }

        let hits = self.hits(recommended, relevant);
        hits as f64 / self.k.min(recommended.len()) as f64
    }

    pub fn calculate_recall_at_k(&self, recommended: &[usize], relevant: &[usize]) -> f64 {
        if relevant.is_empty() {
            return 0.0;
        }

        let hits = self.hits(recommended, relevant);
        hits as f64 / relevant.len() as f64
    }

    pub fn calculate_f1_score(&self, precision: f64, recall: f64) -> f64 {
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }

    /// Relevance is graded by `relevant_scores`; missing items count as 0.
    pub fn calculate_ndcg_at_k(
        &self,
        recommended: &[usize],
        relevant_scores: &HashMap<usize, f64>,
    ) -> f64 {
        let dcg: f64 = recommended
            .iter()
            .take(self.k)
            .enumerate()
            .map(|(i, item)| relevant_scores.get(item).copied().unwrap_or(0.0) / discount(i))
            .sum();

        let mut ideal: Vec<f64> = relevant_scores.values().copied().collect();
        ideal.sort_by(|a, b| b.total_cmp(a));
        let idcg: f64 = ideal
            .iter()
            .take(self.k)
            .enumerate()
            .map(|(i, &score)| score / discount(i))
            .sum();

        if idcg == 0.0 {
            0.0
        } else {
            dcg / idcg
        }
    }

    pub fn calculate_all_metrics(
        &self,
        recommended: &[usize],
        relevant_scores: &HashMap<usize, f64>,
    ) -> RankingMetrics {
        let relevant: Vec<usize> = relevant_scores
            .iter()
            .filter(|&(_, &score)| score > 0.0)
            .map(|(&item, _)| item)
            .collect();
        let precision = self.calculate_precision_at_k(recommended, &relevant);
        let recall = self.calculate_recall_at_k(recommended, &relevant);

        RankingMetrics {
            precision_at_k: precision,
            recall_at_k: recall,
            f1_score: self.calculate_f1_score(precision, recall),
            ndcg_at_k: self.calculate_ndcg_at_k(recommended, relevant_scores),
        }
    }

    fn hits(&self, recommended: &[usize], relevant: &[usize]) -> usize {
        let relevant: HashSet<_> = relevant.iter().collect();
        recommended
            .iter()
            .take(self.k)
            .filter(|item| relevant.contains(item))
            .count()
    }
}

// Position i (0-based) is discounted by log2(i + 2).
fn discount(position: usize) -> f64 {
    ((position + 2) as f64).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rmse_over_observed_cells() {
        let test = DMatrix::from_row_slice(1, 3, &[4.0, 0.0, 2.0]);
        let qhat = DMatrix::from_row_slice(1, 3, &[3.0, 9.0, 3.0]);
        assert!((rmse(&test, &qhat).unwrap() - 1.0).abs() < 1e-12);

        let empty = DMatrix::from_element(1, 3, f64::NAN);
        assert!(rmse(&empty, &qhat).is_err());
    }

    #[test]
    fn test_precision_recall_f1() {
        let calculator = MetricsCalculator::new(3);
        let recommended = vec![4, 1, 7];
        let relevant = vec![4, 7];

        let precision = calculator.calculate_precision_at_k(&recommended, &relevant);
        let recall = calculator.calculate_recall_at_k(&recommended, &relevant);
        assert!((precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((recall - 1.0).abs() < 1e-12);

        let f1 = calculator.calculate_f1_score(precision, recall);
        assert!((f1 - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_ndcg_perfect_ordering() {
        let calculator = MetricsCalculator::new(2);
        let mut scores = HashMap::new();
        scores.insert(3, 2.0);
        scores.insert(5, 1.0);

        assert!((calculator.calculate_ndcg_at_k(&[3, 5], &scores) - 1.0).abs() < 1e-12);
        let swapped = calculator.calculate_ndcg_at_k(&[5, 3], &scores);
        assert!(swapped > 0.0 && swapped < 1.0);
    }

    #[test]
    fn test_all_metrics() {
        let calculator = MetricsCalculator::new(2);
        let mut scores = HashMap::new();
        scores.insert(1, 1.0);
        let metrics = calculator.calculate_all_metrics(&[1, 2], &scores);
        assert!((metrics.precision_at_k - 0.5).abs() < 1e-12);
        assert!((metrics.recall_at_k - 1.0).abs() < 1e-12);
        assert!((metrics.ndcg_at_k - 1.0).abs() < 1e-12);
    }
}
