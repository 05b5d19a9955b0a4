use nalgebra::DMatrix;
use rayon::prelude::*;

use super::preprocessing::{is_missing, make_weight_matrix, max_observed};
use crate::error::{AlsError, Result};
use crate::models::Recommendation;
use crate::utils::{argmax, ranked_indices};
use crate::utils::validation::{validate_labels, validate_same_shape};

pub fn predict(qhat: &DMatrix<f64>, user: usize, item: usize) -> Result<f64> {
    check_user(qhat, user)?;
    if item >= qhat.ncols() {
        return Err(AlsError::IndexOutOfRange {
            what: "item",
            index: item,
            limit: qhat.ncols(),
        });
    }

    Ok(qhat[(user, item)])
}

/// Highest-scoring items the user has not rated yet, ordered by score
/// descending and item index ascending on ties.
///
/// Items observed in `q` are excluded outright, so fewer than `n` entries
/// come back when the user has rated almost everything.
pub fn top_n(
    q: &DMatrix<f64>,
    qhat: &DMatrix<f64>,
    user: usize,
    n: usize,
    labels: Option<&[String]>,
) -> Result<Vec<Recommendation>> {
    validate_same_shape("predictions", q, qhat)?;
    validate_labels(labels, qhat.ncols())?;
    check_user(qhat, user)?;
    if n > qhat.ncols() {
        return Err(AlsError::IndexOutOfRange {
            what: "top-n count",
            index: n,
            limit: qhat.ncols(),
        });
    }

    Ok(rank_user(q, qhat, user, n, labels))
}

/// [`top_n`] reduced to item labels.
pub fn top_n_labels(
    q: &DMatrix<f64>,
    qhat: &DMatrix<f64>,
    user: usize,
    n: usize,
    labels: Option<&[String]>,
) -> Result<Vec<String>> {
    Ok(top_n(q, qhat, user, n, labels)?
        .into_iter()
        .map(|r| r.label)
        .collect())
}

/// Top-N lists for every user, ranked in parallel.
pub fn recommend_all(
    q: &DMatrix<f64>,
    qhat: &DMatrix<f64>,
    n: usize,
    labels: Option<&[String]>,
) -> Result<Vec<Vec<Recommendation>>> {
    validate_same_shape("predictions", q, qhat)?;
    validate_labels(labels, qhat.ncols())?;
    if n > qhat.ncols() {
        return Err(AlsError::IndexOutOfRange {
            what: "top-n count",
            index: n,
            limit: qhat.ncols(),
        });
    }

    Ok((0..qhat.nrows())
        .into_par_iter()
        .map(|user| rank_user(q, qhat, user, n, labels))
        .collect())
}

/// The single item each user is most likely to enjoy among those not rated.
///
/// Predictions are shifted to start at zero and scaled so their maximum
/// matches the largest observed rating; the observation mask, scaled the
/// same way, is then subtracted before taking the arg-max of each row.
pub fn best_items(q: &DMatrix<f64>, qhat: &DMatrix<f64>) -> Result<Vec<usize>> {
    best_items_scaled(&make_weight_matrix(q), qhat, max_observed(q))
}

pub(crate) fn best_items_scaled(
    mask: &DMatrix<f64>,
    qhat: &DMatrix<f64>,
    max_rating: f64,
) -> Result<Vec<usize>> {
    validate_same_shape("predictions", mask, qhat)?;

    let min = qhat.min();
    let shifted = qhat.add_scalar(-min);
    let max = shifted.max();
    let scaled = if max > 0.0 {
        shifted * (max_rating / max)
    } else {
        shifted
    };
    let suppressed = scaled - mask * max_rating;

    Ok(suppressed
        .row_iter()
        .map(|row| {
            let scores: Vec<f64> = row.iter().copied().collect();
            argmax(&scores).unwrap_or(0)
        })
        .collect())
}

fn check_user(qhat: &DMatrix<f64>, user: usize) -> Result<()> {
    if user >= qhat.nrows() {
        return Err(AlsError::IndexOutOfRange {
            what: "user",
            index: user,
            limit: qhat.nrows(),
        });
    }

    Ok(())
}

fn rank_user(
    q: &DMatrix<f64>,
    qhat: &DMatrix<f64>,
    user: usize,
    n: usize,
    labels: Option<&[String]>,
) -> Vec<Recommendation> {
    let candidates: Vec<(usize, f64)> = (0..qhat.ncols())
        .filter(|&item| is_missing(q[(user, item)]))
        .map(|item| (item, qhat[(user, item)]))
        .collect();

    ranked_indices(&candidates, n)
        .into_iter()
        .map(|(item, score)| Recommendation {
            item,
            label: match labels {
                Some(labels) => labels[item].clone(),
                None => item.to_string(),
            },
            score,
        })
        .collect()
}
