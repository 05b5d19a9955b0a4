use std::cmp::Ordering;

pub mod loader;
pub mod metrics;
pub mod validation;

/// Orders `(index, score)` pairs by score descending, then index ascending,
/// and keeps the first `k`. Equal scores never shadow each other.
pub fn ranked_indices(scored: &[(usize, f64)], k: usize) -> Vec<(usize, f64)> {
    let mut ranked = scored.to_vec();
    ranked.sort_by(|a, b| compare_scores(b.1, a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked
}

/// Indices of the `k` highest scores.
pub fn top_k_indices(scores: &[f64], k: usize) -> Vec<usize> {
    let indexed: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();

    ranked_indices(&indexed, k)
        .into_iter()
        .map(|(i, _)| i)
        .collect()
}

/// Position of the largest score; the first one wins on ties.
pub fn argmax(scores: &[f64]) -> Option<usize> {
    top_k_indices(scores, 1).first().copied()
}

/// NaN sorts below every number.
fn compare_scores(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_k_indices() {
        let scores = vec![0.1, 0.5, 0.3, 0.9, 0.2];
        let top_2 = top_k_indices(&scores, 2);
        assert_eq!(top_2, vec![3, 1]);
    }

    #[test]
    fn test_top_k_indices_keeps_duplicate_scores() {
        let scores = vec![0.5, 0.7, 0.5, 0.5];
        assert_eq!(top_k_indices(&scores, 4), vec![1, 0, 2, 3]);
    }

    #[test]
    fn test_nan_ranks_last() {
        let scores = vec![f64::NAN, -1.0, 2.0];
        assert_eq!(top_k_indices(&scores, 3), vec![2, 1, 0]);
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }
}
