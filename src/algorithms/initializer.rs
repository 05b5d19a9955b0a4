use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{AlsError, Result};
use crate::utils::validation::validate_init_scale;

/// Independent draws from `Uniform(0, scale)`, filled column by column.
fn uniform_matrix<R: Rng>(rows: usize, cols: usize, scale: f64, rng: &mut R) -> DMatrix<f64> {
    DMatrix::from_fn(rows, cols, |_, _| scale * rng.gen::<f64>())
}

/// Seeded factor pair for a `rows×cols` interaction matrix: `X` is `rows×k`
/// and `Y` is `k×cols`. Both are drawn from one generator, `X` first.
pub fn init_factors(
    rows: usize,
    cols: usize,
    k: usize,
    scale: f64,
    seed: u64,
) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
    if k == 0 {
        return Err(AlsError::InvalidInput(
            "number of latent factors must be at least 1".to_string(),
        ));
    }
    validate_init_scale(scale)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let x = uniform_matrix(rows, k, scale, &mut rng);
    let y = uniform_matrix(k, cols, scale, &mut rng);

    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_factors_shapes_and_range() {
        let (x, y) = init_factors(4, 6, 3, 5.0, 47).unwrap();
        assert_eq!(x.shape(), (4, 3));
        assert_eq!(y.shape(), (3, 6));
        assert!(x.iter().chain(y.iter()).all(|&v| (0.0..5.0).contains(&v)));
    }

    #[test]
    fn test_init_factors_reproducible() {
        let first = init_factors(5, 5, 2, 1.0, 11).unwrap();
        let second = init_factors(5, 5, 2, 1.0, 11).unwrap();
        assert_eq!(first, second);

        let other = init_factors(5, 5, 2, 1.0, 12).unwrap();
        assert_ne!(first.0, other.0);
    }

    #[test]
    fn test_init_factors_rejects_bad_input() {
        assert!(init_factors(2, 2, 0, 1.0, 1).is_err());
        assert!(init_factors(2, 2, 1, -1.0, 1).is_err());
        assert!(init_factors(2, 2, 1, f64::NAN, 1).is_err());
    }

    #[test]
    fn test_zero_scale_gives_zero_factors() {
        let (x, y) = init_factors(3, 3, 2, 0.0, 1).unwrap();
        assert!(x.iter().chain(y.iter()).all(|&v| v == 0.0));
    }
}
