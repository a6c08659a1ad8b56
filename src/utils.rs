//! Utility functions.
use rand::Rng;

/// Relative spread of the per-neuron parameter jitter.
pub const JITTER: f64 = 0.1;

/// Returns `n` values drawn uniformly around `base`, with a total spread of `epsilon * |base|`.
/// Each value lies in `[base - epsilon * base / 2, base + epsilon * base / 2)` (bounds swap for negative bases).
pub fn jitter<R: Rng>(base: f64, n: usize, epsilon: f64, rng: &mut R) -> Vec<f64> {
    (0..n)
        .map(|_| base - 0.5 * epsilon * base + epsilon * base * rng.gen::<f64>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_jitter_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let values = jitter(0.2, 1000, JITTER, &mut rng);
        assert_eq!(values.len(), 1000);
        assert!(values.iter().all(|&v| (0.1899..0.2101).contains(&v)));

        let values = jitter(-65.0, 1000, JITTER, &mut rng);
        assert!(values.iter().all(|&v| (-68.2501..=-61.7499).contains(&v)));
    }

    #[test]
    fn test_jitter_zero_epsilon() {
        let mut rng = StdRng::seed_from_u64(42);
        assert_eq!(jitter(8.0, 3, 0.0, &mut rng), vec![8.0, 8.0, 8.0]);
    }
}
