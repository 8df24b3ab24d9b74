use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

/// Row-major `nrow * ncol` matrix of `blobs` well separated Gaussian-ish
/// clusters. Row `i` belongs to blob `i % blobs`, whose center sits at
/// `10 * b` in every column; each value is jittered uniformly by ±1.
///
/// Deterministic for a given seed, so tests and benchmarks can rely on
/// the exact values.
pub fn blobs(nrow: usize, ncol: usize, blobs: usize, seed: u64) -> Vec<f64> {
    let ref mut rng = SmallRng::seed_from_u64(seed);
    (0..nrow)
        .flat_map(|i| std::iter::repeat(10. * (i % blobs.max(1)) as f64).take(ncol))
        .map(|center| center + rng.random_range(-1.0..1.0))
        .collect()
}

/// Blob index each row of [`blobs`] was drawn from.
pub fn labels(nrow: usize, blobs: usize) -> Vec<usize> {
    (0..nrow).map(|i| i % blobs.max(1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_and_separated() {
        let a = blobs(50, 5, 3, 7);
        let b = blobs(50, 5, 3, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 250);
        a.chunks_exact(5)
            .zip(labels(50, 3))
            .for_each(|(row, blob)| {
                row.iter()
                    .for_each(|x| assert!((x - 10. * blob as f64).abs() < 1.))
            });
    }
}
