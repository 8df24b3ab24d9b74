/// Additive aggregation for per-thread partial results.
///
/// Absorption must be associative and commutative, so partials can be merged
/// in any order and any grouping (one worker, many workers, many machines).
pub trait Absorb {
    /// Folds `other` into `self`.
    fn absorb(&mut self, other: &Self);
}

/// Per-cluster partial sums and member counts.
///
/// Each worker fills one during an assignment phase. After the barrier the
/// coordinator absorbs them all; across workers the counts of a full
/// assignment phase sum to `nrow`.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    k: usize,
    ncol: usize,
    sums: Vec<f64>,
    counts: Vec<usize>,
}

impl Accumulator {
    pub fn new(k: usize, ncol: usize) -> Self {
        Self {
            k,
            ncol,
            sums: vec![0.; k * ncol],
            counts: vec![0; k],
        }
    }
    pub fn k(&self) -> usize {
        self.k
    }
    pub fn ncol(&self) -> usize {
        self.ncol
    }
    /// Adds one row to cluster `j`.
    pub fn add(&mut self, j: usize, row: &[f64]) {
        debug_assert_eq!(row.len(), self.ncol);
        self.sums[j * self.ncol..(j + 1) * self.ncol]
            .iter_mut()
            .zip(row.iter())
            .for_each(|(sum, x)| *sum += x);
        self.counts[j] += 1;
    }
    pub fn sum(&self, j: usize) -> &[f64] {
        &self.sums[j * self.ncol..(j + 1) * self.ncol]
    }
    pub fn count(&self, j: usize) -> usize {
        self.counts[j]
    }
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }
    /// Members across every cluster.
    pub fn members(&self) -> usize {
        self.counts.iter().sum()
    }
}

impl Absorb for Accumulator {
    fn absorb(&mut self, other: &Self) {
        assert_eq!((self.k, self.ncol), (other.k, other.ncol));
        self.sums
            .iter_mut()
            .zip(other.sums.iter())
            .for_each(|(a, b)| *a += b);
        self.counts
            .iter_mut()
            .zip(other.counts.iter())
            .for_each(|(a, b)| *a += b);
    }
}
