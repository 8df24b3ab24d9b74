use super::*;

/// Per-column minimum and maximum over a set of rows.
///
/// Each worker observes its own rows during the `BOUNDS` phase; the
/// coordinator absorbs the partial ranges into the global one that every
/// worker then applies in `NORMALIZE_DATA`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRange {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl FeatureRange {
    /// An empty range that any observed row widens.
    pub fn new(ncol: usize) -> Self {
        Self {
            min: vec![f64::INFINITY; ncol],
            max: vec![f64::NEG_INFINITY; ncol],
        }
    }
    pub fn ncol(&self) -> usize {
        self.min.len()
    }
    pub fn min(&self) -> &[f64] {
        &self.min
    }
    pub fn max(&self) -> &[f64] {
        &self.max
    }

    /// Widens the range to include `row`.
    pub fn observe(&mut self, row: &[f64]) {
        debug_assert_eq!(row.len(), self.ncol());
        self.min
            .iter_mut()
            .zip(self.max.iter_mut())
            .zip(row)
            .for_each(|((lo, hi), &x)| {
                *lo = lo.min(x);
                *hi = hi.max(x);
            });
    }

    /// Maps `x` from column `col` into [0, 1]. A constant column maps to 0.
    pub fn scale(&self, col: usize, x: f64) -> f64 {
        let span = self.max[col] - self.min[col];
        if span > 0. { (x - self.min[col]) / span } else { 0. }
    }

    /// Every value of `row`, scaled.
    pub fn rescale<'a>(&'a self, row: &'a [f64]) -> impl Iterator<Item = f64> + 'a {
        row.iter().enumerate().map(move |(col, &x)| self.scale(col, x))
    }
}

impl Absorb for FeatureRange {
    fn absorb(&mut self, other: &Self) {
        assert_eq!(self.ncol(), other.ncol());
        self.min
            .iter_mut()
            .zip(other.min.iter())
            .for_each(|(a, b)| *a = a.min(*b));
        self.max
            .iter_mut()
            .zip(other.max.iter())
            .for_each(|(a, b)| *a = a.max(*b));
    }
}
