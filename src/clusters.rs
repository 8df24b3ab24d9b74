use super::*;

/// The global cluster table.
///
/// Holds `k` means, the means of the previous iteration, member counts, and
/// how far each mean moved in the last merge. Only the coordinator mutates
/// it, between phases; workers read it during a phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Clusters {
    k: usize,
    ncol: usize,
    means: Vec<f64>,
    prev: Vec<f64>,
    counts: Vec<usize>,
    drift: Vec<Energy>,
}

impl Clusters {
    pub fn new(k: usize, ncol: usize) -> Self {
        Self {
            k,
            ncol,
            means: vec![0.; k * ncol],
            prev: vec![0.; k * ncol],
            counts: vec![0; k],
            drift: vec![0.; k],
        }
    }
    pub fn k(&self) -> usize {
        self.k
    }
    pub fn ncol(&self) -> usize {
        self.ncol
    }
    pub fn mean(&self, j: usize) -> &[f64] {
        &self.means[j * self.ncol..(j + 1) * self.ncol]
    }
    pub fn means(&self) -> &[f64] {
        &self.means
    }
    pub fn prev_mean(&self, j: usize) -> &[f64] {
        &self.prev[j * self.ncol..(j + 1) * self.ncol]
    }
    pub fn set_mean(&mut self, j: usize, row: &[f64]) {
        self.means[j * self.ncol..(j + 1) * self.ncol].copy_from_slice(row);
    }
    /// Overwrites every mean from a row-major `k * ncol` buffer.
    pub fn set_means(&mut self, means: &[f64]) {
        self.means.copy_from_slice(means);
    }
    pub fn count(&self, j: usize) -> usize {
        self.counts[j]
    }
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }
    /// Distance the mean of cluster j moved in the last merge.
    pub fn drift(&self, j: usize) -> Energy {
        self.drift[j]
    }
    pub fn drifts(&self) -> &[Energy] {
        &self.drift
    }

    /// Distance from `x` to every mean, in cluster order.
    pub fn distances<'a>(&'a self, x: &'a [f64], metric: &'a Metric) -> impl Iterator<Item = Energy> + 'a {
        self.means
            .chunks_exact(self.ncol)
            .map(move |mean| metric.distance(x, mean))
            .inspect(|d| debug_assert!(!d.is_nan()))
    }

    /// Nearest mean to `x` and the distance to it, scanning every cluster.
    /// An exact tie keeps `current`; other ties resolve to the lowest index.
    pub fn nearest(&self, x: &[f64], metric: &Metric, current: Option<usize>) -> (usize, Energy) {
        Self::closest(self.distances(x, metric), current)
    }

    /// Index and value of the smallest distance, with the tie rule of
    /// [`Clusters::nearest`].
    pub fn closest(distances: impl Iterator<Item = Energy>, current: Option<usize>) -> (usize, Energy) {
        distances
            .enumerate()
            .fold((0, Energy::INFINITY), |(j, best), (i, d)| {
                if d < best || (d == best && Some(i) == current) {
                    (i, d)
                } else {
                    (j, best)
                }
            })
    }

    /// Replaces means with `sum / count` from merged partials.
    ///
    /// Empty clusters keep their previous mean rather than dividing by zero.
    /// Records each cluster's drift and returns the total member count.
    pub fn finalize(&mut self, merged: &Accumulator, metric: &Metric) -> usize {
        assert_eq!((merged.k(), merged.ncol()), (self.k, self.ncol));
        self.prev.copy_from_slice(&self.means);
        for j in 0..self.k {
            let count = merged.count(j);
            self.counts[j] = count;
            if count > 0 {
                let n = count as f64;
                self.means[j * self.ncol..(j + 1) * self.ncol]
                    .iter_mut()
                    .zip(merged.sum(j).iter())
                    .for_each(|(mean, sum)| *mean = sum / n);
            } else {
                log::debug!("cluster {} is empty, keeping previous mean", j);
            }
            self.drift[j] = metric.distance(self.mean(j), self.prev_mean(j));
        }
        merged.members()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_averages_members() {
        let mut clusters = Clusters::new(2, 2);
        let mut acc = Accumulator::new(2, 2);
        acc.add(0, &[1., 1.]);
        acc.add(0, &[3., 5.]);
        acc.add(1, &[4., 0.]);
        assert_eq!(clusters.finalize(&acc, &Metric::Euclidean), 3);
        assert_eq!(clusters.mean(0), &[2., 3.]);
        assert_eq!(clusters.mean(1), &[4., 0.]);
        assert_eq!(clusters.counts(), &[2, 1]);
        assert_eq!(clusters.drift(1), 4.);
    }

    #[test]
    fn empty_cluster_keeps_previous_mean() {
        let mut clusters = Clusters::new(2, 1);
        clusters.set_means(&[5., 9.]);
        let mut acc = Accumulator::new(2, 1);
        acc.add(0, &[1.]);
        clusters.finalize(&acc, &Metric::Euclidean);
        assert_eq!(clusters.mean(1), &[9.]);
        assert_eq!(clusters.count(1), 0);
        assert_eq!(clusters.drift(1), 0.);
        assert_eq!(clusters.drift(0), 4.);
    }

    #[test]
    fn nearest_prefers_lowest_index_on_ties() {
        let mut clusters = Clusters::new(3, 1);
        clusters.set_means(&[1., -1., 1.]);
        assert_eq!(clusters.nearest(&[0.], &Metric::Euclidean, None), (0, 1.));
        assert_eq!(clusters.nearest(&[2.], &Metric::Euclidean, None), (0, 1.));
        assert_eq!(clusters.nearest(&[-3.], &Metric::Taxicab, None), (1, 2.));
    }

    #[test]
    fn nearest_keeps_current_cluster_on_ties() {
        let mut clusters = Clusters::new(3, 1);
        clusters.set_means(&[1., -1., 1.]);
        assert_eq!(clusters.nearest(&[0.], &Metric::Euclidean, Some(1)), (1, 1.));
        assert_eq!(clusters.nearest(&[0.], &Metric::Euclidean, Some(2)), (2, 1.));
        assert_eq!(clusters.nearest(&[2.], &Metric::Euclidean, Some(1)), (0, 1.));
    }
}
