use super::*;
use rayon::prelude::*;

/// Dense `k × k` symmetric matrix of inter-centroid distances.
///
/// Recomputed by the coordinator once per iteration, before the assignment
/// phase is broadcast, and read-only for the whole phase. Alongside the
/// matrix it caches s(c) = (1/2) min_{c'≠c} d(c, c') for every centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    k: usize,
    values: Vec<Energy>,
    midpoints: Vec<Energy>,
}

impl DistanceMatrix {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            values: vec![0.; k * k],
            midpoints: vec![Energy::INFINITY; k],
        }
    }
    pub fn k(&self) -> usize {
        self.k
    }
    /// d(c_i, c_j).
    pub fn get(&self, i: usize, j: usize) -> Energy {
        self.values[i * self.k + j]
    }
    /// s(c) = (1/2) min_{c'≠c} d(c, c'). Infinite when k = 1.
    pub fn midpoint(&self, c: usize) -> Energy {
        self.midpoints[c]
    }

    /// Computes pairwise distances between all centroids.
    pub fn compute(&mut self, clusters: &Clusters, metric: &Metric) {
        assert_eq!(clusters.k(), self.k);
        let k = self.k;
        self.values
            .par_chunks_mut(k)
            .enumerate()
            .for_each(|(i, row)| {
                row.iter_mut().enumerate().for_each(|(j, d)| {
                    *d = match i.cmp(&j) {
                        std::cmp::Ordering::Equal => 0.,
                        std::cmp::Ordering::Less => metric.distance(clusters.mean(i), clusters.mean(j)),
                        std::cmp::Ordering::Greater => metric.distance(clusters.mean(j), clusters.mean(i)),
                    }
                })
            });
        self.midpoints = self
            .values
            .chunks_exact(k)
            .enumerate()
            .map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, &d)| d * 0.5)
                    .fold(Energy::INFINITY, Energy::min)
            })
            .collect();
    }
}
