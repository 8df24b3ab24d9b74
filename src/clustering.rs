use super::*;

/// Outcome of a complete run.
///
/// `converged` is false when the iteration budget ran out first; the
/// assignments and centroids are still the best available.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Clustering {
    pub iterations: usize,
    pub converged: bool,
    pub k: usize,
    pub nrow: usize,
    pub ncol: usize,
    /// Cluster of every row, `INVALID_CLUSTER_ID` if no assignment phase ran.
    pub assignments: Vec<ClusterId>,
    /// Members per cluster.
    pub sizes: Vec<usize>,
    /// Row-major `k * ncol` means.
    pub centroids: Vec<f64>,
}

impl Clustering {
    pub fn centroid(&self, j: usize) -> &[f64] {
        &self.centroids[j * self.ncol..(j + 1) * self.ncol]
    }

    /// Sum of squared distances from every row to its assigned centroid.
    pub fn inertia(&self, data: &[f64], metric: &Metric) -> Energy {
        data.chunks_exact(self.ncol)
            .zip(self.assignments.iter())
            .filter(|(_, j)| **j != INVALID_CLUSTER_ID)
            .map(|(x, &j)| metric.distance(x, self.centroid(j as usize)))
            .map(|d| d * d)
            .sum()
    }
}

impl std::fmt::Display for Clustering {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(
            f,
            "{} x {} into {} clusters, {} iterations ({})",
            self.nrow,
            self.ncol,
            self.k,
            self.iterations,
            if self.converged { "converged" } else { "budget exhausted" }
        )?;
        for j in 0..self.k {
            writeln!(f, "{:>4} {:>8} {:?}", j, self.sizes[j], self.centroid(j))?;
        }
        Ok(())
    }
}
