use super::*;

/// Per-row assignment state shared by every engine.
///
/// Bundles the per-row vectors the pruned engine needs: the assigned
/// cluster, an upper bound on the distance to it, a lower bound on the
/// distance to every centroid, and whether the upper bound is stale
/// (centroids moved since it was computed).
///
/// # Algorithm
///
/// If u(x) ≥ d(x, c(x)) and either l(x, c') ≥ u(x) or d(c(x), c') ≥ 2u(x),
/// then c' cannot be closer to x than c(x), so d(x, c') never needs
/// computing.
///
/// # Fields
///
/// - `j`: Index of currently assigned centroid c(x)
/// - `upper`: Upper bound u(x) on distance to assigned centroid
/// - `lower`: Lower bounds l(x, c) on distance to each centroid. Empty until
///   a full scan records them; a missing entry reads as 0
/// - `stale`: Whether `upper` has been loosened by centroid drift
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    j: ClusterId,
    upper: Energy,
    lower: Vec<Energy>,
    stale: bool,
}

impl Bounds {
    /// Currently assigned centroid index.
    pub fn j(&self) -> usize {
        self.j as usize
    }
    /// Raw id as stored in the assignment vector.
    pub fn id(&self) -> ClusterId {
        self.j
    }
    pub fn is_assigned(&self) -> bool {
        self.j != INVALID_CLUSTER_ID
    }
    /// Assigned centroid, if any. Ties in a full scan keep it.
    pub fn current(&self) -> Option<usize> {
        self.is_assigned().then(|| self.j())
    }
    /// Upper bound on distance to assigned centroid.
    pub fn u(&self) -> Energy {
        self.upper
    }
    /// Lower bound on distance to centroid j.
    pub fn l(&self, j: usize) -> Energy {
        self.lower.get(j).copied().unwrap_or(0.)
    }
    /// Whether the upper bound may be loose.
    pub fn stale(&self) -> bool {
        self.stale
    }
    /// Checks if this row can skip every other centroid.
    /// True when u(x) ≤ s(c(x)) where s(c) = min_{c'≠c} d(c,c')/2.
    pub fn can_exclude(&self, matrix: &DistanceMatrix) -> bool {
        self.u() <= matrix.midpoint(self.j())
    }
    /// Checks if centroid j could be closer than the current assignment.
    ///
    /// Returns true (needs checking) if all three filters fail:
    /// 1. j ≠ c(x): not currently assigned
    /// 2. u(x) > l(x,j): upper bound exceeds lower bound to j
    /// 3. u(x) > d(c(x),j)/2: upper bound exceeds half inter-centroid distance
    pub fn has_shifted(&self, matrix: &DistanceMatrix, j: usize) -> bool {
        self.j() != j && self.u() > self.l(j) && self.u() > 0.5 * matrix.get(self.j(), j)
    }
    /// Loosens the bounds after the centroids moved by `drifts`.
    pub fn update(&mut self, drifts: &[Energy]) {
        self.lower
            .iter_mut()
            .zip(drifts)
            .for_each(|(lower, drift)| *lower = (*lower - drift).max(0.));
        self.upper += drifts[self.j()];
        self.stale = true;
    }
    /// Tightens the upper bound with the exact distance to c(x).
    pub fn refresh(&mut self, distance: Energy) {
        let j = self.j();
        if let Some(lower) = self.lower.get_mut(j) {
            *lower = distance;
        }
        self.upper = distance;
        self.stale = false;
    }
    /// Records exact distance to centroid j, reassigning if strictly closer.
    pub fn witness(&mut self, distance: Energy, j: usize) {
        if let Some(lower) = self.lower.get_mut(j) {
            *lower = distance;
        }
        if distance < self.upper {
            self.j = j as ClusterId;
            self.upper = distance;
        }
    }
    /// Direct assignment after a full scan of every centroid.
    pub fn assign(&mut self, j: usize, distance: Energy) {
        self.j = j as ClusterId;
        self.upper = distance;
        self.stale = false;
    }
    /// Direct assignment that also keeps every scanned distance as a lower bound.
    pub fn scan(&mut self, j: usize, distances: Vec<Energy>) {
        self.assign(j, distances[j]);
        self.lower = distances;
    }
    /// Seeds membership without a known distance.
    pub fn join(&mut self, j: usize) {
        self.j = j as ClusterId;
        self.upper = Energy::MAX;
        self.lower.clear();
        self.stale = true;
    }
    /// Keeps the smaller of the current bound and `distance`.
    /// Used while seeding, where `upper` is the distance to the nearest center so far.
    pub fn nearer(&mut self, distance: Energy) -> Energy {
        self.upper = self.upper.min(distance);
        self.upper
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            j: INVALID_CLUSTER_ID,
            upper: Energy::MAX,
            lower: Vec::new(),
            stale: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unassigned() {
        let b = Bounds::default();
        assert!(!b.is_assigned());
        assert_eq!(b.id(), INVALID_CLUSTER_ID);
        assert_eq!(b.current(), None);
        assert_eq!(b.l(3), 0.);
    }

    #[test]
    fn witness_only_moves_to_strictly_closer() {
        let mut b = Bounds::default();
        b.scan(0, vec![2., 3., 4.]);
        b.witness(2., 1);
        assert_eq!(b.j(), 0);
        assert_eq!(b.l(1), 2.);
        b.witness(1., 2);
        assert_eq!((b.j(), b.u(), b.l(2)), (2, 1., 1.));
    }

    #[test]
    fn drift_loosens_and_refresh_tightens() {
        let mut b = Bounds::default();
        b.scan(1, vec![3., 1., 0.25]);
        b.update(&[1., 0.5, 0.5]);
        assert!(b.stale());
        assert_eq!(b.u(), 1.5);
        assert_eq!((b.l(0), b.l(1), b.l(2)), (2., 0.5, 0.));
        b.refresh(1.2);
        assert!(!b.stale());
        assert_eq!((b.u(), b.l(1)), (1.2, 1.2));
    }

    #[test]
    fn lower_bound_rules_out_far_centroids() {
        let mut clusters = Clusters::new(2, 1);
        clusters.set_means(&[0., 1.]);
        let mut matrix = DistanceMatrix::new(2);
        matrix.compute(&clusters, &Metric::Euclidean);
        let mut b = Bounds::default();
        b.assign(0, 0.9);
        assert!(b.has_shifted(&matrix, 1));
        b.scan(0, vec![0.9, 5.]);
        assert!(!b.has_shifted(&matrix, 1));
        assert!(!b.has_shifted(&matrix, 0));
    }
}
