use super::*;

/// Triangle-inequality pruned engine.
///
/// Produces the same assignments as [`Lloyd`] while skipping most
/// point-to-centroid distances. Requires a true metric.
///
/// # Algorithm
///
/// The first phase after seeding is a full scan that records every distance
/// as a lower bound. On every later phase, for each row x with assigned
/// centroid c(x), upper bound u(x) and lower bounds l(x, c):
///
/// 1. loosen u(x) by how far c(x) moved, and each l(x, c) by how far c moved
/// 2. if u(x) ≤ s(c(x)), no other centroid can be closer, skip the row
/// 3. otherwise, for each c' with u(x) > l(x, c') and u(x) > d(c(x), c')/2,
///    tighten u(x) to the exact d(x, c(x)) if it is stale, then compute
///    d(x, c') and move to c' if it is strictly closer
#[derive(Debug, Clone)]
pub struct Pruned {
    matrix: DistanceMatrix,
}

impl Pruned {
    pub fn new(k: usize) -> Self {
        Self {
            matrix: DistanceMatrix::new(k),
        }
    }

    /// Full scan that keeps every distance as a lower bound.
    fn scan(task: &mut Task, snapshot: &Snapshot, partial: &mut Accumulator) -> Tally {
        let ref clusters = snapshot.clusters;
        let ref metric = snapshot.metric;
        task.iter_mut()
            .map(|(x, b)| {
                let old = b.id();
                let distances = clusters.distances(x, metric).collect::<Vec<_>>();
                let (j, _) = Clusters::closest(distances.iter().copied(), b.current());
                b.scan(j, distances);
                partial.add(j, x);
                Tally {
                    rows: 1,
                    changed: (old != b.id()) as usize,
                    computed: clusters.k(),
                }
            })
            .sum()
    }

    /// Tightens a stale upper bound before checking the triangle inequality.
    fn refresh(b: &mut Bounds, x: &[f64], clusters: &Clusters, metric: &Metric) -> usize {
        if b.stale() {
            b.refresh(metric.distance(x, clusters.mean(b.j())));
            1
        } else {
            0
        }
    }

    /// Visits one row, returning how many distances were computed.
    fn rebound(&self, b: &mut Bounds, x: &[f64], clusters: &Clusters, metric: &Metric) -> usize {
        assert!(b.is_assigned(), "pruned phase reached an unassigned row");
        b.update(clusters.drifts());
        if b.can_exclude(&self.matrix) {
            return 0;
        }
        let mut computed = 0;
        for j in 0..clusters.k() {
            if !b.has_shifted(&self.matrix, j) {
                continue;
            }
            computed += Self::refresh(b, x, clusters, metric);
            if b.can_exclude(&self.matrix) {
                break;
            }
            if b.has_shifted(&self.matrix, j) {
                b.witness(metric.distance(x, clusters.mean(j)), j);
                computed += 1;
            }
        }
        computed
    }
}

impl ClusteringStrategy for Pruned {
    fn name(&self) -> &'static str {
        "pruned"
    }

    fn run_init(&mut self, clusters: &Clusters, metric: &Metric) {
        self.matrix.compute(clusters, metric);
    }

    fn run_phase(&self, task: &mut Task, snapshot: &Snapshot, partial: &mut Accumulator) -> Tally {
        if snapshot.fresh {
            return Self::scan(task, snapshot, partial);
        }
        let ref clusters = snapshot.clusters;
        let ref metric = snapshot.metric;
        task.iter_mut()
            .map(|(x, b)| {
                let old = b.id();
                let computed = self.rebound(b, x, clusters, metric);
                partial.add(b.j(), x);
                Tally {
                    rows: 1,
                    changed: (old != b.id()) as usize,
                    computed,
                }
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn snapshot(clusters: Clusters, strategy: Box<dyn ClusteringStrategy>, fresh: bool) -> Snapshot {
        Snapshot {
            clusters,
            strategy,
            metric: Metric::Euclidean,
            fresh,
            candidate: 0,
        }
    }

    /// Two well separated groups on a line; moving the means a little
    /// never needs a single cross-cluster distance.
    #[test]
    fn separated_rows_are_skipped() {
        let data: Arc<[f64]> = Arc::from(vec![0., 0.5, 1., 10., 10.5, 11.]);
        let mut task = Task::new(View::new(data, 0, 0, 6, 1));
        let mut clusters = Clusters::new(2, 1);
        clusters.set_means(&[0., 10.]);
        let mut pruned = Pruned::new(2);
        pruned.run_init(&clusters, &Metric::Euclidean);
        let first = snapshot(clusters.clone(), Box::new(pruned.clone()), true);
        let mut partial = Accumulator::new(2, 1);
        let tally = pruned.run_phase(&mut task, &first, &mut partial);
        assert_eq!(tally.computed, 12);
        clusters.finalize(&partial, &Metric::Euclidean);
        pruned.run_init(&clusters, &Metric::Euclidean);
        let next = snapshot(clusters, Box::new(pruned.clone()), false);
        let mut partial = Accumulator::new(2, 1);
        let tally = pruned.run_phase(&mut task, &next, &mut partial);
        assert_eq!(tally.changed, 0);
        assert_eq!(tally.computed, 0);
        assert_eq!(partial.counts(), &[3, 3]);
    }

    /// The midpoint test alone would not skip this row; its recorded
    /// distance to the far centroid does.
    #[test]
    fn lower_bounds_skip_what_midpoints_cannot() {
        let data: Arc<[f64]> = Arc::from(vec![-1.5]);
        let mut task = Task::new(View::new(data, 0, 0, 1, 1));
        let mut clusters = Clusters::new(2, 1);
        clusters.set_means(&[0., 2.]);
        let mut pruned = Pruned::new(2);
        pruned.run_init(&clusters, &Metric::Euclidean);
        let first = snapshot(clusters.clone(), Box::new(pruned.clone()), true);
        let tally = pruned.run_phase(&mut task, &first, &mut Accumulator::new(2, 1));
        assert_eq!(tally.computed, 2);
        assert_eq!(task.bounds()[0].l(1), 3.5);
        let next = snapshot(clusters, Box::new(pruned.clone()), false);
        let tally = pruned.run_phase(&mut task, &next, &mut Accumulator::new(2, 1));
        assert_eq!(tally.changed, 0);
        assert_eq!(tally.computed, 0);
        assert_eq!(task.bounds()[0].j(), 0);
    }

    /// A row stranded by a moving centroid must still be reassigned.
    #[test]
    fn agrees_with_full_scan_after_drift() {
        let data = (0..40)
            .map(|i| ((i * 7919) % 101) as f64 * 0.173 + (i as f64).sqrt())
            .collect::<Vec<_>>();
        let mut clusters = Clusters::new(3, 1);
        clusters.set_means(&data[..3]);
        let data: Arc<[f64]> = Arc::from(data);
        let mut pruned_task = Task::new(View::new(data.clone(), 0, 0, 40, 1));
        let mut lloyd_task = Task::new(View::new(data, 0, 0, 40, 1));
        let mut pruned = Pruned::new(3);
        let mut fresh = true;
        for _ in 0..8 {
            pruned.run_init(&clusters, &Metric::Euclidean);
            let ref snap = snapshot(clusters.clone(), Box::new(pruned.clone()), fresh);
            let mut a = Accumulator::new(3, 1);
            let mut b = Accumulator::new(3, 1);
            pruned.run_phase(&mut pruned_task, snap, &mut a);
            Lloyd.run_phase(&mut lloyd_task, snap, &mut b);
            assert_eq!(
                pruned_task.bounds().iter().map(Bounds::id).collect::<Vec<_>>(),
                lloyd_task.bounds().iter().map(Bounds::id).collect::<Vec<_>>()
            );
            assert_eq!(a, b);
            clusters.finalize(&a, &Metric::Euclidean);
            fresh = false;
        }
    }

    #[test]
    #[should_panic(expected = "unassigned")]
    fn unassigned_row_after_first_phase_is_fatal() {
        let data: Arc<[f64]> = Arc::from(vec![0., 1.]);
        let mut task = Task::new(View::new(data, 0, 0, 2, 1));
        let mut clusters = Clusters::new(2, 1);
        clusters.set_means(&[0., 1.]);
        let mut pruned = Pruned::new(2);
        pruned.run_init(&clusters, &Metric::Euclidean);
        let snap = snapshot(clusters, Box::new(pruned.clone()), false);
        pruned.run_phase(&mut task, &snap, &mut Accumulator::new(2, 1));
    }
}
