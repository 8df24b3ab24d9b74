use super::*;

/// State every worker reads during a phase.
///
/// Written only by the coordinator, between phases, while it holds the
/// only reference.
pub struct Snapshot {
    pub clusters: Clusters,
    pub strategy: Box<dyn ClusteringStrategy>,
    pub metric: Metric,
    /// The next assignment phase must scan every centroid for every row.
    pub fresh: bool,
    /// Cluster whose mean is the newest k-means++ candidate.
    pub candidate: usize,
}

/// How an assignment phase decides each row's cluster.
///
/// The coordinator calls [`ClusteringStrategy::run_init`] before every
/// assignment broadcast and [`ClusteringStrategy::merge`] after every
/// barrier; workers call [`ClusteringStrategy::run_phase`] once per task.
pub trait ClusteringStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Refreshes per-iteration state from the current means.
    fn run_init(&mut self, _clusters: &Clusters, _metric: &Metric) {}

    /// Assigns every row of `task`, adding each to `partial`.
    fn run_phase(&self, task: &mut Task, snapshot: &Snapshot, partial: &mut Accumulator) -> Tally;

    /// Folds merged partials into the cluster table, returning total members.
    fn merge(&self, clusters: &mut Clusters, merged: &Accumulator, metric: &Metric) -> usize {
        clusters.finalize(merged, metric)
    }
}

impl Engine {
    pub fn strategy(&self, k: usize) -> Box<dyn ClusteringStrategy> {
        match self {
            Self::Lloyd => Box::new(Lloyd),
            Self::Pruned => Box::new(Pruned::new(k)),
        }
    }
}

/// Baseline engine: every row is compared with every centroid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lloyd;

impl Lloyd {
    /// Full scan of one task. A row equally close to its current cluster
    /// and another stays where it is.
    pub fn scan(task: &mut Task, snapshot: &Snapshot, partial: &mut Accumulator) -> Tally {
        let ref clusters = snapshot.clusters;
        let ref metric = snapshot.metric;
        task.iter_mut()
            .map(|(x, b)| {
                let old = b.id();
                let (j, d) = clusters.nearest(x, metric, b.current());
                b.assign(j, d);
                partial.add(j, x);
                Tally {
                    rows: 1,
                    changed: (old != b.id()) as usize,
                    computed: clusters.k(),
                }
            })
            .sum()
    }
}

impl ClusteringStrategy for Lloyd {
    fn name(&self) -> &'static str {
        "lloyd"
    }
    fn run_phase(&self, task: &mut Task, snapshot: &Snapshot, partial: &mut Accumulator) -> Tally {
        Self::scan(task, snapshot, partial)
    }
}
