use super::*;

/// Which [`ClusteringStrategy`] drives the assignment phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Recompute every point-centroid distance each iteration.
    Lloyd,
    /// Skip recomputation wherever the triangle inequality allows it.
    #[default]
    Pruned,
}

/// How rows are handed to workers within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheduling {
    /// Each worker processes exactly its own partition.
    #[default]
    Static,
    /// Partitions are cut into tasks; idle workers drain other queues.
    Stealing,
}

/// Parameters of a clustering run.
///
/// Everything here is validated by [`Config::validate`] before any worker
/// thread exists.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Number of clusters.
    pub k: usize,
    /// Iteration budget for the EM loop.
    pub max_iters: usize,
    /// Memory nodes that threads are spread over (round-robin).
    pub nnodes: usize,
    /// Worker threads in the pool.
    pub nthreads: usize,
    pub init: Init,
    /// Stop once `num_changed / nrow <= tolerance`. Negative means exact.
    pub tolerance: f64,
    pub metric: Metric,
    pub engine: Engine,
    pub scheduling: Scheduling,
    /// Rows per task under [`Scheduling::Stealing`].
    pub task_rows: usize,
    pub seed: u64,
    /// Row-major `k * ncol` initial centroids; overrides `init`.
    pub centers: Option<Vec<f64>>,
    /// Scale every column onto [0, 1] before seeding. Given centers are
    /// taken to be in the scaled space.
    #[serde(default)]
    pub normalize: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            k: 2,
            max_iters: usize::MAX,
            nnodes: Topology::detect().nodes(),
            nthreads: num_cpus::get(),
            init: Init::default(),
            tolerance: -1.,
            metric: Metric::default(),
            engine: Engine::default(),
            scheduling: Scheduling::default(),
            task_rows: TASK_ROWS,
            seed: DEFAULT_SEED,
            centers: None,
            normalize: false,
        }
    }
}

impl Config {
    /// Rejects any configuration the engine cannot run.
    pub fn validate(&self, nrow: usize, ncol: usize, len: usize) -> Result<()> {
        if self.nthreads == 0 {
            return Err(Error::config("thread count must be positive"));
        }
        if self.nnodes == 0 {
            return Err(Error::config("node count must be positive"));
        }
        if self.k == 0 {
            return Err(Error::config("k must be positive"));
        }
        if nrow == 0 || ncol == 0 {
            return Err(Error::config("matrix must have at least one row and column"));
        }
        if self.k > nrow {
            return Err(Error::config(format!("k = {} exceeds nrow = {}", self.k, nrow)));
        }
        if len != nrow * ncol {
            return Err(Error::config(format!(
                "buffer holds {} values, expected {} x {}",
                len, nrow, ncol
            )));
        }
        if self.task_rows < MIN_TASK_ROWS {
            return Err(Error::config(format!(
                "task_rows must be at least {}",
                MIN_TASK_ROWS
            )));
        }
        match (self.init, self.centers.as_ref()) {
            (Init::None, None) => {
                return Err(Error::config("init 'none' requires initial centers"));
            }
            (_, Some(centers)) if centers.len() != self.k * ncol => {
                return Err(Error::config(format!(
                    "centers hold {} values, expected {} x {}",
                    centers.len(),
                    self.k,
                    ncol
                )));
            }
            _ => {}
        }
        if self.engine == Engine::Pruned && !self.metric.is_metric() {
            return Err(Error::config(format!(
                "pruning requires a true metric, '{}' violates the triangle inequality",
                self.metric
            )));
        }
        Ok(())
    }

    /// Rows per task for the configured schedule.
    pub fn chunk(&self, rows: usize) -> usize {
        match self.scheduling {
            Scheduling::Static => rows.max(1),
            Scheduling::Stealing => self.task_rows,
        }
    }
}
