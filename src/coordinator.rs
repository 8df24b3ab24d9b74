use super::*;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::sync::Arc;

/// Where worker rows live for the length of a run.
#[derive(Default)]
pub enum Placement {
    /// Each worker copies its own partition after binding to its node, so
    /// first touch puts the slab in node-local memory.
    #[default]
    Local,
    /// Workers read a caller-provided row-major buffer in place.
    Shared(Arc<[f64]>),
    /// Workers read the per-node copies held by a distributor.
    Numa(MemoryDistributor),
}

impl std::fmt::Display for Placement {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Shared(_) => write!(f, "shared"),
            Self::Numa(distributor) => write!(f, "numa ({} nodes)", distributor.nodes().len()),
        }
    }
}

/// Drives a pool of workers through seeding and EM iterations.
///
/// The coordinator exclusively owns the cluster table, the per-phase
/// [`Snapshot`], and the task queues. Workers see them only through `Arc`
/// clones carried by a command and released before they report, so between
/// barriers every structure here is mutated in place without locks.
///
/// # Lifecycle
///
/// 1. [`Coordinator::create`] validates the configuration and spawns workers
/// 2. [`Coordinator::prepare`] places rows and seeds the centroids
/// 3. [`Coordinator::step`] runs one assignment phase plus merge
/// 4. [`Coordinator::run`] does 2 and then 3 until converged or out of budget
pub struct Coordinator {
    nrow: usize,
    ncol: usize,
    config: Config,
    source: Arc<[f64]>,
    partitions: Vec<Partition>,
    pool: Pool,
    snapshot: Arc<Snapshot>,
    queues: Arc<[TaskQueue]>,
    layout: Vec<View>,
    range: Arc<FeatureRange>,
    assignments: Vec<ClusterId>,
    reducer: Box<dyn AllReduce>,
    rng: SmallRng,
    iterations: usize,
    num_changed: usize,
    converged: bool,
    seeded: bool,
}

impl Coordinator {
    /// Validates `config` against the matrix and starts the worker pool.
    /// Nothing is spawned if validation fails.
    pub fn create(data: impl Into<Arc<[f64]>>, nrow: usize, ncol: usize, config: Config) -> Result<Self> {
        let source = data.into();
        config.validate(nrow, ncol, source.len())?;
        let partitions = Partition::plan(nrow, config.nthreads, config.nnodes)?;
        let topology = Arc::new(Topology::detect());
        let pool = Pool::spawn(
            &partitions,
            topology,
            config.scheduling == Scheduling::Stealing,
        )?;
        let strategy = config.engine.strategy(config.k);
        let mut clusters = Clusters::new(config.k, ncol);
        if let Some(ref centers) = config.centers {
            if config.init != Init::None {
                log::warn!("initial centers given, ignoring init method '{}'", config.init);
            }
            clusters.set_means(centers);
        }
        log::info!(
            "{:<32}{:<32}",
            format!("clustering {} x {}", nrow, ncol),
            format!(
                "k {} threads {} nodes {} {} {}",
                config.k,
                config.nthreads,
                config.nnodes,
                strategy.name(),
                config.metric
            )
        );
        Ok(Self {
            snapshot: Arc::new(Snapshot {
                clusters,
                strategy,
                metric: config.metric,
                fresh: true,
                candidate: 0,
            }),
            queues: Arc::from(Vec::new()),
            layout: Vec::new(),
            range: Arc::new(FeatureRange::new(ncol)),
            assignments: vec![INVALID_CLUSTER_ID; nrow],
            reducer: Box::new(Local),
            rng: SmallRng::seed_from_u64(config.seed),
            iterations: 0,
            num_changed: nrow,
            converged: false,
            seeded: false,
            nrow,
            ncol,
            source,
            partitions,
            pool,
            config,
        })
    }

    /// Replaces the cross-process reduction applied before every merge.
    pub fn with_reducer(mut self, reducer: impl AllReduce + 'static) -> Self {
        self.reducer = Box::new(reducer);
        self
    }

    /// Places the data, seeds, and iterates until converged or out of budget.
    pub fn run(&mut self, placement: Placement) -> Result<Clustering> {
        self.prepare(placement)?;
        while !self.converged && self.iterations < self.config.max_iters {
            self.step()?;
        }
        if !self.converged {
            log::warn!(
                "iteration budget of {} exhausted with {} rows still changing",
                self.config.max_iters,
                self.num_changed
            );
        }
        log::info!(
            "{:<32}{:<32}",
            format!("finished after {} iterations", self.iterations),
            format!("converged {}", self.converged)
        );
        Ok(self.clustering())
    }

    /// Distributes rows to workers, normalizes them if configured, and seeds
    /// the centroids.
    pub fn prepare(&mut self, placement: Placement) -> Result<()> {
        self.place(placement)?;
        if self.config.normalize {
            self.normalize()?;
        }
        self.seed()
    }

    /// One assignment phase, barrier, and merge. Returns how many rows
    /// changed cluster.
    pub fn step(&mut self) -> Result<usize> {
        if !self.seeded {
            return Err(Error::config("rows must be placed and seeded before stepping"));
        }
        let snapshot = self.snapshot_mut();
        snapshot.strategy.run_init(&snapshot.clusters, &snapshot.metric);
        let reports = self.broadcast(Phase::Em)?;
        let changed = self.update_clusters(reports);
        self.snapshot_mut().fresh = false;
        self.iterations += 1;
        self.num_changed = changed;
        self.converged = self.is_converged(changed);
        Ok(changed)
    }

    /// Cluster of every row after the last merge.
    pub fn get_cluster_assignments(&self) -> &[ClusterId] {
        &self.assignments
    }
    pub fn clusters(&self) -> &Clusters {
        &self.snapshot.clusters
    }
    pub fn config(&self) -> &Config {
        &self.config
    }
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }
    pub fn nthreads(&self) -> usize {
        self.pool.nthreads()
    }
    pub fn iterations(&self) -> usize {
        self.iterations
    }
    pub fn num_changed(&self) -> usize {
        self.num_changed
    }
    pub fn converged(&self) -> bool {
        self.converged
    }
    /// Column extremes the rows were scaled by, once normalized.
    pub fn feature_range(&self) -> Option<&FeatureRange> {
        (self.config.normalize && self.seeded).then(|| self.range.as_ref())
    }

    /// Snapshot of the current state as a result.
    pub fn clustering(&self) -> Clustering {
        let ref clusters = self.snapshot.clusters;
        Clustering {
            iterations: self.iterations,
            converged: self.converged,
            k: clusters.k(),
            nrow: self.nrow,
            ncol: self.ncol,
            assignments: self.assignments.clone(),
            sizes: clusters.counts().to_vec(),
            centroids: clusters.means().to_vec(),
        }
    }

    fn is_converged(&self, changed: usize) -> bool {
        changed == 0 || changed as f64 / self.nrow as f64 <= self.config.tolerance
    }
}

// placement
impl Coordinator {
    fn place(&mut self, placement: Placement) -> Result<()> {
        log::info!("{:<32}{:<32}", "placing rows", placement.to_string());
        let views = match placement {
            Placement::Local => self
                .broadcast(Phase::AllocData)?
                .into_iter()
                .map(|report| match report.outcome {
                    Outcome::Allocated(view) => vec![view],
                    other => unreachable!("allocation answered with {:?}", other),
                })
                .collect::<Vec<_>>(),
            Placement::Shared(buffer) => {
                if buffer.len() != self.nrow * self.ncol {
                    return Err(Error::config(format!(
                        "shared buffer holds {} values, expected {} x {}",
                        buffer.len(),
                        self.nrow,
                        self.ncol
                    )));
                }
                self.partitions
                    .iter()
                    .map(|p| View::new(buffer.clone(), p.start() * self.ncol, p.start(), p.rows(), self.ncol))
                    .map(|view| vec![view])
                    .collect::<Vec<_>>()
            }
            Placement::Numa(mut distributor) => {
                if (distributor.nrow(), distributor.ncol()) != (self.nrow, self.ncol) {
                    return Err(Error::config(format!(
                        "distributor holds {} x {}, expected {} x {}",
                        distributor.nrow(),
                        distributor.ncol(),
                        self.nrow,
                        self.ncol
                    )));
                }
                distributor.numa_reorg();
                self.partitions
                    .iter()
                    .map(|p| distributor.views(p.start(), p.rows()))
                    .collect::<Vec<_>>()
            }
        };
        self.layout = views.iter().flatten().cloned().collect();
        self.queues = views
            .iter()
            .zip(self.partitions.iter())
            .map(|(views, p)| TaskQueue::new(views, self.config.chunk(p.rows())))
            .collect::<Vec<_>>()
            .into();
        self.assignments = vec![INVALID_CLUSTER_ID; self.nrow];
        self.iterations = 0;
        self.num_changed = self.nrow;
        self.converged = false;
        self.seeded = false;
        self.snapshot_mut().fresh = true;
        Ok(())
    }

    /// Scales every column onto [0, 1]. A `BOUNDS` phase finds each worker's
    /// column extremes, the coordinator reduces them, and a `NORMALIZE_DATA`
    /// phase rewrites every task's rows into worker-owned buffers. The
    /// caller's matrix is never touched.
    fn normalize(&mut self) -> Result<()> {
        let mut range = FeatureRange::new(self.ncol);
        let mut rows = 0;
        for report in self.broadcast(Phase::Bounds)? {
            match report.outcome {
                Outcome::Ranged { range: partial, rows: n } => {
                    range.absorb(&partial);
                    rows += n;
                }
                other => unreachable!("bounds answered with {:?}", other),
            }
        }
        assert_eq!(rows, self.nrow, "bounds phase missed rows");
        self.reducer.all_range(&mut range);
        self.range = Arc::new(range);
        let rows = self
            .broadcast(Phase::Normalize)?
            .into_iter()
            .map(|report| match report.outcome {
                Outcome::Normalized { rows } => rows,
                other => unreachable!("normalization answered with {:?}", other),
            })
            .sum::<usize>();
        assert_eq!(rows, self.nrow, "normalization missed rows");
        self.layout = self
            .queues
            .iter()
            .flat_map(|queue| queue.with_tasks(|tasks| tasks.map(|task| task.view().clone()).collect::<Vec<_>>()))
            .collect();
        log::debug!(
            "normalized {} columns over {} rows",
            self.ncol,
            self.nrow
        );
        Ok(())
    }

    /// Row `r` as placed.
    fn row(&self, r: usize) -> &[f64] {
        let i = self.layout.partition_point(|view| view.end() <= r);
        self.layout
            .get(i)
            .and_then(|view| view.global(r))
            .expect("placed views cover every row")
    }
}

// seeding
impl Coordinator {
    fn seed(&mut self) -> Result<()> {
        match (self.config.centers.is_some(), self.config.init) {
            (true, _) => self.centers_init(),
            (false, Init::Random) => self.random_init(),
            (false, Init::Forgy) => self.forgy_init(),
            (false, Init::KmeansPP) => self.kmeanspp_init()?,
            (false, Init::None) => unreachable!("init 'none' without centers passed validation"),
        }
        self.seeded = true;
        Ok(())
    }

    fn centers_init(&mut self) {
        let centers = self.config.centers.clone().unwrap_or_default();
        self.snapshot_mut().clusters.set_means(&centers);
        log::debug!("seeded from {} given centers", self.config.k);
    }

    /// Every row joins a uniformly random cluster; means follow from those
    /// memberships.
    fn random_init(&mut self) {
        let k = self.config.k;
        let mut partial = Accumulator::new(k, self.ncol);
        let ref mut rng = self.rng;
        self.queues.iter().for_each(|queue| {
            queue.with_tasks_mut(|tasks| {
                tasks.for_each(|task| {
                    task.iter_mut().for_each(|(x, b)| {
                        let j = rng.random_range(0..k);
                        b.join(j);
                        partial.add(j, x);
                    })
                })
            })
        });
        let snapshot = self.snapshot_mut();
        let members = snapshot.clusters.finalize(&partial, &snapshot.metric);
        assert_eq!(members, self.nrow, "random partition missed rows");
        self.gather();
        log::debug!("seeded from a random partition");
    }

    /// `k` distinct rows become the initial means.
    fn forgy_init(&mut self) {
        let rows = rand::seq::index::sample(&mut self.rng, self.nrow, self.config.k).into_vec();
        for (j, r) in rows.into_iter().enumerate() {
            let row = self.row(r).to_vec();
            self.snapshot_mut().clusters.set_mean(j, &row);
            log::debug!("seed {:>4} <- row {}", j, r);
        }
    }

    /// D² seeding. Each `KMSPP_INIT` phase folds the distance to the newest
    /// center into every row's running minimum; the next center is then
    /// drawn with probability proportional to that minimum squared.
    fn kmeanspp_init(&mut self) -> Result<()> {
        let first = self.rng.random_range(0..self.nrow);
        let row = self.row(first).to_vec();
        self.snapshot_mut().clusters.set_mean(0, &row);
        log::debug!("seed {:>4} <- row {}", 0, first);
        for j in 1..self.config.k {
            self.snapshot_mut().candidate = j - 1;
            let cuml = self
                .broadcast(Phase::KmsppInit)?
                .into_iter()
                .map(|report| match report.outcome {
                    Outcome::Seeded { cuml } => cuml,
                    other => unreachable!("seeding answered with {:?}", other),
                })
                .sum::<Energy>();
            let total = self.reducer.all_sum(cuml);
            let budget = total * self.rng.random::<f64>();
            let next = if total > 0. { self.draw(budget) } else { None }
                .unwrap_or_else(|| self.rng.random_range(0..self.nrow));
            let row = self.row(next).to_vec();
            self.snapshot_mut().clusters.set_mean(j, &row);
            log::debug!("seed {:>4} <- row {} (weight {:.4e})", j, next, total);
        }
        Ok(())
    }

    /// Walks rows in global order, spending `budget` on each row's squared
    /// distance to its nearest seed. Rows already chosen weigh nothing and
    /// are never drawn.
    fn draw(&self, mut budget: Energy) -> Option<usize> {
        let mut last = None;
        for queue in self.queues.iter() {
            let drawn = queue.with_tasks(|tasks| {
                for task in tasks {
                    for (i, b) in task.bounds().iter().enumerate() {
                        let weight = b.u() * b.u();
                        if weight > 0. {
                            last = Some(task.start() + i);
                            budget -= weight;
                            if budget <= 0. {
                                return last;
                            }
                        }
                    }
                }
                None
            });
            if drawn.is_some() {
                return drawn;
            }
        }
        last
    }
}

// phases
impl Coordinator {
    fn snapshot_mut(&mut self) -> &mut Snapshot {
        Arc::get_mut(&mut self.snapshot).expect("phase state still shared after the barrier")
    }

    /// Wakes every worker into `phase` and waits for all of them. Queues are
    /// reset afterwards, so tasks are back in row order.
    fn broadcast(&mut self, phase: Phase) -> Result<Vec<Report>> {
        let ref snapshot = self.snapshot;
        let ref queues = self.queues;
        let ref source = self.source;
        let ref range = self.range;
        let ncol = self.ncol;
        self.pool.wake4run(|_| match phase {
            Phase::AllocData => Command::AllocData {
                source: source.clone(),
                ncol,
            },
            Phase::Bounds => Command::Bounds {
                queues: queues.clone(),
                ncol,
            },
            Phase::Normalize => Command::Normalize {
                range: range.clone(),
                queues: queues.clone(),
            },
            Phase::Em => Command::Em {
                snapshot: snapshot.clone(),
                queues: queues.clone(),
            },
            Phase::KmsppInit => Command::KmsppInit {
                snapshot: snapshot.clone(),
                queues: queues.clone(),
            },
            Phase::Wait | Phase::Exit => unreachable!("{} is never broadcast", phase),
        })?;
        let reports = self.pool.wait4complete()?;
        self.queues.iter().for_each(TaskQueue::reset);
        Ok(reports)
    }

    /// Absorbs every worker's partials, finalizes the means, and refreshes
    /// the assignment vector. Returns the global change count.
    fn update_clusters(&mut self, reports: Vec<Report>) -> usize {
        let mut merged = Accumulator::new(self.config.k, self.ncol);
        let mut tally = Tally::default();
        for report in reports {
            match report.outcome {
                Outcome::Assigned { partial, tally: t } => {
                    merged.absorb(&partial);
                    tally += t;
                }
                other => unreachable!("assignment answered with {:?}", other),
            }
        }
        self.reducer.all_reduce(&mut merged, &mut tally);
        let snapshot = self.snapshot_mut();
        let members = snapshot
            .strategy
            .merge(&mut snapshot.clusters, &merged, &snapshot.metric);
        assert_eq!(members, self.nrow, "merged cluster sizes do not cover every row");
        self.gather();
        log::info!(
            "{:<32}{:<32}",
            format!("iteration {:>4} changed {:>8}", self.iterations + 1, tally.changed),
            format!(
                "distances {:>10} of {:>10}",
                tally.computed,
                tally.rows * self.config.k
            )
        );
        tally.changed
    }

    /// Copies every row's cluster id out of the task queues.
    fn gather(&mut self) {
        let ref mut assignments = self.assignments;
        self.queues.iter().for_each(|queue| {
            queue.with_tasks(|tasks| {
                tasks.for_each(|task| {
                    assignments[task.start()..task.start() + task.rows()]
                        .iter_mut()
                        .zip(task.bounds())
                        .for_each(|(id, b)| *id = b.id())
                })
            })
        });
    }
}
