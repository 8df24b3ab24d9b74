use super::*;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;

/// A long-lived compute thread.
///
/// Bound to the CPUs of its partition's memory node for its whole life. It
/// idles on its command channel, runs one phase per command, and reports on
/// the shared completion channel. A panic inside a phase is caught and
/// reported as [`Outcome::Failed`], so the coordinator's barrier always
/// completes.
pub struct Worker {
    id: usize,
    partition: Partition,
    topology: Arc<Topology>,
    stealing: bool,
    state: Phase,
    inbox: Receiver<Command>,
    outbox: Sender<Report>,
}

impl Worker {
    pub fn new(
        id: usize,
        partition: Partition,
        topology: Arc<Topology>,
        stealing: bool,
        inbox: Receiver<Command>,
        outbox: Sender<Report>,
    ) -> Self {
        Self {
            id,
            partition,
            topology,
            stealing,
            state: Phase::Wait,
            inbox,
            outbox,
        }
    }

    /// Starts the thread. Fails only if the OS refuses to create it.
    pub fn spawn(self) -> Result<std::thread::JoinHandle<()>> {
        let thread = self.id;
        std::thread::Builder::new()
            .name(format!("knor-{}", thread))
            .spawn(move || self.run())
            .map_err(|source| Error::Spawn { thread, source })
    }

    fn run(mut self) {
        if let Err(e) = self.topology.bind(self.partition.node()) {
            log::warn!(
                "worker {} could not bind to node {}: {}",
                self.id,
                self.partition.node(),
                e
            );
        }
        log::debug!(
            "{:<32}{:<32}",
            format!("worker {} ready", self.id),
            format!(
                "rows {}..{} node {}",
                self.partition.start(),
                self.partition.end(),
                self.partition.node()
            )
        );
        while let Ok(command) = self.inbox.recv() {
            assert_eq!(self.state, Phase::Wait, "worker {} woken while not waiting", self.id);
            self.state = command.phase();
            if self.state == Phase::Exit {
                break;
            }
            let phase = self.state;
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(command)))
                .unwrap_or_else(|panic| Outcome::Failed {
                    phase,
                    message: Self::message(panic),
                });
            self.state = Phase::Wait;
            let report = Report {
                thread: self.id,
                outcome,
            };
            if self.outbox.send(report).is_err() {
                break;
            }
        }
        log::debug!("worker {} exiting", self.id);
    }

    /// Runs one phase. Shared state carried by the command is dropped before
    /// returning, ahead of the report.
    fn dispatch(&self, command: Command) -> Outcome {
        match command {
            Command::AllocData { source, ncol } => Outcome::Allocated(View::copied(
                &source,
                self.partition.start(),
                self.partition.rows(),
                ncol,
            )),
            Command::Bounds { queues, ncol } => {
                let mut range = FeatureRange::new(ncol);
                let rows = self.drain(&queues, |task| {
                    task.view().iter().for_each(|x| range.observe(x));
                    task.rows()
                });
                Outcome::Ranged { range, rows }
            }
            Command::Normalize { range, queues } => Outcome::Normalized {
                rows: self.drain(&queues, |task| {
                    task.rescale(&range);
                    task.rows()
                }),
            },
            Command::Em { snapshot, queues } => {
                let ref clusters = snapshot.clusters;
                let mut partial = Accumulator::new(clusters.k(), clusters.ncol());
                let tally = self.drain(&queues, |task| {
                    snapshot.strategy.run_phase(task, &snapshot, &mut partial)
                });
                Outcome::Assigned { partial, tally }
            }
            Command::KmsppInit { snapshot, queues } => {
                let center = snapshot.clusters.mean(snapshot.candidate);
                let ref metric = snapshot.metric;
                let cuml = self.drain(&queues, |task| {
                    task.iter_mut()
                        .map(|(x, b)| b.nearer(metric.distance(x, center)))
                        .map(|d| d * d)
                        .sum::<Energy>()
                });
                Outcome::Seeded { cuml }
            }
            Command::Exit => unreachable!("exit is handled before dispatch"),
        }
    }

    /// Processes every task of this worker's own queue, then, when stealing,
    /// every task left in the other queues in ring order.
    fn drain<T, F>(&self, queues: &[TaskQueue], mut f: F) -> T
    where
        T: std::iter::Sum<T>,
        F: FnMut(&mut Task) -> T,
    {
        let n = queues.len();
        (0..n)
            .take(if self.stealing { n } else { 1 })
            .map(|offset| &queues[(self.id + offset) % n])
            .flat_map(|queue| std::iter::from_fn(move || queue.get_task().map(|task| (queue, task))))
            .map(|(queue, mut task)| {
                let result = f(&mut task);
                queue.complete(task);
                result
            })
            .sum()
    }

    fn message(panic: Box<dyn std::any::Any + Send>) -> String {
        panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn worker(id: usize, stealing: bool) -> (Worker, Sender<Command>, Receiver<Report>) {
        let (tx, inbox) = mpsc::channel();
        let (outbox, rx) = mpsc::channel();
        let partition = Partition::plan(40, 2, 1).unwrap()[id];
        let topology = Arc::new(Topology::flat());
        (Worker::new(id, partition, topology, stealing, inbox, outbox), tx, rx)
    }

    fn queues(data: &Arc<[f64]>) -> Arc<[TaskQueue]> {
        Partition::plan(40, 2, 1)
            .unwrap()
            .iter()
            .map(|p| View::new(data.clone(), p.start(), p.start(), p.rows(), 1))
            .map(|v| TaskQueue::new(&[v], MIN_TASK_ROWS))
            .collect::<Vec<_>>()
            .into()
    }

    fn snapshot() -> Arc<Snapshot> {
        let mut clusters = Clusters::new(2, 1);
        clusters.set_means(&[0., 39.]);
        Arc::new(Snapshot {
            clusters,
            strategy: Engine::Lloyd.strategy(2),
            metric: Metric::Euclidean,
            fresh: true,
            candidate: 0,
        })
    }

    #[test]
    fn allocates_own_rows() {
        let (worker, tx, rx) = worker(1, false);
        let handle = worker.spawn().unwrap();
        let source: Arc<[f64]> = (0..40).map(|x| x as f64).collect::<Vec<_>>().into();
        tx.send(Command::AllocData { source, ncol: 1 }).unwrap();
        match rx.recv().unwrap().outcome {
            Outcome::Allocated(view) => {
                assert_eq!(view.start(), 20);
                assert_eq!(view.as_slice()[0], 20.);
                assert_eq!(view.rows(), 20);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        tx.send(Command::Exit).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn stealing_worker_drains_every_queue() {
        let data: Arc<[f64]> = (0..40).map(|x| x as f64).collect::<Vec<_>>().into();
        let queues = queues(&data);
        let (worker, tx, rx) = worker(0, true);
        let handle = worker.spawn().unwrap();
        tx.send(Command::Em {
            snapshot: snapshot(),
            queues: queues.clone(),
        })
        .unwrap();
        match rx.recv().unwrap().outcome {
            Outcome::Assigned { partial, tally } => {
                assert_eq!(tally.rows, 40);
                assert_eq!(partial.members(), 40);
                assert_eq!(partial.counts(), &[20, 20]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        drop(tx);
        handle.join().unwrap();
    }

    #[test]
    fn static_worker_stays_in_its_partition() {
        let data: Arc<[f64]> = (0..40).map(|x| x as f64).collect::<Vec<_>>().into();
        let queues = queues(&data);
        let (worker, tx, rx) = worker(1, false);
        let handle = worker.spawn().unwrap();
        tx.send(Command::KmsppInit {
            snapshot: snapshot(),
            queues: queues.clone(),
        })
        .unwrap();
        match rx.recv().unwrap().outcome {
            Outcome::Seeded { cuml } => {
                assert_eq!(cuml, (20..40).map(|x| (x * x) as f64).sum::<f64>());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(queues[0].has_task());
        assert!(!queues[1].has_task());
        tx.send(Command::Exit).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn bounds_then_normalize_own_rows() {
        let data: Arc<[f64]> = (0..40).map(|x| x as f64).collect::<Vec<_>>().into();
        let queues = queues(&data);
        let (worker, tx, rx) = worker(1, false);
        let handle = worker.spawn().unwrap();
        tx.send(Command::Bounds {
            queues: queues.clone(),
            ncol: 1,
        })
        .unwrap();
        let range = match rx.recv().unwrap().outcome {
            Outcome::Ranged { range, rows } => {
                assert_eq!(rows, 20);
                assert_eq!((range.min(), range.max()), (&[20.][..], &[39.][..]));
                range
            }
            other => panic!("unexpected outcome {:?}", other),
        };
        queues.iter().for_each(TaskQueue::reset);
        tx.send(Command::Normalize {
            range: Arc::new(range),
            queues: queues.clone(),
        })
        .unwrap();
        match rx.recv().unwrap().outcome {
            Outcome::Normalized { rows } => assert_eq!(rows, 20),
            other => panic!("unexpected outcome {:?}", other),
        }
        queues[1].reset();
        let scaled = queues[1].with_tasks(|tasks| {
            tasks
                .flat_map(|task| task.view().as_slice().to_vec())
                .collect::<Vec<_>>()
        });
        assert_eq!(scaled.first(), Some(&0.));
        assert_eq!(scaled.last(), Some(&1.));
        assert_eq!(data[20], 20.);
        tx.send(Command::Exit).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn panics_are_reported_not_propagated() {
        let data: Arc<[f64]> = (0..40).map(|x| x as f64).collect::<Vec<_>>().into();
        let queues = queues(&data);
        let mut stale = snapshot();
        Arc::get_mut(&mut stale).unwrap().strategy = Engine::Pruned.strategy(2);
        Arc::get_mut(&mut stale).unwrap().fresh = false;
        let (worker, tx, rx) = worker(0, false);
        let handle = worker.spawn().unwrap();
        tx.send(Command::Em {
            snapshot: stale,
            queues,
        })
        .unwrap();
        match rx.recv().unwrap().outcome {
            Outcome::Failed { phase, message } => {
                assert_eq!(phase, Phase::Em);
                assert!(message.contains("unassigned"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        tx.send(Command::Exit).unwrap();
        handle.join().unwrap();
    }
}
