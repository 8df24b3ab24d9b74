use super::*;
use std::sync::Arc;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;

/// Fixed set of [`Worker`] threads driven in lock step.
///
/// [`Pool::wake4run`] broadcasts one command to every worker and
/// [`Pool::wait4complete`] blocks until every worker has reported, which is
/// the barrier between phases. Dropping the pool sends `Exit` to every
/// worker and joins them.
pub struct Pool {
    senders: Vec<Sender<Command>>,
    reports: Receiver<Report>,
    handles: Vec<JoinHandle<()>>,
    pending: usize,
}

impl Pool {
    /// One worker per partition, numbered in partition order.
    pub fn spawn(partitions: &[Partition], topology: Arc<Topology>, stealing: bool) -> Result<Self> {
        let (outbox, reports) = mpsc::channel();
        let mut pool = Self {
            senders: Vec::with_capacity(partitions.len()),
            reports,
            handles: Vec::with_capacity(partitions.len()),
            pending: 0,
        };
        for (id, partition) in partitions.iter().enumerate() {
            let (sender, inbox) = mpsc::channel();
            let worker = Worker::new(
                id,
                *partition,
                topology.clone(),
                stealing,
                inbox,
                outbox.clone(),
            );
            pool.handles.push(worker.spawn()?);
            pool.senders.push(sender);
        }
        log::debug!("spawned {} workers", pool.nthreads());
        Ok(pool)
    }

    pub fn nthreads(&self) -> usize {
        self.senders.len()
    }

    /// Sends `command(thread)` to every worker.
    pub fn wake4run(&mut self, command: impl Fn(usize) -> Command) -> Result<()> {
        assert_eq!(self.pending, 0, "previous phase still running");
        for (thread, sender) in self.senders.iter().enumerate() {
            sender.send(command(thread)).map_err(|_| Error::Disconnected)?;
            self.pending += 1;
        }
        Ok(())
    }

    /// Blocks until every woken worker reports. Reports come back sorted by
    /// thread id. A failed worker surfaces as [`Error::Worker`] once all
    /// others have finished too.
    pub fn wait4complete(&mut self) -> Result<Vec<Report>> {
        let mut reports = Vec::with_capacity(self.pending);
        while self.pending > 0 {
            let report = self.reports.recv().map_err(|_| Error::Disconnected)?;
            self.pending -= 1;
            reports.push(report);
        }
        reports.sort_by_key(|report| report.thread);
        match reports.iter().find_map(|report| match report.outcome {
            Outcome::Failed { phase, ref message } => Some((report.thread, phase, message)),
            _ => None,
        }) {
            Some((thread, phase, message)) => Err(Error::Worker {
                thread,
                phase,
                message: message.clone(),
            }),
            None => Ok(reports),
        }
    }

    /// Sends `Exit` to every worker and joins them.
    fn destroy_threads(&mut self) {
        self.senders
            .drain(..)
            .for_each(|sender| {
                let _ = sender.send(Command::Exit);
            });
        self.handles.drain(..).for_each(|handle| {
            if handle.join().is_err() {
                log::error!("worker thread panicked outside of a phase");
            }
        });
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.destroy_threads();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(nthreads: usize) -> Pool {
        let partitions = Partition::plan(100, nthreads, 2).unwrap();
        Pool::spawn(&partitions, Arc::new(Topology::flat()), false).unwrap()
    }

    #[test]
    fn barrier_collects_every_report_in_thread_order() {
        let mut pool = pool(4);
        let source: Arc<[f64]> = Arc::from(vec![1.; 200]);
        for _ in 0..3 {
            pool.wake4run(|_| Command::AllocData {
                source: source.clone(),
                ncol: 2,
            })
            .unwrap();
            let reports = pool.wait4complete().unwrap();
            assert_eq!(
                reports.iter().map(|r| r.thread).collect::<Vec<_>>(),
                vec![0, 1, 2, 3]
            );
        }
    }

    #[test]
    fn failed_phase_surfaces_as_worker_error() {
        let mut pool = pool(2);
        let data: Arc<[f64]> = Arc::from(vec![0.; 100]);
        let queues: Arc<[TaskQueue]> = Partition::plan(100, 2, 1)
            .unwrap()
            .iter()
            .map(|p| View::new(data.clone(), p.start(), p.start(), p.rows(), 1))
            .map(|view| TaskQueue::new(&[view], MIN_TASK_ROWS))
            .collect::<Vec<_>>()
            .into();
        let mut clusters = Clusters::new(2, 1);
        clusters.set_means(&[0., 1.]);
        let snapshot = Arc::new(Snapshot {
            clusters,
            strategy: Engine::Pruned.strategy(2),
            metric: Metric::Euclidean,
            fresh: false,
            candidate: 0,
        });
        pool.wake4run(|_| Command::Em {
            snapshot: snapshot.clone(),
            queues: queues.clone(),
        })
        .unwrap();
        match pool.wait4complete() {
            Err(Error::Worker { phase, .. }) => assert_eq!(phase, Phase::Em),
            other => panic!("expected a worker error, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn drop_joins_idle_workers() {
        let pool = pool(3);
        assert_eq!(pool.nthreads(), 3);
        drop(pool);
    }
}
