use super::*;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A chunk of consecutive rows together with their mutable per-row state.
///
/// Whoever holds a `Task` holds the only mutable access to those rows'
/// slice of the assignment vector, so no two threads ever write the same row.
#[derive(Debug)]
pub struct Task {
    view: View,
    bounds: Vec<Bounds>,
}

impl Task {
    pub fn new(view: View) -> Self {
        Self {
            bounds: vec![Bounds::default(); view.rows()],
            view,
        }
    }
    /// Global index of the first row.
    pub fn start(&self) -> usize {
        self.view.start()
    }
    pub fn rows(&self) -> usize {
        self.view.rows()
    }
    pub fn view(&self) -> &View {
        &self.view
    }
    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }
    pub fn bounds_mut(&mut self) -> &mut [Bounds] {
        &mut self.bounds
    }
    /// Replaces this task's rows with a copy scaled into `range`.
    pub fn rescale(&mut self, range: &FeatureRange) {
        self.view = self.view.rescaled(range);
    }
    /// Rows paired with their mutable state.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&[f64], &mut Bounds)> {
        self.view.iter().zip(self.bounds.iter_mut())
    }
}

/// Tasks of one partition, handed out one at a time under a lock.
///
/// A task delivered by [`TaskQueue::get_task`] leaves the queue until the
/// consumer hands it back with [`TaskQueue::complete`], so each task reaches
/// exactly one consumer per drain. [`TaskQueue::reset`] makes every completed
/// task available again, in row order, for the next phase.
#[derive(Debug, Default)]
pub struct TaskQueue {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    pending: VecDeque<Task>,
    finished: Vec<Task>,
}

impl TaskQueue {
    /// Cuts `views` into tasks of at most `rows` rows. Empty views are dropped.
    pub fn new(views: &[View], rows: usize) -> Self {
        let rows = rows.max(MIN_TASK_ROWS);
        Self {
            inner: Mutex::new(Inner {
                pending: views
                    .iter()
                    .filter(|view| !view.is_empty())
                    .flat_map(|view| view.split(rows))
                    .map(Task::new)
                    .collect(),
                finished: Vec::new(),
            }),
        }
    }

    /// Next unclaimed task, if any.
    pub fn get_task(&self) -> Option<Task> {
        self.lock().pending.pop_front()
    }

    /// Whether any task is still unclaimed.
    pub fn has_task(&self) -> bool {
        !self.lock().pending.is_empty()
    }

    /// Returns a processed task to this queue.
    pub fn complete(&self, task: Task) {
        self.lock().finished.push(task);
    }

    /// Makes every task available again, ordered by first row.
    pub fn reset(&self) {
        let mut inner = self.lock();
        let finished = std::mem::take(&mut inner.finished);
        inner.pending.extend(finished);
        inner.pending.make_contiguous().sort_by_key(Task::start);
    }

    /// Tasks currently in the queue (claimed tasks are not counted).
    pub fn len(&self) -> usize {
        let inner = self.lock();
        inner.pending.len() + inner.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows across every task currently in the queue.
    pub fn rows(&self) -> usize {
        self.with_tasks(|tasks| tasks.map(Task::rows).sum())
    }

    /// Visits every pending task in row order. Call between phases only,
    /// after [`TaskQueue::reset`], when no task is claimed.
    pub fn with_tasks<R>(&self, f: impl FnOnce(&mut dyn Iterator<Item = &Task>) -> R) -> R {
        let inner = self.lock();
        f(&mut inner.pending.iter())
    }

    /// Mutable counterpart of [`TaskQueue::with_tasks`].
    pub fn with_tasks_mut<R>(
        &self,
        f: impl FnOnce(&mut dyn Iterator<Item = &mut Task>) -> R,
    ) -> R {
        let mut inner = self.lock();
        f(&mut inner.pending.iter_mut())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("task queue lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn queue(nrow: usize, ncol: usize, rows: usize) -> (Vec<f64>, TaskQueue) {
        let data = (0..nrow * ncol).map(|x| x as f64).collect::<Vec<_>>();
        let view = View::new(Arc::from(data.clone()), 0, 0, nrow, ncol);
        (data, TaskQueue::new(&[view], rows))
    }

    #[test]
    fn repeated_drains_cover_every_row_once() {
        let (data, q) = queue(50, 5, MIN_TASK_ROWS);
        assert_eq!(q.rows(), 50);
        for _ in 0..4 {
            q.reset();
            let mut seen = BTreeSet::new();
            let mut rows = 0;
            while q.has_task() {
                let task = q.get_task().unwrap();
                assert!(seen.insert(task.start()), "task delivered twice");
                assert_eq!(
                    task.view().as_slice(),
                    &data[task.start() * 5..(task.start() + task.rows()) * 5]
                );
                rows += task.rows();
                q.complete(task);
            }
            assert!(q.get_task().is_none());
            assert_eq!(rows, 50);
            assert_eq!(seen.len(), 7);
        }
    }

    #[test]
    fn reset_restores_row_order() {
        let (_, q) = queue(40, 1, MIN_TASK_ROWS);
        let mut tasks = std::iter::from_fn(|| q.get_task()).collect::<Vec<_>>();
        tasks.reverse();
        tasks.into_iter().for_each(|t| q.complete(t));
        q.reset();
        let starts = q.with_tasks(|tasks| tasks.map(Task::start).collect::<Vec<_>>());
        assert_eq!(starts, vec![0, 8, 16, 24, 32]);
    }

    #[test]
    fn concurrent_consumers_never_share_a_task() {
        let (_, q) = queue(1000, 2, MIN_TASK_ROWS);
        for _ in 0..3 {
            q.reset();
            let ref q = q;
            let claimed = std::thread::scope(|scope| {
                (0..4)
                    .map(|_| {
                        scope.spawn(move || {
                            std::iter::from_fn(|| q.get_task())
                                .map(|task| {
                                    let start = task.start();
                                    q.complete(task);
                                    start
                                })
                                .collect::<Vec<_>>()
                        })
                    })
                    .collect::<Vec<_>>()
                    .into_iter()
                    .flat_map(|h| h.join().unwrap())
                    .collect::<Vec<_>>()
            });
            let unique = claimed.iter().collect::<BTreeSet<_>>();
            assert_eq!(unique.len(), claimed.len());
            assert_eq!(claimed.len(), 125);
        }
    }

    #[test]
    fn oversized_chunks_keep_views_whole() {
        let data: Arc<[f64]> = Arc::from(vec![0.; 30]);
        let views = [
            View::new(data.clone(), 0, 0, 4, 3),
            View::new(data.clone(), 12, 4, 0, 3),
            View::new(data, 12, 4, 6, 3),
        ];
        let q = TaskQueue::new(&views, usize::MAX);
        assert_eq!(q.len(), 2);
        assert_eq!(q.rows(), 10);
    }
}
