use super::*;
use std::sync::Arc;

/// State register of a worker thread.
///
/// Workers idle in `Wait`, run exactly one compute phase when the
/// coordinator wakes them, and return to `Wait`. `Exit` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Wait,
    AllocData,
    Bounds,
    Normalize,
    Em,
    KmsppInit,
    Exit,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Wait => write!(f, "WAIT"),
            Self::AllocData => write!(f, "ALLOC_DATA"),
            Self::Bounds => write!(f, "BOUNDS"),
            Self::Normalize => write!(f, "NORMALIZE_DATA"),
            Self::Em => write!(f, "EM"),
            Self::KmsppInit => write!(f, "KMSPP_INIT"),
            Self::Exit => write!(f, "EXIT"),
        }
    }
}

/// One unit of work broadcast from the coordinator to a worker.
///
/// Shared state travels inside the command as `Arc` clones. A worker drops
/// its clones before reporting, so once the barrier completes the coordinator
/// is again the sole owner and may mutate in place.
pub enum Command {
    /// Copy this worker's rows of `source` into memory it first-touches.
    AllocData { source: Arc<[f64]>, ncol: usize },
    /// Find the per-column extremes of every row this worker visits.
    Bounds {
        queues: Arc<[TaskQueue]>,
        ncol: usize,
    },
    /// Rewrite every visited row scaled into `range`.
    Normalize {
        range: Arc<FeatureRange>,
        queues: Arc<[TaskQueue]>,
    },
    /// Assign rows to their nearest cluster and accumulate partial sums.
    Em {
        snapshot: Arc<Snapshot>,
        queues: Arc<[TaskQueue]>,
    },
    /// Fold the distance to the newest seeding candidate into each row.
    KmsppInit {
        snapshot: Arc<Snapshot>,
        queues: Arc<[TaskQueue]>,
    },
    Exit,
}

impl Command {
    pub fn phase(&self) -> Phase {
        match self {
            Self::AllocData { .. } => Phase::AllocData,
            Self::Bounds { .. } => Phase::Bounds,
            Self::Normalize { .. } => Phase::Normalize,
            Self::Em { .. } => Phase::Em,
            Self::KmsppInit { .. } => Phase::KmsppInit,
            Self::Exit => Phase::Exit,
        }
    }
}

/// A worker's answer once its phase is complete.
#[derive(Debug)]
pub struct Report {
    pub thread: usize,
    pub outcome: Outcome,
}

#[derive(Debug)]
pub enum Outcome {
    Allocated(View),
    Ranged { range: FeatureRange, rows: usize },
    Normalized { rows: usize },
    Assigned { partial: Accumulator, tally: Tally },
    Seeded { cuml: Energy },
    Failed { phase: Phase, message: String },
}

/// Per-phase counters from an assignment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Rows visited.
    pub rows: usize,
    /// Rows whose assignment differs from the previous iteration.
    pub changed: usize,
    /// Point-to-centroid distances actually evaluated.
    pub computed: usize,
}

impl std::ops::Add for Tally {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            rows: self.rows + other.rows,
            changed: self.changed + other.changed,
            computed: self.computed + other.computed,
        }
    }
}

impl std::ops::AddAssign for Tally {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl std::iter::Sum for Tally {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |a, b| a + b)
    }
}
