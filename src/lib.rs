//! NUMA-aware parallel k-means.
//!
//! A fixed pool of long-lived worker threads is driven through repeated
//! compute phases by a single [`Coordinator`]. Each worker owns a contiguous
//! slab of the input matrix, placed on the memory node closest to the CPUs it
//! is bound to, and a private [`Accumulator`] that is merged into the global
//! [`Clusters`] table between phases.
//!
//! ## Pipeline
//!
//! 1. **Plan**: [`Partition::plan`] splits `nrow` rows across threads
//! 2. **Place**: workers copy their rows locally, or adopt a [`MemoryDistributor`] layout
//! 3. **Normalize** (optional): `BOUNDS` and `NORMALIZE_DATA` phases scale columns onto [0, 1]
//! 4. **Seed**: random partition, Forgy, or k-means++ driven by the `KMSPP_INIT` phase
//! 5. **Iterate**: broadcast `EM`, barrier, merge, test convergence
//!
//! ## Core Types
//!
//! - [`Coordinator`]: Owns the pool, the cluster table, and convergence bookkeeping
//! - [`Pool`] / [`Worker`]: Phase dispatch over channels with a total barrier
//! - [`TaskQueue`]: Chunked row ranges handed out under a lock, for work stealing
//! - [`DistanceMatrix`]: Inter-centroid distances used for pruning
//!
//! ## Algorithms
//!
//! - [`Lloyd`]: Full recomputation of every point-centroid distance
//! - [`Pruned`]: Triangle-inequality pruning over the centroid distance matrix
mod accumulator;
mod bounds;
mod clustering;
mod clusters;
mod config;
mod coordinator;
mod distances;
mod distributor;
mod error;
mod init;
mod metric;
mod partition;
mod phase;
mod pool;
mod pruned;
mod queue;
mod reduce;
mod scaling;
mod strategy;
mod synthetic;
mod topology;
mod view;
mod worker;

pub use accumulator::*;
pub use bounds::*;
pub use clustering::*;
pub use clusters::*;
pub use config::*;
pub use coordinator::*;
pub use distances::*;
pub use distributor::*;
pub use error::*;
pub use init::*;
pub use metric::*;
pub use partition::*;
pub use phase::*;
pub use pool::*;
pub use pruned::*;
pub use queue::*;
pub use reduce::*;
pub use scaling::*;
pub use strategy::*;
pub use synthetic::*;
pub use topology::*;
pub use view::*;
pub use worker::*;

// ============================================================================
// TYPE ALIASES
// ============================================================================
/// Distances, bound values, and cumulative seeding weights.
pub type Energy = f64;
/// Cluster identifier as stored in the assignment vector.
pub type ClusterId = u32;

// ============================================================================
// CLUSTERING PARAMETERS
// ============================================================================
/// Marks a row that has not been assigned to any cluster yet.
pub const INVALID_CLUSTER_ID: ClusterId = ClusterId::MAX;
/// Smallest number of rows handed out as a single task by a [`TaskQueue`].
pub const MIN_TASK_ROWS: usize = 8;
/// Default task size for work-stealing schedules.
pub const TASK_ROWS: usize = 1024;
/// Seed used when none is configured, so repeated runs are reproducible.
pub const DEFAULT_SEED: u64 = 0x6b6e6f72;

// ============================================================================
// RUNTIME UTILITIES
// ============================================================================
/// Initialize dual logging (terminal + file) with timestamped log files.
/// Creates `logs/` directory and writes DEBUG level to file, INFO to terminal.
#[cfg(feature = "cli")]
pub fn log() {
    std::fs::create_dir_all("logs").expect("create logs directory");
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{}.log", time)).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config.clone(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file]).expect("initialize logger");
}
