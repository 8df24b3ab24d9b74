use super::*;

/// Failures surfaced by the engine.
///
/// Configuration problems are caught before a single worker is spawned.
/// Broken internal invariants are not represented here: they panic, since
/// continuing would silently produce a wrong clustering.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to spawn worker {thread}: {source}")]
    Spawn {
        thread: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("worker {thread} failed during {phase}: {message}")]
    Worker {
        thread: usize,
        phase: Phase,
        message: String,
    },
    #[error("worker pool disconnected before the barrier completed")]
    Disconnected,
}

/// Convenient alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
