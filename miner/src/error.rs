//! Error types for the `cr29-miner` crate

use crate::share::SubmitError;

/// Errors that stop a worker or the miner as a whole
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MinerError {
    /// The solver rejected its configuration or failed outright.
    #[error("solver error: {0}")]
    Core(#[from] cuckaroo::Error),

    /// The share sink can no longer accept shares.
    #[error("share submission failed: {0}")]
    Submit(#[from] SubmitError),

    /// A worker's backend kept failing after being rebuilt.
    #[error("worker {worker} backend failed {failures} times, giving up")]
    BackendExhausted {
        /// Index of the failing worker
        worker: usize,
        /// Number of consecutive failures, including the last one
        failures: u32,
    },

    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The job board was closed before the miner started.
    #[error("miner was stopped before starting")]
    Stopped,

    /// A worker thread panicked.
    #[error("worker {0} panicked")]
    Panicked(usize),

    /// The configuration could not be loaded or is inconsistent.
    #[error("invalid miner configuration: {0}")]
    Config(String),
}
