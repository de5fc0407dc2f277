//! Mining statistics

use crate::share::ShareResponse;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters shared by every worker and the pool side
#[derive(Debug)]
pub struct MinerStats {
    /// When counting started
    started: Instant,
    /// Completed solve attempts
    graphs: AtomicU64,
    /// Attempts that found a 42-cycle
    cycles: AtomicU64,
    /// Shares handed to the sink
    submitted: AtomicU64,
    /// Shares the pool accepted
    accepted: AtomicU64,
    /// Shares the pool rejected
    rejected: AtomicU64,
    /// Shares or attempts discarded because their job was replaced
    stale: AtomicU64,
    /// Proofs that failed local verification or nonce recovery
    invalid: AtomicU64,
    /// Backend rebuilds after a failure
    backend_restarts: AtomicU64,
}

impl Default for MinerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Bump one counter.
fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl MinerStats {
    /// Start counting from zero, now.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            graphs: AtomicU64::new(0),
            cycles: AtomicU64::new(0),
            submitted: AtomicU64::new(0),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            stale: AtomicU64::new(0),
            invalid: AtomicU64::new(0),
            backend_restarts: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_graph(&self) {
        bump(&self.graphs);
    }

    pub(crate) fn record_cycle(&self) {
        bump(&self.cycles);
    }

    pub(crate) fn record_submitted(&self) {
        bump(&self.submitted);
    }

    pub(crate) fn record_stale(&self) {
        bump(&self.stale);
    }

    pub(crate) fn record_invalid(&self) {
        bump(&self.invalid);
    }

    pub(crate) fn record_backend_restart(&self) {
        bump(&self.backend_restarts);
    }

    /// Record the pool's answer to a submitted share.
    pub fn record_response(&self, response: ShareResponse) {
        match response {
            ShareResponse::Accepted => bump(&self.accepted),
            ShareResponse::Rejected => bump(&self.rejected),
            ShareResponse::Stale => bump(&self.stale),
        }
    }

    /// Current values of every counter
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            elapsed: self.started.elapsed(),
            graphs: load(&self.graphs),
            cycles: load(&self.cycles),
            submitted: load(&self.submitted),
            accepted: load(&self.accepted),
            rejected: load(&self.rejected),
            stale: load(&self.stale),
            invalid: load(&self.invalid),
            backend_restarts: load(&self.backend_restarts),
        }
    }
}

/// Point-in-time copy of [`MinerStats`]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[non_exhaustive]
pub struct StatsSnapshot {
    /// Time since counting started
    pub elapsed: Duration,
    /// Completed solve attempts
    pub graphs: u64,
    /// Attempts that found a 42-cycle
    pub cycles: u64,
    /// Shares handed to the sink
    pub submitted: u64,
    /// Shares the pool accepted
    pub accepted: u64,
    /// Shares the pool rejected
    pub rejected: u64,
    /// Discarded stale shares and attempts
    pub stale: u64,
    /// Proofs that failed local checks
    pub invalid: u64,
    /// Backend rebuilds
    pub backend_restarts: u64,
}

impl StatsSnapshot {
    /// Average solve attempts per second
    pub fn graphs_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.graphs as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2} graphs/s, {} graphs, {} cycles, {} submitted ({} accepted, {} rejected, {} stale, {} invalid)",
            self.graphs_per_second(),
            self.graphs,
            self.cycles,
            self.submitted,
            self.accepted,
            self.rejected,
            self.stale,
            self.invalid,
        )
    }
}
