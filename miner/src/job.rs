//! Jobs and the board workers take them from
//!
//! A pool notification becomes a [`Job`] published on the [`JobBoard`].
//! Every publish starts a fresh nonce range shared by all workers. A job
//! marked `clean` also invalidates all earlier work: attempts still running
//! for an older job notice between stages and stop without submitting.

use crate::target::Target;
use parking_lot::{Condvar, Mutex};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One unit of work from the pool
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Job {
    /// Pool-assigned identifier, echoed back with each share
    pub id: String,
    /// Header bytes the graph keys are derived from
    pub header: Vec<u8>,
    /// Largest proof hash value the pool accepts
    pub target: Target,
    /// Does this job replace all earlier work immediately?
    pub clean: bool,
    /// First nonce handed out for this job
    pub first_nonce: u64,
}

impl Job {
    /// Make a new job.
    pub fn new(id: impl Into<String>, header: Vec<u8>, target: Target, clean: bool) -> Self {
        Self {
            id: id.into(),
            header,
            target,
            clean,
            first_nonce: 0,
        }
    }

    /// Start the job's nonce range at `nonce` instead of zero.
    pub fn with_first_nonce(mut self, nonce: u64) -> Self {
        self.first_nonce = nonce;
        self
    }
}

/// A worker's view of the job it is mining
#[derive(Debug, Clone)]
pub struct ActiveJob {
    /// The job itself
    job: Arc<Job>,
    /// Publish count when the job was issued
    epoch: u64,
    /// Clean-publish count when the job was issued
    clean_epoch: u64,
    /// Next unclaimed nonce, shared by every worker on this job
    cursor: Arc<AtomicU64>,
}

impl ActiveJob {
    /// The job being mined
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Publish count this job was issued at
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Claim the next `count` nonces for the caller alone.
    pub fn claim(&self, count: u32) -> Range<u64> {
        let count = u64::from(count.max(1));
        let start = self.cursor.fetch_add(count, Ordering::Relaxed);
        start..start.saturating_add(count)
    }
}

/// Board state guarded by the mutex
#[derive(Debug, Default)]
struct Posted {
    /// Latest job, if any was published
    job: Option<ActiveJob>,
    /// No more jobs will be published
    closed: bool,
}

/// Latest job, shared between the pool side and all workers
#[derive(Debug, Default)]
pub struct JobBoard {
    /// Latest job and closed flag
    posted: Mutex<Posted>,
    /// Signalled on every publish and on close
    changed: Condvar,
    /// Number of jobs published
    epoch: AtomicU64,
    /// Number of clean jobs published
    clean_epoch: AtomicU64,
}

impl JobBoard {
    /// Make an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current job and wake any waiting workers.
    ///
    /// Ignored once the board is closed.
    pub fn publish(&self, job: Job) {
        let mut posted = self.posted.lock();
        if posted.closed {
            return;
        }
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let clean_epoch = if job.clean {
            self.clean_epoch.fetch_add(1, Ordering::AcqRel) + 1
        } else {
            self.clean_epoch.load(Ordering::Acquire)
        };
        let cursor = Arc::new(AtomicU64::new(job.first_nonce));
        posted.job = Some(ActiveJob {
            job: Arc::new(job),
            epoch,
            clean_epoch,
            cursor,
        });
        self.changed.notify_all();
    }

    /// The latest job, without waiting
    pub fn current(&self) -> Option<ActiveJob> {
        let posted = self.posted.lock();
        if posted.closed {
            return None;
        }
        posted.job.clone()
    }

    /// Block until a job is available.
    ///
    /// Returns `None` once the board is closed.
    pub fn wait_for_job(&self) -> Option<ActiveJob> {
        let mut posted = self.posted.lock();
        loop {
            if posted.closed {
                return None;
            }
            if let Some(job) = &posted.job {
                return Some(job.clone());
            }
            self.changed.wait(&mut posted);
        }
    }

    /// Has `job` been superseded by a clean job, or the board closed?
    ///
    /// Work on a stale job must be discarded.
    pub fn is_stale(&self, job: &ActiveJob) -> bool {
        self.clean_epoch.load(Ordering::Acquire) != job.clean_epoch || self.is_closed()
    }

    /// Is `job` still the latest job?
    pub fn is_latest(&self, job: &ActiveJob) -> bool {
        self.epoch.load(Ordering::Acquire) == job.epoch
    }

    /// Stop handing out jobs and wake every waiting worker.
    pub fn close(&self) {
        let mut posted = self.posted.lock();
        posted.closed = true;
        self.changed.notify_all();
    }

    /// Has [`Self::close()`] been called?
    pub fn is_closed(&self) -> bool {
        self.posted.lock().closed
    }
}
