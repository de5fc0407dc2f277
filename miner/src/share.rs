//! Shares and where they go

use cuckaroo::{Nonce, Proof};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{Sender, SyncSender};

/// A proof meeting a job's target, ready for the pool
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Share {
    /// Identifier of the job the proof was found for
    pub job_id: String,
    /// Graph nonce the keys were derived from
    pub nonce: u64,
    /// The cycle proof
    pub proof: Proof,
    /// Difficulty of the proof, `u64::MAX / hash_value`
    pub difficulty: u64,
}

impl Share {
    /// The proof's edge nonces
    pub fn edges(&self) -> &[Nonce] {
        self.proof.nonces()
    }
}

/// Failure to hand a share over for submission
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum SubmitError {
    /// Nothing is receiving shares any more.
    #[error("share receiver has gone away")]
    Closed,
    /// The sink refused the share outright.
    #[error("share refused: {0}")]
    Refused(String),
}

/// Pool's answer to a submitted share
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[non_exhaustive]
pub enum ShareResponse {
    /// Counted by the pool
    Accepted,
    /// Refused by the pool
    Rejected,
    /// Arrived after the job was replaced
    Stale,
}

/// Destination of shares found by the workers
///
/// Implementations must not block for long; workers call this inline
/// between attempts.
pub trait ShareSink: Send + Sync {
    /// Hand over one share.
    fn submit(&self, share: Share) -> Result<(), SubmitError>;
}

impl ShareSink for Sender<Share> {
    fn submit(&self, share: Share) -> Result<(), SubmitError> {
        self.send(share).map_err(|_| SubmitError::Closed)
    }
}

impl ShareSink for SyncSender<Share> {
    fn submit(&self, share: Share) -> Result<(), SubmitError> {
        self.send(share).map_err(|_| SubmitError::Closed)
    }
}

impl<S: ShareSink + ?Sized> ShareSink for std::sync::Arc<S> {
    fn submit(&self, share: Share) -> Result<(), SubmitError> {
        (**self).submit(share)
    }
}
