//! Error types for the `cuckaroo` crate

use crate::edge::Nonce;

/// Errors applicable to configuring, solving and verifying cycle puzzles
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A proof's nonces are not in strictly ascending order.
    ///
    /// This is checked before any hashing takes place. Well formed proofs
    /// list each nonce once, smallest first.
    #[error("failed order constraint, proof nonces are not strictly ascending")]
    Order,

    /// A proof does not contain exactly the required number of nonces.
    #[error("proof has {0} nonces, expected {expected}", expected = crate::PROOF_SIZE)]
    ProofSize(usize),

    /// A proof nonce lies outside the graph's edge index space.
    #[error("nonce {nonce} is outside the graph of {num_edges} edges")]
    NonceRange {
        /// The offending nonce
        nonce: Nonce,
        /// Number of edges in the graph being checked
        num_edges: u32,
    },

    /// The endpoints of the proof's edges do not pair up.
    ///
    /// In a closed cycle every node is shared by exactly two edges, so the
    /// XOR of all endpoints on each side must be zero.
    #[error("proof edge endpoints do not match up")]
    Endpoints,

    /// Walking the cycle found a node shared by more than two proof edges.
    #[error("proof edges branch instead of forming a simple cycle")]
    Branch,

    /// Walking the cycle found a node touched by only one proof edge.
    #[error("proof edges lead to a dead end")]
    DeadEnd,

    /// The proof edges close a cycle that is shorter than the whole proof.
    #[error("proof edges form a cycle shorter than {expected}", expected = crate::PROOF_SIZE)]
    ShortCycle,

    /// Solver parameters were rejected.
    #[error("invalid solver parameters: {0}")]
    Params(#[from] ParamsError),

    /// Solver memory was allocated for different parameters than the
    /// solver using it.
    #[error("solver memory was allocated for different parameters")]
    MemoryMismatch,

    /// Solver memory could not be allocated.
    #[error("failed to allocate {bytes} bytes of solver memory")]
    Allocation {
        /// Size of the failed request
        bytes: usize,
    },

    /// The compute backend failed and is no longer usable.
    ///
    /// Callers are expected to rebuild the backend and its memory before
    /// attempting another graph.
    #[error("compute backend failure: {0}")]
    Backend(String),

    /// A cycle was found but not all of its edges could be mapped back
    /// to nonces.
    #[error("nonce recovery matched only {found} of the cycle's edges")]
    Recovery {
        /// Number of distinct cycle edges that were matched
        found: usize,
    },
}

impl Error {
    /// Does this error leave the compute backend unusable?
    ///
    /// Backend failures are fatal to the current attempt, unlike proof or
    /// recovery failures which only discard one candidate.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Error::Allocation { .. } | Error::Backend(_))
    }
}

/// Reasons a set of solver parameters can be rejected
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ParamsError {
    /// Graph size outside the supported range.
    #[error("edge_bits {0} is outside the supported range {min}..={max}", min = crate::params::MIN_EDGE_BITS, max = crate::params::MAX_EDGE_BITS)]
    EdgeBits(u32),

    /// Too many buckets for the graph size.
    #[error("bucket_bits {bucket_bits} leaves fewer than 16 degree counters per bucket at edge_bits {edge_bits}")]
    BucketBits {
        /// Requested bucket bits
        bucket_bits: u32,
        /// Configured edge bits
        edge_bits: u32,
    },

    /// Degree counter table size outside the usable range.
    #[error("degree_bits {degree_bits} is outside the usable range 4..={max}")]
    DegreeBits {
        /// Requested counter index bits
        degree_bits: u32,
        /// Largest useful value, one counter per node
        max: u32,
    },

    /// At least one trimming round is required.
    #[error("trim_rounds must be at least 1")]
    TrimRounds,

    /// The residual limit cannot hold a single cycle.
    #[error("max_residual {0} cannot hold a {size}-edge cycle", size = crate::PROOF_SIZE)]
    ResidualLimit(u32),

    /// Edge generation batches must be non-empty.
    #[error("lane_batch must be at least 1")]
    LaneBatch,
}
