//! Solver parameters and the graph geometry derived from them
//!
//! [`Params`] is the user-facing, serializable description of one puzzle
//! size and the solver's memory trade-offs. [`Geometry`] is the validated
//! form used internally: every shift and mask the kernels need, computed
//! once.

use crate::err::ParamsError;
use crate::PROOF_SIZE;
use serde::{Deserialize, Serialize};

/// Smallest supported graph, in bits of edge index
pub const MIN_EDGE_BITS: u32 = 8;

/// Largest supported graph, in bits of edge index
///
/// Node ids use one more bit than edge indices and must fit in a `u32`.
pub const MAX_EDGE_BITS: u32 = 31;

/// Solver parameters
///
/// The defaults describe the full-size puzzle: `2^29` edges scattered over
/// 64 buckets, trimmed for up to 176 rounds.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct Params {
    /// Number of bits in an edge index; the graph has `2^edge_bits` edges
    pub edge_bits: u32,
    /// Edges are scattered over `2^bucket_bits` buckets by the high bits of
    /// one endpoint
    pub bucket_bits: u32,
    /// Extra slots per bucket beyond its average share of edges
    pub bucket_slack: u32,
    /// Index bits for each bucket's degree counters
    ///
    /// `None` allocates one counter per node, which makes trimming exact.
    /// Smaller tables alias several nodes onto one counter, which can only
    /// keep extra edges, never discard a cycle edge.
    pub degree_bits: Option<u32>,
    /// Upper bound on the number of trimming rounds
    pub trim_rounds: u32,
    /// Largest residual graph handed to the cycle search
    pub max_residual: u32,
    /// Minimum number of nonces each parallel generation task processes
    pub lane_batch: u32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            edge_bits: 29,
            bucket_bits: 6,
            bucket_slack: 4096,
            degree_bits: None,
            trim_rounds: 176,
            max_residual: 1 << 20,
            lane_batch: 4096,
        }
    }
}

impl Params {
    /// Default parameters resized for a graph of `2^edge_bits` edges.
    ///
    /// Bucket count shrinks for small graphs so each bucket keeps at least
    /// a few thousand nodes per side.
    pub fn with_edge_bits(edge_bits: u32) -> Self {
        let defaults = Self::default();
        Self {
            edge_bits,
            bucket_bits: defaults.bucket_bits.min(edge_bits.saturating_sub(12)),
            ..defaults
        }
    }

    /// Check these parameters and compute the graph [`Geometry`].
    pub fn validate(&self) -> Result<Geometry, ParamsError> {
        Geometry::new(self)
    }
}

/// Validated graph and memory layout
///
/// Node ids have `edge_bits + 1` bits. Even ids are "U" nodes (first
/// endpoints) and odd ids are "V" nodes. A node's bucket is given by its
/// top `bucket_bits` bits; the rest, minus the parity bit, index that
/// bucket's degree counters.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Geometry {
    /// Bits per edge index
    edge_bits: u32,
    /// Number of edges, `2^edge_bits`
    num_edges: u32,
    /// Mask applied to raw hash output to form a node id
    node_mask: u32,
    /// Bits of bucket index
    bucket_bits: u32,
    /// Shift from node id to bucket index
    bucket_shift: u32,
    /// Slots per bucket
    bucket_capacity: usize,
    /// Index bits of each bucket's counter table
    degree_bits: u32,
    /// Mask selecting a node's offset inside its bucket
    local_mask: u32,
}

impl Geometry {
    /// Validate `params` and derive the layout.
    fn new(params: &Params) -> Result<Self, ParamsError> {
        let edge_bits = params.edge_bits;
        if !(MIN_EDGE_BITS..=MAX_EDGE_BITS).contains(&edge_bits) {
            return Err(ParamsError::EdgeBits(edge_bits));
        }
        let node_bits = edge_bits + 1;
        let bucket_bits = params.bucket_bits;
        // One counter per node of a bucket's side needs node_bits - bucket_bits - 1
        // index bits, and the table works in whole 16-counter words.
        let exact_degree_bits = match edge_bits.checked_sub(bucket_bits) {
            Some(bits) if bits >= 4 => bits,
            _ => {
                return Err(ParamsError::BucketBits {
                    bucket_bits,
                    edge_bits,
                })
            }
        };
        let degree_bits = params.degree_bits.unwrap_or(exact_degree_bits);
        if !(4..=exact_degree_bits).contains(&degree_bits) {
            return Err(ParamsError::DegreeBits {
                degree_bits,
                max: exact_degree_bits,
            });
        }
        if params.trim_rounds == 0 {
            return Err(ParamsError::TrimRounds);
        }
        if (params.max_residual as usize) < PROOF_SIZE {
            return Err(ParamsError::ResidualLimit(params.max_residual));
        }
        if params.lane_batch == 0 {
            return Err(ParamsError::LaneBatch);
        }

        let num_edges = 1u32 << edge_bits;
        let bucket_shift = node_bits - bucket_bits;
        Ok(Self {
            edge_bits,
            num_edges,
            node_mask: ((1u64 << node_bits) - 1) as u32,
            bucket_bits,
            bucket_shift,
            bucket_capacity: (num_edges >> bucket_bits) as usize + params.bucket_slack as usize,
            degree_bits,
            local_mask: ((1u64 << bucket_shift) - 1) as u32,
        })
    }

    /// Bits per edge index
    pub fn edge_bits(&self) -> u32 {
        self.edge_bits
    }

    /// Number of edges in the graph
    pub fn num_edges(&self) -> u32 {
        self.num_edges
    }

    /// Mask applied to raw hash output to form a node id
    pub fn node_mask(&self) -> u32 {
        self.node_mask
    }

    /// Number of buckets in each edge buffer
    pub fn num_buckets(&self) -> usize {
        1 << self.bucket_bits
    }

    /// Slots per bucket
    pub fn bucket_capacity(&self) -> usize {
        self.bucket_capacity
    }

    /// Index bits of each bucket's counter table
    pub fn degree_bits(&self) -> u32 {
        self.degree_bits
    }

    /// Does each node get its own degree counter?
    pub fn exact_degrees(&self) -> bool {
        self.degree_bits == self.edge_bits - self.bucket_bits
    }

    /// Bucket holding edges keyed by `node`
    #[inline(always)]
    pub fn bucket_of(&self, node: u32) -> usize {
        (u64::from(node) >> self.bucket_shift) as usize
    }

    /// Counter index of `node` inside its bucket's table
    #[inline(always)]
    pub(crate) fn counter_index(&self, node: u32) -> usize {
        (((node & self.local_mask) >> 1) & ((1 << self.degree_bits) - 1)) as usize
    }

    /// 32-bit counter words per bucket, 16 two-bit counters each
    pub(crate) fn words_per_bucket(&self) -> usize {
        1 << (self.degree_bits - 4)
    }
}
