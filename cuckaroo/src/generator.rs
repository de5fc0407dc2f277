//! Edge generation: hash the whole nonce space into U-keyed buckets

use crate::bucket_store::EdgeBuffer;
use crate::edge::EdgeHasher;
use crate::params::Geometry;
use rayon::prelude::*;
use std::ops::Add;

/// Outcome of filling a buffer with every edge of a graph
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct FillReport {
    /// Number of nonces hashed
    pub generated: u64,
    /// Number of edges written to a bucket
    pub stored: u64,
    /// Number of edges lost to full buckets
    pub dropped: u64,
    /// Number of edges discarded because both endpoints coincide
    pub self_loops: u64,
}

impl Add for FillReport {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            generated: self.generated + rhs.generated,
            stored: self.stored + rhs.stored,
            dropped: self.dropped + rhs.dropped,
            self_loops: self.self_loops + rhs.self_loops,
        }
    }
}

/// Hash every nonce and append its edge to the bucket of its U endpoint.
///
/// `out` must be empty. Work is split into parallel tasks of at least
/// `lane_batch` nonces on the current rayon pool.
pub(crate) fn fill(
    hasher: &EdgeHasher,
    geometry: &Geometry,
    lane_batch: usize,
    out: &EdgeBuffer,
) -> FillReport {
    (0..geometry.num_edges())
        .into_par_iter()
        .with_min_len(lane_batch)
        .fold(FillReport::default, |mut tally, nonce| {
            let edge = hasher.edge(nonce);
            tally.generated += 1;
            if edge.is_self_loop() {
                tally.self_loops += 1;
            } else if out.push(geometry.bucket_of(edge.u()), edge) {
                tally.stored += 1;
            } else {
                tally.dropped += 1;
            }
            tally
        })
        .reduce(FillReport::default, Add::add)
}
