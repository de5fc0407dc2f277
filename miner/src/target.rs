//! Share targets

use cuckaroo::Proof;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest acceptable proof hash value for a job
///
/// A proof meets the target when [`Proof::hash_value()`] is at or below
/// it, so larger targets are easier.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(pub u64);

impl Target {
    /// Target met by every proof
    pub const MAX: Target = Target(u64::MAX);

    /// Target matching a difficulty, `u64::MAX / difficulty`
    pub fn from_difficulty(difficulty: u64) -> Self {
        Self(u64::MAX / difficulty.max(1))
    }

    /// Difficulty of a proof exactly at this target
    pub fn difficulty(self) -> u64 {
        u64::MAX / self.0.max(1)
    }

    /// Does `proof` meet this target in a graph of `edge_bits`?
    pub fn meets(self, proof: &Proof, edge_bits: u32) -> bool {
        proof.hash_value(edge_bits) <= self.0
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::MAX
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
