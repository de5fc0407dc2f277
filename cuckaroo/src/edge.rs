//! Edges of the puzzle graph and the keyed function that generates them

use crate::params::Geometry;
use crate::siphash::{siphash24, SipKeys};
use std::fmt;

/// Index of one edge in the graph, and the unit of a proof
pub type Nonce = u32;

/// One node id; even ids are U nodes, odd ids are V nodes
pub type Node = u32;

/// One of the two node partitions of the bipartite graph
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Side {
    /// First endpoints, always even
    U,
    /// Second endpoints, always odd
    V,
}

impl Side {
    /// Side whose degrees are counted in trimming round `round`
    #[inline(always)]
    pub fn of_round(round: u32) -> Self {
        if round & 1 == 0 {
            Side::U
        } else {
            Side::V
        }
    }

    /// The opposite partition
    #[inline(always)]
    pub fn other(self) -> Self {
        match self {
            Side::U => Side::V,
            Side::V => Side::U,
        }
    }
}

/// One packed edge, `v << 32 | u`
///
/// Edges carry no nonce. Once a cycle has been found the nonces are
/// recovered by hashing the whole index space again.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Edge(u64);

impl Edge {
    /// Pack the endpoints `u` (even) and `v` (odd).
    #[inline(always)]
    pub const fn new(u: Node, v: Node) -> Self {
        Self((v as u64) << 32 | u as u64)
    }

    /// Build the edge joining `a` and `b`, in whichever order puts the
    /// even node first.
    #[inline(always)]
    pub fn joining(a: Node, b: Node) -> Self {
        if a & 1 == 0 {
            Self::new(a, b)
        } else {
            Self::new(b, a)
        }
    }

    /// Reinterpret a packed value.
    #[inline(always)]
    pub const fn from_packed(packed: u64) -> Self {
        Self(packed)
    }

    /// The packed `v << 32 | u` representation
    #[inline(always)]
    pub const fn packed(self) -> u64 {
        self.0
    }

    /// Endpoint in the U partition
    #[inline(always)]
    pub const fn u(self) -> Node {
        self.0 as u32
    }

    /// Endpoint in the V partition
    #[inline(always)]
    pub const fn v(self) -> Node {
        (self.0 >> 32) as u32
    }

    /// Endpoint on one side
    #[inline(always)]
    pub fn node(self, side: Side) -> Node {
        match side {
            Side::U => self.u(),
            Side::V => self.v(),
        }
    }

    /// Are both endpoints the same node?
    ///
    /// Forced endpoint parity keeps generated edges from ever being loops,
    /// but edges built from raw values may still be.
    #[inline(always)]
    pub fn is_self_loop(self) -> bool {
        self.u() == self.v()
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Edge({}, {})", self.u(), self.v())
    }
}

/// Keyed edge function for one puzzle instance
///
/// Edge `n` joins `sip(2n) & mask & !1` to `sip(2n + 1) & mask | 1`, where
/// `mask` keeps `edge_bits + 1` bits of node id.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EdgeHasher {
    /// Puzzle keys
    keys: SipKeys,
    /// Node id mask for the configured graph size
    node_mask: u32,
    /// Number of edges in the graph
    num_edges: u32,
}

impl EdgeHasher {
    /// Edge function for `keys` over the graph described by `geometry`.
    pub fn new(keys: SipKeys, geometry: &Geometry) -> Self {
        Self {
            keys,
            node_mask: geometry.node_mask(),
            num_edges: geometry.num_edges(),
        }
    }

    /// Puzzle keys
    pub fn keys(&self) -> &SipKeys {
        &self.keys
    }

    /// Number of edges in the graph
    pub fn num_edges(&self) -> u32 {
        self.num_edges
    }

    /// Compute the endpoint of edge `nonce` on `side`.
    #[inline(always)]
    pub fn node(&self, nonce: Nonce, side: Side) -> Node {
        let index = 2 * u64::from(nonce);
        match side {
            Side::U => (siphash24(&self.keys, index) as u32) & self.node_mask & !1,
            Side::V => (siphash24(&self.keys, index + 1) as u32) & self.node_mask | 1,
        }
    }

    /// Compute edge `nonce`.
    #[inline(always)]
    pub fn edge(&self, nonce: Nonce) -> Edge {
        Edge::new(self.node(nonce, Side::U), self.node(nonce, Side::V))
    }
}
