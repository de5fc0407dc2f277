//! Search for a 42-cycle in the trimmed residual graph
//!
//! The search keeps the residual edges seen so far as a forest of parent
//! links, one directed path from every node to the root of its tree. Each
//! new edge `(u, v)` either joins two trees or closes a cycle:
//!
//!   - Different roots: the shorter of the two paths is reversed so its
//!     node becomes the root of its tree, and then linked to the other
//!     endpoint. The forest stays acyclic.
//!
//!   - Same root: the two paths meet at their first shared node, and the
//!     edge closes a cycle through it. A cycle of the wanted length is
//!     reported. Anything else is skipped and the edge is never linked.
//!
//! Paths are bounded; an edge whose path would exceed [`MAX_PATH_LEN`]
//! nodes is skipped with a warning.

use crate::edge::{Edge, Node};
use crate::PROOF_SIZE;
use arrayvec::ArrayVec;
use std::collections::HashMap;
use tracing::warn;

/// Longest parent-link path followed before an edge is skipped
pub const MAX_PATH_LEN: usize = 8192;

/// The edges of one cycle found by [`CycleFinder`]
pub type CycleEdges = ArrayVec<Edge, PROOF_SIZE>;

/// Reusable state for the cycle search
#[derive(Debug, Default)]
pub struct CycleFinder {
    /// Parent link of every non-root node
    links: HashMap<Node, Node>,
    /// Scratch path from the current edge's U endpoint
    us: Vec<Node>,
    /// Scratch path from the current edge's V endpoint
    vs: Vec<Node>,
}

/// Path from a node to its root ran past [`MAX_PATH_LEN`]
#[derive(Debug)]
struct PathOverflow;

/// Fill `path` with `start` followed by its ancestors up to the root.
fn follow(links: &HashMap<Node, Node>, start: Node, path: &mut Vec<Node>) -> Result<(), PathOverflow> {
    path.clear();
    path.push(start);
    let mut node = start;
    while let Some(&parent) = links.get(&node) {
        if path.len() >= MAX_PATH_LEN {
            return Err(PathOverflow);
        }
        path.push(parent);
        node = parent;
    }
    Ok(())
}

impl CycleFinder {
    /// Create an empty finder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Search `edges`, in order, for the first cycle of exactly
    /// [`PROOF_SIZE`] edges.
    ///
    /// Edges in the result are normalized with the even node first and
    /// listed starting with the closing edge.
    pub fn find(&mut self, edges: &[Edge]) -> Option<CycleEdges> {
        self.links.clear();
        for &edge in edges {
            let (u0, v0) = (edge.u(), edge.v());
            if follow(&self.links, u0, &mut self.us).is_err()
                || follow(&self.links, v0, &mut self.vs).is_err()
            {
                warn!(?edge, "cycle search path overflow, skipping edge");
                continue;
            }
            let (mut nu, mut nv) = (self.us.len() - 1, self.vs.len() - 1);

            if self.us[nu] == self.vs[nv] {
                // Same tree: walk both paths from equal depth to where they join.
                let min = nu.min(nv);
                nu -= min;
                nv -= min;
                while self.us[nu] != self.vs[nv] {
                    nu += 1;
                    nv += 1;
                }
                if nu + nv + 1 == PROOF_SIZE {
                    return Some(self.collect(edge, nu, nv));
                }
                continue;
            }

            if nu < nv {
                for j in (0..nu).rev() {
                    self.links.insert(self.us[j + 1], self.us[j]);
                }
                self.links.insert(u0, v0);
            } else {
                for j in (0..nv).rev() {
                    self.links.insert(self.vs[j + 1], self.vs[j]);
                }
                self.links.insert(v0, u0);
            }
        }
        None
    }

    /// Gather the closing edge and both path segments up to the join.
    fn collect(&self, closing: Edge, nu: usize, nv: usize) -> CycleEdges {
        let mut cycle = CycleEdges::new();
        cycle.push(closing);
        for path in [&self.us[..=nu], &self.vs[..=nv]] {
            for pair in path.windows(2) {
                cycle.push(Edge::joining(pair[0], pair[1]));
            }
        }
        cycle
    }
}

#[cfg(test)]
mod test {
    use super::CycleFinder;
    use crate::edge::Edge;
    use crate::PROOF_SIZE;

    /// A cycle through `2 * len` nodes, `len` on each side
    fn ring(len: u32, base: u32) -> Vec<Edge> {
        let mut edges = Vec::new();
        for i in 0..len {
            let u = base + 2 * i;
            edges.push(Edge::new(u, u + 1));
            edges.push(Edge::new(base + 2 * ((i + 1) % len), u + 1));
        }
        edges
    }

    #[test]
    fn finds_planted_cycle() {
        let mut edges = ring(PROOF_SIZE as u32 / 2, 1000);
        edges.sort();
        let found = CycleFinder::new().find(&edges).unwrap();
        assert_eq!(found.len(), PROOF_SIZE);
        let mut found = found.to_vec();
        found.sort();
        assert_eq!(found, edges);
    }

    #[test]
    fn ignores_other_lengths() {
        let mut edges = ring(3, 10);
        edges.extend(ring(20, 500));
        edges.extend(ring(22, 5000));
        edges.sort();
        assert!(CycleFinder::new().find(&edges).is_none());
    }

    #[test]
    fn duplicate_edges_are_not_cycles() {
        let edges = [Edge::new(2, 3), Edge::new(2, 3), Edge::new(4, 3)];
        assert!(CycleFinder::new().find(&edges).is_none());
    }

    #[test]
    fn finder_is_reusable() {
        let mut finder = CycleFinder::new();
        let mut edges = ring(21, 0);
        edges.sort();
        assert!(finder.find(&edges).is_some());
        assert!(finder.find(&ring(4, 0)).is_none());
        assert!(finder.find(&edges).is_some());
    }
}
