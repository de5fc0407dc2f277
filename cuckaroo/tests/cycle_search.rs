//! Cycle search over hand-built residual graphs

use cuckaroo::{check_cycle, CycleFinder, Edge, PROOF_SIZE};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// A ring of `len` edges through fresh nodes starting at `base`
fn ring(base: u32, len: usize) -> Vec<Edge> {
    let half = len as u32 / 2;
    let mut edges = Vec::with_capacity(len);
    for i in 0..half {
        let u = base + 2 * i;
        edges.push(Edge::new(u, u + 1));
        edges.push(Edge::new(base + 2 * ((i + 1) % half), u + 1));
    }
    edges
}

/// A tree hanging off `root`, which never adds a cycle
fn pendant_tree(root: u32, base: u32, size: u32) -> Vec<Edge> {
    let mut edges = Vec::new();
    let mut parent = root;
    for i in 0..size {
        // alternate sides along the path
        let node = base + 2 * i + ((parent & 1) ^ 1);
        edges.push(Edge::joining(parent, node));
        parent = node;
    }
    edges
}

fn normalized(edges: &[Edge]) -> Vec<Edge> {
    let mut edges: Vec<Edge> = edges.iter().map(|e| Edge::joining(e.u(), e.v())).collect();
    edges.sort();
    edges
}

#[test]
fn planted_cycle_among_noise() {
    let planted = ring(10_000, PROOF_SIZE);
    let mut graph = planted.clone();
    graph.extend(ring(20_000, 40));
    graph.extend(ring(30_000, 44));
    graph.extend(ring(40_000, 2));
    graph.extend(pendant_tree(10_000, 50_000, 30));
    graph.extend(pendant_tree(30_001, 60_000, 12));
    graph.extend(pendant_tree(70_000, 80_000, 100));

    let mut rng = StdRng::seed_from_u64(42);
    let mut finder = CycleFinder::new();
    for _ in 0..8 {
        graph.shuffle(&mut rng);
        let cycle = finder.find(&graph).expect("planted cycle");
        assert_eq!(cycle.len(), PROOF_SIZE);
        assert_eq!(normalized(&cycle), normalized(&planted));

        let array: [Edge; PROOF_SIZE] = cycle.into_inner().unwrap();
        check_cycle(&array).unwrap();
    }
}

#[test]
fn wrong_lengths_only() {
    let mut graph = ring(0, 40);
    graph.extend(ring(1_000, 44));
    graph.extend(ring(2_000, 84));
    graph.extend(pendant_tree(0, 5_000, 50));
    assert!(CycleFinder::new().find(&graph).is_none());
}

#[test]
fn cycle_through_shared_node() {
    // A 42-ring and a 40-ring sharing node 0
    let planted = ring(0, PROOF_SIZE);
    let mut other = ring(1_000, 40);
    for edge in other.iter_mut() {
        if edge.u() == 1_000 {
            *edge = Edge::new(0, edge.v());
        }
    }
    let mut graph = other;
    graph.extend(planted.iter().copied());
    let cycle = CycleFinder::new().find(&graph).expect("planted cycle");
    assert_eq!(normalized(&cycle), normalized(&planted));
}

#[test]
fn empty_and_tiny_graphs() {
    let mut finder = CycleFinder::new();
    assert!(finder.find(&[]).is_none());
    assert!(finder.find(&[Edge::new(0, 1)]).is_none());
    assert!(finder.find(&ring(0, 2)).is_none());
}
