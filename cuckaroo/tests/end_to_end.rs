//! Full solve attempts on small graphs, reusing solver memory

use cuckaroo::{CpuBackend, CuckarooBuilder, Outcome, Params, SipKeys, Solver};

const HEADER: &[u8] = b"cr29 test header";

fn params(edge_bits: u32, bucket_bits: u32) -> Params {
    let mut params = Params::with_edge_bits(edge_bits);
    params.bucket_bits = bucket_bits;
    params.bucket_slack = 1024;
    params.trim_rounds = 512;
    params
}

#[test]
fn first_proof_for_header() {
    let mut solver = Solver::new(CpuBackend::new(), params(16, 2)).unwrap();
    let mut mem = solver.memory().unwrap();

    let mut found = Vec::new();
    for nonce in 0..=20u64 {
        let report = solver
            .solve(&SipKeys::from_header(HEADER, Some(nonce)), &mut mem, &())
            .unwrap();
        if let Outcome::Found(proof) = report.outcome {
            found.push((nonce, proof));
        }
    }
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, 20);

    let mut builder = CuckarooBuilder::new();
    builder.params(params(16, 2));
    builder.verify(HEADER, 20, &found[0].1).unwrap();
}

#[test]
fn larger_graph_results_verify() {
    let mut builder = CuckarooBuilder::new();
    builder.params(params(20, 4));
    let mut solver = Solver::new(CpuBackend::with_threads(0, 2).unwrap(), params(20, 4)).unwrap();
    let mut mem = solver.memory().unwrap();

    for nonce in 0..3u64 {
        let keys = SipKeys::from_header(b"larger graph", Some(nonce));
        let report = solver.solve(&keys, &mut mem, &()).unwrap();
        assert_eq!(report.fill.generated, 1 << 20);
        assert_eq!(report.fill.dropped, 0);
        assert!(report.trim.residual() < 1 << 20);
        match report.outcome {
            Outcome::Found(proof) => builder.verify(b"larger graph", nonce, &proof).unwrap(),
            Outcome::NoCycle => {}
            Outcome::Aborted => panic!("nothing asked to abort"),
            _ => unreachable!(),
        }
    }
}

#[test]
fn residual_is_a_two_core() {
    let mut solver = Solver::new(CpuBackend::new(), params(12, 1)).unwrap();
    let mut mem = solver.memory().unwrap();
    for nonce in 0..4 {
        let report = solver
            .solve(&SipKeys::from_header(b"two core", Some(nonce)), &mut mem, &())
            .unwrap();
        assert!(report.trim.converged());
        let residual = mem.residual();
        assert!(residual.windows(2).all(|pair| pair[0] <= pair[1]));
        for edge in residual {
            assert!(residual.iter().filter(|e| e.u() == edge.u()).count() >= 2);
            assert!(residual.iter().filter(|e| e.v() == edge.v()).count() >= 2);
        }
    }
}
