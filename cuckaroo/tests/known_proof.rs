//! A known 42-cycle in a 2^16-edge graph, checked end to end

use cuckaroo::{
    CpuBackend, Cuckaroo, CuckarooBuilder, Edge, Error, Outcome, Params, Proof, ProofArray,
    SipKeys, Solver, PROOF_SIZE,
};

const HEADER: &[u8] = b"cr29 test header";
const NONCE: u64 = 20;

/// The only proof among nonces 0..=20 for this header
const PROOF: ProofArray = [
    658, 6581, 10314, 11294, 11653, 12069, 12720, 14326, 15759, 17193, 20730, 24959, 25048, 26625,
    29358, 30902, 32677, 34724, 35578, 36312, 37085, 37581, 38910, 40115, 40887, 41668, 42127,
    43863, 48451, 48562, 48882, 49259, 50559, 52074, 52328, 53675, 55005, 55341, 55830, 59699,
    61543, 63583,
];

fn builder() -> CuckarooBuilder {
    let mut builder = CuckarooBuilder::new();
    builder
        .edge_bits(16)
        .bucket_bits(2)
        .bucket_slack(1024)
        .trim_rounds(512);
    builder
}

fn instance() -> Cuckaroo {
    builder().build(HEADER, Some(NONCE)).unwrap()
}

#[test]
fn keys_and_edges() {
    let instance = instance();
    assert_eq!(
        *instance.keys(),
        SipKeys::new(
            0x8bb36fdae0c741c6,
            0xf908c189994bfe30,
            0x2a8c91c4da6dd222,
            0x30c6dafdd3104791
        )
    );
    let hasher = instance.hasher();
    assert_eq!(hasher.edge(658), Edge::new(36798, 1925));
    assert_eq!(hasher.edge(6581), Edge::new(55928, 31683));
    assert_eq!(hasher.edge(10314), Edge::new(58566, 101927));
    assert_eq!(hasher.edge(63583), Edge::new(81616, 37905));
}

#[test]
fn verify_known_proof() {
    let proof = Proof::try_from_array(&PROOF).unwrap();
    instance().verify(&proof).unwrap();
    builder().verify(HEADER, NONCE, &proof).unwrap();
    builder().verify_array(HEADER, NONCE, &PROOF).unwrap();
}

#[test]
fn solve_finds_known_proof() {
    let found = builder().solve(HEADER, NONCE).unwrap();
    assert_eq!(found, Some(Proof::try_from_array(&PROOF).unwrap()));
}

#[test]
fn trimming_report() {
    let mut params = Params::with_edge_bits(16);
    params.bucket_bits = 2;
    params.bucket_slack = 1024;
    params.trim_rounds = 512;
    let mut solver = Solver::new(CpuBackend::new(), params).unwrap();
    let mut mem = solver.memory().unwrap();
    let report = solver
        .solve(&SipKeys::from_header(HEADER, Some(NONCE)), &mut mem, &())
        .unwrap();

    assert_eq!(report.fill.generated, 1 << 16);
    assert_eq!(report.fill.dropped, 0);
    assert_eq!(report.trim.dropped, 0);
    assert!(report.trim.converged());
    assert_eq!(report.residual, 46);
    assert_eq!(report.residual_dropped, 0);
    assert_eq!(mem.residual().len(), 46);
    assert_eq!(
        report.outcome,
        Outcome::Found(Proof::try_from_array(&PROOF).unwrap())
    );
}

#[test]
fn proof_difficulty() {
    let proof = Proof::try_from_array(&PROOF).unwrap();
    assert_eq!(
        hex::encode(proof.hash(16)),
        "24c62b87c7a32a76e6033722a4e7afda5d9f37a5e7f862c4eed404a1af6d7778"
    );
    assert_eq!(proof.hash_value(16), 0x24c62b87c7a32a76);
    assert_eq!(proof.difficulty(16), 6);
    assert_eq!(
        hex::encode(proof.hash(29)),
        "9c56adb464accb418a672740a5a730c1e0dc2b9d8a4c9ec12a85c1915ee93592"
    );
}

#[test]
fn mutated_proofs_fail() {
    let instance = instance();

    let mut moved = PROOF;
    moved[0] += 1;
    let proof = Proof::try_from_array(&moved).unwrap();
    assert!(instance.verify(&proof).is_err());

    let mut out_of_range = PROOF;
    out_of_range[PROOF_SIZE - 1] = 1 << 16;
    let proof = Proof::try_from_array(&out_of_range).unwrap();
    assert!(matches!(
        instance.verify(&proof),
        Err(Error::NonceRange {
            nonce: 65536,
            num_edges: 65536
        })
    ));

    let mut swapped = PROOF;
    swapped.swap(10, 11);
    assert!(matches!(
        builder().verify_array(HEADER, NONCE, &swapped),
        Err(Error::Order)
    ));

    let proof = Proof::try_from_array(&PROOF).unwrap();
    assert!(builder().verify(HEADER, NONCE + 1, &proof).is_err());
    assert!(builder().verify(b"other header", NONCE, &proof).is_err());
}

#[test]
fn byte_round_trip() {
    let proof = Proof::try_from_array(&PROOF).unwrap();
    let bytes = proof.to_bytes();
    assert_eq!(Proof::try_from_bytes(&bytes).unwrap(), proof);
    assert_eq!(&bytes[..4], &658u32.to_le_bytes());
}
