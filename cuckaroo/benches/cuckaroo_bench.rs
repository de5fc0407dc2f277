use criterion::{
    BenchmarkId, Criterion, Throughput, {criterion_group, criterion_main},
};
use cuckaroo::{
    siphash24, Backend, BucketStore, CpuBackend, DegreeTable, EdgeHasher, Params, SipKeys, Solver,
};

fn small_params(edge_bits: u32) -> Params {
    let mut params = Params::with_edge_bits(edge_bits);
    params.trim_rounds = 512;
    params
}

fn siphash(c: &mut Criterion) {
    let keys = SipKeys::from_header(&[255; 32], Some(0));
    c.bench_function("siphash24", |b| {
        let mut input = 0u64;
        b.iter(|| {
            input = input.wrapping_add(1);
            siphash24(&keys, input)
        })
    });
}

fn generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    let mut backend = CpuBackend::new();
    for edge_bits in [16u32, 20].iter() {
        let geometry = small_params(*edge_bits).validate().unwrap();
        let mut store = BucketStore::new(&geometry).unwrap();
        let hasher = EdgeHasher::new(SipKeys::from_header(&[255; 32], None), &geometry);
        group.throughput(Throughput::Elements(1 << edge_bits));
        group.bench_with_input(BenchmarkId::from_parameter(edge_bits), edge_bits, |b, _| {
            b.iter(|| backend.generate(&hasher, 4096, &mut store).unwrap())
        });
    }
    group.finish();
}

fn trim_round(c: &mut Criterion) {
    let mut group = c.benchmark_group("first_trim_round");
    let mut backend = CpuBackend::new();
    for edge_bits in [16u32, 20].iter() {
        let geometry = small_params(*edge_bits).validate().unwrap();
        let mut store = BucketStore::new(&geometry).unwrap();
        let mut degrees = DegreeTable::new(&geometry).unwrap();
        let hasher = EdgeHasher::new(SipKeys::from_header(&[255; 32], None), &geometry);
        group.throughput(Throughput::Elements(1 << edge_bits));
        group.bench_with_input(BenchmarkId::from_parameter(edge_bits), edge_bits, |b, _| {
            b.iter(|| {
                backend.generate(&hasher, 4096, &mut store).unwrap();
                backend.count_degrees(&store, &mut degrees).unwrap();
                backend.trim(&mut store, &degrees).unwrap()
            })
        });
    }
    group.finish();
}

fn solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve");
    group.sample_size(10);
    for edge_bits in [16u32, 20].iter() {
        let mut solver = Solver::new(CpuBackend::new(), small_params(*edge_bits)).unwrap();
        let mut mem = solver.memory().unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(edge_bits), edge_bits, |b, _| {
            let mut nonce = 0u64;
            b.iter(|| {
                nonce += 1;
                let keys = SipKeys::from_header(&[255; 32], Some(nonce));
                solver.solve(&keys, &mut mem, &()).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, siphash, generate, trim_round, solve);
criterion_main!(benches);
