use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dynakv::node::Ring;
use dynakv::Peer;

fn ring_of(size: u64) -> Ring {
    let mut ring = Ring::new();
    ring.add_peers((0..size).map(|i| Peer::new(i * 1_000, format!("127.0.0.1:{}", 10_000 + i))));
    ring
}

fn criterion_benchmarks(c: &mut Criterion) {
    let ring = ring_of(64);

    c.bench_function("replicas_for_key n=3", |b| {
        let mut key = 0u64;
        b.iter(|| {
            key = key.wrapping_add(7_919) % 70_000;
            black_box(ring.replicas_for_key(3, black_box(key)))
        });
    });

    c.bench_function("is_replica_for n=3", |b| {
        b.iter(|| black_box(ring.is_replica_for(3, black_box(63_500), black_box(1_000))));
    });
}

criterion_group!(benches, criterion_benchmarks);
criterion_main!(benches);
