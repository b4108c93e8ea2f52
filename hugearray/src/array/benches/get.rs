//! Sequential and random read benchmarks for Array.

use super::{init, ITEMS};
use criterion::{black_box, criterion_group, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Instant;

const READS: usize = 100_000;

fn select_indices(pattern: &str) -> Vec<u64> {
    match pattern {
        "sequential" => (0..READS as u64).collect(),
        _ => {
            let mut rng = StdRng::seed_from_u64(42);
            (0..READS).map(|_| rng.gen_range(0..ITEMS)).collect()
        }
    }
}

fn bench_get(c: &mut Criterion) {
    for pattern in ["sequential", "random"] {
        let indices = select_indices(pattern);
        for (buffer_size, cache_capacity) in [(128, 512), (1_024, 64)] {
            let mut array = init(buffer_size, cache_capacity);
            c.bench_function(
                &format!(
                    "{}/pattern={} buffer={} cache={} reads={}",
                    module_path!(),
                    pattern,
                    buffer_size,
                    cache_capacity,
                    READS,
                ),
                |b| {
                    b.iter_custom(|iters| {
                        let start = Instant::now();
                        for _ in 0..iters {
                            for index in &indices {
                                black_box(array.get(*index).unwrap());
                            }
                        }
                        start.elapsed()
                    });
                },
            );
            array.close().unwrap();
        }
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_get
}
