//! Random write benchmark for Array, including write-back of evicted buffers.

use super::{init, ITEMS};
use criterion::{criterion_group, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Instant;

fn bench_set(c: &mut Criterion) {
    for writes in [10_000, 100_000] {
        for cache_capacity in [16, 512] {
            c.bench_function(
                &format!(
                    "{}/cache={} writes={}",
                    module_path!(),
                    cache_capacity,
                    writes,
                ),
                |b| {
                    b.iter_custom(|iters| {
                        let mut rng = StdRng::seed_from_u64(0);
                        let mut duration = std::time::Duration::ZERO;
                        for _ in 0..iters {
                            let mut array = init(128, cache_capacity);
                            let start = Instant::now();
                            for _ in 0..writes {
                                let index = rng.gen_range(0..ITEMS);
                                array.set(index, rng.gen()).unwrap();
                            }
                            array.flush().unwrap();
                            duration += start.elapsed();
                            array.close().unwrap();
                        }
                        duration
                    });
                },
            );
        }
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_set
}
