use commonware_hugearray::{
    array::{Array, Config},
    storage::memory::Storage,
};
use criterion::criterion_main;
use std::num::{NonZeroU64, NonZeroUsize};

mod get;
mod set;

criterion_main!(get::benches, set::benches);

/// Items held by each benchmarked array.
const ITEMS: u64 = 1_000_000;

/// Items per segment.
const BLOCK_CAPACITY: u64 = 65_536;

/// Open an in-memory array of `ITEMS` items with the given buffering parameters.
fn init(buffer_size: usize, cache_capacity: usize) -> Array<Storage, u64> {
    let cfg = Config {
        block_capacity: NonZeroU64::new(BLOCK_CAPACITY).unwrap(),
        buffer_size: NonZeroUsize::new(buffer_size).unwrap(),
        cache_capacity: NonZeroUsize::new(cache_capacity).unwrap(),
    };
    Array::init(Storage::default(), cfg, ITEMS).unwrap()
}
