//! A resizable array of fixed-size items spread across many [crate::storage::Segment]s.
//!
//! Items are stored in a sequence of segments allocated from a caller-provided
//! [crate::storage::Storage], each holding `block_capacity` items. Reads and writes go through an
//! in-memory cache of `cache_capacity` buffers of `buffer_size` consecutive items, so random access
//! touches storage only on a cache miss.
//!
//! # Format
//!
//! Item `i` is stored at byte offset `(i % block_capacity) * SIZE` of segment `i / block_capacity`,
//! where `SIZE` is the item's [commonware_codec::FixedSize]. Every segment is exactly
//! `block_capacity * SIZE` bytes, including the last one (which may be partially used):
//!
//! ```text
//! segment 0                           segment 1
//! +--------+--------+-----+---------+ +--------+--------+-----+---------+
//! | item_0 | item_1 | ... | item_b-1| | item_b |  ...   |     |         |
//! +--------+--------+-----+---------+ +--------+--------+-----+---------+
//!
//! b = config.block_capacity
//! ```
//!
//! # Buffering
//!
//! Every access resolves the buffer-aligned `position` of its item (a multiple of `buffer_size`).
//! The most recently used buffer is remembered and reused directly; otherwise the buffer is looked
//! up in a least-recently-used [crate::cache::Lru] and, on a miss, read from its segment. Because
//! `buffer_size` must divide `block_capacity`, a buffer never spans two segments.
//!
//! Writes only modify the cached buffer, marking it dirty. A dirty buffer is written back to its
//! segment when it is evicted from the cache, or when the caller invokes [Array::flush],
//! [Array::sync], [Array::resize], or [Array::close]. Only items before the end of the array are
//! ever written back. Dropping an [Array] without closing it discards any dirty buffers.
//!
//! # Resizing
//!
//! [Array::resize] writes back and drops all buffers, then allocates or closes segments so that
//! exactly `ceil(len / block_capacity)` remain. Buffered items at or past a smaller length are
//! discarded rather than written back. Growing never copies data: new items read whatever the
//! storage holds for them.
//!
//! Shrinking does not zero storage. Items past the new length that were written back before the
//! shrink (by eviction, [Array::flush], or [Array::sync]) reappear if the array grows over them
//! again, including items in segments that were closed by the shrink.
//!
//! # Concurrency
//!
//! [Array] performs all I/O synchronously on the calling thread and holds no locks. Every
//! operation (including [Array::get], which updates the cache) requires `&mut self`; callers
//! sharing an [Array] across threads must serialize access themselves.
//!
//! # Example
//!
//! ```rust
//! use commonware_hugearray::{
//!     array::{Array, Config},
//!     storage::memory::Storage,
//! };
//!
//! let storage = Storage::default();
//! let mut array = Array::<_, u64>::init(storage.clone(), Config::default(), 0).unwrap();
//!
//! // Grow the array and write an item
//! array.resize(10_000).unwrap();
//! array.set(9_999, 42).unwrap();
//! assert_eq!(array.get(9_999).unwrap(), 42);
//!
//! // Close the array (writing back all buffers) and reopen it
//! array.close().unwrap();
//! let mut array = Array::<_, u64>::init(storage, Config::default(), 10_000).unwrap();
//! assert_eq!(array.get(9_999).unwrap(), 42);
//! ```

use std::num::{NonZeroU64, NonZeroUsize};
use thiserror::Error;

mod buffer;
mod storage;
pub use storage::Array;

/// Errors that can occur when interacting with an [Array].
#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("index out of range: {0} (len {1})")]
    IndexOutOfRange(u64, u64),
}

/// Configuration for [Array] storage.
#[derive(Clone, Debug)]
pub struct Config {
    /// The number of items stored in each segment.
    pub block_capacity: NonZeroU64,

    /// The number of consecutive items held by each cached buffer.
    ///
    /// Must divide `block_capacity`.
    pub buffer_size: NonZeroUsize,

    /// The maximum number of buffers to cache.
    pub cache_capacity: NonZeroUsize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_capacity: NonZeroU64::new(1024).unwrap(),
            buffer_size: NonZeroUsize::new(128).unwrap(),
            cache_capacity: NonZeroUsize::new(512).unwrap(),
        }
    }
}
