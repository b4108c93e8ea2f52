//! A bounded least-recently-used cache with explicit write-back on eviction.
//!
//! [Lru] holds at most `capacity` entries. Inserting into a full cache evicts the least recently
//! used entry, and clearing the cache evicts every entry. Rather than notifying subscribers after
//! the fact, each evicting operation ([Lru::put], [Lru::clear]) takes an `evict` hook that is run
//! synchronously on the victim _before_ it is discarded. If the hook fails, the operation is
//! abandoned and the victim stays cached, so a failed write-back never loses data.
//!
//! # Slots
//!
//! [Lru::find] and [Lru::put] return a [Slot]: a handle to the entry that can be used to access it
//! again with [Lru::at_mut] without hashing the key or updating recency. A slot is invalidated
//! (and may be reused) once its entry is evicted or the cache is cleared, so holders must drop it
//! at that point.
//!
//! # Example
//!
//! ```rust
//! use commonware_hugearray::cache::Lru;
//! use std::num::NonZeroUsize;
//!
//! let mut cache = Lru::new(NonZeroUsize::new(1).unwrap());
//! let mut written = Vec::new();
//! cache.put(1u64, "a", |_, _| Ok::<_, ()>(())).unwrap();
//! cache
//!     .put(2u64, "b", |key, value| {
//!         written.push((*key, *value));
//!         Ok::<_, ()>(())
//!     })
//!     .unwrap();
//! assert_eq!(written, vec![(1, "a")]);
//! assert!(!cache.contains(&1));
//! ```

mod lru;
pub use lru::{Lru, Slot};
