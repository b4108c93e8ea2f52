//! Address an array of fixed-size items that is larger than any single mapping (or than memory).
//!
//! An [array::Array] partitions its items across fixed-capacity [storage::Segment]s and serves
//! reads and writes through a bounded, write-back [cache::Lru] of item buffers.
//!
//! # Status
//!
//! `commonware-hugearray` is **ALPHA** software and is not yet recommended for production use.
//! Developers should expect breaking changes and occasional instability.

pub mod array;
pub mod cache;
pub mod storage;
