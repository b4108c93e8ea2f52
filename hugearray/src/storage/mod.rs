//! Fixed-size [Segment]s and the [Storage] factories that allocate them.
//!
//! A [Segment] is a contiguous region of exactly `size` bytes supporting positional reads and
//! writes. Segments are exclusively owned by whoever allocated them (usually an
//! [crate::array::Array]) and are released with [Segment::close]. Closing a segment never removes
//! the data behind it: the lifetime of the underlying file (or memory) belongs to the [Storage],
//! which may be shared by several owners.
//!
//! # Layout
//!
//! Segment `index` of a [Storage] always refers to the same region of the backing store, so a
//! segment allocated again with the same `index` and `size` observes everything written to it
//! before:
//!
//! ```text
//! +-------------------+-------------------+-------------------+-----
//! |     segment 0     |     segment 1     |     segment 2     | ...
//! +-------------------+-------------------+-------------------+-----
//!  ^ base              ^ base + size       ^ base + 2 * size
//! ```
//!
//! # Items
//!
//! [read_bulk] and [write_bulk] move runs of fixed-size items (any
//! [commonware_codec::Codec] with a [commonware_codec::FixedSize]) in and out of a [Segment]. Item
//! `i` of a run starting at byte `offset` occupies bytes `[offset + i * SIZE, offset + (i + 1) *
//! SIZE)`, with no framing or checksum.

use bytes::BytesMut;
use commonware_codec::{Codec, DecodeExt, FixedSize, Write as _};
use thiserror::Error;

pub mod memory;
pub mod metered;
pub mod mmap;

/// Errors that can occur when interacting with a [Segment] or [Storage].
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] commonware_codec::Error),
    #[error("segment insufficient length")]
    SegmentInsufficientLength,
    #[error("offset overflow")]
    OffsetOverflow,
    #[error("invalid segment size: {0}")]
    InvalidSize(u64),
    #[error("zero-sized item")]
    ZeroSizedItem,
}

/// A fixed-size region of storage.
pub trait Segment {
    /// The size of the segment in bytes. Never changes after allocation.
    fn size(&self) -> u64;

    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// Fails with [Error::SegmentInsufficientLength] if the range ends past [Segment::size].
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), Error>;

    /// Write all of `buf` starting at `offset`.
    ///
    /// Fails with [Error::SegmentInsufficientLength] if the range ends past [Segment::size].
    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<(), Error>;

    /// Ensure all written data is durably persisted.
    fn sync(&mut self) -> Result<(), Error>;

    /// Persist pending data and release the segment.
    fn close(self) -> Result<(), Error>
    where
        Self: Sized;
}

/// A factory of [Segment]s backed by a single store.
pub trait Storage {
    type Segment: Segment;

    /// Allocate segment `index` with exactly `size` bytes.
    ///
    /// Regions that were never written read as zero.
    fn allocate(&self, index: u64, size: u64) -> Result<Self::Segment, Error>;
}

/// Return the range `[offset, offset + len)` as `usize` bounds, if it fits within `size` bytes.
pub(crate) fn range(offset: u64, len: usize, size: u64) -> Result<(usize, usize), Error> {
    let end = offset
        .checked_add(len as u64)
        .ok_or(Error::OffsetOverflow)?;
    if end > size {
        return Err(Error::SegmentInsufficientLength);
    }
    let start: usize = offset.try_into().map_err(|_| Error::OffsetOverflow)?;
    Ok((start, start + len))
}

/// Read `count` consecutive items from `segment`, starting at byte `offset`.
pub fn read_bulk<S: Segment, T: Codec<Cfg = ()> + FixedSize>(
    segment: &S,
    offset: u64,
    count: usize,
) -> Result<Vec<T>, Error> {
    if T::SIZE == 0 {
        return Err(Error::ZeroSizedItem);
    }
    let len = count.checked_mul(T::SIZE).ok_or(Error::OffsetOverflow)?;
    let mut buf = vec![0u8; len];
    segment.read_at(&mut buf, offset)?;
    buf.chunks_exact(T::SIZE)
        .map(|chunk| T::decode(chunk).map_err(Error::Codec))
        .collect()
}

/// Write `items` consecutively to `segment`, starting at byte `offset`.
pub fn write_bulk<S: Segment, T: Codec<Cfg = ()> + FixedSize>(
    segment: &mut S,
    offset: u64,
    items: &[T],
) -> Result<(), Error> {
    if T::SIZE == 0 {
        return Err(Error::ZeroSizedItem);
    }
    let len = items.len().checked_mul(T::SIZE).ok_or(Error::OffsetOverflow)?;
    let mut buf = BytesMut::with_capacity(len);
    for item in items {
        item.write(&mut buf);
    }
    segment.write_at(&buf, offset)
}
