use super::Error;
use crate::storage::{self, Segment};
use commonware_codec::{Codec, FixedSize};
use tracing::trace;

/// An in-memory copy of `items.len()` consecutive items, starting at a buffer-aligned `position`.
pub(super) struct Buffer<T> {
    pub(super) position: u64,
    pub(super) items: Vec<T>,
    /// Set once any item has been modified since the buffer was last written back.
    pub(super) dirty: bool,
}

/// Translate an item `position` into the index of the segment holding it and the byte offset of
/// the item within that segment.
pub(super) const fn locate(position: u64, items_per_segment: u64, item_size: u64) -> (u64, u64) {
    (
        position / items_per_segment,
        (position % items_per_segment) * item_size,
    )
}

impl<T: Codec<Cfg = ()> + FixedSize> Buffer<T> {
    /// Read the `size` items starting at `position` from `segments`.
    ///
    /// `position` must be a multiple of `size`, and `size` must divide `items_per_segment`, so the
    /// whole buffer lies within a single segment.
    pub(super) fn load<S: Segment>(
        segments: &[S],
        items_per_segment: u64,
        position: u64,
        size: usize,
    ) -> Result<Self, Error> {
        let (segment, offset) = locate(position, items_per_segment, T::SIZE as u64);
        let items = storage::read_bulk(&segments[segment as usize], offset, size)?;
        trace!(position, segment, "loaded buffer");
        Ok(Self {
            position,
            items,
            dirty: false,
        })
    }

    /// Write the buffer back to `segments` if it is dirty, returning whether anything was written.
    ///
    /// Only items before `len` are written: the tail of a buffer that extends past the end of the
    /// array is never persisted. A buffer starting at or after `len` is discarded without I/O.
    pub(super) fn write_back<S: Segment>(
        &mut self,
        segments: &mut [S],
        items_per_segment: u64,
        len: u64,
    ) -> Result<bool, Error> {
        if !self.dirty {
            return Ok(false);
        }
        if self.position >= len {
            trace!(position = self.position, len, "discarded buffer past end");
            self.dirty = false;
            return Ok(false);
        }
        let count = self
            .items
            .len()
            .min((len - self.position).try_into().unwrap_or(usize::MAX));
        let (segment, offset) = locate(self.position, items_per_segment, T::SIZE as u64);
        storage::write_bulk(&mut segments[segment as usize], offset, &self.items[..count])?;
        trace!(position = self.position, segment, count, "wrote back buffer");
        self.dirty = false;
        Ok(true)
    }
}
