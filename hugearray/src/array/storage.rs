use super::{buffer::Buffer, Config, Error};
use crate::{
    cache::{Lru, Slot},
    storage::{Segment, Storage},
};
use commonware_codec::{Codec, FixedSize};
use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};
use tracing::{debug, warn};

#[derive(Default)]
struct Metrics {
    hits: Counter,
    misses: Counter,
    evictions: Counter,
    write_backs: Counter,
    tracked: Gauge,
}

impl Metrics {
    fn register(&self, registry: &mut Registry) {
        registry.register(
            "hits",
            "Number of buffer lookups served by the cache",
            self.hits.clone(),
        );
        registry.register(
            "misses",
            "Number of buffers loaded from segments",
            self.misses.clone(),
        );
        registry.register(
            "evictions",
            "Number of buffers evicted from the cache",
            self.evictions.clone(),
        );
        registry.register(
            "write_backs",
            "Number of dirty buffers written to segments",
            self.write_backs.clone(),
        );
        registry.register("tracked", "Number of segments", self.tracked.clone());
    }
}

/// Implementation of [Array] storage.
pub struct Array<S: Storage, T> {
    storage: S,
    cfg: Config,

    // Invariant: `segments.len() == len.div_ceil(cfg.block_capacity)`, and segment `i` holds the
    // items at positions `[i * block_capacity, (i + 1) * block_capacity)`.
    segments: Vec<S::Segment>,
    segment_size: u64,
    len: u64,

    cache: Lru<u64, Buffer<T>>,

    // The most recently resolved buffer. Reset whenever the entry it refers to may have been
    // evicted or cleared.
    last: Option<(u64, Slot)>,

    metrics: Metrics,
}

impl<S: Storage, T: Codec<Cfg = ()> + FixedSize + Clone> Array<S, T> {
    /// Initialize an [Array] of `len` items over `storage`.
    ///
    /// Segments `0..ceil(len / block_capacity)` are allocated from `storage`. Any data already
    /// stored in them (from a previous [Array] over the same storage) is visible.
    pub fn init(storage: S, cfg: Config, len: u64) -> Result<Self, Error> {
        if T::SIZE == 0 {
            return Err(Error::InvalidArgument("item size must be non-zero"));
        }
        let block_capacity = cfg.block_capacity.get();
        if block_capacity % cfg.buffer_size.get() as u64 != 0 {
            return Err(Error::InvalidArgument(
                "buffer size must divide block capacity",
            ));
        }
        let segment_size = block_capacity
            .checked_mul(T::SIZE as u64)
            .ok_or(Error::InvalidArgument("segment size overflows u64"))?;
        let count = Self::segments_for(len, block_capacity)?;

        let mut segments = Vec::new();
        Self::reserve(&mut segments, count)?;
        for index in 0..count {
            segments.push(storage.allocate(index as u64, segment_size)?);
        }
        debug!(len, segments = count, "initialized array");

        let metrics = Metrics::default();
        metrics.tracked.set(count as i64);
        Ok(Self {
            storage,
            cache: Lru::new(cfg.cache_capacity),
            cfg,
            segments,
            segment_size,
            len,
            last: None,
            metrics,
        })
    }

    /// The number of segments required to hold `len` items.
    fn segments_for(len: u64, block_capacity: u64) -> Result<usize, Error> {
        len.div_ceil(block_capacity)
            .try_into()
            .map_err(|_| Error::InvalidArgument("length requires too many segments"))
    }

    /// Reserve room for `additional` more segments in `segments`.
    fn reserve<G>(segments: &mut Vec<G>, additional: usize) -> Result<(), Error> {
        segments
            .try_reserve_exact(additional)
            .map_err(|_| Error::InvalidArgument("length requires too many segments"))
    }

    /// Register the array's metrics in `registry`.
    pub fn register(&self, registry: &mut Registry) {
        self.metrics.register(registry);
    }

    /// The number of items in the array.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the array holds no items.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of segments backing the array.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// The configuration of the array.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Get the item at `index`.
    pub fn get(&mut self, index: u64) -> Result<T, Error> {
        let (slot, offset) = self.resolve(index)?;
        Ok(self.cache.at_mut(slot).items[offset].clone())
    }

    /// Set the item at `index` to `item`.
    ///
    /// The item is visible to subsequent reads immediately, but is only persisted once its buffer
    /// is written back (on eviction, [Array::flush], [Array::sync], [Array::resize], or
    /// [Array::close]).
    pub fn set(&mut self, index: u64, item: T) -> Result<(), Error> {
        let (slot, offset) = self.resolve(index)?;
        let buffer = self.cache.at_mut(slot);
        buffer.items[offset] = item;
        buffer.dirty = true;
        Ok(())
    }

    /// Find (loading if necessary) the buffer holding `index`, returning its cache slot and the
    /// offset of `index` within it.
    fn resolve(&mut self, index: u64) -> Result<(Slot, usize), Error> {
        if index >= self.len {
            return Err(Error::IndexOutOfRange(index, self.len));
        }
        let buffer_size = self.cfg.buffer_size.get() as u64;
        let offset = index % buffer_size;
        let position = index - offset;

        // Fast path: same buffer as the last access
        if let Some((last, slot)) = self.last {
            if last == position {
                return Ok((slot, offset as usize));
            }
        }

        let slot = match self.cache.find(&position) {
            Some(slot) => {
                self.metrics.hits.inc();
                slot
            }
            None => {
                self.metrics.misses.inc();
                self.load(position)?
            }
        };
        self.last = Some((position, slot));
        Ok((slot, offset as usize))
    }

    /// Read the buffer at `position` from its segment and insert it into the cache, writing back
    /// the least recently used buffer if the cache is full.
    fn load(&mut self, position: u64) -> Result<Slot, Error> {
        let block_capacity = self.cfg.block_capacity.get();
        let buffer = Buffer::<T>::load(
            &self.segments,
            block_capacity,
            position,
            self.cfg.buffer_size.get(),
        )?;

        // The evicted buffer may be the one `last` refers to
        self.last = None;
        let Self {
            cache,
            segments,
            len,
            metrics,
            ..
        } = self;
        cache.put(position, buffer, |_, victim| {
            if victim.write_back(segments, block_capacity, *len)? {
                metrics.write_backs.inc();
            }
            metrics.evictions.inc();
            Ok(())
        })
    }

    /// Write back every dirty buffer (up to `limit`) and empty the cache.
    fn clear(&mut self, limit: u64) -> Result<(), Error> {
        self.last = None;
        let block_capacity = self.cfg.block_capacity.get();
        let Self {
            cache,
            segments,
            metrics,
            ..
        } = self;
        cache.clear(|_, buffer| {
            if buffer.write_back(segments, block_capacity, limit)? {
                metrics.write_backs.inc();
            }
            Ok(())
        })
    }

    /// Write back every dirty buffer, keeping all buffers cached.
    pub fn flush(&mut self) -> Result<(), Error> {
        let block_capacity = self.cfg.block_capacity.get();
        let Self {
            cache,
            segments,
            len,
            metrics,
            ..
        } = self;
        cache.try_for_each(|_, buffer| {
            if buffer.write_back(segments, block_capacity, *len)? {
                metrics.write_backs.inc();
            }
            Ok(())
        })
    }

    /// Write back every dirty buffer and durably persist all segments.
    pub fn sync(&mut self) -> Result<(), Error> {
        self.flush()?;
        for segment in self.segments.iter_mut() {
            segment.sync()?;
        }
        Ok(())
    }

    /// Change the number of items in the array to `len`.
    ///
    /// All buffers are written back and dropped first. When shrinking, buffered items at or past
    /// the new `len` are discarded and segments beyond the new end are closed. When growing, new
    /// segments are allocated from storage. No data is copied, so new items read whatever the
    /// storage holds for them (zero for storage that was never written).
    pub fn resize(&mut self, len: u64) -> Result<(), Error> {
        let block_capacity = self.cfg.block_capacity.get();
        let target = Self::segments_for(len, block_capacity)?;
        let current = self.segments.len();
        let mut added = Vec::new();
        if target > current {
            Self::reserve(&mut self.segments, target - current)?;
            Self::reserve(&mut added, target - current)?;
        }
        self.clear(self.len.min(len))?;

        if target < current {
            let removed = self.segments.split_off(target);
            self.len = len;
            self.metrics.tracked.set(target as i64);
            for (index, segment) in (target..).zip(removed) {
                segment.close()?;
                debug!(segment = index, "closed segment");
            }
        } else {
            for index in current..target {
                added.push(self.storage.allocate(index as u64, self.segment_size)?);
                debug!(segment = index, "allocated segment");
            }
            self.segments.extend(added);
            self.len = len;
            self.metrics.tracked.set(target as i64);
        }
        debug!(len, segments = target, "resized array");
        Ok(())
    }

    /// Write back every dirty buffer and close all segments.
    ///
    /// The storage itself is left open and may be used to initialize another [Array].
    ///
    /// If writing back fails, the array is still consumed and any buffers not yet written back
    /// are lost. Callers that must be able to retry should [Array::sync] before closing: once
    /// `sync` succeeds, nothing remains to be written back.
    pub fn close(mut self) -> Result<(), Error> {
        self.clear(self.len)?;
        for segment in self.segments.drain(..) {
            segment.close()?;
        }
        self.metrics.tracked.set(0);
        debug!(len = self.len, "closed array");
        Ok(())
    }
}

impl<S: Storage, T> Drop for Array<S, T> {
    fn drop(&mut self) {
        let dirty = self.cache.iter().filter(|(_, buffer)| buffer.dirty).count();
        if dirty > 0 {
            warn!(dirty, "dropped array with buffers that were not written back");
        }
    }
}
