//! A [Storage](super::Storage) wrapper that tracks segment I/O.

use super::Error;
use prometheus_client::metrics::{counter::Counter, gauge::Gauge};
use prometheus_client::registry::Registry;
use std::sync::Arc;

/// Segment activity observed by a metered [Storage].
///
/// Registered under the `segment` prefix (e.g. `segment_read_bytes`).
#[derive(Default)]
pub struct Metrics {
    /// Segments allocated and not yet closed or dropped.
    pub open: Gauge,
    pub reads: Counter,
    pub read_bytes: Counter,
    pub writes: Counter,
    pub write_bytes: Counter,
}

impl Metrics {
    fn register(&self, registry: &mut Registry) {
        let registry = registry.sub_registry_with_prefix("segment");
        registry.register("open", "Number of open segments", self.open.clone());
        registry.register("reads", "Number of segment reads", self.reads.clone());
        registry.register(
            "read_bytes",
            "Bytes read from segments",
            self.read_bytes.clone(),
        );
        registry.register("writes", "Number of segment writes", self.writes.clone());
        registry.register(
            "write_bytes",
            "Bytes written to segments",
            self.write_bytes.clone(),
        );
    }

    fn read(&self, bytes: usize) {
        self.reads.inc();
        self.read_bytes.inc_by(bytes as u64);
    }

    fn write(&self, bytes: usize) {
        self.writes.inc();
        self.write_bytes.inc_by(bytes as u64);
    }
}

/// A wrapper around a `Storage` implementation that tracks metrics.
#[derive(Clone)]
pub struct Storage<S> {
    inner: S,
    metrics: Arc<Metrics>,
}

impl<S> Storage<S> {
    /// Wrap `inner`, registering segment metrics in `registry`.
    pub fn new(inner: S, registry: &mut Registry) -> Self {
        let metrics = Metrics::default();
        metrics.register(registry);
        Self {
            inner,
            metrics: Arc::new(metrics),
        }
    }

    /// The metrics tracked for all segments allocated by this storage.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// The wrapped storage.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: super::Storage> super::Storage for Storage<S> {
    type Segment = Segment<S::Segment>;

    fn allocate(&self, index: u64, size: u64) -> Result<Self::Segment, Error> {
        let inner = self.inner.allocate(index, size)?;
        self.metrics.open.inc();
        Ok(Segment {
            inner: Some(inner),
            metrics: self.metrics.clone(),
        })
    }
}

/// A wrapper around a `Segment` implementation that tracks metrics.
pub struct Segment<G: super::Segment> {
    // Only taken by `close`, so always populated otherwise.
    inner: Option<G>,
    metrics: Arc<Metrics>,
}

impl<G: super::Segment> Segment<G> {
    fn inner(&self) -> &G {
        self.inner.as_ref().expect("segment already closed")
    }

    fn inner_mut(&mut self) -> &mut G {
        self.inner.as_mut().expect("segment already closed")
    }
}

impl<G: super::Segment> super::Segment for Segment<G> {
    fn size(&self) -> u64 {
        self.inner().size()
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), Error> {
        self.inner().read_at(buf, offset)?;
        self.metrics.read(buf.len());
        Ok(())
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<(), Error> {
        self.inner_mut().write_at(buf, offset)?;
        self.metrics.write(buf.len());
        Ok(())
    }

    fn sync(&mut self) -> Result<(), Error> {
        self.inner_mut().sync()
    }

    fn close(mut self) -> Result<(), Error> {
        match self.inner.take() {
            Some(inner) => inner.close(),
            None => Ok(()),
        }
    }
}

impl<G: super::Segment> Drop for Segment<G> {
    fn drop(&mut self) {
        self.metrics.open.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::Storage as MemoryStorage;
    use crate::storage::tests::run_storage_tests;
    use crate::storage::{Segment as _, Storage as _};
    use commonware_macros::test_traced;
    use prometheus_client::encoding::text::encode;

    #[test_traced]
    fn test_metered_storage() {
        let mut registry = Registry::default();
        let inner = MemoryStorage::default();
        let storage = Storage::new(inner, &mut registry);

        run_storage_tests(storage.clone());
        assert_eq!(storage.metrics().open.get(), 0);
    }

    /// Test that metrics are updated correctly for basic operations.
    #[test_traced]
    fn test_metered_segment_metrics() {
        let mut registry = Registry::default();
        let inner = MemoryStorage::default();
        let storage = Storage::new(inner, &mut registry);

        // Allocate a segment
        let mut segment = storage.allocate(0, 64).unwrap();
        assert_eq!(storage.metrics().open.get(), 1);

        // Write data to the segment
        segment.write_at(b"hello world", 0).unwrap();
        assert_eq!(storage.metrics().writes.get(), 1);
        assert_eq!(storage.metrics().write_bytes.get(), 11);

        // A failed write is not counted
        assert!(segment.write_at(b"hello world", 60).is_err());
        assert_eq!(storage.metrics().writes.get(), 1);

        // Read data from the segment
        let mut buffer = vec![0; 11];
        segment.read_at(&mut buffer, 0).unwrap();
        assert_eq!(storage.metrics().reads.get(), 1);
        assert_eq!(storage.metrics().read_bytes.get(), 11);

        // Close the segment
        segment.close().unwrap();
        assert_eq!(storage.metrics().open.get(), 0);

        // Metrics are exported under the segment prefix
        let mut buffer = String::new();
        encode(&mut buffer, &registry).unwrap();
        assert!(buffer.contains("segment_open 0\n"));
        assert!(buffer.contains("segment_writes_total 1\n"));
        assert!(buffer.contains("segment_read_bytes_total 11\n"));
    }

    /// Test that the open segment count tracks segments released without `close`.
    #[test_traced]
    fn test_metered_segment_dropped() {
        let mut registry = Registry::default();
        let storage = Storage::new(MemoryStorage::default(), &mut registry);

        let first = storage.allocate(0, 8).unwrap();
        let second = storage.allocate(1, 8).unwrap();
        assert_eq!(storage.metrics().open.get(), 2);

        first.close().unwrap();
        assert_eq!(storage.metrics().open.get(), 1);
        drop(second);
        assert_eq!(storage.metrics().open.get(), 0);
    }
}
