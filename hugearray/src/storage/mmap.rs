//! Memory-mapped file [Storage](super::Storage).
//!
//! Each [Segment] is a shared, writable mapping of one region of a file held (via [Arc]) by every
//! [Storage] derived from it. Dropping or closing a segment unmaps its region but never truncates
//! or closes the file, so several owners can map disjoint regions of the same file (see
//! [Storage::with_base]).

use super::{range, Error};
use memmap2::{MmapMut, MmapOptions};
use std::{
    fs::{File, OpenOptions},
    path::Path,
    sync::Arc,
};
use tracing::debug;

/// Memory-mapped storage over a single file.
#[derive(Clone)]
pub struct Storage {
    file: Arc<File>,
    base: u64,
}

impl Storage {
    /// Open (creating if it does not exist) the file at `path` for read and write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        Ok(Self::new(Arc::new(file)))
    }

    /// Map segments of an already opened `file`, starting at byte 0.
    pub fn new(file: Arc<File>) -> Self {
        Self { file, base: 0 }
    }

    /// Returns a [Storage] over the same file that places segment 0 at byte `base`.
    ///
    /// Callers are responsible for keeping the regions used by different bases disjoint.
    pub fn with_base(&self, base: u64) -> Self {
        Self {
            file: self.file.clone(),
            base,
        }
    }

    /// The file backing this storage.
    pub fn file(&self) -> &Arc<File> {
        &self.file
    }
}

impl super::Storage for Storage {
    type Segment = Segment;

    fn allocate(&self, index: u64, size: u64) -> Result<Segment, Error> {
        if size == 0 {
            return Err(Error::InvalidSize(size));
        }
        let len: usize = size.try_into().map_err(|_| Error::InvalidSize(size))?;
        let offset = index
            .checked_mul(size)
            .and_then(|offset| offset.checked_add(self.base))
            .ok_or(Error::OffsetOverflow)?;
        let end = offset.checked_add(size).ok_or(Error::OffsetOverflow)?;

        // Extend the file so that the whole region is backed (new bytes read as zero)
        if self.file.metadata()?.len() < end {
            self.file.set_len(end)?;
        }

        // SAFETY: the mapped region lies within the file (extended above) and is only accessed
        // through this segment. Concurrent modification of the file by other processes is not
        // supported.
        let map = unsafe {
            MmapOptions::new()
                .offset(offset)
                .len(len)
                .map_mut(self.file.as_ref())?
        };
        debug!(segment = index, offset, size, "mapped segment");
        Ok(Segment { index, size, map })
    }
}

/// A mapped region of a [Storage] file.
pub struct Segment {
    index: u64,
    size: u64,
    map: MmapMut,
}

impl super::Segment for Segment {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), Error> {
        let (start, end) = range(offset, buf.len(), self.size)?;
        buf.copy_from_slice(&self.map[start..end]);
        Ok(())
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<(), Error> {
        let (start, end) = range(offset, buf.len(), self.size)?;
        self.map[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), Error> {
        self.map.flush()?;
        Ok(())
    }

    fn close(mut self) -> Result<(), Error> {
        self.sync()?;
        debug!(segment = self.index, "unmapped segment");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{tests::run_storage_tests, Segment as _, Storage as _};
    use commonware_macros::test_traced;
    use std::io::Read;

    #[test_traced]
    fn test_mmap_storage() {
        let file = tempfile::tempfile().unwrap();
        run_storage_tests(Storage::new(Arc::new(file)));
    }

    #[test_traced]
    fn test_mmap_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segments");
        let storage = Storage::open(&path).unwrap();

        // Segment 2 of size 4 starts at byte 8
        let mut segment = storage.allocate(2, 4).unwrap();
        segment.write_at(&[1, 2, 3, 4], 0).unwrap();
        segment.close().unwrap();

        let mut contents = Vec::new();
        File::open(&path)
            .unwrap()
            .read_to_end(&mut contents)
            .unwrap();
        assert_eq!(contents, vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test_traced]
    fn test_mmap_shared_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared");
        let first = Storage::open(&path).unwrap();
        let second = first.with_base(1024);
        assert!(Arc::ptr_eq(first.file(), second.file()));

        let mut a = first.allocate(0, 16).unwrap();
        let mut b = second.allocate(0, 16).unwrap();
        a.write_at(&[1u8; 16], 0).unwrap();
        b.write_at(&[2u8; 16], 0).unwrap();

        // Closing one owner's segment leaves the other usable
        a.close().unwrap();
        let mut buf = [0u8; 16];
        b.read_at(&mut buf, 0).unwrap();
        assert_eq!(buf, [2u8; 16]);
        b.close().unwrap();
        drop(first);

        // Both regions were persisted
        let reopened = Storage::open(&path).unwrap();
        let a = reopened.allocate(0, 16).unwrap();
        a.read_at(&mut buf, 0).unwrap();
        assert_eq!(buf, [1u8; 16]);
        let b = reopened.with_base(1024).allocate(0, 16).unwrap();
        b.read_at(&mut buf, 0).unwrap();
        assert_eq!(buf, [2u8; 16]);
    }

    #[test_traced]
    fn test_mmap_zero_size() {
        let storage = Storage::new(Arc::new(tempfile::tempfile().unwrap()));
        assert!(matches!(storage.allocate(0, 0), Err(Error::InvalidSize(0))));
    }
}
