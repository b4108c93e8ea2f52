//! In-memory [Storage](super::Storage), useful for testing.

use super::{range, Error};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, RwLock},
};

/// In-memory storage.
///
/// Clones share the same contents, so a segment allocated from one clone observes everything
/// written through segments allocated from any other.
#[derive(Clone, Default)]
pub struct Storage {
    segments: Arc<Mutex<BTreeMap<u64, Arc<RwLock<Vec<u8>>>>>>,
}

impl Storage {
    /// Returns a copy of the current contents of segment `index`, if it was ever allocated.
    pub fn contents(&self, index: u64) -> Option<Vec<u8>> {
        let segments = self.segments.lock().unwrap();
        segments
            .get(&index)
            .map(|content| content.read().unwrap().clone())
    }
}

impl super::Storage for Storage {
    type Segment = Segment;

    fn allocate(&self, index: u64, size: u64) -> Result<Segment, Error> {
        let len: usize = size.try_into().map_err(|_| Error::InvalidSize(size))?;
        let content = {
            let mut segments = self.segments.lock().unwrap();
            segments.entry(index).or_default().clone()
        };
        {
            let mut content = content.write().unwrap();
            if content.len() < len {
                content.resize(len, 0);
            }
        }
        Ok(Segment { size, content })
    }
}

/// A segment of [Storage].
pub struct Segment {
    size: u64,
    content: Arc<RwLock<Vec<u8>>>,
}

impl super::Segment for Segment {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<(), Error> {
        let (start, end) = range(offset, buf.len(), self.size)?;
        let content = self.content.read().unwrap();
        buf.copy_from_slice(&content[start..end]);
        Ok(())
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<(), Error> {
        let (start, end) = range(offset, buf.len(), self.size)?;
        let mut content = self.content.write().unwrap();
        content[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn close(self) -> Result<(), Error> {
        Ok(())
    }
}
