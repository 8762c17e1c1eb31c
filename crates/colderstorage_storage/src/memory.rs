//! Backend over a `Vec<u8>`.

use crate::backend::{StorageBackend, SyncMode};
use crate::error::{StorageError, StorageResult};

/// A backend that keeps its bytes in memory.
///
/// Used by the engine's unit tests to exercise log and table formats
/// without touching the file system. It also counts durable syncs so tests
/// can check when the engine asks for durability.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    data: Vec<u8>,
    durable_syncs: u64,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding `data`, as if it had been appended earlier.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data,
            durable_syncs: 0,
        }
    }

    /// Borrow the stored bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the backend and returns its bytes.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Number of `Data` or `All` syncs requested so far.
    #[must_use]
    pub fn durable_syncs(&self) -> u64 {
        self.durable_syncs
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = self.data.len() as u64;
        let end = offset.saturating_add(len as u64);
        if end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        let start = offset as usize;
        Ok(self.data[start..start + len].to_vec())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(data);
        Ok(offset)
    }

    fn sync(&mut self, mode: SyncMode) -> StorageResult<()> {
        if mode != SyncMode::Flush {
            self.durable_syncs += 1;
        }
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_backend() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(backend.read_all().unwrap().is_empty());
    }

    #[test]
    fn offsets_are_cumulative() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"ab").unwrap(), 0);
        assert_eq!(backend.append(b"").unwrap(), 2);
        assert_eq!(backend.append(b"cde").unwrap(), 2);
        assert_eq!(backend.read_at(1, 3).unwrap(), b"bcd");
    }

    #[test]
    fn out_of_range_read() {
        let backend = InMemoryBackend::with_data(b"xyz".to_vec());
        assert!(backend.read_at(2, 2).is_err());
        assert!(backend.read_at(u64::MAX, 1).is_err());
    }

    #[test]
    fn only_durable_syncs_are_counted() {
        let mut backend = InMemoryBackend::new();
        backend.sync(SyncMode::Flush).unwrap();
        backend.sync(SyncMode::Data).unwrap();
        backend.sync(SyncMode::All).unwrap();
        assert_eq!(backend.durable_syncs(), 2);
    }

    proptest! {
        #[test]
        fn appended_chunks_read_back(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16)) {
            let mut backend = InMemoryBackend::new();
            let mut offsets = Vec::new();
            for chunk in &chunks {
                offsets.push(backend.append(chunk).unwrap());
            }
            for (chunk, offset) in chunks.iter().zip(offsets) {
                prop_assert_eq!(&backend.read_at(offset, chunk.len()).unwrap(), chunk);
            }
        }
    }
}
