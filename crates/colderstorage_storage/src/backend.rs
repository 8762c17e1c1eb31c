//! The backend trait.

use crate::error::StorageResult;

/// How far [`StorageBackend::sync`] must push written data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Hand buffered bytes to the operating system.
    Flush,
    /// Force file contents to stable storage (`fdatasync`).
    Data,
    /// Force contents and metadata to stable storage (`fsync`).
    All,
}

/// An append-only byte store with random reads.
///
/// # Invariants
///
/// - `append` returns the offset at which the bytes start
/// - `read_at` returns exactly the bytes previously appended at that range
/// - after `sync(SyncMode::Data)` or stronger returns, appended bytes survive
///   a process crash
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::ReadPastEnd`] when the range is not
    /// fully inside the backend, or with an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors. A failed append leaves no bytes visible to
    /// `read_at`.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Makes appended data durable to the requested degree.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    fn sync(&mut self, mode: SyncMode) -> StorageResult<()>;

    /// Current size in bytes; the offset of the next append.
    ///
    /// # Errors
    ///
    /// Fails when the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Reads the whole backend.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        let len = usize::try_from(size).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "backend too large")
        })?;
        self.read_at(0, len)
    }
}
