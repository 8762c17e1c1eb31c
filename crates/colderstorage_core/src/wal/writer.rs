//! WAL appends.

use crate::batch::WriteBatch;
use crate::error::CoreResult;
use crate::wal::{WalRecord, WalRecordIterator};
use colderstorage_storage::{StorageBackend, SyncMode};

/// The write-ahead log of one memtable.
pub struct Wal {
    backend: Box<dyn StorageBackend>,
    sync_on_write: bool,
}

impl Wal {
    /// Wraps a backend. With `sync_on_write`, every append is synced to
    /// stable storage before it returns; otherwise it is only flushed to the
    /// operating system.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_write: bool) -> Self {
        Self {
            backend,
            sync_on_write,
        }
    }

    /// Appends a record and returns its offset.
    ///
    /// # Errors
    ///
    /// Fails if the record cannot be encoded or written. The memtable must
    /// not be touched in that case.
    pub fn append(&mut self, record: &WalRecord) -> CoreResult<u64> {
        self.append_encoded(&record.encode()?)
    }

    /// Appends a batch record without cloning the batch.
    ///
    /// # Errors
    ///
    /// Same as [`Wal::append`].
    pub fn append_batch(&mut self, batch: &WriteBatch) -> CoreResult<u64> {
        self.append_encoded(&WalRecord::encode_batch(batch)?)
    }

    fn append_encoded(&mut self, data: &[u8]) -> CoreResult<u64> {
        let offset = self.backend.append(data)?;
        let mode = if self.sync_on_write {
            SyncMode::Data
        } else {
            SyncMode::Flush
        };
        self.backend.sync(mode)?;
        Ok(offset)
    }

    /// Forces everything appended so far to stable storage.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.sync(SyncMode::Data)?;
        Ok(())
    }

    /// Current size of the log in bytes.
    ///
    /// # Errors
    ///
    /// Fails if the backend cannot report its size.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Iterates over the records in the log.
    ///
    /// # Errors
    ///
    /// Fails if the backend cannot report its size.
    pub fn iter(&self) -> CoreResult<WalRecordIterator<'_>> {
        WalRecordIterator::new(self.backend.as_ref())
    }

    /// Reads every record in the log.
    ///
    /// # Errors
    ///
    /// Fails on corruption.
    pub fn read_all(&self) -> CoreResult<Vec<(u64, WalRecord)>> {
        self.iter()?.collect()
    }
}
