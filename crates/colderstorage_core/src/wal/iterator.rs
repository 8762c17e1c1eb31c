//! Streaming WAL record iterator.

use crate::error::{CoreError, CoreResult};
use crate::wal::record::{CRC_SIZE, HEADER_SIZE};
use crate::wal::{WalRecord, WalRecordType, WAL_MAGIC, WAL_VERSION};
use colderstorage_storage::StorageBackend;

/// Reads WAL records one at a time, yielding `(offset, record)` pairs.
///
/// Memory use is bounded by the largest record. A truncated record at the
/// end of the log ends the iteration; corruption yields one error and then
/// ends it.
pub struct WalRecordIterator<'a> {
    backend: &'a dyn StorageBackend,
    total_size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> WalRecordIterator<'a> {
    /// Starts reading at the beginning of `backend`.
    ///
    /// # Errors
    ///
    /// Fails if the backend size cannot be determined.
    pub fn new(backend: &'a dyn StorageBackend) -> CoreResult<Self> {
        Ok(Self {
            backend,
            total_size: backend.size()?,
            offset: 0,
            finished: false,
        })
    }

    /// Offset just past the last record returned.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.offset
    }

    fn read_next(&mut self) -> CoreResult<Option<(u64, WalRecord)>> {
        let remaining = self.total_size - self.offset;
        if remaining < HEADER_SIZE as u64 {
            return Ok(None);
        }

        let header = self.backend.read_at(self.offset, HEADER_SIZE)?;
        if header[0..4] != WAL_MAGIC {
            return Err(CoreError::wal_corruption(format!(
                "invalid magic at offset {}",
                self.offset
            )));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > WAL_VERSION {
            return Err(CoreError::wal_corruption(format!(
                "unsupported record version {version} at offset {}",
                self.offset
            )));
        }
        let record_type = WalRecordType::from_byte(header[6]).ok_or_else(|| {
            CoreError::wal_corruption(format!(
                "unknown record type {} at offset {}",
                header[6], self.offset
            ))
        })?;
        let len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;

        let body_len = len + CRC_SIZE;
        if remaining - (HEADER_SIZE as u64) < body_len as u64 {
            return Ok(None);
        }
        let body = self
            .backend
            .read_at(self.offset + HEADER_SIZE as u64, body_len)?;
        let (payload, crc) = body.split_at(len);

        let expected = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header);
        hasher.update(payload);
        let actual = hasher.finalize();
        if expected != actual {
            return Err(CoreError::ChecksumMismatch { expected, actual });
        }

        let record = WalRecord::decode_payload(record_type, payload)?;
        let offset = self.offset;
        self.offset += (HEADER_SIZE + body_len) as u64;
        Ok(Some((offset, record)))
    }
}

impl Iterator for WalRecordIterator<'_> {
    type Item = CoreResult<(u64, WalRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
