//! SSTable construction.

use crate::error::{CoreError, CoreResult};
use crate::sstable::table::BlockMeta;
use crate::sstable::{SsTable, FLAG_TOMBSTONE, FLAG_VALUE, SST_MAGIC};
use colderstorage_storage::{FileBackend, StorageBackend, SyncMode};
use std::path::Path;

/// Accumulates sorted entries and writes them out as an SSTable.
pub struct SsTableBuilder {
    block_size: usize,
    block: Vec<u8>,
    first_key: Vec<u8>,
    last_key: Vec<u8>,
    data: Vec<u8>,
    metas: Vec<BlockMeta>,
}

impl SsTableBuilder {
    /// Creates a builder that cuts blocks at about `block_size` bytes.
    #[must_use]
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            block: Vec::with_capacity(block_size),
            first_key: Vec::new(),
            last_key: Vec::new(),
            data: Vec::new(),
            metas: Vec::new(),
        }
    }

    /// Adds an entry. Keys must arrive in strictly ascending order.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` if the key does not fit a `u16` length
    /// or the value does not fit a `u32` length.
    pub fn add(&mut self, key: &[u8], value: Option<&[u8]>) -> CoreResult<()> {
        let key_len = u16::try_from(key.len())
            .map_err(|_| CoreError::invalid_argument("key too large for SSTable"))?;
        let flag = if value.is_some() {
            FLAG_VALUE
        } else {
            FLAG_TOMBSTONE
        };
        let value = value.unwrap_or_default();
        let value_len = u32::try_from(value.len())
            .map_err(|_| CoreError::invalid_argument("value too large for SSTable"))?;
        debug_assert!(self.is_empty() || key > self.last_key.as_slice());

        let entry_len = 7 + key.len() + value.len();
        if !self.block.is_empty() && self.block.len() + entry_len > self.block_size {
            self.finish_block();
        }
        if self.block.is_empty() {
            self.first_key = key.to_vec();
        }

        self.block.push(flag);
        self.block.extend_from_slice(&key_len.to_le_bytes());
        self.block.extend_from_slice(key);
        self.block.extend_from_slice(&value_len.to_le_bytes());
        self.block.extend_from_slice(value);
        self.last_key = key.to_vec();
        Ok(())
    }

    /// Whether no entry has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metas.is_empty() && self.block.is_empty()
    }

    /// Bytes of block data produced so far.
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        self.data.len() + self.block.len()
    }

    fn finish_block(&mut self) {
        if self.block.is_empty() {
            return;
        }
        let crc = crc32fast::hash(&self.block);
        self.metas.push(BlockMeta {
            offset: self.data.len() as u64,
            len: self.block.len() as u64,
            first_key: std::mem::take(&mut self.first_key),
            last_key: self.last_key.clone(),
        });
        self.data.append(&mut self.block);
        self.data.extend_from_slice(&crc.to_le_bytes());
    }

    /// Writes the table into `backend` and returns the file image size.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn write_to(mut self, backend: &mut dyn StorageBackend) -> CoreResult<u64> {
        self.finish_block();

        let index_offset = self.data.len() as u64;
        let index_start = self.data.len();
        let count = self.metas.len() as u32;
        self.data.extend_from_slice(&count.to_le_bytes());
        for meta in &self.metas {
            meta.encode_into(&mut self.data);
        }
        let crc = crc32fast::hash(&self.data[index_start..]);
        self.data.extend_from_slice(&crc.to_le_bytes());
        self.data.extend_from_slice(&index_offset.to_le_bytes());
        self.data.extend_from_slice(&SST_MAGIC);

        backend.append(&self.data)?;
        backend.sync(SyncMode::All)?;
        Ok(self.data.len() as u64)
    }

    /// Writes the table to a new file at `path` and opens it for reading.
    ///
    /// # Errors
    ///
    /// Fails if the file already exists or on I/O errors.
    pub fn build(self, id: u64, path: &Path) -> CoreResult<SsTable> {
        let mut backend = FileBackend::create_new(path)?;
        self.write_to(&mut backend)?;
        drop(backend);
        SsTable::open(id, Box::new(FileBackend::open_read_only(path)?))
    }
}
