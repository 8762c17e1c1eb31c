//! Lazy iteration over an SSTable.

use crate::error::CoreResult;
use crate::iterator::KvIterator;
use crate::sstable::table::BlockEntries;
use crate::sstable::SsTable;
use std::sync::Arc;

/// Walks an SSTable in key order, loading one block at a time.
pub struct SsTableIterator {
    table: Arc<SsTable>,
    block_idx: usize,
    entries: BlockEntries,
    pos: usize,
}

impl SsTableIterator {
    /// Positions on the first entry with key `>= lower`.
    ///
    /// # Errors
    ///
    /// Fails if the first candidate block cannot be read.
    pub fn seek(table: Arc<SsTable>, lower: &[u8]) -> CoreResult<Self> {
        let block_idx = table.find_block(lower);
        let mut it = Self {
            table,
            block_idx,
            entries: Vec::new(),
            pos: 0,
        };
        it.load_block()?;
        it.pos = it.entries.partition_point(|(k, _)| k.as_slice() < lower);
        it.skip_exhausted_blocks()?;
        Ok(it)
    }

    /// Positions on the first entry of the table.
    ///
    /// # Errors
    ///
    /// Fails if the first block cannot be read.
    pub fn first(table: Arc<SsTable>) -> CoreResult<Self> {
        Self::seek(table, &[])
    }

    fn load_block(&mut self) -> CoreResult<()> {
        self.entries = if self.block_idx < self.table.block_count() {
            self.table.read_block(self.block_idx)?
        } else {
            Vec::new()
        };
        self.pos = 0;
        Ok(())
    }

    fn skip_exhausted_blocks(&mut self) -> CoreResult<()> {
        while self.pos >= self.entries.len() && self.block_idx < self.table.block_count() {
            self.block_idx += 1;
            self.load_block()?;
        }
        Ok(())
    }
}

impl KvIterator for SsTableIterator {
    fn is_valid(&self) -> bool {
        self.pos < self.entries.len()
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.pos].0
    }

    fn value(&self) -> Option<&[u8]> {
        self.entries[self.pos].1.as_deref()
    }

    fn next(&mut self) -> CoreResult<()> {
        if !self.is_valid() {
            return Ok(());
        }
        self.pos += 1;
        self.skip_exhausted_blocks()
    }
}
