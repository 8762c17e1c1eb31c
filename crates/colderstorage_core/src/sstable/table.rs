//! Reading SSTables.

use crate::error::{CoreError, CoreResult};
use crate::sstable::{CRC_SIZE, FLAG_TOMBSTONE, FLAG_VALUE, FOOTER_SIZE, SST_MAGIC};
use colderstorage_storage::StorageBackend;

/// Decoded entries of one block.
pub(crate) type BlockEntries = Vec<(Vec<u8>, Option<Vec<u8>>)>;

/// Index entry describing one data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMeta {
    /// Offset of the block in the file.
    pub offset: u64,
    /// Length of the block, without its checksum.
    pub len: u64,
    /// Smallest key in the block.
    pub first_key: Vec<u8>,
    /// Largest key in the block.
    pub last_key: Vec<u8>,
}

impl BlockMeta {
    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.len.to_le_bytes());
        // Keys were length-checked when the block was built.
        buf.extend_from_slice(&(self.first_key.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.first_key);
        buf.extend_from_slice(&(self.last_key.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.last_key);
    }
}

/// An open, immutable SSTable.
pub struct SsTable {
    id: u64,
    backend: Box<dyn StorageBackend>,
    metas: Vec<BlockMeta>,
    size: u64,
}

impl std::fmt::Debug for SsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsTable")
            .field("id", &self.id)
            .field("blocks", &self.metas.len())
            .field("size", &self.size)
            .finish()
    }
}

impl SsTable {
    /// Opens a table by reading its footer and block index.
    ///
    /// # Errors
    ///
    /// Fails with `SstCorruption` or `ChecksumMismatch` if the footer or
    /// index are damaged.
    pub fn open(id: u64, backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        let size = backend.size()?;
        if size < (FOOTER_SIZE + CRC_SIZE + 4) as u64 {
            return Err(CoreError::sst_corruption(format!(
                "table {id} is too short ({size} bytes)"
            )));
        }

        let footer = backend.read_at(size - FOOTER_SIZE as u64, FOOTER_SIZE)?;
        if footer[8..12] != SST_MAGIC {
            return Err(CoreError::sst_corruption(format!("table {id} has bad magic")));
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&footer[0..8]);
        let index_offset = u64::from_le_bytes(raw);
        let index_end = size - FOOTER_SIZE as u64;
        if index_offset + CRC_SIZE as u64 > index_end {
            return Err(CoreError::sst_corruption(format!(
                "table {id} index offset {index_offset} out of range"
            )));
        }

        let index_len = (index_end - index_offset) as usize;
        let index = backend.read_at(index_offset, index_len)?;
        let (body, crc) = index.split_at(index_len - CRC_SIZE);
        verify_crc(body, crc)?;
        let metas = decode_index(body, index_offset)
            .ok_or_else(|| CoreError::sst_corruption(format!("table {id} has a malformed index")))?;

        Ok(Self {
            id,
            backend,
            metas,
            size,
        })
    }

    /// Id of this table.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// File size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of data blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.metas.len()
    }

    /// Smallest key in the table.
    #[must_use]
    pub fn first_key(&self) -> Option<&[u8]> {
        self.metas.first().map(|m| m.first_key.as_slice())
    }

    /// Largest key in the table.
    #[must_use]
    pub fn last_key(&self) -> Option<&[u8]> {
        self.metas.last().map(|m| m.last_key.as_slice())
    }

    /// Index of the first block whose last key is `>= key`.
    ///
    /// Equals `block_count()` when every key in the table is smaller.
    #[must_use]
    pub fn find_block(&self, key: &[u8]) -> usize {
        self.metas
            .partition_point(|meta| meta.last_key.as_slice() < key)
    }

    /// Reads and decodes block `idx`.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, a checksum mismatch or a malformed block.
    pub(crate) fn read_block(&self, idx: usize) -> CoreResult<BlockEntries> {
        let meta = &self.metas[idx];
        let len = usize::try_from(meta.len)
            .map_err(|_| CoreError::sst_corruption("block length overflows memory"))?;
        let raw = self.backend.read_at(meta.offset, len + CRC_SIZE)?;
        let (block, crc) = raw.split_at(len);
        verify_crc(block, crc)?;
        decode_block(block).ok_or_else(|| {
            CoreError::sst_corruption(format!("table {} block {idx} is malformed", self.id))
        })
    }

    /// Looks up `key`.
    ///
    /// `None` means the table has no entry for the key; `Some(None)` is a
    /// tombstone.
    ///
    /// # Errors
    ///
    /// Fails if the candidate block cannot be read.
    pub fn get(&self, key: &[u8]) -> CoreResult<Option<Option<Vec<u8>>>> {
        let idx = self.find_block(key);
        if idx >= self.metas.len() || self.metas[idx].first_key.as_slice() > key {
            return Ok(None);
        }
        let entries = self.read_block(idx)?;
        Ok(entries
            .binary_search_by(|(k, _)| k.as_slice().cmp(key))
            .ok()
            .map(|pos| entries[pos].1.clone()))
    }
}

fn verify_crc(data: &[u8], crc: &[u8]) -> CoreResult<()> {
    let expected = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
    let actual = crc32fast::hash(data);
    if expected != actual {
        return Err(CoreError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        let slice = self.data.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Option<u32> {
        self.take(4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Option<u64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Some(u64::from_le_bytes(raw))
    }

    fn done(&self) -> bool {
        self.pos == self.data.len()
    }
}

fn decode_index(data: &[u8], data_end: u64) -> Option<Vec<BlockMeta>> {
    let mut r = Reader { data, pos: 0 };
    let count = r.u32()? as usize;
    let mut metas = Vec::with_capacity(count.min(data.len() / 20));
    for _ in 0..count {
        let offset = r.u64()?;
        let len = r.u64()?;
        let first_len = usize::from(r.u16()?);
        let first_key = r.take(first_len)?.to_vec();
        let last_len = usize::from(r.u16()?);
        let last_key = r.take(last_len)?.to_vec();
        if offset.checked_add(len)?.checked_add(CRC_SIZE as u64)? > data_end {
            return None;
        }
        metas.push(BlockMeta {
            offset,
            len,
            first_key,
            last_key,
        });
    }
    r.done().then_some(metas)
}

fn decode_block(data: &[u8]) -> Option<BlockEntries> {
    let mut r = Reader { data, pos: 0 };
    let mut entries = Vec::new();
    while !r.done() {
        let flag = r.take(1)?[0];
        let key_len = usize::from(r.u16()?);
        let key = r.take(key_len)?.to_vec();
        let value_len = r.u32()? as usize;
        let value = r.take(value_len)?;
        let value = match flag {
            FLAG_VALUE => Some(value.to_vec()),
            FLAG_TOMBSTONE => None,
            _ => return None,
        };
        entries.push((key, value));
    }
    Some(entries)
}
