//! WAL record types and serialization.

use crate::batch::WriteBatch;
use crate::error::{CoreError, CoreResult};

/// Magic bytes opening every WAL record.
pub const WAL_MAGIC: [u8; 4] = *b"CWAL";

/// Current WAL record version.
pub const WAL_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4).
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;

/// Type byte of a WAL record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalRecordType {
    /// An atomic write batch.
    Batch = 1,
}

impl WalRecordType {
    /// Converts a byte to a record type.
    #[must_use]
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Batch),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A logged mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// A write batch, replayed all-or-nothing.
    Batch(WriteBatch),
}

impl WalRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> WalRecordType {
        match self {
            Self::Batch(_) => WalRecordType::Batch,
        }
    }

    /// Serializes the payload:
    /// `| count u32 | (op u8 | key_len u16 | key | [val_len u32 | val])* |`.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` if a key or value exceeds its length
    /// field.
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let Self::Batch(batch) = self;
        batch_payload(batch)
    }

    /// Deserializes a payload of the given type.
    ///
    /// # Errors
    ///
    /// Fails with `WalCorruption` on a malformed payload.
    pub fn decode_payload(record_type: WalRecordType, payload: &[u8]) -> CoreResult<Self> {
        let mut reader = PayloadReader { data: payload, pos: 0 };
        match record_type {
            WalRecordType::Batch => {
                let count = reader.u32()?;
                let mut batch = WriteBatch::new();
                for _ in 0..count {
                    let op = reader.take(1)?[0];
                    let key_len = usize::from(reader.u16()?);
                    let key = reader.take(key_len)?.to_vec();
                    match op {
                        OP_PUT => {
                            let val_len = reader.u32()? as usize;
                            batch.put(key, reader.take(val_len)?.to_vec());
                        }
                        OP_DELETE => batch.delete(key),
                        other => {
                            return Err(CoreError::wal_corruption(format!(
                                "unknown batch operation {other}"
                            )))
                        }
                    }
                }
                if reader.pos != payload.len() {
                    return Err(CoreError::wal_corruption(format!(
                        "trailing bytes in batch record: used {} of {}",
                        reader.pos,
                        payload.len()
                    )));
                }
                Ok(Self::Batch(batch))
            }
        }
    }

    /// Serializes the whole record, envelope and checksum included.
    ///
    /// # Errors
    ///
    /// Fails if the payload cannot be encoded or exceeds the length field.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        envelope(self.record_type(), &self.encode_payload()?)
    }

    /// Serializes a batch record without taking ownership of the batch.
    ///
    /// # Errors
    ///
    /// Same as [`WalRecord::encode`].
    pub fn encode_batch(batch: &WriteBatch) -> CoreResult<Vec<u8>> {
        envelope(WalRecordType::Batch, &batch_payload(batch)?)
    }
}

fn batch_payload(batch: &WriteBatch) -> CoreResult<Vec<u8>> {
    let count = u32::try_from(batch.len())
        .map_err(|_| CoreError::invalid_argument("too many operations in one batch"))?;

    let mut buf = Vec::with_capacity(4 + batch.byte_size() + batch.len() * 7);
    buf.extend_from_slice(&count.to_le_bytes());
    for op in batch {
        let key_len = u16::try_from(op.key.len())
            .map_err(|_| CoreError::invalid_argument("key too large for WAL record"))?;
        match &op.value {
            Some(value) => {
                let val_len = u32::try_from(value.len())
                    .map_err(|_| CoreError::invalid_argument("value too large for WAL record"))?;
                buf.push(OP_PUT);
                buf.extend_from_slice(&key_len.to_le_bytes());
                buf.extend_from_slice(&op.key);
                buf.extend_from_slice(&val_len.to_le_bytes());
                buf.extend_from_slice(value);
            }
            None => {
                buf.push(OP_DELETE);
                buf.extend_from_slice(&key_len.to_le_bytes());
                buf.extend_from_slice(&op.key);
            }
        }
    }
    Ok(buf)
}

fn envelope(record_type: WalRecordType, payload: &[u8]) -> CoreResult<Vec<u8>> {
    let len = u32::try_from(payload.len())
        .map_err(|_| CoreError::invalid_argument("WAL record payload too large"))?;

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&WAL_MAGIC);
    data.extend_from_slice(&WAL_VERSION.to_le_bytes());
    data.push(record_type.as_byte());
    data.extend_from_slice(&len.to_le_bytes());
    data.extend_from_slice(payload);
    let crc = crc32fast::hash(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    Ok(data)
}

struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| CoreError::wal_corruption("unexpected end of payload"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> CoreResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}
