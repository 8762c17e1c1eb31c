//! Database manifest: format version, id allocator and live SSTables.

use crate::error::{CoreError, CoreResult};

/// Magic bytes for the manifest file.
pub const MANIFEST_MAGIC: [u8; 4] = *b"CMFN";

/// Current manifest layout version.
pub const MANIFEST_VERSION: u16 = 1;

/// Persistent description of which files make up the database.
///
/// Layout:
///
/// ```text
/// | magic (4) | version (2) | major (2) | minor (2) | next_id (8) |
/// | count (4) | sst_id (8) * count | crc32 (4) |
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Format version (major, minor).
    pub format_version: (u16, u16),
    /// Next id handed out to a memtable, WAL or SSTable.
    pub next_id: u64,
    /// Live SSTable ids, newest first.
    pub ssts: Vec<u64>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new((1, 0))
    }
}

impl Manifest {
    /// Creates a manifest for an empty database.
    #[must_use]
    pub fn new(format_version: (u16, u16)) -> Self {
        Self {
            format_version,
            next_id: 1,
            ssts: Vec::new(),
        }
    }

    /// Hands out a fresh file id.
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Makes sure ids found on disk are never handed out again.
    pub fn reserve_through(&mut self, id: u64) {
        if id >= self.next_id {
            self.next_id = id + 1;
        }
    }

    /// Encodes the manifest to bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(26 + self.ssts.len() * 8);
        buf.extend_from_slice(&MANIFEST_MAGIC);
        buf.extend_from_slice(&MANIFEST_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.format_version.0.to_le_bytes());
        buf.extend_from_slice(&self.format_version.1.to_le_bytes());
        buf.extend_from_slice(&self.next_id.to_le_bytes());
        let count = u32::try_from(self.ssts.len()).unwrap_or(u32::MAX);
        buf.extend_from_slice(&count.to_le_bytes());
        for id in self.ssts.iter().take(count as usize) {
            buf.extend_from_slice(&id.to_le_bytes());
        }
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes a manifest from bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` for a bad magic, an unknown layout version or
    /// a short file, and `ChecksumMismatch` if the trailer does not match.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < 26 || data[0..4] != MANIFEST_MAGIC {
            return Err(CoreError::invalid_format("invalid manifest header"));
        }
        let (body, trailer) = data.split_at(data.len() - 4);
        let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let actual = crc32fast::hash(body);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch { expected, actual });
        }

        let u16_at = |at: usize| u16::from_le_bytes([body[at], body[at + 1]]);
        let u64_at = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&body[at..at + 8]);
            u64::from_le_bytes(raw)
        };

        let version = u16_at(4);
        if version > MANIFEST_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported manifest version: {version}"
            )));
        }
        let format_version = (u16_at(6), u16_at(8));
        let next_id = u64_at(10);
        let count = u32::from_le_bytes([body[18], body[19], body[20], body[21]]) as usize;
        if body.len() != 22 + count * 8 {
            return Err(CoreError::invalid_format(format!(
                "manifest lists {count} tables but holds {} bytes",
                body.len()
            )));
        }
        let ssts = (0..count).map(|i| u64_at(22 + i * 8)).collect();

        Ok(Self {
            format_version,
            next_id,
            ssts,
        })
    }
}
