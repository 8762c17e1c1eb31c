//! Immutable sorted tables.
//!
//! An SSTable holds the contents of one flushed memtable, or one slice of
//! a compaction's output, in key order.
//!
//! ## File Format
//!
//! ```text
//! | block 0 | crc32 | block 1 | crc32 | ... | index | crc32 | index_offset (8) | "CSST" |
//! ```
//!
//! A block is a run of entries close to `block_size` bytes:
//!
//! ```text
//! | flag (1) | key_len (2) | key | value_len (4) | value |
//! ```
//!
//! where flag 1 marks a tombstone (with an empty value). The index lists,
//! for every block, its offset, length, first key and last key, so point
//! lookups read at most one block and range scans read blocks lazily.

mod builder;
mod iterator;
mod table;

pub use builder::SsTableBuilder;
pub use iterator::SsTableIterator;
pub use table::{BlockMeta, SsTable};

/// Magic bytes closing every SSTable.
pub const SST_MAGIC: [u8; 4] = *b"CSST";

/// index_offset (8) + magic (4).
pub(crate) const FOOTER_SIZE: usize = 12;

pub(crate) const CRC_SIZE: usize = 4;

pub(crate) const FLAG_VALUE: u8 = 0;
pub(crate) const FLAG_TOMBSTONE: u8 = 1;
