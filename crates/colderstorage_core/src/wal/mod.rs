//! Write-ahead logs.
//!
//! Every memtable has its own log file, `<id>.wal`. Each write batch is
//! appended as one record before the memtable changes, so recovery can
//! rebuild the memtable by replaying the file.
//!
//! ## Record Format
//!
//! ```text
//! | magic "CWAL" (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! The checksum covers the header and the payload.
//!
//! ## Recovery Policy
//!
//! A record cut short at the end of the file (short header, or fewer bytes
//! than its length announces) is a write interrupted by a crash. It was
//! never acknowledged, so the iterator treats it as a clean end of log.
//!
//! A complete record with a bad checksum, a bad magic, an unknown type or
//! a newer version is corruption and fails recovery.

mod iterator;
mod record;
mod writer;

pub use iterator::WalRecordIterator;
pub use record::{WalRecord, WalRecordType, WAL_MAGIC, WAL_VERSION};
pub use writer::Wal;
