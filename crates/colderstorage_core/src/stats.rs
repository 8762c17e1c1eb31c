//! Database statistics.
//!
//! ```rust,ignore
//! let snapshot = db.stats();
//! println!("reads: {} writes: {}", snapshot.reads, snapshot.writes);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters shared by the store and the facade.
///
/// Counters only grow and are read without synchronization, so a snapshot
/// taken during an operation may be slightly stale.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    scans: AtomicU64,
    statements: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    flushes: AtomicU64,
    compactions: AtomicU64,
    errors: AtomicU64,
}

impl DatabaseStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self, bytes: u64) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, bytes: u64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_statement(&self) {
        self.statements.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Total number of flushed memtables.
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Total number of completed compactions.
    pub fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }

    /// Copies every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            reads: load(&self.reads),
            writes: load(&self.writes),
            deletes: load(&self.deletes),
            scans: load(&self.scans),
            statements: load(&self.statements),
            bytes_read: load(&self.bytes_read),
            bytes_written: load(&self.bytes_written),
            flushes: load(&self.flushes),
            compactions: load(&self.compactions),
            errors: load(&self.errors),
        }
    }
}

/// A point-in-time copy of [`DatabaseStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Point lookups.
    pub reads: u64,
    /// Raw puts.
    pub writes: u64,
    /// Raw deletes.
    pub deletes: u64,
    /// Raw range scans opened.
    pub scans: u64,
    /// Statements executed, successful or not.
    pub statements: u64,
    /// Value bytes returned by lookups.
    pub bytes_read: u64,
    /// Key and value bytes written by puts.
    pub bytes_written: u64,
    /// Memtables flushed to SSTables.
    pub flushes: u64,
    /// Full compactions.
    pub compactions: u64,
    /// Failed operations.
    pub errors: u64,
}
