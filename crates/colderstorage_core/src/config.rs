//! Database configuration.

use crate::error::{CoreError, CoreResult};

/// Smallest accepted SSTable block size.
pub const MIN_BLOCK_SIZE: usize = 64;

/// Configuration for opening a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Whether to create the database directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Target size of an SSTable data block in bytes.
    pub block_size: usize,

    /// Memtable size at which it is frozen, and the size at which
    /// compaction splits its output tables.
    pub target_sst_size: usize,

    /// Number of frozen memtables kept in memory before the oldest is flushed.
    pub num_memtable_limit: usize,

    /// Whether writes go through a write-ahead log.
    pub enable_wal: bool,

    /// Whether each WAL append is synced to disk before returning.
    pub sync_on_write: bool,

    /// SSTable count that triggers a full compaction (0 = never).
    pub compaction_trigger: usize,

    /// Format version to use for new databases.
    pub format_version: (u16, u16),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            block_size: 4096,
            target_sst_size: 2 * 1024 * 1024, // 2 MB
            num_memtable_limit: 3,
            enable_wal: true,
            sync_on_write: true,
            compaction_trigger: 8,
            format_version: (1, 0),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the SSTable block size.
    #[must_use]
    pub const fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the memtable freeze / SSTable split size.
    #[must_use]
    pub const fn target_sst_size(mut self, size: usize) -> Self {
        self.target_sst_size = size;
        self
    }

    /// Sets how many frozen memtables may wait for a flush.
    #[must_use]
    pub const fn num_memtable_limit(mut self, limit: usize) -> Self {
        self.num_memtable_limit = limit;
        self
    }

    /// Enables or disables the write-ahead log.
    #[must_use]
    pub const fn enable_wal(mut self, value: bool) -> Self {
        self.enable_wal = value;
        self
    }

    /// Sets whether to sync the WAL on every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the SSTable count that triggers compaction.
    #[must_use]
    pub const fn compaction_trigger(mut self, count: usize) -> Self {
        self.compaction_trigger = count;
        self
    }

    /// Checks that the sizes are usable.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a block size below [`MIN_BLOCK_SIZE`]
    /// or a zero target SSTable size.
    pub fn validate(&self) -> CoreResult<()> {
        if self.block_size < MIN_BLOCK_SIZE {
            return Err(CoreError::invalid_argument(format!(
                "block_size must be at least {MIN_BLOCK_SIZE}, got {}",
                self.block_size
            )));
        }
        if self.target_sst_size == 0 {
            return Err(CoreError::invalid_argument("target_sst_size must be non-zero"));
        }
        Ok(())
    }
}
