//! Storage error types.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The operating system reported an I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read asked for bytes beyond the end of the backend.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: usize,
        /// Size of the backend at the time of the read.
        size: u64,
    },

    /// The backend was opened read-only and a write was attempted.
    #[error("storage is read-only: {0}")]
    ReadOnly(String),
}
