//! Error types for the ColderStorage core.

use crate::sql::SqlError;
use colderstorage_codec::ErrorKind;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the storage engine and the execution layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] colderstorage_storage::StorageError),

    /// Stored bytes could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] colderstorage_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A statement was rejected.
    #[error(transparent)]
    Sql(#[from] SqlError),

    /// A WAL file is corrupted.
    #[error("WAL corruption: {message}")]
    WalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// A sorted table is corrupted.
    #[error("SSTable corruption: {message}")]
    SstCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// Another instance holds the database directory.
    #[error("database locked: another instance has exclusive access")]
    DatabaseLocked,

    /// The database has been closed.
    #[error("database is closed")]
    DatabaseClosed,

    /// Invalid database format or version.
    #[error("invalid database format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// A caller-supplied argument was rejected.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a WAL corruption error.
    pub fn wal_corruption(message: impl Into<String>) -> Self {
        Self::WalCorruption {
            message: message.into(),
        }
    }

    /// Creates an SSTable corruption error.
    pub fn sst_corruption(message: impl Into<String>) -> Self {
        Self::SstCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// The wire category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(_) | Self::Io(_) => ErrorKind::Io,
            Self::Codec(_)
            | Self::WalCorruption { .. }
            | Self::SstCorruption { .. }
            | Self::ChecksumMismatch { .. }
            | Self::InvalidFormat { .. } => ErrorKind::Corruption,
            Self::Sql(_) => ErrorKind::Statement,
            Self::DatabaseLocked => ErrorKind::Locked,
            Self::DatabaseClosed => ErrorKind::Closed,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(CoreError::DatabaseLocked.kind(), ErrorKind::Locked);
        assert_eq!(CoreError::DatabaseClosed.kind(), ErrorKind::Closed);
        assert_eq!(
            CoreError::wal_corruption("bad magic").kind(),
            ErrorKind::Corruption
        );
        assert_eq!(
            CoreError::from(SqlError::TableNotFound("t".into())).kind(),
            ErrorKind::Statement
        );
        assert_eq!(
            CoreError::from(io::Error::new(io::ErrorKind::Other, "disk")).kind(),
            ErrorKind::Io
        );
    }

    #[test]
    fn sql_errors_display_transparently() {
        let err = CoreError::from(SqlError::TableNotFound("missing_table".into()));
        assert_eq!(err.to_string(), "table not found: missing_table");
    }
}
