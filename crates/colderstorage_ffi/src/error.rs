//! Errors raised at the C boundary.
//!
//! Every failed `cs_*` call leaves an error payload in the output buffer; see
//! [`crate::buffer`]. The payload carries an [`ErrorKind`] and the message of
//! the error below.

use colderstorage_codec::{CodecError, ErrorKind};
use colderstorage_core::CoreError;
use thiserror::Error;

/// Result type for FFI entry points.
pub type FfiResult<T> = Result<T, FfiError>;

/// Errors reported through the output buffer.
#[derive(Debug, Error)]
pub enum FfiError {
    /// An engine operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A payload could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// No database is open in this session.
    #[error("no database is open")]
    NoSession,

    /// `cs_open` was called while a database is open.
    #[error("a database is already open")]
    SessionOpen,

    /// There is no active result cursor.
    #[error("no active cursor")]
    NoCursor,

    /// A required pointer was null.
    #[error("null pointer argument: {0}")]
    NullPointer(&'static str),

    /// A string argument was not valid UTF-8.
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
}

impl FfiError {
    /// Wire category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(e) => e.kind(),
            Self::Codec(_) => ErrorKind::Protocol,
            Self::NoSession | Self::NoCursor => ErrorKind::Closed,
            Self::SessionOpen => ErrorKind::Locked,
            Self::NullPointer(_) | Self::InvalidUtf8(_) => ErrorKind::InvalidArgument,
        }
    }
}
