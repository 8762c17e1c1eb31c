//! Codec errors and the wire error kinds.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The input ended before a complete item was read.
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes the decoder needed.
        needed: usize,
        /// Bytes left in the input.
        remaining: usize,
    },

    /// A payload started with an unknown marker byte.
    #[error("unknown payload marker 0x{0:02x}")]
    UnknownMarker(u8),

    /// A value carried an unknown type tag.
    #[error("unknown type tag {0}")]
    UnknownTag(u8),

    /// An error payload carried an unknown kind code.
    #[error("unknown error kind {0}")]
    UnknownErrorKind(u8),

    /// Text was not valid UTF-8.
    #[error("invalid UTF-8 text")]
    InvalidUtf8,

    /// Bytes were left over after a complete payload.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),

    /// A length does not fit the 32-bit length prefix.
    #[error("{what} too large to encode: {len}")]
    TooLarge {
        /// What was being encoded.
        what: &'static str,
        /// Its length.
        len: usize,
    },

    /// A decoded array did not have the shape of a schema.
    #[error("invalid schema payload: {0}")]
    InvalidSchema(String),

    /// The payload was well formed but not the kind the caller expected.
    #[error("expected {expected} payload")]
    UnexpectedPayload {
        /// The payload kind the caller asked for.
        expected: &'static str,
    },
}

impl CodecError {
    /// Creates an [`CodecError::InvalidSchema`] error.
    pub fn invalid_schema(msg: impl Into<String>) -> Self {
        Self::InvalidSchema(msg.into())
    }
}

/// Error categories carried by error payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    /// File system or device failure.
    Io = 1,
    /// On-disk data failed validation.
    Corruption = 2,
    /// A statement was rejected or failed.
    Statement = 3,
    /// A payload could not be encoded or decoded.
    Protocol = 4,
    /// The database or cursor is closed.
    Closed = 5,
    /// The database directory is held by another instance.
    Locked = 6,
    /// A caller-supplied argument was rejected.
    InvalidArgument = 7,
}

impl ErrorKind {
    /// Wire code of this kind.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Looks up a kind by wire code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Io),
            2 => Some(Self::Corruption),
            3 => Some(Self::Statement),
            4 => Some(Self::Protocol),
            5 => Some(Self::Closed),
            6 => Some(Self::Locked),
            7 => Some(Self::InvalidArgument),
            _ => None,
        }
    }

    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Io => "io",
            Self::Corruption => "corruption",
            Self::Statement => "statement",
            Self::Protocol => "protocol",
            Self::Closed => "closed",
            Self::Locked => "locked",
            Self::InvalidArgument => "invalid_argument",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
