//! Statement errors.

use thiserror::Error;

/// Result type for statement parsing and planning.
pub type SqlResult<T> = Result<T, SqlError>;

/// Reasons a statement is rejected. A rejected statement has no effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlError {
    /// The statement text is malformed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The named table does not exist.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// A table with this name already exists.
    #[error("table already exists: {0}")]
    TableExists(String),

    /// The table has no such column.
    #[error("column not found: {table}.{column}")]
    ColumnNotFound {
        /// Table name.
        table: String,
        /// Missing column.
        column: String,
    },

    /// A column is declared or listed twice.
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    /// A value does not fit its column, or two values cannot be compared.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A row has the wrong number of values.
    #[error("expected {expected} values, found {found}")]
    ArityMismatch {
        /// Values required.
        expected: usize,
        /// Values supplied.
        found: usize,
    },

    /// The statement is valid SQL but outside the supported subset.
    #[error("unsupported statement: {0}")]
    Unsupported(String),
}

impl SqlError {
    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch(message.into())
    }
}
