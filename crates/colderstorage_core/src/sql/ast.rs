//! Parsed statements.

use colderstorage_codec::{Column, Value};

/// One parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `CREATE TABLE`.
    CreateTable {
        /// Table name as written.
        name: String,
        /// Column definitions.
        columns: Vec<Column>,
        /// `IF NOT EXISTS` was given.
        if_not_exists: bool,
    },
    /// `DROP TABLE`.
    DropTable {
        /// Table name.
        name: String,
        /// `IF EXISTS` was given.
        if_exists: bool,
    },
    /// `INSERT INTO`.
    Insert {
        /// Target table.
        table: String,
        /// Explicit column list, if any.
        columns: Option<Vec<String>>,
        /// Literal rows.
        rows: Vec<Vec<Value>>,
    },
    /// `SELECT`.
    Select {
        /// Source table.
        table: String,
        /// Output columns.
        projection: Projection,
        /// Row filter.
        filter: Option<Expr>,
        /// Maximum number of rows.
        limit: Option<u64>,
    },
    /// `UPDATE`.
    Update {
        /// Target table.
        table: String,
        /// `column = literal` pairs.
        assignments: Vec<(String, Value)>,
        /// Row filter.
        filter: Option<Expr>,
    },
    /// `DELETE FROM`.
    Delete {
        /// Target table.
        table: String,
        /// Row filter.
        filter: Option<Expr>,
    },
}

/// Output columns of a `SELECT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// `*`
    All,
    /// An explicit column list.
    Columns(Vec<String>),
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=` or `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// A `WHERE` condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `column op literal`.
    Compare {
        /// Column name.
        column: String,
        /// Operator.
        op: CompareOp,
        /// Right-hand literal.
        value: Value,
    },
    /// `column IS [NOT] NULL`.
    IsNull {
        /// Column name.
        column: String,
        /// `IS NOT NULL`.
        negated: bool,
    },
    /// Both sides hold.
    And(Box<Expr>, Box<Expr>),
    /// Either side holds.
    Or(Box<Expr>, Box<Expr>),
    /// The inner condition does not hold.
    Not(Box<Expr>),
}
