//! Statement language: a small SQL subset over the catalog.
//!
//! ```text
//! CREATE TABLE [IF NOT EXISTS] t (col TYPE, ...)
//! DROP TABLE [IF EXISTS] t
//! INSERT INTO t [(col, ...)] VALUES (lit, ...)[, (lit, ...)]
//! SELECT * | col, ... FROM t [WHERE expr] [LIMIT n]
//! UPDATE t SET col = lit[, ...] [WHERE expr]
//! DELETE FROM t [WHERE expr]
//! ```
//!
//! Keywords are case-insensitive and a trailing `;` is optional.

mod ast;
mod error;
mod executor;
mod lexer;
mod parser;

pub use ast::{CompareOp, Expr, Projection, Statement};
pub use error::{SqlError, SqlResult};
pub(crate) use executor::execute;
pub use parser::parse;
