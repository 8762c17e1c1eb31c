//! # ColderStorage Core
//!
//! Embedded storage engine and tabular execution layer for ColderStorage.
//!
//! This crate provides:
//! - A log-structured merge tree: WAL, memtables, SSTables, manifest
//! - A raw key-value API with inclusive range scans
//! - Tables defined and queried through a small statement language
//! - Cursors over scans and statement results
//! - A resource tracker that reports cursors left open at close
//!
//! ## Example
//!
//! ```rust,ignore
//! use colderstorage_core::Database;
//! use std::path::Path;
//!
//! let mut db = Database::open(Path::new("my_database"))?;
//! db.put(b"banana", b"yellow")?;
//!
//! for entry in db.scan(b"apple", b"cherry")? {
//!     let (key, value) = entry?;
//!     println!("{key:?} = {value:?}");
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod catalog;
mod config;
mod cursor;
mod database;
mod dir;
mod error;
mod iterator;
mod keyspace;
mod lsm;
mod manifest;
mod memtable;
mod sql;
mod sstable;
mod stats;
mod tracker;
mod wal;

pub use batch::{BatchOp, WriteBatch, MAX_KEY_LEN, MAX_VALUE_LEN};
pub use catalog::{Catalog, TableMeta};
pub use config::Config;
pub use cursor::{Cursor, CursorState, ResultCursor, RowSource, ScanCursor};
pub use database::{Database, DatabaseInfo};
pub use error::{CoreError, CoreResult};
pub use keyspace::Namespace;
pub use lsm::{LsmStore, StoreInfo};
pub use sql::{parse, CompareOp, Expr, Projection, SqlError, SqlResult, Statement};
pub use stats::{DatabaseStats, StatsSnapshot};
pub use tracker::{ResourceCount, ResourceGuard, ResourceKind, ResourceTracker};

pub use colderstorage_codec::{Column, ErrorKind, Row, Schema, Type, Value};
