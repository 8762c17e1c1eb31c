//! # ColderStorage Storage
//!
//! Byte-store backends for the ColderStorage engine.
//!
//! A backend is an append-only byte region with random reads. It knows
//! nothing about write-ahead logs, sorted tables or manifests; the engine in
//! `colderstorage_core` owns every on-disk format and only asks backends to
//! append, read back and make data durable.
//!
//! ## Backends
//!
//! - [`FileBackend`] - one OS file, used for WAL files and sorted tables
//! - [`InMemoryBackend`] - a `Vec<u8>`, used by tests and scratch stores
//!
//! ## Example
//!
//! ```rust
//! use colderstorage_storage::{InMemoryBackend, StorageBackend, SyncMode};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"block").unwrap();
//! backend.sync(SyncMode::Data).unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"block");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{StorageBackend, SyncMode};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
