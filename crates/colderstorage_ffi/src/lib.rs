//! # ColderStorage FFI
//!
//! Stable C ABI for ColderStorage bindings.
//!
//! This crate provides:
//! - C-compatible `cs_*` function exports over one process-wide session
//! - A shared output buffer carrying array, schema and error payloads
//! - Opaque scan iterator handles
//!
//! ## Conventions
//!
//! Fallible calls return `bool`. On `false` the output buffer holds an
//! error payload; read it with `cs_get_buffer` and `cs_get_buffer_len`
//! before the next call. `cs_fetch` is the exception: it also returns
//! `false` with an empty array payload once its rows run out. Memory passed in stays owned by the caller;
//! iterators are owned by Rust and released with `cs_iterator_deinit`.

mod buffer;
mod database;
mod error;
mod iterator;
mod session;
mod statement;
mod types;

pub use buffer::{cs_get_buffer, cs_get_buffer_len, OutputBuffer};
pub use database::{
    cs_close, cs_detect_leaks, cs_get, cs_open, cs_put, cs_remove, cs_set_options, cs_version,
};
pub use error::{FfiError, FfiResult};
pub use iterator::{
    cs_iterator_deinit, cs_iterator_is_valid, cs_iterator_key, cs_iterator_next, cs_iterator_val,
    cs_scan,
};
pub use statement::{
    cs_close_cursor, cs_cursor_write_schema, cs_display_table, cs_execute, cs_fetch,
    cs_list_tables,
};
pub use types::{CsGetStatus, CsIterator};
