//! Database FFI functions.

use crate::error::{FfiError, FfiResult};
use crate::session;
use crate::types::{byte_slice, c_str, copy_out, CsGetStatus};
use colderstorage_core::{Config, Database, ResourceKind};
use std::ffi::c_char;
use std::path::Path;

/// Sets the options used by the next `cs_open`.
///
/// Sizes are in bytes. Invalid values are reported by `cs_open`.
#[no_mangle]
pub extern "C" fn cs_set_options(
    block_size: u32,
    target_sst_size: u32,
    num_memtable_limit: u32,
    enable_wal: bool,
) {
    let mut session = session::lock();
    session.options = Config::new()
        .block_size(block_size as usize)
        .target_sst_size(target_sst_size as usize)
        .num_memtable_limit(num_memtable_limit as usize)
        .enable_wal(enable_wal);
}

/// Opens the database at `path`, creating it if needed.
///
/// # Returns
///
/// `true` on success. Fails if a database is already open in this session
/// or the directory is locked by another instance.
///
/// # Safety
///
/// `path` must be a valid null-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn cs_open(path: *const c_char) -> bool {
    let mut session = session::lock();
    let result = (|| -> FfiResult<bool> {
        let path = c_str(path, "path")?;
        if session.db().is_ok() {
            return Err(FfiError::SessionOpen);
        }
        let db = Database::open_with_config(Path::new(path), session.options.clone())?;
        let guard = db.tracker().acquire(ResourceKind::OutputBuffer);
        session.buffer.clear();
        session.buffer.attach(guard);
        session.db = Some(db);
        Ok(true)
    })();
    session.finish(result)
}

/// Closes the active cursor and the database.
///
/// Scan iterators still alive are reported by `cs_detect_leaks`.
///
/// # Returns
///
/// `true` on success, `false` if no database is open or buffered writes
/// could not be made durable.
#[no_mangle]
pub extern "C" fn cs_close() -> bool {
    let mut session = session::lock();
    let result = (|| -> FfiResult<bool> {
        session.db()?;
        session.buffer.detach();
        session.buffer.clear();
        session.db_mut()?.close()?;
        Ok(true)
    })();
    session.finish(result)
}

/// Inserts or replaces a key.
///
/// # Safety
///
/// `key` and `val` must be valid for `key_len` and `val_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn cs_put(
    key: *const u8,
    key_len: usize,
    val: *const u8,
    val_len: usize,
) -> bool {
    let mut session = session::lock();
    let result = (|| -> FfiResult<bool> {
        let key = byte_slice(key, key_len, "key")?;
        let val = byte_slice(val, val_len, "value")?;
        session.db()?.put(key, val)?;
        Ok(true)
    })();
    session.finish(result)
}

/// Looks up a key and copies its value into `out`.
///
/// `out_len` receives the value length when the status is `Found` or
/// `BufferTooSmall`.
///
/// # Safety
///
/// - `key` must be valid for `key_len` bytes
/// - `out` must be valid for writes of `out_cap` bytes
/// - `out_len` must be null or a valid pointer
#[no_mangle]
pub unsafe extern "C" fn cs_get(
    key: *const u8,
    key_len: usize,
    out: *mut u8,
    out_cap: usize,
    out_len: *mut usize,
) -> CsGetStatus {
    let mut session = session::lock();
    let result = (|| -> FfiResult<Option<Vec<u8>>> {
        let key = byte_slice(key, key_len, "key")?;
        Ok(session.db()?.get(key)?)
    })();

    match result {
        Ok(Some(value)) => {
            if !out_len.is_null() {
                *out_len = value.len();
            }
            if copy_out(&value, out, out_cap) {
                CsGetStatus::Found
            } else {
                CsGetStatus::BufferTooSmall
            }
        }
        Ok(None) => CsGetStatus::NotFound,
        Err(e) => {
            session.buffer.write_error(&e);
            CsGetStatus::Error
        }
    }
}

/// Deletes a key. Deleting an absent key succeeds.
///
/// # Safety
///
/// `key` must be valid for `key_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn cs_remove(key: *const u8, key_len: usize) -> bool {
    let mut session = session::lock();
    let result = (|| -> FfiResult<bool> {
        let key = byte_slice(key, key_len, "key")?;
        session.db()?.delete(key)?;
        Ok(true)
    })();
    session.finish(result)
}

/// Reports whether cursors or buffers of the current or last closed
/// database are still outstanding.
///
/// An open session holds its output buffer, so the answer is only
/// conclusive after `cs_close`.
#[no_mangle]
pub extern "C" fn cs_detect_leaks() -> bool {
    session::lock()
        .db
        .as_ref()
        .is_some_and(Database::detect_leaks)
}

/// Returns the library version as a null-terminated string.
///
/// The returned pointer is static and should not be freed.
#[no_mangle]
pub extern "C" fn cs_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr().cast()
}
