//! Statement and catalog FFI functions.
//!
//! Results travel through the output buffer: rows and table lists as array
//! payloads, schemas as schema payloads. At most one result cursor is active;
//! `cs_execute` closes the previous one.

use crate::error::{FfiError, FfiResult};
use crate::session;
use crate::types::c_str;
use colderstorage_core::{CoreError, SqlError, Value};
use std::ffi::c_char;

/// Executes one statement and makes its result the active cursor.
///
/// # Returns
///
/// `true` on success with an empty output buffer, `false` with an error
/// payload.
///
/// # Safety
///
/// `sql` must be a valid null-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn cs_execute(sql: *const c_char) -> bool {
    let mut session = session::lock();
    let result = (|| -> FfiResult<bool> {
        let sql = c_str(sql, "statement")?;
        session.db_mut()?.execute(sql)?;
        session.buffer.clear();
        Ok(true)
    })();
    session.finish(result)
}

/// Fetches the next row of the active cursor.
///
/// # Returns
///
/// `true` with a one-row array payload. `false` with an empty array payload
/// once the rows are exhausted, which also closes the cursor, or with an
/// error payload on failure.
///
/// Unlike the other calls, `false` alone does not mean failure: check the
/// first byte of the buffer. `b'A'` marks exhaustion, `b'E'` an error.
#[no_mangle]
pub extern "C" fn cs_fetch() -> bool {
    let mut session = session::lock();
    let result = (|| -> FfiResult<bool> {
        let row = session.db_mut()?.fetch()?;
        match row {
            Some(row) => {
                session.buffer.write_array(&[row])?;
                Ok(true)
            }
            None => {
                session.buffer.write_array(&[])?;
                Ok(false)
            }
        }
    })();
    session.finish(result)
}

/// Closes the active cursor, if any.
#[no_mangle]
pub extern "C" fn cs_close_cursor() {
    if let Ok(db) = session::lock().db_mut() {
        db.close_cursor();
    }
}

/// Writes the schema of the active cursor.
///
/// # Returns
///
/// `true` with a schema payload, `false` with an error payload when no
/// cursor is active.
#[no_mangle]
pub extern "C" fn cs_cursor_write_schema() -> bool {
    let mut session = session::lock();
    let result = (|| -> FfiResult<bool> {
        let schema = session
            .db()?
            .cursor_schema()
            .cloned()
            .ok_or(FfiError::NoCursor)?;
        session.buffer.write_schema(&schema)?;
        Ok(true)
    })();
    session.finish(result)
}

/// Writes the table names as an array of one-column rows.
#[no_mangle]
pub extern "C" fn cs_list_tables() -> bool {
    let mut session = session::lock();
    let result = (|| -> FfiResult<bool> {
        let rows: Vec<_> = session
            .db()?
            .list_tables()
            .into_iter()
            .map(|name| vec![Value::Text(name)])
            .collect();
        session.buffer.write_array(&rows)?;
        Ok(true)
    })();
    session.finish(result)
}

/// Writes the schema of table `name`.
///
/// # Returns
///
/// `true` with a schema payload, `false` with an error payload when the
/// table does not exist.
///
/// # Safety
///
/// `name` must be a valid null-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn cs_display_table(name: *const c_char) -> bool {
    let mut session = session::lock();
    let result = (|| -> FfiResult<bool> {
        let name = c_str(name, "table name")?;
        let schema = session.db()?.display_table(name).ok_or_else(|| {
            FfiError::Core(CoreError::Sql(SqlError::TableNotFound(name.to_string())))
        })?;
        session.buffer.write_schema(&schema)?;
        Ok(true)
    })();
    session.finish(result)
}
