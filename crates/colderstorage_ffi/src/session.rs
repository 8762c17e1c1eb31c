//! The process-wide session behind the `cs_*` calls.
//!
//! The C interface has no database handle: one session holds the open
//! database, the options for the next open and the output buffer. A closed
//! database stays in the session so its leak report can still be read.

use crate::buffer::OutputBuffer;
use crate::error::{FfiError, FfiResult};
use colderstorage_core::{Config, Database};
use parking_lot::{Mutex, MutexGuard};
use std::sync::LazyLock;

static SESSION: LazyLock<Mutex<Session>> = LazyLock::new(|| Mutex::new(Session::default()));

/// State shared by every `cs_*` call.
#[derive(Debug, Default)]
pub struct Session {
    /// The open database, or the last one closed.
    pub db: Option<Database>,
    /// Options applied by the next `cs_open`.
    pub options: Config,
    /// Payload of the last call.
    pub buffer: OutputBuffer,
}

impl Session {
    /// The open database.
    pub fn db(&self) -> FfiResult<&Database> {
        self.db
            .as_ref()
            .filter(|db| db.is_open())
            .ok_or(FfiError::NoSession)
    }

    /// The open database, mutably.
    pub fn db_mut(&mut self) -> FfiResult<&mut Database> {
        self.db
            .as_mut()
            .filter(|db| db.is_open())
            .ok_or(FfiError::NoSession)
    }

    /// Turns `result` into the boolean answer of a `cs_*` call.
    ///
    /// An error is written to the output buffer.
    pub fn finish(&mut self, result: FfiResult<bool>) -> bool {
        match result {
            Ok(answer) => answer,
            Err(e) => {
                self.buffer.write_error(&e);
                false
            }
        }
    }
}

/// Locks the session for the duration of one call.
pub fn lock() -> MutexGuard<'static, Session> {
    SESSION.lock()
}

/// Serializes tests that drive the global session.
#[cfg(test)]
pub(crate) fn serial() -> MutexGuard<'static, ()> {
    static SERIAL: Mutex<()> = parking_lot::const_mutex(());
    SERIAL.lock()
}
