//! The shared output buffer.
//!
//! Calls that produce data leave one payload here: an array, a schema or an
//! error. The caller reads it with [`cs_get_buffer`] and
//! [`cs_get_buffer_len`]; the bytes stay valid until the next `cs_*` call.

use crate::error::{FfiError, FfiResult};
use crate::session;
use colderstorage_codec::{PayloadEncoder, Row, Schema};
use colderstorage_core::ResourceGuard;

/// Payload storage owned by the session.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    encoder: PayloadEncoder,
    guard: Option<ResourceGuard>,
}

impl OutputBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current payload.
    pub fn as_bytes(&self) -> &[u8] {
        self.encoder.as_bytes()
    }

    /// Empties the buffer.
    pub fn clear(&mut self) {
        self.encoder.clear();
    }

    /// Replaces the payload with an array.
    pub fn write_array(&mut self, rows: &[Row]) -> FfiResult<()> {
        // The encoder leaves its buffer untouched on failure.
        let mut encoder = PayloadEncoder::new();
        encoder.array(rows)?;
        self.encoder = encoder;
        Ok(())
    }

    /// Replaces the payload with a schema.
    pub fn write_schema(&mut self, schema: &Schema) -> FfiResult<()> {
        let mut encoder = PayloadEncoder::new();
        encoder.schema(schema)?;
        self.encoder = encoder;
        Ok(())
    }

    /// Replaces the payload with an error record.
    pub fn write_error(&mut self, error: &FfiError) {
        self.encoder.clear();
        self.encoder.error(error.kind(), &error.to_string());
    }

    /// Accounts the buffer against an open database.
    pub(crate) fn attach(&mut self, guard: ResourceGuard) {
        self.guard = Some(guard);
    }

    /// Releases the accounting taken by [`attach`](Self::attach).
    pub(crate) fn detach(&mut self) {
        if let Some(mut guard) = self.guard.take() {
            guard.release();
        }
    }
}

/// Returns a pointer to the current payload.
///
/// The pointer is valid until the next `cs_*` call. It may dangle when
/// [`cs_get_buffer_len`] is zero.
#[no_mangle]
pub extern "C" fn cs_get_buffer() -> *const u8 {
    session::lock().buffer.as_bytes().as_ptr()
}

/// Returns the length of the current payload in bytes.
#[no_mangle]
pub extern "C" fn cs_get_buffer_len() -> usize {
    session::lock().buffer.as_bytes().len()
}

/// Copies the current payload. Test helper.
#[cfg(test)]
pub(crate) fn take_payload() -> Vec<u8> {
    let ptr = cs_get_buffer();
    let len = cs_get_buffer_len();
    if len == 0 {
        return Vec::new();
    }
    // Safety: the buffer is not touched between the two calls above and here.
    unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec()
}
