//! Type definitions for FFI.

use crate::error::{FfiError, FfiResult};
use std::ffi::{c_char, CStr};

/// Outcome of `cs_get`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsGetStatus {
    /// The value was copied into the caller's buffer.
    Found = 0,
    /// The key does not exist.
    NotFound = 1,
    /// The caller's buffer is too small; `out_len` holds the needed size.
    BufferTooSmall = 2,
    /// The call failed; the output buffer holds an error payload.
    Error = 3,
}

/// An opaque scan cursor handle.
///
/// Created by `cs_scan`, released by `cs_iterator_deinit`.
#[repr(C)]
pub struct CsIterator {
    _private: [u8; 0],
}

/// Views a caller byte range. A null pointer is only accepted with length 0.
///
/// # Safety
///
/// `ptr` must be valid for reads of `len` bytes for the returned lifetime.
pub(crate) unsafe fn byte_slice<'a>(
    ptr: *const u8,
    len: usize,
    what: &'static str,
) -> FfiResult<&'a [u8]> {
    if ptr.is_null() {
        return if len == 0 {
            Ok(&[])
        } else {
            Err(FfiError::NullPointer(what))
        };
    }
    Ok(std::slice::from_raw_parts(ptr, len))
}

/// Views a null-terminated UTF-8 string.
///
/// # Safety
///
/// `ptr` must be null or point to a null-terminated string that outlives
/// the returned reference.
pub(crate) unsafe fn c_str<'a>(ptr: *const c_char, what: &'static str) -> FfiResult<&'a str> {
    if ptr.is_null() {
        return Err(FfiError::NullPointer(what));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| FfiError::InvalidUtf8(what))
}

/// Copies `src` into a caller buffer of `cap` bytes if it fits.
///
/// Returns whether anything was copied.
///
/// # Safety
///
/// `out` must be null or valid for writes of `cap` bytes.
pub(crate) unsafe fn copy_out(src: &[u8], out: *mut u8, cap: usize) -> bool {
    if src.len() > cap || (out.is_null() && !src.is_empty()) {
        return false;
    }
    if !src.is_empty() {
        std::ptr::copy_nonoverlapping(src.as_ptr(), out, src.len());
    }
    true
}
