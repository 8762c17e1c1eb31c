//! Scan iterator FFI functions.
//!
//! An iterator is a boxed [`ScanCursor`] handed out as an opaque pointer. It
//! sees the data as of `cs_scan` and stays usable after `cs_close`, but one
//! that is not released with `cs_iterator_deinit` before `cs_close` counts as
//! a leak.

use crate::error::FfiResult;
use crate::session;
use crate::types::{byte_slice, copy_out, CsIterator};
use colderstorage_core::{Cursor, ScanCursor};

/// Opens an iterator over the keys in `[lower, upper]`.
///
/// # Returns
///
/// A new iterator, or null on failure with an error payload in the output
/// buffer. An inverted range yields an iterator that is immediately invalid.
///
/// # Safety
///
/// `lower` and `upper` must be valid for `lower_len` and `upper_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn cs_scan(
    lower: *const u8,
    lower_len: usize,
    upper: *const u8,
    upper_len: usize,
) -> *mut CsIterator {
    let mut session = session::lock();
    let result = (|| -> FfiResult<ScanCursor> {
        let lower = byte_slice(lower, lower_len, "lower bound")?;
        let upper = byte_slice(upper, upper_len, "upper bound")?;
        Ok(session.db()?.scan(lower, upper)?)
    })();

    match result {
        Ok(cursor) => Box::into_raw(Box::new(cursor)).cast(),
        Err(e) => {
            session.buffer.write_error(&e);
            std::ptr::null_mut()
        }
    }
}

/// Whether the iterator is positioned on an entry.
///
/// # Safety
///
/// `it` must be null or a live iterator from `cs_scan`.
#[no_mangle]
pub unsafe extern "C" fn cs_iterator_is_valid(it: *const CsIterator) -> bool {
    cursor(it).is_some_and(ScanCursor::is_valid)
}

/// Copies the current key into `out`.
///
/// # Returns
///
/// The key length, or 0 when the iterator is not positioned. Nothing is
/// copied when the key is longer than `out_cap`; call again with a buffer of
/// the returned size.
///
/// # Safety
///
/// - `it` must be null or a live iterator from `cs_scan`
/// - `out` must be valid for writes of `out_cap` bytes
#[no_mangle]
pub unsafe extern "C" fn cs_iterator_key(it: *const CsIterator, out: *mut u8, out_cap: usize) -> u32 {
    match cursor(it).and_then(ScanCursor::key) {
        Some(key) => {
            copy_out(key, out, out_cap);
            key.len() as u32
        }
        None => 0,
    }
}

/// Copies the current value into `out`.
///
/// Same contract as `cs_iterator_key`.
///
/// # Safety
///
/// - `it` must be null or a live iterator from `cs_scan`
/// - `out` must be valid for writes of `out_cap` bytes
#[no_mangle]
pub unsafe extern "C" fn cs_iterator_val(it: *const CsIterator, out: *mut u8, out_cap: usize) -> u32 {
    match cursor(it).and_then(ScanCursor::value) {
        Some(value) => {
            copy_out(value, out, out_cap);
            value.len() as u32
        }
        None => 0,
    }
}

/// Advances the iterator. A no-op once it is exhausted.
///
/// # Returns
///
/// `false` if the next entry could not be read; the output buffer holds the
/// error.
///
/// # Safety
///
/// `it` must be null or a live iterator from `cs_scan`.
#[no_mangle]
pub unsafe extern "C" fn cs_iterator_next(it: *mut CsIterator) -> bool {
    let Some(cursor) = it.cast::<ScanCursor>().as_mut() else {
        return false;
    };
    match cursor.next() {
        Ok(()) => true,
        Err(e) => {
            session::lock().buffer.write_error(&e.into());
            false
        }
    }
}

/// Closes and frees an iterator.
///
/// # Safety
///
/// `it` must be null or an iterator from `cs_scan` that was not freed yet.
/// It must not be used after this call.
#[no_mangle]
pub unsafe extern "C" fn cs_iterator_deinit(it: *mut CsIterator) {
    if it.is_null() {
        return;
    }
    let mut cursor = Box::from_raw(it.cast::<ScanCursor>());
    cursor.close();
}

unsafe fn cursor<'a>(it: *const CsIterator) -> Option<&'a ScanCursor> {
    it.cast::<ScanCursor>().as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::take_payload;
    use crate::database::{cs_close, cs_detect_leaks, cs_open, cs_put};
    use crate::session::serial;
    use colderstorage_codec::{decode_error, ErrorKind};
    use std::ffi::CString;
    use tempfile::tempdir;

    unsafe fn open(dir: &tempfile::TempDir) {
        let path = CString::new(dir.path().to_str().unwrap()).unwrap();
        assert!(cs_open(path.as_ptr()));
    }

    unsafe fn scan(lower: &[u8], upper: &[u8]) -> *mut CsIterator {
        cs_scan(lower.as_ptr(), lower.len(), upper.as_ptr(), upper.len())
    }

    unsafe fn drain(it: *mut CsIterator) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut entries = Vec::new();
        while cs_iterator_is_valid(it) {
            let mut key = [0u8; 32];
            let mut val = [0u8; 32];
            let key_len = cs_iterator_key(it, key.as_mut_ptr(), key.len()) as usize;
            let val_len = cs_iterator_val(it, val.as_mut_ptr(), val.len()) as usize;
            entries.push((key[..key_len].to_vec(), val[..val_len].to_vec()));
            assert!(cs_iterator_next(it));
        }
        entries
    }

    #[test]
    fn scan_is_inclusive() {
        let _serial = serial();
        let temp = tempdir().unwrap();
        unsafe {
            open(&temp);
            for (i, key) in ["apple", "banana", "cherry", "date", "elderberry"].iter().enumerate() {
                let val = i.to_string();
                assert!(cs_put(key.as_ptr(), key.len(), val.as_ptr(), val.len()));
            }

            let it = scan(b"banana", b"date");
            assert!(!it.is_null());
            let entries = drain(it);
            assert_eq!(
                entries,
                vec![
                    (b"banana".to_vec(), b"1".to_vec()),
                    (b"cherry".to_vec(), b"2".to_vec()),
                    (b"date".to_vec(), b"3".to_vec()),
                ]
            );
            // Exhausted iterators stay exhausted.
            assert!(cs_iterator_next(it));
            assert!(!cs_iterator_is_valid(it));
            assert_eq!(cs_iterator_key(it, std::ptr::null_mut(), 0), 0);
            cs_iterator_deinit(it);

            assert!(cs_close());
        }
        assert!(!cs_detect_leaks());
    }

    #[test]
    fn short_buffer_gets_length_only() {
        let _serial = serial();
        let temp = tempdir().unwrap();
        unsafe {
            open(&temp);
            assert!(cs_put(b"long key".as_ptr(), 8, b"v".as_ptr(), 1));
            let it = scan(b"a", b"z");
            let mut out = [0u8; 4];
            assert_eq!(cs_iterator_key(it, out.as_mut_ptr(), out.len()), 8);
            assert_eq!(out, [0u8; 4]);
            cs_iterator_deinit(it);
            assert!(cs_close());
        }
    }

    #[test]
    fn undeinitialized_iterator_is_a_leak() {
        let _serial = serial();
        let temp = tempdir().unwrap();
        unsafe {
            open(&temp);
            let it = scan(b"a", b"z");
            assert!(cs_close());
            assert!(cs_detect_leaks());
            cs_iterator_deinit(it);
            // The report is about the state at close.
            assert!(cs_detect_leaks());

            open(&temp);
            assert!(cs_close());
            assert!(!cs_detect_leaks());
        }
    }

    #[test]
    fn scan_without_session_returns_null() {
        let _serial = serial();
        let _ = cs_close();
        unsafe {
            assert!(scan(b"a", b"z").is_null());
        }
        assert_eq!(decode_error(&take_payload()).unwrap().kind, ErrorKind::Closed);
    }

    #[test]
    fn null_iterator_is_harmless() {
        unsafe {
            assert!(!cs_iterator_is_valid(std::ptr::null()));
            assert!(!cs_iterator_next(std::ptr::null_mut()));
            assert_eq!(cs_iterator_val(std::ptr::null(), std::ptr::null_mut(), 0), 0);
            cs_iterator_deinit(std::ptr::null_mut());
        }
    }
}
