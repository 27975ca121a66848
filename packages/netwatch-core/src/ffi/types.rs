//! # FFI Types
//!
//! C-compatible types for cross-platform FFI.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use crate::error::Error;

/// FFI-safe result type
///
/// Used to return results across the FFI boundary. Free with
/// [`netwatch_free_result`].
#[repr(C)]
pub struct FfiResult {
    /// Success flag (1 = success, 0 = error)
    pub success: i32,
    /// Error code (0 if success)
    pub error_code: i32,
    /// Error kind, e.g. `KeyNotFoundError` (null if success)
    pub error_kind: *mut c_char,
    /// Error message (null if success)
    pub error_message: *mut c_char,
    /// Result data (null if error)
    pub data: *mut c_char,
}

impl FfiResult {
    /// Create a successful result with data
    pub fn ok(data: String) -> Self {
        Self {
            success: 1,
            error_code: 0,
            error_kind: std::ptr::null_mut(),
            error_message: std::ptr::null_mut(),
            data: into_c_string(data),
        }
    }

    /// Create a successful result without data
    pub fn ok_empty() -> Self {
        Self {
            success: 1,
            error_code: 0,
            error_kind: std::ptr::null_mut(),
            error_message: std::ptr::null_mut(),
            data: std::ptr::null_mut(),
        }
    }

    /// Create an error result
    pub fn err(code: i32, kind: &str, message: String) -> Self {
        Self {
            success: 0,
            error_code: code,
            error_kind: into_c_string(kind.to_string()),
            error_message: into_c_string(message),
            data: std::ptr::null_mut(),
        }
    }

    /// Create an error result from a core error
    pub fn from_error(error: &Error) -> Self {
        Self::err(error.code(), error.kind(), error.to_string())
    }

    /// Create from a Rust Result
    pub fn from_result<T: ToString>(result: crate::Result<T>) -> Self {
        match result {
            Ok(value) => Self::ok(value.to_string()),
            Err(e) => Self::from_error(&e),
        }
    }
}

/// FFI-safe byte array
#[repr(C)]
pub struct FfiBytes {
    /// Pointer to the data
    pub ptr: *mut u8,
    /// Length of the data
    pub len: usize,
}

impl FfiBytes {
    /// Create from a Rust Vec<u8>
    pub fn new(data: Vec<u8>) -> Self {
        let len = data.len();
        let mut boxed = data.into_boxed_slice();
        let ptr = boxed.as_mut_ptr();
        std::mem::forget(boxed);
        Self { ptr, len }
    }

    /// Create a null/empty bytes
    pub fn null() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            len: 0,
        }
    }
}

/// FFI-safe result carrying binary data
///
/// Returned by the file operations. Free with [`netwatch_free_bytes_result`].
#[repr(C)]
pub struct FfiBytesResult {
    /// Success flag (1 = success, 0 = error)
    pub success: i32,
    /// Error code (0 if success)
    pub error_code: i32,
    /// Error kind (null if success)
    pub error_kind: *mut c_char,
    /// Error message (null if success)
    pub error_message: *mut c_char,
    /// Result bytes (null if error)
    pub data: FfiBytes,
}

impl FfiBytesResult {
    /// Create a successful result
    pub fn ok(data: Vec<u8>) -> Self {
        Self {
            success: 1,
            error_code: 0,
            error_kind: std::ptr::null_mut(),
            error_message: std::ptr::null_mut(),
            data: FfiBytes::new(data),
        }
    }

    /// Create an error result from a core error
    pub fn from_error(error: &Error) -> Self {
        Self {
            success: 0,
            error_code: error.code(),
            error_kind: into_c_string(error.kind().to_string()),
            error_message: into_c_string(error.to_string()),
            data: FfiBytes::null(),
        }
    }

    /// Create from a Rust Result
    pub fn from_result(result: crate::Result<Vec<u8>>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e),
        }
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Hand a string to C. Interior NULs are dropped so the conversion can't fail.
pub(crate) fn into_c_string(s: String) -> *mut c_char {
    let s = if s.contains('\0') { s.replace('\0', "") } else { s };
    CString::new(s).unwrap_or_default().into_raw()
}

/// Convert a C string to a Rust String
///
/// # Safety
/// The caller must ensure the pointer is valid and null-terminated.
pub unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(String::from)
}

/// Borrow a caller-owned buffer
///
/// A null pointer is only accepted together with a zero length.
///
/// # Safety
/// `ptr` must point to `len` readable bytes that outlive the returned slice.
pub unsafe fn bytes_from_raw<'a>(ptr: *const u8, len: usize) -> Option<&'a [u8]> {
    if ptr.is_null() {
        return if len == 0 { Some(&[]) } else { None };
    }
    Some(std::slice::from_raw_parts(ptr, len))
}

/// Free a C string allocated by Rust
///
/// # Safety
/// The pointer must have been allocated by Rust using CString::into_raw().
#[no_mangle]
pub unsafe extern "C" fn netwatch_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Free an FfiResult
///
/// # Safety
/// The FfiResult must have been created by Rust FFI functions.
#[no_mangle]
pub unsafe extern "C" fn netwatch_free_result(result: FfiResult) {
    netwatch_free_string(result.error_kind);
    netwatch_free_string(result.error_message);
    netwatch_free_string(result.data);
}

/// Free FfiBytes
///
/// # Safety
/// The FfiBytes must have been created by Rust FFI functions.
#[no_mangle]
pub unsafe extern "C" fn netwatch_free_bytes(bytes: FfiBytes) {
    if !bytes.ptr.is_null() {
        let _ = Vec::from_raw_parts(bytes.ptr, bytes.len, bytes.len);
    }
}

/// Free an FfiBytesResult
///
/// # Safety
/// The FfiBytesResult must have been created by Rust FFI functions.
#[no_mangle]
pub unsafe extern "C" fn netwatch_free_bytes_result(result: FfiBytesResult) {
    netwatch_free_string(result.error_kind);
    netwatch_free_string(result.error_message);
    netwatch_free_bytes(result.data);
}
