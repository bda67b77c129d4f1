//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! A call returns one heap-allocated `FfiSendResult`: on success `text`
//! holds the response body as a C string; on failure `error_code` says which
//! kind of failure and `error_message` describes it. Conversion helpers live
//! here to keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use relay_core::SendError;

/// Error codes returned in `FfiSendResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    Connection = 1,
    Other = 2,
    NullArg = 3,
    InvalidArg = 4,
    Panic = 5,
}

/// Result envelope for `relay_send_text`.
///
/// The caller owns the returned pointer and must release it with
/// `relay_free_result`.
#[repr(C)]
pub struct FfiSendResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub text: *mut c_char,
}

impl FfiSendResult {
    /// Build a success result carrying the response text.
    ///
    /// An interior NUL cannot be represented in a C string, so such a body
    /// is reported as `Other`.
    pub(crate) fn ok(text: String) -> *mut Self {
        match CString::new(text) {
            Ok(text) => Box::into_raw(Box::new(FfiSendResult {
                error_code: FfiErrorCode::Ok,
                error_message: std::ptr::null_mut(),
                text: text.into_raw(),
            })),
            Err(_) => Self::error(FfiErrorCode::Other, "response body contains a NUL byte"),
        }
    }

    /// Build an error result from a `SendError`.
    pub(crate) fn from_error(err: SendError) -> *mut Self {
        let code = match err {
            SendError::Connection => FfiErrorCode::Connection,
            SendError::Other => FfiErrorCode::Other,
        };
        Self::error(code, &err.to_string())
    }

    /// Build an error result for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::error(FfiErrorCode::NullArg, &format!("null argument: {name}"))
    }

    /// Build an error result for an argument that is present but unusable.
    pub(crate) fn invalid_arg(name: &str) -> *mut Self {
        Self::error(FfiErrorCode::InvalidArg, &format!("invalid argument: {name}"))
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::error(FfiErrorCode::Panic, msg)
    }

    fn error(error_code: FfiErrorCode, msg: &str) -> *mut Self {
        let result = Box::new(FfiSendResult {
            error_code,
            error_message: CString::new(msg).unwrap_or_default().into_raw(),
            text: std::ptr::null_mut(),
        });
        Box::into_raw(result)
    }
}
