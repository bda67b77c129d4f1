//! C-ABI wrapper around `relay-core`.
//!
//! # Overview
//! Exposes `send_text` through one `extern "C"` function so any language
//! with a C FFI can relay a prompt without linking against Rust directly.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - A single `FfiSendResult` envelope carries either the response text or
//!   an error code plus message.
//! - The C caller owns the returned pointer and must call
//!   `relay_free_result` to release it.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::catch_unwind;

use relay_core::HttpVersion;

use types::*;

/// Borrow a C string argument as UTF-8. `ptr` must be null or point to a
/// NUL-terminated string that outlives the call.
fn arg<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, *mut FfiSendResult> {
    if ptr.is_null() {
        return Err(FfiSendResult::null_arg(name));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| FfiSendResult::invalid_arg(name))
}

/// Borrow several C string arguments, stopping at the first bad one.
fn args<'a, const N: usize>(
    ptrs: [(*const c_char, &str); N],
) -> Result<[&'a str; N], *mut FfiSendResult> {
    let mut out = [""; N];
    for (slot, (ptr, name)) in out.iter_mut().zip(ptrs) {
        *slot = arg(ptr, name)?;
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// POST `body` to `host:port` + `target` and return the response text.
///
/// `http_version` is `10` or `11`. Returns a result with `error_code = Ok`
/// and `text` set on success. Never returns null.
/// The caller must free the returned pointer with `relay_free_result`.
#[unsafe(no_mangle)]
pub extern "C" fn relay_send_text(
    host: *const c_char,
    port: *const c_char,
    use_tls: bool,
    target: *const c_char,
    api_key: *const c_char,
    body: *const c_char,
    http_version: i32,
) -> *mut FfiSendResult {
    catch_unwind(|| {
        let [host, port, target, api_key, body] = match args([
            (host, "host"),
            (port, "port"),
            (target, "target"),
            (api_key, "api_key"),
            (body, "body"),
        ]) {
            Ok(args) => args,
            Err(result) => return result,
        };
        let Some(version) = HttpVersion::from_code(http_version) else {
            return FfiSendResult::invalid_arg("http_version");
        };

        match relay_core::send_text(host, port, use_tls, target, api_key, body, version) {
            Ok(text) => FfiSendResult::ok(text),
            Err(e) => FfiSendResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiSendResult::panic("panic in relay_send_text"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiSendResult` returned by `relay_send_text`. Safe to call with
/// null.
#[unsafe(no_mangle)]
pub extern "C" fn relay_free_result(result: *mut FfiSendResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if !result.text.is_null() {
            drop(unsafe { CString::from_raw(result.text) });
        }
    });
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
