//! C-ABI wrapper around `curlfetch-core`.
//!
//! # Overview
//! Exposes the asynchronous fetch API through `extern "C"` functions. A C
//! caller creates a client, issues requests with a function-pointer handler
//! and an opaque `void*` context, and receives exactly one handler call per
//! accepted request on a worker thread.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Argument problems (null pointers, invalid UTF-8) are reported
//!   synchronously through the return code and the handler is not called.
//!   Everything else, including an empty URL, is reported through the handler.
//! - The C caller owns returned pointers and must call the matching
//!   `curlfetch_*_free` function to release them.

pub mod types;

use std::collections::BTreeMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::panic::catch_unwind;

use curlfetch_core::{Completion, FetchClient, FetchConfig, FetchRequest};
use tracing::warn;

use types::*;

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client.
///
/// With a null `tool_path` the well-known curl locations are searched, after
/// `$CURLFETCH_TOOL_PATH` if set. Otherwise only `tool_path` is used.
/// Returns null on invalid UTF-8 or an internal panic. Free with
/// `curlfetch_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn curlfetch_client_new(tool_path: *const c_char) -> *mut FfiFetchClient {
    catch_unwind(|| {
        let config = if tool_path.is_null() {
            FetchConfig::default().with_env_override()
        } else {
            match unsafe { CStr::from_ptr(tool_path) }.to_str() {
                Ok(path) => FetchConfig::default().with_tool_paths([path]),
                Err(_) => return std::ptr::null_mut(),
            }
        };
        into_handle(config)
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Create a client from a JSON configuration document.
///
/// Recognised keys: `tool_paths` (array of strings), `max_response_bytes`,
/// `poll_interval` (milliseconds). Missing keys keep their defaults.
/// Returns null if `json` is null or does not parse.
#[unsafe(no_mangle)]
pub extern "C" fn curlfetch_client_new_from_json(json: *const c_char) -> *mut FfiFetchClient {
    catch_unwind(|| {
        if json.is_null() {
            return std::ptr::null_mut();
        }
        let Ok(text) = unsafe { CStr::from_ptr(json) }.to_str() else {
            return std::ptr::null_mut();
        };
        match FetchConfig::from_json(text) {
            Ok(config) => into_handle(config),
            Err(e) => {
                warn!(error = %e, "rejecting client configuration");
                std::ptr::null_mut()
            }
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

fn into_handle(config: FetchConfig) -> *mut FfiFetchClient {
    Box::into_raw(Box::new(FfiFetchClient {
        inner: FetchClient::new(config),
    }))
}

/// Free a client. Safe to call with null. Requests already issued keep
/// running and still call their handlers.
#[unsafe(no_mangle)]
pub extern "C" fn curlfetch_client_free(client: *mut FfiFetchClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

/// Return the tool path the client would use right now, or null if none of
/// its candidates exist. Free with `curlfetch_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn curlfetch_tool_path(client: *const FfiFetchClient) -> *mut c_char {
    catch_unwind(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        curlfetch_core::locate(&client.inner.config().tool_paths)
            .and_then(|p| CString::new(p.to_string_lossy().into_owned()).ok())
            .map_or(std::ptr::null_mut(), CString::into_raw)
    })
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Issue an asynchronous fetch.
///
/// `headers` points at `headers_len` entries (may be null when the length is
/// zero); entries with a null name or value are skipped. `arg` is passed to
/// `handler` unmodified.
///
/// Returns `Ok` when the request was accepted; `handler` is then called
/// exactly once from a worker thread. Any other return code means the
/// handler will not be called.
#[unsafe(no_mangle)]
pub extern "C" fn curlfetch_request(
    client: *const FfiFetchClient,
    method: FfiHttpMethod,
    url: *const c_char,
    headers: *const FfiHeader,
    headers_len: usize,
    timeout_secs: u32,
    handler: FfiFetchHandler,
    arg: *mut c_void,
) -> FfiErrorCode {
    catch_unwind(|| {
        if client.is_null() || url.is_null() {
            return FfiErrorCode::NullArg;
        }
        let Some(handler) = handler else {
            return FfiErrorCode::NullArg;
        };
        if headers.is_null() && headers_len > 0 {
            return FfiErrorCode::NullArg;
        }
        let client = unsafe { &*client };

        let Ok(url) = unsafe { CStr::from_ptr(url) }.to_str() else {
            return FfiErrorCode::InvalidUtf8;
        };
        let header_map = match read_headers(headers, headers_len) {
            Ok(map) => map,
            Err(code) => return code,
        };

        let request = FetchRequest::new(method.into(), url)
            .headers(header_map)
            .timeout_secs(timeout_secs);
        let arg = HandlerArg(arg);

        match client
            .inner
            .fetch(request, move |completion| deliver(handler, arg, completion))
        {
            Ok(_detached) => FfiErrorCode::Ok,
            Err(e) => {
                warn!(error = %e, "could not start fetch worker");
                FfiErrorCode::ThreadSpawnFailed
            }
        }
    })
    .unwrap_or(FfiErrorCode::Panic)
}

/// Copy the caller's header array into an owned map.
fn read_headers(
    headers: *const FfiHeader,
    len: usize,
) -> Result<BTreeMap<String, String>, FfiErrorCode> {
    let mut map = BTreeMap::new();
    if len == 0 {
        return Ok(map);
    }
    let entries = unsafe { std::slice::from_raw_parts(headers, len) };
    for entry in entries {
        if entry.name.is_null() || entry.value.is_null() {
            continue;
        }
        let name = unsafe { CStr::from_ptr(entry.name) }
            .to_str()
            .map_err(|_| FfiErrorCode::InvalidUtf8)?;
        let value = unsafe { CStr::from_ptr(entry.value) }
            .to_str()
            .map_err(|_| FfiErrorCode::InvalidUtf8)?;
        map.insert(name.to_string(), value.to_string());
    }
    Ok(map)
}

/// Translate a completion into the C handler call.
fn deliver(
    handler: extern "C" fn(*mut c_void, i32, *const c_char, bool, *const c_char, usize, FfiErrorCode),
    arg: HandlerArg,
    completion: Completion,
) {
    let status = completion.status_code();
    let redirected = completion.redirected;
    // the URL arrived as a C string, so it has no interior NUL
    let url = CString::new(completion.url).unwrap_or_default();
    let (mut text, code) = match completion.result {
        Ok(response) => (response.body, FfiErrorCode::Ok),
        Err(e) => (e.to_string().into_bytes(), e.kind().into()),
    };
    let text_len = text.len();
    text.push(0);

    handler(
        arg.into_raw(),
        status,
        url.as_ptr(),
        redirected,
        text.as_ptr().cast::<c_char>(),
        text_len,
        code,
    );
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn curlfetch_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
