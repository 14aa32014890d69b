//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type with a C-compatible representation. Input
//! types (`FfiHeader`) borrow caller memory for the duration of the call;
//! the callback receives pointers that are valid only while it runs.

use std::os::raw::{c_char, c_void};

use curlfetch_core::{FetchErrorKind, HttpMethod};

/// Opaque handle to a `FetchClient`. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiFetchClient {
    pub(crate) inner: curlfetch_core::FetchClient,
}

/// HTTP method as a C enum. Advisory only.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Head = 1,
    Post = 2,
    Put = 3,
    Delete = 4,
}

impl From<FfiHttpMethod> for HttpMethod {
    fn from(m: FfiHttpMethod) -> Self {
        match m {
            FfiHttpMethod::Get => HttpMethod::Get,
            FfiHttpMethod::Head => HttpMethod::Head,
            FfiHttpMethod::Post => HttpMethod::Post,
            FfiHttpMethod::Put => HttpMethod::Put,
            FfiHttpMethod::Delete => HttpMethod::Delete,
        }
    }
}

/// A single request header. Both strings are borrowed from the caller.
#[repr(C)]
pub struct FfiHeader {
    pub name: *const c_char,
    pub value: *const c_char,
}

/// Outcome codes, returned synchronously by `curlfetch_request` and passed
/// to the completion handler.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    EmptyUrl = 1,
    ToolNotFound = 2,
    SpawnFailed = 3,
    TimedOut = 4,
    TooLong = 5,
    ToolExecutionFailed = 6,
    EmptyResponse = 7,
    InvalidStatusLine = 8,
    NullArg = 9,
    InvalidUtf8 = 10,
    ThreadSpawnFailed = 11,
    Panic = 12,
}

impl From<FetchErrorKind> for FfiErrorCode {
    fn from(kind: FetchErrorKind) -> Self {
        match kind {
            FetchErrorKind::EmptyUrl => FfiErrorCode::EmptyUrl,
            FetchErrorKind::ToolNotFound => FfiErrorCode::ToolNotFound,
            FetchErrorKind::SpawnFailed => FfiErrorCode::SpawnFailed,
            FetchErrorKind::TimedOut => FfiErrorCode::TimedOut,
            FetchErrorKind::TooLong => FfiErrorCode::TooLong,
            FetchErrorKind::ToolExecutionFailed => FfiErrorCode::ToolExecutionFailed,
            FetchErrorKind::EmptyResponse => FfiErrorCode::EmptyResponse,
            FetchErrorKind::InvalidStatusLine => FfiErrorCode::InvalidStatusLine,
        }
    }
}

/// Completion handler.
///
/// Called exactly once per accepted request, from a worker thread. `status`
/// is the HTTP status or -1 on failure. `text` points at `text_len` bytes
/// (body, status message or diagnostic) followed by a NUL; the body may
/// itself contain NULs. `url` and `text` are valid only during the call.
pub type FfiFetchHandler = Option<
    extern "C" fn(
        arg: *mut c_void,
        status: i32,
        url: *const c_char,
        redirected: bool,
        text: *const c_char,
        text_len: usize,
        error_code: FfiErrorCode,
    ),
>;

/// Caller context pointer carried to the worker thread untouched.
pub(crate) struct HandlerArg(pub(crate) *mut c_void);

// The pointer is never dereferenced on this side; ownership and thread
// safety of what it points to are the caller's.
unsafe impl Send for HandlerArg {}

impl HandlerArg {
    /// Consume the wrapper. Taking `self` makes closures capture the whole
    /// `Send` wrapper rather than the raw pointer field.
    pub(crate) fn into_raw(self) -> *mut c_void {
        self.0
    }
}
