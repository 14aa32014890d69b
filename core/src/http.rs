//! Request, response and completion values.
//!
//! # Design
//! These are plain owned data. A `FetchRequest` is created by the caller and
//! moved into exactly one operation; a `Completion` is produced by that
//! operation and moved into the caller's callback. Neither is shared between
//! operations.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FetchResult;

/// Placeholder delivered for non-200 responses that carry no reason phrase.
pub const NO_STATUS_MESSAGE: &str = "(no status message from server)";

/// Default stall timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u32 = 30;

/// HTTP method of a request.
///
/// Advisory only: the external tool is always invoked in its default (GET)
/// mode. The method is recorded in logs for correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable fetch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    #[serde(default)]
    pub method: HttpMethod,
    pub url: String,
    /// Header name to value, forwarded in key order.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Stall timeout in whole seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    DEFAULT_TIMEOUT_SECS
}

impl FetchRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// A GET request with no headers and the default timeout.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn timeout_secs(mut self, secs: u32) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// A successfully framed response.
///
/// For status 200 `body` is the payload verbatim. For any other status it is
/// the reason phrase from the status line, or [`NO_STATUS_MESSAGE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// The single terminal value delivered for one request.
#[derive(Debug)]
pub struct Completion {
    /// The request URL, echoed for correlation.
    pub url: String,
    /// Reserved for redirect tracking; always `false`.
    pub redirected: bool,
    pub result: FetchResult<FetchResponse>,
}

impl Completion {
    pub(crate) fn new(url: String, result: FetchResult<FetchResponse>) -> Self {
        Self {
            url,
            redirected: false,
            result,
        }
    }

    /// The protocol status code, or `-1` for any transport or process failure.
    pub fn status_code(&self) -> i32 {
        match &self.result {
            Ok(response) => i32::from(response.status),
            Err(_) => -1,
        }
    }

    /// The success body / status message, or the failure diagnostic.
    pub fn text(&self) -> Cow<'_, str> {
        match &self.result {
            Ok(response) => response.text(),
            Err(e) => Cow::Owned(e.to_string()),
        }
    }
}
