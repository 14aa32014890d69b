//! Asynchronous HTTP fetches delegated to an external `curl` process.
//!
//! # Overview
//! The protocol work is done by curl. This crate owns the orchestration:
//! finding the tool, spawning it with the right arguments, multiplexing its
//! stdout/stderr under a stall timeout and a size ceiling, framing the status
//! line and body out of the captured bytes, and delivering exactly one
//! completion per request.
//!
//! # Design
//! - `FetchClient` is cheap to clone and holds only configuration.
//! - Every request becomes one `FetchOperation` that owns its buffer, child
//!   process and pipes. It runs on its own thread and is dropped right after
//!   its callback returns.
//! - Nothing beyond the first status line is interpreted: no HTTP parsing,
//!   TLS, redirects or pooling.
//! - Unix only (`poll(2)`, `fcntl(2)`).

pub mod args;
pub mod client;
pub mod config;
pub mod error;
pub mod framing;
pub mod http;
pub mod locator;
pub mod operation;

pub use client::FetchClient;
pub use config::FetchConfig;
pub use error::{FetchError, FetchErrorKind, FetchResult};
pub use http::{Completion, FetchRequest, FetchResponse, HttpMethod};
pub use locator::locate;
pub use operation::FetchOperation;
