//! Small HTTP origin used to exercise curl-backed fetches end to end.
//!
//! Routes:
//! - `GET /hello` returns a fixed plain-text body.
//! - `GET /echo-header/{name}` returns the value of request header `name`.
//! - `GET /bytes/{n}` returns `n` bytes of `a`.
//! - `GET /status/{code}` returns an empty response with that status.
//! - anything else is 404.

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tracing::debug;

pub const HELLO_BODY: &str = "hello from mock-server\n";

/// Largest body `/bytes/{n}` will produce.
pub const MAX_BYTES: usize = 16 * 1024 * 1024;

pub fn app() -> Router {
    Router::new()
        .route("/hello", get(hello))
        .route("/echo-header/{name}", get(echo_header))
        .route("/bytes/{n}", get(bytes))
        .route("/status/{code}", get(status))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn hello() -> &'static str {
    HELLO_BODY
}

async fn echo_header(Path(name): Path<String>, headers: HeaderMap) -> Result<String, StatusCode> {
    debug!(%name, "echo header");
    headers
        .get(name.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or(StatusCode::BAD_REQUEST)
}

async fn bytes(Path(n): Path<usize>) -> Result<String, StatusCode> {
    if n > MAX_BYTES {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }
    Ok("a".repeat(n))
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}
