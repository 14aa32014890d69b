//! Argument vector construction for the external tool.
//!
//! The tool is invoked as `<tool> -D - [-H "<name>: <value>"]* <url>`. `-D -`
//! makes it write the response header block to stdout ahead of the body.

use tracing::warn;

use crate::http::FetchRequest;

/// Upper bound on the argument vector, counting the tool path itself.
pub const MAX_TOOL_ARGS: usize = 1024;

/// Slots kept free at the end of the vector for the URL and terminator.
const RESERVED_ARGS: usize = 4;

/// Leading arguments: tool path, `-D`, `-`.
const LEADING_ARGS: usize = 3;

/// Build the arguments passed after the tool path.
///
/// Headers that would push the vector past [`MAX_TOOL_ARGS`] are dropped
/// silently; the request still goes out with the headers that fit.
pub fn build_args(request: &FetchRequest) -> Vec<String> {
    let mut args = vec!["-D".to_string(), "-".to_string()];
    let mut used = LEADING_ARGS;
    let mut dropped = 0usize;

    for (name, value) in &request.headers {
        if used >= MAX_TOOL_ARGS - RESERVED_ARGS {
            dropped += 1;
            continue;
        }
        args.push("-H".to_string());
        args.push(format!("{name}: {value}"));
        used += 2;
    }

    if dropped > 0 {
        warn!(
            url = %request.url,
            dropped,
            "header count exceeds argument limit; extra headers not sent"
        );
    }

    args.push(request.url.clone());
    args
}

/// Number of headers that fit under [`MAX_TOOL_ARGS`].
pub fn max_forwarded_headers() -> usize {
    (MAX_TOOL_ARGS - RESERVED_ARGS - LEADING_ARGS).div_ceil(2)
}
