//! Splitting captured tool output into header block and body.
//!
//! Captured stdout is: zero or more header lines (LF terminated, optional
//! trailing CR), one empty line, then the body bytes verbatim. Only the first
//! header line is interpreted.

use crate::error::{FetchError, FetchResult};
use crate::http::{FetchResponse, NO_STATUS_MESSAGE};

/// Split `raw` into its header lines and the body that follows the first
/// empty line. Carriage returns inside the header block are stripped.
///
/// When no empty line is present every line is a header line and the body
/// is empty.
pub fn split_head(raw: &[u8]) -> (Vec<String>, &[u8]) {
    let mut lines = Vec::new();
    let mut current = Vec::new();
    let mut idx = 0;

    while idx < raw.len() {
        let byte = raw[idx];
        idx += 1;
        match byte {
            b'\n' => {
                if current.is_empty() {
                    return (lines, &raw[idx..]);
                }
                lines.push(String::from_utf8_lossy(&current).into_owned());
                current.clear();
            }
            b'\r' => {}
            other => current.push(other),
        }
    }
    if !current.is_empty() {
        lines.push(String::from_utf8_lossy(&current).into_owned());
    }
    (lines, &raw[raw.len()..])
}

/// Frame the captured output of a tool run that exited cleanly.
pub fn parse_response(raw: &[u8]) -> FetchResult<FetchResponse> {
    let (lines, body) = split_head(raw);
    let status_line = lines.first().ok_or(FetchError::EmptyResponse)?;
    let (status, message) = parse_status_line(status_line)?;

    let body = if status == 200 {
        body.to_vec()
    } else {
        message.unwrap_or(NO_STATUS_MESSAGE).as_bytes().to_vec()
    };
    Ok(FetchResponse { status, body })
}

/// Parse `HTTP/x.y NNN reason` into the code and optional reason phrase.
///
/// The code is the three characters after the first space and must be
/// all digits in `1..=999`. The reason is whatever follows the code and one
/// delimiter character.
pub fn parse_status_line(line: &str) -> FetchResult<(u16, Option<&str>)> {
    let space = line
        .find(' ')
        .ok_or_else(|| FetchError::InvalidStatusLine("no status line".to_string()))?;
    let rest = &line[space + 1..];

    let code = rest
        .get(..3)
        .filter(|c| c.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|c| c.parse::<u16>().ok())
        .filter(|c| (1..=999).contains(c))
        .ok_or_else(|| FetchError::InvalidStatusLine("invalid response code".to_string()))?;

    // One delimiter after the code; the phrase must be non-empty.
    let message = rest.get(4..).filter(|m| !m.is_empty());
    Ok((code, message))
}
