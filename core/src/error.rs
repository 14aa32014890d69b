//! Error types for the fetch orchestrator.
//!
//! # Design
//! Every variant is terminal: nothing inside the core retries. The `Display`
//! text of each variant is the diagnostic string handed to the completion
//! callback, so callers that only see a status of `-1` still get a readable
//! reason. `FetchErrorKind` is the fieldless mirror used where a plain code is
//! needed (the C ABI).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure outcomes of a single fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request carried an empty URL. No process is spawned.
    #[error("cannot fetch empty URL")]
    EmptyUrl,

    /// None of the candidate tool paths exist.
    #[error("unable to locate 'curl' binary in {}", display_paths(.searched))]
    ToolNotFound { searched: Vec<PathBuf> },

    /// The child process could not be started.
    #[error("unable to spawn curl: {0}")]
    SpawnFailed(#[source] io::Error),

    /// No output progress within the stall timeout.
    #[error("connection timed out")]
    TimedOut,

    /// Captured output exceeded the response size ceiling.
    #[error("response too long")]
    TooLong,

    /// The tool exited unsuccessfully (`code` is `None` when killed by a signal).
    #[error("connection failed (curl returned non-zero exit code)")]
    ToolExecutionFailed { code: Option<i32> },

    /// The tool exited cleanly but produced no header block.
    #[error("HTTP response empty")]
    EmptyResponse,

    /// The first header line does not carry a usable status code.
    #[error("invalid HTTP response ({0})")]
    InvalidStatusLine(String),
}

/// Fieldless discriminant of [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    EmptyUrl,
    ToolNotFound,
    SpawnFailed,
    TimedOut,
    TooLong,
    ToolExecutionFailed,
    EmptyResponse,
    InvalidStatusLine,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::EmptyUrl => FetchErrorKind::EmptyUrl,
            FetchError::ToolNotFound { .. } => FetchErrorKind::ToolNotFound,
            FetchError::SpawnFailed(_) => FetchErrorKind::SpawnFailed,
            FetchError::TimedOut => FetchErrorKind::TimedOut,
            FetchError::TooLong => FetchErrorKind::TooLong,
            FetchError::ToolExecutionFailed { .. } => FetchErrorKind::ToolExecutionFailed,
            FetchError::EmptyResponse => FetchErrorKind::EmptyResponse,
            FetchError::InvalidStatusLine(_) => FetchErrorKind::InvalidStatusLine,
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "(no candidate paths)".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_not_found_lists_searched_paths() {
        let err = FetchError::ToolNotFound {
            searched: vec![PathBuf::from("/usr/bin/curl"), PathBuf::from("/bin/curl")],
        };
        assert_eq!(
            err.to_string(),
            "unable to locate 'curl' binary in /usr/bin/curl, /bin/curl"
        );
    }

    #[test]
    fn tool_not_found_with_no_candidates() {
        let err = FetchError::ToolNotFound { searched: Vec::new() };
        assert!(err.to_string().ends_with("(no candidate paths)"));
    }

    #[test]
    fn invalid_status_line_carries_detail() {
        let err = FetchError::InvalidStatusLine("no status line".to_string());
        assert_eq!(err.to_string(), "invalid HTTP response (no status line)");
        assert_eq!(err.kind(), FetchErrorKind::InvalidStatusLine);
    }

    #[test]
    fn spawn_failed_exposes_source() {
        let err = FetchError::SpawnFailed(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.kind(), FetchErrorKind::SpawnFailed);
    }
}
