//! Client configuration.
//!
//! # Design
//! The defaults reproduce the well-known curl install locations, a 64 MiB
//! response ceiling and a one-second readiness slice. Hosts can override any
//! field from JSON; missing fields keep their defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable naming a tool path to try before the defaults.
pub const TOOL_PATH_ENV: &str = "CURLFETCH_TOOL_PATH";

/// Maximum captured response size in bytes.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

/// Well-known curl locations, searched in order.
pub const DEFAULT_TOOL_PATHS: [&str; 5] = [
    "/usr/bin/curl",
    "/bin/curl",
    "/usr/local/bin/curl",
    "/usr/sbin/curl",
    "/sbin/curl",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Candidate tool paths, searched in order on every fetch.
    pub tool_paths: Vec<PathBuf>,
    pub max_response_bytes: usize,
    /// Upper bound on a single readiness wait.
    #[serde(with = "millis")]
    pub poll_interval: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            tool_paths: DEFAULT_TOOL_PATHS.iter().map(PathBuf::from).collect(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl FetchConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Prepend `$CURLFETCH_TOOL_PATH` to the candidate list when it is set.
    pub fn with_env_override(mut self) -> Self {
        if let Some(path) = std::env::var_os(TOOL_PATH_ENV).filter(|p| !p.is_empty()) {
            self.tool_paths.insert(0, PathBuf::from(path));
        }
        self
    }

    pub fn with_tool_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.tool_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = max;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
