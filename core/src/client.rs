//! Caller-facing fetch API.
//!
//! # Design
//! `FetchClient` holds only shared, read-only configuration. Each call to
//! [`FetchClient::fetch`] creates a fresh `FetchOperation` and moves it onto a
//! dedicated thread, which runs it, invokes the callback and drops it. The
//! callback is `FnOnce`, so it cannot be delivered twice. Operations share
//! nothing but the `Arc<FetchConfig>`.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::config::FetchConfig;
use crate::http::{Completion, FetchRequest, HttpMethod};
use crate::operation::FetchOperation;

/// Stateless client: holds only the shared config and starts one
/// [`FetchOperation`] per request.
#[derive(Debug, Clone, Default)]
pub struct FetchClient {
    config: Arc<FetchConfig>,
}

impl FetchClient {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Run `request` on the calling thread and return its completion.
    pub fn execute(&self, request: FetchRequest) -> Completion {
        FetchOperation::new(request, Arc::clone(&self.config)).into_completion()
    }

    /// Run `request` on a new thread and deliver the result to `on_complete`.
    ///
    /// The callback runs on that thread, never the caller's. An `Err` means
    /// the thread could not be started; the callback is then dropped without
    /// being called.
    pub fn fetch<F>(&self, request: FetchRequest, on_complete: F) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let operation = FetchOperation::new(request, Arc::clone(&self.config));
        let id = operation.id().simple().to_string();
        debug!(id = %id, url = %operation.request().url, "dispatching fetch");

        thread::Builder::new()
            .name(format!("curlfetch-{}", &id[..8]))
            .spawn(move || operation.run(on_complete))
    }

    /// Convenience wrapper for a GET with the given headers and timeout.
    pub fn get<F>(
        &self,
        url: impl Into<String>,
        headers: BTreeMap<String, String>,
        timeout_secs: u32,
        on_complete: F,
    ) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let request = FetchRequest::new(HttpMethod::Get, url)
            .headers(headers)
            .timeout_secs(timeout_secs);
        self.fetch(request, on_complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    use crate::error::FetchError;

    fn client_without_tool() -> FetchClient {
        FetchClient::new(FetchConfig::default().with_tool_paths(Vec::<String>::new()))
    }

    #[test]
    fn default_client_uses_default_config() {
        assert_eq!(FetchClient::default().config(), &FetchConfig::default());
    }

    #[test]
    fn fetch_delivers_on_worker_thread() {
        let (tx, rx) = mpsc::channel();
        let caller = thread::current().id();
        let handle = client_without_tool()
            .fetch(FetchRequest::get("http://example.invalid/"), move |c| {
                tx.send((thread::current().id(), c)).unwrap();
            })
            .unwrap();
        handle.join().unwrap();

        let (worker, completion) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(worker, caller);
        assert!(matches!(completion.result, Err(FetchError::ToolNotFound { .. })));
        assert!(rx.try_recv().is_err(), "callback must fire once");
    }

    #[test]
    fn get_empty_url_reports_empty_url() {
        let (tx, rx) = mpsc::channel();
        client_without_tool()
            .get("", BTreeMap::new(), 5, move |c| tx.send(c).unwrap())
            .unwrap()
            .join()
            .unwrap();
        let completion = rx.recv().unwrap();
        assert_eq!(completion.status_code(), -1);
        assert_eq!(completion.text(), "cannot fetch empty URL");
        assert_eq!(completion.url, "");
    }

    #[test]
    fn execute_runs_inline() {
        let completion = client_without_tool().execute(FetchRequest::get(""));
        assert!(matches!(completion.result, Err(FetchError::EmptyUrl)));
    }
}
