//! One in-flight fetch: spawn the tool, multiplex its pipes, frame the output.
//!
//! # Design
//! A `FetchOperation` owns everything a request needs: the request itself,
//! the capture buffer and, while running, the child process and the read
//! ends of its stdout/stderr pipes. It is consumed by [`FetchOperation::run`],
//! which delivers exactly one [`Completion`] and then drops the operation.
//!
//! The loop waits on both pipes with `poll(2)` in slices no longer than
//! `FetchConfig::poll_interval`. Every chunk read from stdout pushes the
//! deadline out by the request timeout, so the timeout measures a stall rather
//! than total duration. The child is always reaped and both pipes closed
//! before the completion is built.

use std::io::{self, Read};
use std::os::fd::{AsRawFd, RawFd};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, trace, warn};
use uuid::Uuid;

use crate::args::build_args;
use crate::config::FetchConfig;
use crate::error::{FetchError, FetchResult};
use crate::framing::parse_response;
use crate::http::{Completion, FetchRequest, FetchResponse};
use crate::locator::locate;

/// Size of a single pipe read.
const READ_CHUNK: usize = 16 * 1024;

/// Poll slice used once both pipes have closed and only the exit is pending.
const REAP_INTERVAL: Duration = Duration::from_millis(10);

/// Why the multiplexing loop stopped.
#[derive(Debug)]
enum Stop {
    Exited(ExitStatus),
    TimedOut,
    TooLong,
    PipeError,
}

/// Result of reading one chunk from a pipe.
enum ReadOutcome {
    Data(usize),
    Pending,
    Eof,
}

/// A single fetch, consumed by [`FetchOperation::run`] or
/// [`FetchOperation::into_completion`].
pub struct FetchOperation {
    id: Uuid,
    request: FetchRequest,
    config: Arc<FetchConfig>,
    buffer: Vec<u8>,
}

impl FetchOperation {
    pub fn new(request: FetchRequest, config: Arc<FetchConfig>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            config,
            buffer: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &FetchRequest {
        &self.request
    }

    /// Perform the fetch, hand the completion to `on_complete`, then drop the
    /// operation.
    pub fn run<F>(mut self, on_complete: F)
    where
        F: FnOnce(Completion),
    {
        let completion = self.perform();
        on_complete(completion);
    }

    /// Perform the fetch and return the completion instead of calling back.
    pub fn into_completion(mut self) -> Completion {
        self.perform()
    }

    fn perform(&mut self) -> Completion {
        let span = info_span!(
            "fetch",
            id = %self.id,
            method = %self.request.method,
            url = %self.request.url,
        );
        let _guard = span.enter();

        let result = self.execute();
        match &result {
            Ok(response) => info!(
                status = response.status,
                bytes = response.body.len(),
                "fetch completed"
            ),
            Err(e) => warn!(error = %e, "fetch failed"),
        }
        Completion::new(self.request.url.clone(), result)
    }

    fn execute(&mut self) -> FetchResult<FetchResponse> {
        if self.request.url.is_empty() {
            return Err(FetchError::EmptyUrl);
        }

        let tool = locate(&self.config.tool_paths).ok_or_else(|| FetchError::ToolNotFound {
            searched: self.config.tool_paths.clone(),
        })?;
        let args = build_args(&self.request);

        debug!(tool = %tool.display(), args = args.len(), "spawning fetch tool");
        let mut child = Command::new(&tool)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(FetchError::SpawnFailed)?;

        let mut pipes = match Pipes::take(&mut child) {
            Ok(pipes) => pipes,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(FetchError::SpawnFailed(e));
            }
        };

        let timeout = Duration::from_secs(u64::from(self.request.timeout_secs));
        let (stop, deadline) = self.multiplex(&mut child, &mut pipes, timeout);

        let status = match stop {
            Stop::Exited(status) => Some(status),
            Stop::TimedOut | Stop::TooLong => {
                // already signalled; this wait is bounded
                child.wait().ok()
            }
            Stop::PipeError => reap_until(&mut child, deadline),
        };
        drop(pipes);

        match stop {
            Stop::TimedOut => Err(FetchError::TimedOut),
            Stop::TooLong => Err(FetchError::TooLong),
            Stop::PipeError if status.is_none() => Err(FetchError::TimedOut),
            Stop::Exited(_) | Stop::PipeError => match status {
                Some(status) if status.success() => parse_response(&self.buffer),
                Some(status) => Err(FetchError::ToolExecutionFailed {
                    code: status.code(),
                }),
                None => Err(FetchError::ToolExecutionFailed { code: None }),
            },
        }
    }

    /// Run the readiness loop until the child exits, stalls, overflows, or a
    /// pipe reports an error. Returns the reason and the last deadline.
    fn multiplex(
        &mut self,
        child: &mut Child,
        pipes: &mut Pipes,
        timeout: Duration,
    ) -> (Stop, Instant) {
        let max = self.config.max_response_bytes;
        let mut deadline = Instant::now() + timeout;
        let mut scratch = vec![0u8; READ_CHUNK];

        loop {
            let slice = if pipes.is_closed() {
                REAP_INTERVAL
            } else {
                self.config.poll_interval
            };
            let wait = slice.min(deadline.saturating_duration_since(Instant::now()));

            let ready = match pipes.poll(wait) {
                Ok(ready) => ready,
                Err(e) => {
                    warn!(error = %e, "poll failed");
                    return (Stop::PipeError, deadline);
                }
            };

            if ready.stdout {
                match read_chunk(pipes.stdout.as_mut(), &mut scratch) {
                    Ok(ReadOutcome::Data(n)) => {
                        self.buffer.extend_from_slice(&scratch[..n]);
                        deadline = Instant::now() + timeout;
                        trace!(read = n, total = self.buffer.len(), "stdout progress");
                        if self.buffer.len() > max {
                            warn!(limit = max, "response exceeds size limit; killing tool");
                            kill(child);
                            return (Stop::TooLong, deadline);
                        }
                    }
                    Ok(ReadOutcome::Pending) => {}
                    Ok(ReadOutcome::Eof) => pipes.stdout = None,
                    Err(e) => {
                        warn!(error = %e, "stdout read failed");
                        return (Stop::PipeError, deadline);
                    }
                }
            }

            if ready.stderr {
                match read_chunk(pipes.stderr.as_mut(), &mut scratch) {
                    Ok(ReadOutcome::Data(n)) => {
                        let text = String::from_utf8_lossy(&scratch[..n]);
                        debug!(stderr = %text.trim_end(), "tool diagnostics");
                    }
                    Ok(ReadOutcome::Pending) => {}
                    Ok(ReadOutcome::Eof) => pipes.stderr = None,
                    Err(e) => {
                        warn!(error = %e, "stderr read failed");
                        return (Stop::PipeError, deadline);
                    }
                }
            }

            if ready.error {
                return (Stop::PipeError, deadline);
            }

            if Instant::now() >= deadline {
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "no progress before deadline; killing tool"
                );
                kill(child);
                return (Stop::TimedOut, deadline);
            }

            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(%status, "tool exited");
                    if !self.drain_stdout(pipes, &mut scratch) {
                        return (Stop::TooLong, deadline);
                    }
                    return (Stop::Exited(status), deadline);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "checking tool status failed");
                    return (Stop::PipeError, deadline);
                }
            }
        }
    }

    /// Read whatever the exited child left in the stdout pipe. Returns false
    /// if the size limit was crossed.
    fn drain_stdout(&mut self, pipes: &mut Pipes, scratch: &mut [u8]) -> bool {
        loop {
            match read_chunk(pipes.stdout.as_mut(), scratch) {
                Ok(ReadOutcome::Data(n)) => {
                    self.buffer.extend_from_slice(&scratch[..n]);
                    if self.buffer.len() > self.config.max_response_bytes {
                        return false;
                    }
                }
                Ok(ReadOutcome::Eof) => {
                    pipes.stdout = None;
                    return true;
                }
                Ok(ReadOutcome::Pending) | Err(_) => return true,
            }
        }
    }
}

/// Read ends of the child's stdout and stderr pipes. `None` once closed.
struct Pipes {
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

struct Readiness {
    stdout: bool,
    stderr: bool,
    error: bool,
}

impl Pipes {
    /// Take both read ends from `child` and switch them to non-blocking mode.
    fn take(child: &mut Child) -> io::Result<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr was not captured"))?;
        set_nonblocking(stdout.as_raw_fd())?;
        set_nonblocking(stderr.as_raw_fd())?;
        Ok(Self {
            stdout: Some(stdout),
            stderr: Some(stderr),
        })
    }

    fn is_closed(&self) -> bool {
        self.stdout.is_none() && self.stderr.is_none()
    }

    /// Wait up to `timeout` for either pipe to become readable.
    ///
    /// Closed pipes are passed as `-1`, which `poll(2)` ignores, so the call
    /// degrades to a plain sleep once both are closed.
    fn poll(&self, timeout: Duration) -> io::Result<Readiness> {
        let mut fds = [
            pollfd(self.stdout.as_ref().map(AsRawFd::as_raw_fd)),
            pollfd(self.stderr.as_ref().map(AsRawFd::as_raw_fd)),
        ];
        let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);

        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, millis) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(Readiness {
                    stdout: false,
                    stderr: false,
                    error: false,
                });
            }
            return Err(err);
        }

        let readable = libc::POLLIN | libc::POLLHUP;
        let failed = libc::POLLERR | libc::POLLNVAL;
        Ok(Readiness {
            stdout: fds[0].revents & readable != 0,
            stderr: fds[1].revents & readable != 0,
            error: (fds[0].revents | fds[1].revents) & failed != 0,
        })
    }
}

fn pollfd(fd: Option<RawFd>) -> libc::pollfd {
    libc::pollfd {
        fd: fd.unwrap_or(-1),
        events: libc::POLLIN,
        revents: 0,
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn read_chunk<R: Read>(pipe: Option<&mut R>, scratch: &mut [u8]) -> io::Result<ReadOutcome> {
    let Some(pipe) = pipe else {
        return Ok(ReadOutcome::Eof);
    };
    match pipe.read(scratch) {
        Ok(0) => Ok(ReadOutcome::Eof),
        Ok(n) => Ok(ReadOutcome::Data(n)),
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
            Ok(ReadOutcome::Pending)
        }
        Err(e) => Err(e),
    }
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "kill failed; tool already gone");
    }
}

/// Wait for the child without blocking past `deadline`; kill and reap it if
/// the deadline passes. Returns `None` when it had to be killed.
fn reap_until(child: &mut Child, deadline: Instant) -> Option<ExitStatus> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) if Instant::now() < deadline => std::thread::sleep(REAP_INTERVAL),
            Ok(None) | Err(_) => {
                kill(child);
                let _ = child.wait();
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operation(url: &str, config: FetchConfig) -> FetchOperation {
        FetchOperation::new(FetchRequest::get(url), Arc::new(config))
    }

    #[test]
    fn empty_url_fails_before_locating_tool() {
        let config = FetchConfig::default().with_tool_paths(Vec::<String>::new());
        let completion = operation("", config).into_completion();
        assert!(matches!(completion.result, Err(FetchError::EmptyUrl)));
        assert_eq!(completion.status_code(), -1);
    }

    #[test]
    fn empty_url_never_spawns_tool() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("spawned");
        let tool = dir.path().join("curl");
        std::fs::write(
            &tool,
            format!("#!/bin/sh\ntouch '{}'\nprintf 'HTTP/1.1 200 OK\\n\\n'\n", marker.display()),
        )
        .unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        let config = FetchConfig::default().with_tool_paths([tool]);

        let completion = operation("", config.clone()).into_completion();
        assert!(matches!(completion.result, Err(FetchError::EmptyUrl)));
        assert!(!marker.exists(), "tool must not run for an empty URL");

        let completion = operation("http://example.invalid/", config).into_completion();
        assert_eq!(completion.status_code(), 200);
        assert!(marker.exists());
    }

    #[test]
    fn missing_tool_reports_searched_paths() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("curl");
        let config = FetchConfig::default().with_tool_paths([missing.clone()]);
        let completion = operation("http://example.invalid/", config).into_completion();
        match completion.result {
            Err(FetchError::ToolNotFound { searched }) => assert_eq!(searched, vec![missing]),
            other => panic!("expected ToolNotFound, got {other:?}"),
        }
    }

    #[test]
    fn non_executable_tool_is_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("curl");
        std::fs::write(&tool, b"not a program").unwrap();
        let config = FetchConfig::default().with_tool_paths([tool]);
        let completion = operation("http://example.invalid/", config).into_completion();
        assert!(matches!(completion.result, Err(FetchError::SpawnFailed(_))));
    }

    #[test]
    fn run_invokes_callback_once_with_url() {
        let config = FetchConfig::default().with_tool_paths(Vec::<String>::new());
        let op = operation("http://example.invalid/a", config);
        let mut calls = Vec::new();
        op.run(|c| calls.push(c));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "http://example.invalid/a");
        assert!(!calls[0].redirected);
    }

    #[test]
    fn operations_get_distinct_ids() {
        let a = operation("http://a/", FetchConfig::default());
        let b = operation("http://a/", FetchConfig::default());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.request().url, "http://a/");
    }
}
