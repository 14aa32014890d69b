//! Fetches through a real curl against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then runs requests through the
//! curl-backed client and compares with a direct ureq round-trip. Skipped
//! (with a note on stderr) when no curl binary is installed.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::mpsc;
use std::time::Duration;

use curlfetch_core::{locate, FetchClient, FetchConfig, FetchError, FetchRequest};

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });
    addr
}

fn curl_client() -> Option<FetchClient> {
    // loopback traffic must not go through any proxy configured on the host
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    std::env::set_var("no_proxy", "127.0.0.1,localhost");

    let config = FetchConfig::default().with_env_override();
    if locate(&config.tool_paths).is_none() {
        eprintln!("curl not installed; skipping live fetch test");
        return None;
    }
    Some(FetchClient::new(config))
}

/// Fetch `url` directly with ureq, returning status and body.
fn direct(url: &str) -> (u16, String) {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();
    let mut response = agent.get(url).call().expect("HTTP transport error");
    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string().unwrap_or_default();
    (status, body)
}

#[test]
fn live_fetches_match_direct_requests() {
    let Some(client) = curl_client() else {
        return;
    };
    let base = format!("http://{}", start_server());

    // Step 1: plain 200 body matches a direct request.
    let url = format!("{base}/hello");
    let completion = client.execute(FetchRequest::get(&url).timeout_secs(10));
    let (status, body) = direct(&url);
    assert_eq!(completion.status_code(), i32::from(status));
    assert_eq!(completion.text(), body);
    assert_eq!(completion.url, url);

    // Step 2: headers reach the server.
    let completion = client.execute(
        FetchRequest::get(format!("{base}/echo-header/x-probe"))
            .header("X-Probe", "from curl")
            .timeout_secs(10),
    );
    assert_eq!(completion.status_code(), 200);
    assert_eq!(completion.text(), "from curl");

    // Step 3: a 404 yields the reason phrase, not the body.
    let completion = client.execute(FetchRequest::get(format!("{base}/missing")).timeout_secs(10));
    assert_eq!(completion.status_code(), 404);
    assert_eq!(completion.text(), "Not Found");

    // Step 4: a large body arrives intact.
    let completion = client.execute(FetchRequest::get(format!("{base}/bytes/1000000")).timeout_secs(10));
    let response = completion.result.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body.len(), 1_000_000);
}

#[test]
fn live_fetch_respects_size_limit() {
    let Some(client) = curl_client() else {
        return;
    };
    let base = format!("http://{}", start_server());
    let client = FetchClient::new(client.config().clone().with_max_response_bytes(64 * 1024));

    let completion = client.execute(FetchRequest::get(format!("{base}/bytes/1000000")).timeout_secs(10));
    assert!(matches!(completion.result, Err(FetchError::TooLong)));
}

#[test]
fn refused_connection_is_execution_failure() {
    let Some(client) = curl_client() else {
        return;
    };
    // bind then drop to get a port with nothing listening
    let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

    let (tx, rx) = mpsc::channel();
    client
        .get(format!("http://{addr}/"), BTreeMap::new(), 10, move |c| tx.send(c).unwrap())
        .unwrap();
    let completion = rx.recv_timeout(Duration::from_secs(30)).unwrap();
    assert_eq!(completion.status_code(), -1);
    assert!(matches!(
        completion.result,
        Err(FetchError::ToolExecutionFailed { .. })
    ));
}
