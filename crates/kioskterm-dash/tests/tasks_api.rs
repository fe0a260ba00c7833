//! Task producer against a local HTTP server.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use kioskterm_dash::config::TasksConfig;
use kioskterm_dash::producers::TaskProducer;
use kioskterm_dash::scheduler::Producer;
use kioskterm_dash::RefreshError;
use time::UtcOffset;

const BODY: &str = r#"[
    {"id": "1", "content": "water plants", "priority": 1},
    {"id": "2", "content": "file taxes", "priority": 4, "due": {"date": "2020-04-15"}},
    {"id": 3, "content": "call mom", "priority": 3, "due": {"date": "2999-01-01"}},
    {"id": "4", "content": "renew passport", "priority": 4}
]"#;

/// Serve `status`/`body` to every request. Returns the URL, a receiver of
/// the `Authorization` headers seen and a stop sender.
fn start_mock_api(status: u16, body: &'static str) -> (String, mpsc::Receiver<String>, mpsc::Sender<()>) {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("Failed to start test server");
    let port = server.server_addr().to_ip().expect("ip addr").port();
    let url = format!("http://127.0.0.1:{port}/rest/v2/tasks");

    let (auth_tx, auth_rx) = mpsc::channel();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    thread::spawn(move || {
        loop {
            if stop_rx.try_recv().is_ok() {
                break;
            }
            match server.recv_timeout(Duration::from_millis(100)) {
                Ok(Some(request)) => {
                    let auth = request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("Authorization"))
                        .map(|h| h.value.as_str().to_string())
                        .unwrap_or_default();
                    let _ = auth_tx.send(auth);
                    let response = tiny_http::Response::from_string(body)
                        .with_status_code(status)
                        .with_header(
                            tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                                .expect("header"),
                        );
                    let _ = request.respond(response);
                }
                Ok(None) => {}
                Err(_) => break,
            }
        }
    });
    (url, auth_rx, stop_tx)
}

fn producer(url: &str, limit: usize) -> TaskProducer {
    let cfg = TasksConfig {
        api_url: url.to_string(),
        token_env: "KIOSKTERM_TEST_TOKEN_NEVER_SET".to_string(),
        limit,
        timeout_secs: 5,
    };
    TaskProducer::from_config(&cfg, UtcOffset::UTC)
}

#[test]
fn fetches_sorts_and_flags_overdue() {
    let (url, auth, stop) = start_mock_api(200, BODY);
    let list = producer(&url, 3).fetch_tasks("s3cret").expect("fetch");

    assert_eq!(
        auth.recv_timeout(Duration::from_secs(2)).expect("request seen"),
        "Bearer s3cret"
    );
    let order: Vec<&str> = list.items.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(order, ["file taxes", "renew passport", "call mom"]);
    assert_eq!(list.total, 4);
    assert!(list.items[0].overdue);
    assert!(!list.items[2].overdue);
    assert_eq!(list.items[2].id, "3");
    let _ = stop.send(());
}

#[test]
fn http_error_status_is_reported() {
    let (url, _auth, stop) = start_mock_api(401, "unauthorized");
    let err = producer(&url, 5).fetch_tasks("wrong").expect_err("401");
    match err {
        RefreshError::Http(msg) => assert!(msg.starts_with("401"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }
    let _ = stop.send(());
}

#[test]
fn malformed_body_is_a_parse_error() {
    let (url, _auth, stop) = start_mock_api(200, "{\"oops\": true}");
    let err = producer(&url, 5).fetch_tasks("t").expect_err("bad body");
    assert!(matches!(err, RefreshError::Parse(_)), "{err}");
    let _ = stop.send(());
}

#[test]
fn missing_token_is_unavailable_without_a_request() {
    let (url, auth, stop) = start_mock_api(200, BODY);
    let err = producer(&url, 5).produce().expect_err("no token");
    assert!(
        matches!(&err, RefreshError::Unavailable(msg) if msg.contains("KIOSKTERM_TEST_TOKEN_NEVER_SET")),
        "{err}"
    );
    assert!(auth.recv_timeout(Duration::from_millis(200)).is_err());
    let _ = stop.send(());
}

#[test]
fn unreachable_server_is_an_http_error() {
    // Bind then drop to get a port nobody listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("bind")
        .port();
    let err = producer(&format!("http://127.0.0.1:{port}/"), 5)
        .fetch_tasks("t")
        .expect_err("refused");
    assert!(matches!(err, RefreshError::Http(_)), "{err}");
}
