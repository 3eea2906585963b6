use std::sync::Arc;
use std::time::Duration;

use mah_config::{ConfigStore, MemoryStorage, UlidSessionKeys};
use mah_core::MessageCategory;
use mah_delivery::{HttpTransport, OutboundRequest, ReportDispatcher, Transport};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accept one connection, capture the raw request, answer with `status_line`.
async fn one_shot_server(status_line: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("http://{}/hook", listener.local_addr().expect("addr"));
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.expect("read");
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            if request_complete(&raw) {
                break;
            }
        }
        let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        socket
            .write_all(response.as_bytes())
            .await
            .expect("write response");
        String::from_utf8_lossy(&raw).into_owned()
    });
    (url, handle)
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some(split) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..split]
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    raw.len() >= split + 4 + content_length
}

#[tokio::test]
async fn test_http_transport_posts_json_with_headers() {
    let (url, server) = one_shot_server("HTTP/1.1 200 OK").await;
    let transport = HttpTransport::new(Duration::from_secs(5)).expect("client");

    let mut headers = mah_config::ExtraMap::new();
    headers.insert("X-Sig".to_string(), "abc".to_string());
    transport
        .post(&OutboundRequest {
            destination: url,
            headers,
            body: json!({"type": "heartbeat"}),
        })
        .await
        .expect("delivered");

    let raw = server.await.expect("server task").to_ascii_lowercase();
    assert!(raw.starts_with("post /hook http/1.1"));
    assert!(raw.contains("x-sig: abc"));
    assert!(raw.contains("content-type: application/json"));
    assert!(raw.ends_with(r#"{"type":"heartbeat"}"#));
}

#[tokio::test]
async fn test_http_transport_reports_error_status() {
    let (url, server) = one_shot_server("HTTP/1.1 500 Internal Server Error").await;
    let transport = HttpTransport::new(Duration::from_secs(5)).expect("client");

    let err = transport
        .post(&OutboundRequest {
            destination: url,
            headers: Default::default(),
            body: json!({}),
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("500"));
    server.await.expect("server task");
}

#[tokio::test]
async fn test_dispatcher_over_http_isolates_dead_destination() {
    let (live_url, server) = one_shot_server("HTTP/1.1 204 No Content").await;
    // Bind then drop to get a port nothing listens on.
    let dead_url = {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        format!("http://{}/hook", listener.local_addr().expect("addr"))
    };

    let storage = Arc::new(MemoryStorage::from_json(json!({
        "authKey": "k",
        "report": {"enable": true, "destinations": [dead_url, live_url]}
    })));
    let store = Arc::new(ConfigStore::open(storage, Arc::new(UlidSessionKeys)).expect("store"));
    let transport = Arc::new(HttpTransport::new(Duration::from_secs(5)).expect("client"));
    let dispatcher = ReportDispatcher::new(store, transport);

    let report = dispatcher
        .dispatch(MessageCategory::Group, &json!({"type": "GroupMessage"}))
        .await;

    assert_eq!(report.delivered.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].0.contains("/hook"));
    assert!(server.await.expect("server task").contains("GroupMessage"));
}
