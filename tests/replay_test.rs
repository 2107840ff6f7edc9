//! Replaying transcripts against a raw-socket upstream.

mod common;

use common::{start_proxy, start_upstream, wait_for_transcripts, MockResponse};

use capture_proxy::replay::ReplayError;
use capture_proxy::{replay, ProxyConfig, ReplayOptions, TranscriptStore};

#[tokio::test]
async fn replays_get_and_writes_body_only() {
    let upstream = start_upstream(MockResponse::ok("replayed").header("X-From", "mock")).await;
    let payload = format!("GET {} HTTP/1.1\r\nuser-agent: test\r\n\r\n", upstream.url("/x"));

    let mut out = Vec::new();
    let status = replay(payload.as_bytes(), &ReplayOptions::default(), &mut out)
        .await
        .unwrap();

    assert_eq!(status, 200);
    assert_eq!(out, b"replayed");

    let received = upstream.last_request();
    assert!(received.starts_with("GET /x HTTP/1.1\r\n"), "{received}");
    assert!(received.contains("user-agent: test\r\n"));
}

#[tokio::test]
async fn replays_post_body_verbatim() {
    let upstream = start_upstream(MockResponse::ok("")).await;
    let payload = format!(
        "POST {} HTTP/1.1\r\ncontent-type: application/x-www-form-urlencoded\r\n\r\nhello=world",
        upstream.url("/form")
    );

    replay(payload.as_bytes(), &ReplayOptions::default(), &mut Vec::new())
        .await
        .unwrap();

    let received = upstream.last_request();
    assert!(received.starts_with("POST /form HTTP/1.1\r\n"));
    assert!(received.ends_with("\r\n\r\nhello=world"), "{received}");
}

#[tokio::test]
async fn include_writes_status_line_and_headers() {
    let upstream = start_upstream(MockResponse::ok("body").header("X-From", "mock")).await;
    let payload = format!("GET {} HTTP/1.1\r\n\r\n", upstream.url("/"));

    let options = ReplayOptions {
        include_headers: true,
        ..ReplayOptions::default()
    };
    let mut out = Vec::new();
    replay(payload.as_bytes(), &options, &mut out).await.unwrap();

    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"), "{out}");
    assert!(out.contains("x-from: mock\r\n"));
    assert!(out.ends_with("\r\n\r\nbody"));
}

#[tokio::test]
async fn verbose_echoes_the_request_first() {
    let upstream = start_upstream(MockResponse::ok("answer")).await;
    let url = upstream.url("/v");
    let payload = format!("PUT {url} HTTP/1.1\r\na: 1\r\n\r\ndata");

    let options = ReplayOptions {
        verbose: true,
        ..ReplayOptions::default()
    };
    let mut out = Vec::new();
    replay(payload.as_bytes(), &options, &mut out).await.unwrap();

    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with(&format!("PUT {url} HTTP/1.1\r\na: 1\r\n\r\ndata\r\n")), "{out}");
    assert!(out.ends_with("answer"));
}

#[tokio::test]
async fn upstream_status_is_returned() {
    let upstream = start_upstream(MockResponse::new("503 Service Unavailable", "busy")).await;
    let payload = format!("GET {} HTTP/1.1\r\n\r\n", upstream.url("/"));

    let mut out = Vec::new();
    let status = replay(payload.as_bytes(), &ReplayOptions::default(), &mut out)
        .await
        .unwrap();
    assert_eq!(status, 503);
    assert_eq!(out, b"busy");
}

#[tokio::test]
async fn malformed_transcript_is_rejected() {
    let err = replay(b"GET /\r\n\r\n", &ReplayOptions::default(), &mut Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ReplayError::Parse(_)));
}

#[tokio::test]
async fn captured_request_saves_and_replays() {
    let out = tempfile::tempdir().unwrap();
    let store_dir = tempfile::tempdir().unwrap();
    let upstream = start_upstream(MockResponse::ok("again")).await;

    let mut config = ProxyConfig::for_target(upstream.url("/root/"));
    config.capture_requests = true;
    config.output_directory = Some(out.path().to_path_buf());
    let proxy = start_proxy(config).await;

    reqwest::Client::new()
        .post(proxy.url("/something"))
        .body("hello=world")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let files = wait_for_transcripts(out.path(), "req", 1).await;
    assert_eq!(files.len(), 1);

    let store = TranscriptStore::new(store_dir.path().join("save"));
    store.save(&files[0], "favourite").await.unwrap();
    let payload = store.load("favourite").await.unwrap();

    let mut body = Vec::new();
    let status = replay(&payload, &ReplayOptions::default(), &mut body)
        .await
        .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, b"again");

    let requests = upstream.requests();
    assert_eq!(requests.len(), 2);
    let replayed = String::from_utf8_lossy(&requests[1]).into_owned();
    assert!(replayed.starts_with("POST /root/something HTTP/1.1\r\n"), "{replayed}");
    assert!(replayed.ends_with("\r\n\r\nhello=world"), "{replayed}");
}
