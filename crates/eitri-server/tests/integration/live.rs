/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Live viewers over a real socket.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::fixtures::TestFixture;

type Viewer = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server(fixture: &TestFixture) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = fixture.create_test_router();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, id: &str) -> Viewer {
    let (viewer, _) = connect_async(format!("ws://{}/ws?id={}", addr, id))
        .await
        .unwrap();
    viewer
}

async fn subscribe(viewer: &mut Viewer, pod: &str) {
    let message = json!({
        "event": "logs:subscribe",
        "resource_name": pod,
        "resource_namespace": "jobs",
        "data": {}
    });
    viewer
        .send(Message::Text(message.to_string().into()))
        .await
        .unwrap();
}

/// Reads frames until every expected line was seen or the deadline passes.
async fn collect_lines(viewer: &mut Viewer, expected: &[&str]) -> HashSet<String> {
    let mut seen = HashSet::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !expected.iter().all(|line| seen.contains(*line)) {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let Ok(Some(Ok(message))) = timeout(remaining, viewer.next()).await else {
            break;
        };
        if message.is_text() {
            let frame: Value = serde_json::from_str(message.to_text().unwrap()).unwrap();
            seen.insert(frame["data"].as_str().unwrap().to_string());
        }
    }
    seen
}

#[tokio::test]
async fn test_two_viewers_in_same_room_both_receive_lines() {
    let fixture = TestFixture::new();
    fixture
        .cluster
        .script_pod("report-abc-1", &["line 1", "line 2", "line 3"]);
    let addr = start_server(&fixture).await;

    let mut first = connect(addr, "42").await;
    let mut second = connect(addr, "42").await;
    subscribe(&mut first, "report-abc-1").await;
    subscribe(&mut second, "report-abc-1").await;

    let expected = ["line 1", "line 2", "line 3"];
    let first_seen = collect_lines(&mut first, &expected).await;
    let second_seen = collect_lines(&mut second, &expected).await;

    for line in expected {
        assert!(first_seen.contains(line), "first viewer missed {}", line);
        assert!(second_seen.contains(line), "second viewer missed {}", line);
    }
    // One upstream follow per subscriber
    let mut follows = 0;
    for _ in 0..50 {
        follows = fixture.cluster.follows.lock().unwrap().len();
        if follows == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(follows, 2);
}

#[tokio::test]
async fn test_viewer_in_other_room_receives_nothing() {
    let fixture = TestFixture::new();
    fixture.cluster.script_pod("report-abc-1", &["secret line"]);
    let addr = start_server(&fixture).await;

    let mut watcher = connect(addr, "42").await;
    let mut bystander = connect(addr, "43").await;
    subscribe(&mut watcher, "report-abc-1").await;

    let seen = collect_lines(&mut watcher, &["secret line"]).await;
    assert!(seen.contains("secret line"));

    let nothing = timeout(Duration::from_millis(200), bystander.next()).await;
    assert!(nothing.is_err());
}

#[tokio::test]
async fn test_unknown_pod_reports_error_frame() {
    let fixture = TestFixture::new();
    let addr = start_server(&fixture).await;

    let mut viewer = connect(addr, "42").await;
    subscribe(&mut viewer, "ghost").await;

    let expected = "error: pods \"ghost\" not found";
    let seen = collect_lines(&mut viewer, &[expected]).await;
    assert!(seen.contains(expected));
}

#[tokio::test]
async fn test_malformed_message_keeps_connection_open() {
    let fixture = TestFixture::new();
    fixture.cluster.script_pod("report-abc-1", &["still here"]);
    let addr = start_server(&fixture).await;

    let mut viewer = connect(addr, "42").await;
    viewer
        .send(Message::Text("not json".into()))
        .await
        .unwrap();
    viewer
        .send(Message::Text(r#"{"event": "logs:unsubscribe"}"#.into()))
        .await
        .unwrap();
    subscribe(&mut viewer, "report-abc-1").await;

    let seen = collect_lines(&mut viewer, &["still here"]).await;
    assert!(seen.contains("still here"));
}

/// Polls until `check` holds, giving the server tasks time to settle.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_closing_socket_drops_upstream_follow() {
    let fixture = TestFixture::new();
    fixture.cluster.script_pod("report-abc-1", &["hello"]);
    let addr = start_server(&fixture).await;

    let mut viewer = connect(addr, "42").await;
    subscribe(&mut viewer, "report-abc-1").await;
    collect_lines(&mut viewer, &["hello"]).await;
    assert_eq!(fixture.cluster.open_follows(), 1);

    viewer.close(None).await.unwrap();
    drop(viewer);

    assert!(eventually(|| fixture.cluster.open_follows() == 0).await);
}

#[tokio::test]
async fn test_resubscribe_replaces_previous_follow() {
    let fixture = TestFixture::new();
    fixture.cluster.script_pod("report-abc-1", &["first pod"]);
    fixture.cluster.script_pod("report-abc-2", &["second pod"]);
    let addr = start_server(&fixture).await;

    let mut viewer = connect(addr, "42").await;
    subscribe(&mut viewer, "report-abc-1").await;
    collect_lines(&mut viewer, &["first pod"]).await;
    subscribe(&mut viewer, "report-abc-2").await;
    let seen = collect_lines(&mut viewer, &["second pod"]).await;
    assert!(seen.contains("second pod"));

    assert!(eventually(|| fixture.cluster.follows.lock().unwrap().len() == 2).await);
    assert!(eventually(|| fixture.cluster.open_follows() == 1).await);
    // Still one open follow once things have settled
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fixture.cluster.open_follows(), 1);
}

#[tokio::test]
async fn test_disconnect_cleans_up_hub() {
    let fixture = TestFixture::new();
    fixture.cluster.script_pod("report-abc-1", &["hello"]);
    let addr = start_server(&fixture).await;

    let mut viewer = connect(addr, "42").await;
    subscribe(&mut viewer, "report-abc-1").await;
    collect_lines(&mut viewer, &["hello"]).await;

    let snapshot = fixture.hub.snapshot().await.unwrap();
    assert_eq!(snapshot.clients, 1);
    assert_eq!(snapshot.rooms.get("42"), Some(&1));

    viewer.close(None).await.unwrap();
    drop(viewer);

    let mut cleaned = false;
    for _ in 0..100 {
        let snapshot = fixture.hub.snapshot().await.unwrap();
        if snapshot.clients == 0 && snapshot.rooms.is_empty() {
            cleaned = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(cleaned);
}
