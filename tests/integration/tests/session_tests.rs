//! Session lifecycle tests
//!
//! Drives real WebSocket clients against a gateway on an ephemeral port.

use futures_util::{SinkExt, StreamExt};
use integration_tests::*;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use wsgate::pump::JsonDecoder;
use wsgate::server::session_route;

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start_with(&[("WS_MAX_CONNECTIONS", "4")])
        .await
        .expect("Failed to start server");

    let response = server.get("/health").await.expect("Request failed");
    let body: Value = assert_json(response, StatusCode::OK)
        .await
        .expect("Invalid response");

    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 0);
    assert_eq!(body["max_connections"], 4);
    assert_eq!(body["available_permits"], 4);
}

#[tokio::test]
async fn test_health_counts_sessions() {
    let server = TestServer::start().await.expect("Failed to start server");
    let _ws = server.connect("/ws").await.expect("Connect failed");
    server.wait_for_sessions(1).await.expect("Session not registered");

    let response = server.get("/health").await.expect("Request failed");
    let body: Value = assert_json(response, StatusCode::OK)
        .await
        .expect("Invalid response");
    assert_eq!(body["sessions"], 1);
}

// =============================================================================
// Echo route
// =============================================================================

#[tokio::test]
async fn test_echo_preserves_order() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut ws = server.connect("/ws").await.expect("Connect failed");

    for i in 0..20 {
        ws.send(Message::Text(format!("msg-{i}").into()))
            .await
            .expect("Send failed");
    }
    for i in 0..20 {
        let text = recv_text(&mut ws).await.expect("Missing echo");
        assert_eq!(text, format!("msg-{i}"));
    }

    ws.send(Message::Binary(vec![1, 2, 3].into()))
        .await
        .expect("Send failed");
    match recv(&mut ws).await.expect("Missing echo") {
        Message::Binary(data) => assert_eq!(data.to_vec(), vec![1, 2, 3]),
        other => panic!("expected binary echo, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_close_ends_session() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut ws = server.connect("/ws").await.expect("Connect failed");
    server.wait_for_sessions(1).await.expect("Session not registered");

    ws.send(Message::Text("last".into())).await.expect("Send failed");
    ws.close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "bye".into(),
    }))
    .await
    .expect("Close failed");

    assert_eq!(recv_text(&mut ws).await.expect("Missing echo"), "last");
    assert_eq!(recv_close(&mut ws).await.expect("Missing close"), 1000);

    server.wait_for_sessions(0).await.expect("Session not removed");
}

#[tokio::test]
async fn test_dropped_client_releases_session() {
    let server = TestServer::start_with(&[("WS_MAX_CONNECTIONS", "1")])
        .await
        .expect("Failed to start server");

    let ws = server.connect("/ws").await.expect("Connect failed");
    server.wait_for_sessions(1).await.expect("Session not registered");
    assert_eq!(server.state.gate().available(), Some(0));

    drop(ws);

    server.wait_for_sessions(0).await.expect("Session not removed");
    assert_eq!(server.state.gate().available(), Some(1));
}

// =============================================================================
// Timers
// =============================================================================

#[tokio::test]
async fn test_keepalive_pings_client() {
    let server = TestServer::start_with(&[
        ("WS_PONG_WAIT_MS", "2000"),
        ("WS_PING_PERIOD_MS", "100"),
    ])
    .await
    .expect("Failed to start server");
    let mut ws = server.connect("/ws").await.expect("Connect failed");

    let ping = tokio::time::timeout(STEP_TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_))) => return true,
                Some(Ok(_)) => {}
                _ => return false,
            }
        }
    })
    .await
    .expect("No ping before timeout");
    assert!(ping);
}

#[tokio::test]
async fn test_silent_client_times_out() {
    let server = TestServer::start_with(&[
        ("WS_PONG_WAIT_MS", "200"),
        ("WS_PING_PERIOD_MS", "0"),
    ])
    .await
    .expect("Failed to start server");
    let mut ws = server.connect("/ws").await.expect("Connect failed");

    let started = tokio::time::Instant::now();
    assert_eq!(recv_close(&mut ws).await.expect("Missing close"), 1011);
    assert!(started.elapsed() < Duration::from_secs(2));

    server.wait_for_sessions(0).await.expect("Session not removed");
}

// =============================================================================
// Typed route
// =============================================================================

#[tokio::test]
async fn test_json_route_dispatches_orders() {
    let server = TestServer::start_with_routes(&[], |router| {
        router.route(
            "/orders",
            session_route(JsonDecoder::<Order>::default(), OrderHandler),
        )
    })
    .await
    .expect("Failed to start server");
    let mut ws = server.connect("/orders").await.expect("Connect failed");

    ws.send(Message::Text(order_json("tea", 2).into()))
        .await
        .expect("Send failed");
    ws.send(Message::Text(order_json("cake", 1).into()))
        .await
        .expect("Send failed");

    assert_eq!(recv_text(&mut ws).await.unwrap(), "ack tea x2");
    assert_eq!(recv_text(&mut ws).await.unwrap(), "ack cake x1");
}

#[tokio::test]
async fn test_malformed_json_closes_session() {
    let server = TestServer::start_with_routes(&[], |router| {
        router.route(
            "/orders",
            session_route(JsonDecoder::<Order>::default(), OrderHandler),
        )
    })
    .await
    .expect("Failed to start server");
    let mut ws = server.connect("/orders").await.expect("Connect failed");

    ws.send(Message::Text(order_json("tea", 2).into()))
        .await
        .expect("Send failed");
    ws.send(Message::Text("{not json".into()))
        .await
        .expect("Send failed");
    // Sent after the failure; never dispatched
    let _ = ws.send(Message::Text(order_json("late", 1).into())).await;

    assert_eq!(recv_text(&mut ws).await.unwrap(), "ack tea x2");
    assert_eq!(recv_close(&mut ws).await.unwrap(), 1003);
    server.wait_for_sessions(0).await.expect("Session not removed");
}

#[tokio::test]
async fn test_invalid_order_closes_with_invalid_payload() {
    let server = TestServer::start_with_routes(&[], |router| {
        router.route(
            "/orders",
            session_route(JsonDecoder::<Order>::default(), OrderHandler),
        )
    })
    .await
    .expect("Failed to start server");
    let mut ws = server.connect("/orders").await.expect("Connect failed");

    ws.send(Message::Text(order_json("tea", 500).into()))
        .await
        .expect("Send failed");

    assert_eq!(recv_close(&mut ws).await.unwrap(), 1007);
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test]
async fn test_shutdown_sends_going_away() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut ws = server.connect("/ws").await.expect("Connect failed");
    server.wait_for_sessions(1).await.expect("Session not registered");

    server.shutdown().await.expect("Shutdown failed");

    assert_eq!(recv_close(&mut ws).await.expect("Missing close"), 1001);
}
