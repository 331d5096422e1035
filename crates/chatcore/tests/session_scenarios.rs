// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the six seed end-to-end scenarios in spec §8,
//! driven through the public `SessionManager` API against the in-memory
//! `test-util` transport double rather than a real socket.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use chatcore::test_support::FakeTransport;
use chatcore::transport::CloseClass;
use chatcore::{ConnectionConfig, ConnectionEvent, CreateMessageParams, SdkError, SessionManager, SessionState};

fn test_config() -> ConnectionConfig {
    ConnectionConfig {
        app_id: "app-1".to_owned(),
        user_id: "user-1".to_owned(),
        access_token: "token-1".to_owned(),
        endpoint_base_url: "wss://example.test".to_owned(),
        app_version: None,
        sdk_version: "1.0.0".to_owned(),
        api_version: "v4".to_owned(),
        platform: "rust".to_owned(),
        platform_version: None,
        connect_timeout: Duration::from_secs(5),
    }
}

fn login_ok_frame() -> String {
    format!("LOGI{}", json!({"session_key": "sess-1"}))
}

async fn wait_until(done: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !done() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition was not met within the deadline");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn outbound_req_id(frame: &str) -> String {
    let body = &frame[4..];
    let value: serde_json::Value = serde_json::from_str(body).expect("valid outbound json");
    value.get("req_id").and_then(|v| v.as_str()).expect("req_id present").to_owned()
}

async fn connected() -> (SessionManager, chatcore::test_support::FakeServerHandle) {
    let (transport, server) = FakeTransport::pair();
    let manager = SessionManager::new(Box::new(transport));

    let connect = tokio::spawn({
        let manager = manager.clone();
        async move { manager.connect(test_config()).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    server.send_frame(login_ok_frame());
    tokio::time::timeout(Duration::from_secs(1), connect).await.unwrap().unwrap().unwrap();

    (manager, server)
}

/// Scenario 1: happy send — waiter resolves and the channel handler fires.
#[tokio::test]
async fn scenario_happy_send() {
    let (manager, server) = connected().await;

    let seen = Arc::new(Mutex::new(None));
    let seen_clone = seen.clone();
    manager
        .on_channel_event("observer", move |event| {
            if let chatcore::ChannelEvent::MessageReceived(message) = event {
                *seen_clone.lock().unwrap() = message.message_id;
            }
        })
        .await;

    let send = tokio::spawn({
        let manager = manager.clone();
        async move {
            manager
                .send_message("c1".to_owned(), CreateMessageParams { message: "hi".to_owned(), custom_type: None, data: None })
                .await
        }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    let outbound = server.outbound_rx.recv().await.expect("outbound frame");
    let req_id = outbound_req_id(&outbound);
    server.send_frame(format!(
        "MESG{}",
        json!({"req_id": req_id, "channel_url": "c1", "message": "hi", "message_id": 42, "created_at": 1, "user": {"user_id": "u"}})
    ));

    let result = tokio::time::timeout(Duration::from_secs(1), send).await.unwrap().unwrap();
    assert_eq!(result.unwrap().message_id, Some(42));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(*seen.lock().unwrap(), Some(42));
}

/// Scenario 2: ACK timeout — waiter resolves with an error, no reconnect.
#[tokio::test]
async fn scenario_ack_timeout() {
    let (manager, _server) = connected().await;

    let result = manager
        .send_message("c1".to_owned(), CreateMessageParams { message: "hi".to_owned(), custom_type: None, data: None })
        .await;

    assert!(result.is_err());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.state().await, SessionState::Open);
}

/// Scenario 3: reconnect on abnormal close, LOGI replayed, attempt counter
/// resets on success.
#[tokio::test]
async fn scenario_reconnect_on_abnormal_close() {
    let (manager, server) = connected().await;

    let started = Arc::new(AtomicBool::new(false));
    let succeeded = Arc::new(AtomicBool::new(false));
    let started_clone = started.clone();
    let succeeded_clone = succeeded.clone();
    manager
        .on_connection_event("observer", move |event| match event {
            ConnectionEvent::ReconnectStarted => started_clone.store(true, Ordering::SeqCst),
            ConnectionEvent::ReconnectSucceeded => succeeded_clone.store(true, Ordering::SeqCst),
            _ => {}
        })
        .await;

    server.close(CloseClass::ConnectionFailed);
    wait_until(|| started.load(Ordering::SeqCst)).await;

    tokio::time::sleep(Duration::from_millis(1100)).await;
    server.send_frame(login_ok_frame());

    wait_until(|| succeeded.load(Ordering::SeqCst)).await;
    assert_eq!(manager.state().await, SessionState::Open);
}

/// Scenario 3b: exhausting retries gives up and reports failure.
#[tokio::test]
async fn scenario_reconnect_exhausts_retries() {
    let (transport, server) = FakeTransport::pair();
    let manager = SessionManager::with_config(
        Box::new(transport),
        chatcore::SessionConfig {
            ack_timeouts: Default::default(),
            reconnection: chatcore::config::ReconnectionConfig {
                initial_delay: Duration::from_millis(10),
                backoff_multiplier: 2,
                max_delay: Duration::from_millis(50),
                max_retries: 2,
            },
            token_refresh: Default::default(),
            auto_resend: Default::default(),
            auth_timeout: Duration::from_millis(200),
        },
    );

    let connect = tokio::spawn({
        let manager = manager.clone();
        async move { manager.connect(test_config()).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    server.send_frame(login_ok_frame());
    tokio::time::timeout(Duration::from_secs(1), connect).await.unwrap().unwrap().unwrap();

    let failed = Arc::new(AtomicBool::new(false));
    let failed_clone = failed.clone();
    manager
        .on_connection_event("observer", move |event| {
            if matches!(event, ConnectionEvent::ReconnectFailed) {
                failed_clone.store(true, Ordering::SeqCst);
            }
        })
        .await;

    // Every reconnect attempt's transport connect fails outright, so the
    // campaign exhausts max_retries without ever reaching another LOGI.
    server.fail_next_connect.store(true, Ordering::SeqCst);
    server.close(CloseClass::ConnectionFailed);

    wait_until(|| failed.load(Ordering::SeqCst)).await;
    assert_eq!(manager.state().await, SessionState::Closed);
}

/// Scenario 4: EXPR triggers the refresh coordinator; providing a new token
/// reconnects and reports success.
#[tokio::test]
async fn scenario_expr_refresh_success() {
    let (manager, server) = connected().await;

    let required = Arc::new(AtomicBool::new(false));
    let refreshed = Arc::new(AtomicBool::new(false));
    let required_clone = required.clone();
    let refreshed_clone = refreshed.clone();
    manager
        .on_connection_event("observer", move |event| match event {
            ConnectionEvent::TokenRefreshRequired => required_clone.store(true, Ordering::SeqCst),
            ConnectionEvent::SessionRefreshed => refreshed_clone.store(true, Ordering::SeqCst),
            _ => {}
        })
        .await;

    server.send_frame("EXPR{}");
    wait_until(|| required.load(Ordering::SeqCst)).await;

    manager.provide_token(Some("token-2".to_owned()));
    tokio::time::sleep(Duration::from_millis(30)).await;
    server.send_frame(login_ok_frame());

    wait_until(|| refreshed.load(Ordering::SeqCst)).await;
    assert_eq!(manager.state().await, SessionState::Open);
}

/// Scenario 4b: declining the refresh (empty token) surfaces a session error.
#[tokio::test]
async fn scenario_expr_refresh_declined() {
    let (manager, server) = connected().await;

    let errored = Arc::new(AtomicUsize::new(0));
    let errored_clone = errored.clone();
    manager
        .on_connection_event("observer", move |event| {
            if let ConnectionEvent::SessionError(err) = event {
                if err == SdkError::SessionRefreshFailed {
                    errored_clone.fetch_add(1, Ordering::SeqCst);
                }
            }
        })
        .await;

    server.send_frame("EXPR{}");
    tokio::time::sleep(Duration::from_millis(30)).await;
    manager.provide_token(None);

    wait_until(|| errored.load(Ordering::SeqCst) == 1).await;
}

/// Scenario 5: a message sent while disconnected is queued and resent once
/// the connection comes back.
#[tokio::test]
async fn scenario_auto_resend_after_reconnect() {
    let (manager, server) = connected().await;

    server.fail_next_send.store(true, Ordering::SeqCst);
    let first = manager
        .send_message("c1".to_owned(), CreateMessageParams { message: "queued".to_owned(), custom_type: None, data: None })
        .await;
    assert!(first.is_err());

    server.close(CloseClass::ConnectionFailed);
    tokio::time::sleep(Duration::from_millis(30)).await;
    server.send_frame(login_ok_frame());

    let resent = tokio::time::timeout(Duration::from_secs(1), server.outbound_rx.recv())
        .await
        .unwrap()
        .expect("resent frame after reconnect");
    let req_id = outbound_req_id(&resent);

    let succeeded = Arc::new(AtomicBool::new(false));
    let succeeded_clone = succeeded.clone();
    manager
        .on_pending_message_event("observer", move |event| {
            if matches!(event, chatcore::PendingMessageEvent::Succeeded(_)) {
                succeeded_clone.store(true, Ordering::SeqCst);
            }
        })
        .await;

    server.send_frame(format!("MESG{}", json!({"req_id": req_id, "channel_url": "c1", "message_id": 7})));
    wait_until(|| succeeded.load(Ordering::SeqCst)).await;
    assert_eq!(manager.state().await, SessionState::Open);
}
