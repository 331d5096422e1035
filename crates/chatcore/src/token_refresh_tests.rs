// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::json;
use tokio::sync::mpsc;

use super::*;

fn jwt_with_exp(exp: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({"alg": "none"}).to_string());
    let payload = URL_SAFE_NO_PAD.encode(json!({"exp": exp}).to_string());
    format!("{header}.{payload}.sig")
}

fn coordinator() -> (TokenRefreshCoordinator, mpsc::UnboundedReceiver<TokenRefreshEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let config = TokenRefreshConfig { timeout: Duration::from_millis(50), proactive_refresh: Duration::from_secs(300) };
    (TokenRefreshCoordinator::new(config, tx), rx)
}

#[test]
fn unparseable_token_always_needs_refresh() {
    let (coordinator, _rx) = coordinator();
    assert!(coordinator.should_refresh_proactively("not-a-jwt"));
}

#[test]
fn token_far_from_expiry_does_not_need_refresh() {
    let (coordinator, _rx) = coordinator();
    let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3_600;
    assert!(!coordinator.should_refresh_proactively(&jwt_with_exp(exp)));
}

#[test]
fn token_within_margin_needs_refresh() {
    let (coordinator, _rx) = coordinator();
    let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 60;
    assert!(coordinator.should_refresh_proactively(&jwt_with_exp(exp)));
}

#[tokio::test]
async fn request_refresh_is_idempotent_while_in_flight() {
    let (coordinator, mut rx) = coordinator();
    assert!(coordinator.request_refresh().await);
    assert!(!coordinator.request_refresh().await);
    assert!(matches!(rx.recv().await, Some(TokenRefreshEvent::TokenRefreshRequired)));
    assert!(coordinator.is_refreshing().await);
}

#[tokio::test]
async fn empty_token_fails_the_cycle() {
    let (coordinator, mut rx) = coordinator();
    coordinator.request_refresh().await;
    let _ = rx.recv().await;

    coordinator.provide_token(None).await;
    assert!(matches!(rx.recv().await, Some(TokenRefreshEvent::SessionError(SdkError::SessionRefreshFailed))));
    assert!(!coordinator.is_refreshing().await);
}

#[tokio::test]
async fn new_token_is_forwarded() {
    let (coordinator, mut rx) = coordinator();
    coordinator.request_refresh().await;
    let _ = rx.recv().await;

    coordinator.provide_token(Some("fresh-token".to_owned())).await;
    match rx.recv().await {
        Some(TokenRefreshEvent::NewTokenReceived(token)) => assert_eq!(token, "fresh-token"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn complete_emits_session_refreshed_and_clears_state() {
    let (coordinator, mut rx) = coordinator();
    coordinator.request_refresh().await;
    let _ = rx.recv().await;

    coordinator.complete().await;
    assert!(matches!(rx.recv().await, Some(TokenRefreshEvent::SessionRefreshed)));
    assert!(!coordinator.is_refreshing().await);

    // A fresh cycle can start immediately after completion.
    assert!(coordinator.request_refresh().await);
}

#[tokio::test]
async fn timeout_emits_session_error_when_unanswered() {
    let (coordinator, mut rx) = coordinator();
    coordinator.request_refresh().await;
    let _ = rx.recv().await;

    match rx.recv().await {
        Some(TokenRefreshEvent::SessionError(SdkError::SessionRefreshFailed)) => {}
        other => panic!("expected timeout failure, got {other:?}"),
    }
    assert!(!coordinator.is_refreshing().await);
}
