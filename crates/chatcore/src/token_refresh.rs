// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token-refresh coordinator (C6): detects auth-expiry triggers, asks the
//! application for a new token, and enforces a single in-flight refresh
//! with a timeout.
//!
//! Grounded on the teacher's `credential::broker::CredentialBroker` refresh
//! loop (`refresh_at = expires_at.saturating_sub(margin)`) and its
//! `CredentialEvent` broadcast, but reshaped per the spec's own Redesign
//! Flags: the source wires the broker and session back into each other
//! directly, which this crate avoids by emitting events on a plain channel
//! the Session Manager owns, instead of holding a back-reference to it.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::TokenRefreshConfig;
use crate::error::SdkError;

/// Events the coordinator emits for the Session Manager to act on.
#[derive(Debug, Clone)]
pub enum TokenRefreshEvent {
    /// The application must call [`TokenRefreshCoordinator::provide_token`].
    TokenRefreshRequired,
    SessionRefreshed,
    SessionError(SdkError),
    NewTokenReceived(String),
}

struct RefreshState {
    is_refreshing: bool,
    started_at: Option<Instant>,
    timeout_cancel: Option<CancellationToken>,
}

/// Coordinates a single in-flight token refresh per session.
#[derive(Clone)]
pub struct TokenRefreshCoordinator {
    config: TokenRefreshConfig,
    state: Arc<Mutex<RefreshState>>,
    events_tx: mpsc::UnboundedSender<TokenRefreshEvent>,
}

impl TokenRefreshCoordinator {
    pub fn new(
        config: TokenRefreshConfig,
        events_tx: mpsc::UnboundedSender<TokenRefreshEvent>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(RefreshState {
                is_refreshing: false,
                started_at: None,
                timeout_cancel: None,
            })),
            events_tx,
        }
    }

    pub async fn is_refreshing(&self) -> bool {
        self.state.lock().await.is_refreshing
    }

    /// Start a refresh cycle. Idempotent: a call while one is already in
    /// flight is a no-op and returns `false`.
    pub async fn request_refresh(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.is_refreshing {
            return false;
        }
        state.is_refreshing = true;
        state.started_at = Some(Instant::now());
        let cancel = CancellationToken::new();
        state.timeout_cancel = Some(cancel.clone());
        drop(state);

        let _ = self.events_tx.send(TokenRefreshEvent::TokenRefreshRequired);

        let this = self.clone();
        let timeout = self.config.timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    this.timeout_elapsed().await;
                }
            }
        });

        true
    }

    async fn timeout_elapsed(&self) {
        let mut state = self.state.lock().await;
        if !state.is_refreshing {
            return;
        }
        state.is_refreshing = false;
        state.started_at = None;
        state.timeout_cancel = None;
        drop(state);
        let _ = self.events_tx.send(TokenRefreshEvent::SessionError(SdkError::SessionRefreshFailed));
    }

    /// The application's response to `TokenRefreshRequired`. `None` or an
    /// empty token fails the cycle; otherwise the new token is forwarded so
    /// the Session Manager can reconnect with it.
    pub async fn provide_token(&self, token: Option<String>) {
        match token.filter(|t| !t.is_empty()) {
            Some(token) => {
                let _ = self.events_tx.send(TokenRefreshEvent::NewTokenReceived(token));
            }
            None => {
                self.clear().await;
                let _ = self
                    .events_tx
                    .send(TokenRefreshEvent::SessionError(SdkError::SessionRefreshFailed));
            }
        }
    }

    /// Called by the Session Manager once the reconnection using the new
    /// token succeeds with a LOGI ack.
    pub async fn complete(&self) {
        self.clear().await;
        let _ = self.events_tx.send(TokenRefreshEvent::SessionRefreshed);
    }

    /// Called by the Session Manager when reconnection with the new token
    /// fails.
    pub async fn fail(&self, err: SdkError) {
        self.clear().await;
        let _ = self.events_tx.send(TokenRefreshEvent::SessionError(err));
    }

    async fn clear(&self) {
        let mut state = self.state.lock().await;
        if let Some(cancel) = state.timeout_cancel.take() {
            cancel.cancel();
        }
        state.is_refreshing = false;
        state.started_at = None;
    }

    /// Proactive trigger: should the current token be refreshed now?
    ///
    /// True if the token's `exp` claim is unreadable, or is within
    /// `proactive_refresh` of the current time.
    pub fn should_refresh_proactively(&self, token: &str) -> bool {
        match decode_exp(token) {
            Some(exp) => {
                let now = epoch_secs();
                exp.saturating_sub(now) <= self.config.proactive_refresh.as_secs()
            }
            None => true,
        }
    }
}

/// Decode a JWT's middle (payload) segment and extract its `exp` claim.
///
/// Returns `None` if the token isn't three dot-separated segments, the
/// payload isn't valid Base64URL, or it doesn't parse as JSON carrying a
/// numeric `exp` field.
fn decode_exp(token: &str) -> Option<u64> {
    let payload_segment = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload_segment).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    value.get("exp")?.as_u64()
}

fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
#[path = "token_refresh_tests.rs"]
mod tests;
