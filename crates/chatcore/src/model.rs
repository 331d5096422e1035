// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire-level and domain types shared across the connection engine.

use serde::{Deserialize, Serialize};

/// The four-character type code that prefixes every wire frame.
///
/// `Unknown` carries the raw code so the dispatcher can log-and-ignore
/// frames the crate doesn't recognize instead of failing the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// First frame after transport open; carries the session key on success.
    Logi,
    /// User-message command; echoed back as both ACK and broadcast.
    Mesg,
    /// File-message command (ack-required).
    File,
    /// Streaming/update command carrying a `done` flag.
    Medi,
    /// Error frame, optionally correlated to a request via `req_id`.
    Eror,
    /// Heartbeat reply; fire-and-forget.
    Pong,
    /// "Your access token has expired" signal.
    Expr,
    /// Any four-character code this crate doesn't special-case.
    Unknown(String),
}

impl CommandType {
    /// Parse a four-character wire code into a `CommandType`.
    pub fn parse(code: &str) -> Self {
        match code {
            "LOGI" => Self::Logi,
            "MESG" => Self::Mesg,
            "FILE" => Self::File,
            "MEDI" => Self::Medi,
            "EROR" => Self::Eror,
            "PONG" => Self::Pong,
            "EXPR" => Self::Expr,
            other => Self::Unknown(other.to_owned()),
        }
    }

    /// The four-character wire code for this type.
    pub fn code(&self) -> &str {
        match self {
            Self::Logi => "LOGI",
            Self::Mesg => "MESG",
            Self::File => "FILE",
            Self::Medi => "MEDI",
            Self::Eror => "EROR",
            Self::Pong => "PONG",
            Self::Expr => "EXPR",
            Self::Unknown(code) => code,
        }
    }

    /// Whether a send of this type must be correlated with a `req_id` and
    /// awaited via the pending-ack table.
    pub fn ack_required(&self) -> bool {
        matches!(self, Self::Mesg | Self::File)
    }
}

/// A decoded or to-be-encoded command frame.
#[derive(Debug, Clone)]
pub struct Command {
    pub kind: CommandType,
    pub req_id: Option<String>,
    pub payload: serde_json::Value,
}

/// Connection lifecycle state. `Open` requires a non-empty `session_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Connecting,
    Authenticating,
    Open,
    Closing,
    Reconnecting,
    Refreshing,
}

/// Immutable per-connection-attempt configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub app_id: String,
    pub user_id: String,
    pub access_token: String,
    pub endpoint_base_url: String,
    pub app_version: Option<String>,
    pub sdk_version: String,
    pub api_version: String,
    pub platform: String,
    pub platform_version: Option<String>,
    pub connect_timeout: std::time::Duration,
}

impl ConnectionConfig {
    /// Build the `ws(s)://.../ws?...` connection URL described in spec §6.
    pub fn connection_url(&self) -> String {
        let mut url = format!(
            "{}/ws?app_id={}&user_id={}&access_token={}&sdk_version={}&api_version={}&platform={}",
            self.endpoint_base_url,
            urlencode(&self.app_id),
            urlencode(&self.user_id),
            urlencode(&self.access_token),
            urlencode(&self.sdk_version),
            urlencode(&self.api_version),
            urlencode(&self.platform),
        );
        if let Some(app_version) = &self.app_version {
            url.push_str(&format!("&app_version={}", urlencode(app_version)));
        }
        url.push_str("&sdk_module=core");
        if let Some(platform_version) = &self.platform_version {
            url.push_str(&format!("&platform_version={}", urlencode(platform_version)));
        }
        url
    }
}

/// Minimal percent-encoding for query parameter values.
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// A channel member, as carried on `MESG`/`MEDI` payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// A normalized broadcast message handed to channel handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub channel_url: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub custom_type: Option<String>,
    #[serde(default, alias = "msg_id")]
    pub message_id: Option<i64>,
    #[serde(default, alias = "ts")]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Message {
    /// Parse a normalized `Message` out of a decoded command payload.
    ///
    /// Tolerant of missing fields — a malformed broadcast is still routed
    /// with whatever fields parsed, never dropped outright (that's reserved
    /// for frames that fail the codec's own decode step).
    pub fn from_payload(payload: &serde_json::Value) -> Self {
        serde_json::from_value(payload.clone()).unwrap_or_else(|_| Message {
            channel_url: payload
                .get("channel_url")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned(),
            message: None,
            message_type: None,
            data: None,
            custom_type: None,
            message_id: None,
            created_at: None,
            done: None,
            user: None,
        })
    }
}

/// Parameters for sending a user message, supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageParams {
    pub message: String,
    #[serde(default)]
    pub custom_type: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Lifecycle status of a queued outbound user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingMessageStatus {
    Pending,
    Sending,
    Succeeded,
    Failed,
    Canceled,
}

impl PendingMessageStatus {
    /// Whether `self -> next` is a legal transition per spec §4.7.
    pub fn can_transition_to(self, next: Self) -> bool {
        use PendingMessageStatus::*;
        matches!(
            (self, next),
            (Pending, Sending)
                | (Sending, Succeeded)
                | (Sending, Failed)
                | (Sending, Canceled)
                | (Failed, Pending)
                | (Pending, Canceled)
        )
    }
}

/// A queued outbound user message tracked by the auto-resend queue.
#[derive(Debug, Clone)]
pub struct PendingMessage {
    pub req_id: String,
    pub channel_url: String,
    pub create_params: CreateMessageParams,
    pub status: PendingMessageStatus,
    pub error_code: Option<crate::error::SdkError>,
    pub retry_count: u32,
    pub created_at: std::time::Instant,
}

impl PendingMessage {
    pub fn new(req_id: String, channel_url: String, create_params: CreateMessageParams) -> Self {
        Self {
            req_id,
            channel_url,
            create_params,
            status: PendingMessageStatus::Pending,
            error_code: None,
            retry_count: 0,
            created_at: std::time::Instant::now(),
        }
    }

    /// Apply a status transition, enforcing the legal-transition set.
    ///
    /// An illegal transition is a no-op: neither `status` nor `error_code`
    /// is mutated, matching the invariant in spec §8.
    pub fn set_status(&mut self, next: PendingMessageStatus, error_code: Option<crate::error::SdkError>) {
        if !self.status.can_transition_to(next) {
            return;
        }
        self.status = next;
        self.error_code = error_code;
    }

    pub fn is_expired(&self, ttl: std::time::Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }

    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.retry_count < max_retries
    }
}
