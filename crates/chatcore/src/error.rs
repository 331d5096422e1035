// SPDX-License-Identifier: MIT OR Apache-2.0

//! The crate's typed error taxonomy (spec §7).
//!
//! Every public async operation resolves with either a value or an
//! `SdkError` carrying a stable numeric code, matching the legacy SDK's
//! error families: 800000-series (internal/transport), 400000-series
//! (common API), and the domain families (channel/message/application/
//! organization/push).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    // -- 800000-series: SDK internal & transport --
    ConnectionRequired,
    InvalidInit,
    InvalidParameter,
    Network,
    MalformedData,
    AckTimeout,
    LoginTimeout,
    ConnectionClosed,
    ConnectionFailed,
    RequestFailed,
    PassedInvalidAccessToken,
    SessionRefreshSucceeded,
    SessionRefreshFailed,
    PendingError,
    WebSocketConnectionClosed,
    WebSocketConnectionFailed,

    // -- 400000-series: common API errors --
    BadRequest,
    InvalidArgument,
    Unauthorized,
    InvalidSession,
    InvalidSessionKeyValue,
    Forbidden,
    NotFound,
    PreconditionFailed,
    ServerBusy,
    Internal,
    HttpTimeout,

    /// Any code this crate doesn't recognize by name, preserved verbatim.
    Unknown(u32),
}

impl SdkError {
    /// The stable numeric code for this error, per spec §7.
    pub fn code(&self) -> u32 {
        match self {
            Self::ConnectionRequired => 800_101,
            Self::InvalidInit => 800_102,
            Self::InvalidParameter => 800_103,
            Self::Network => 800_104,
            Self::MalformedData => 800_105,
            Self::AckTimeout => 800_106,
            Self::LoginTimeout => 800_107,
            Self::ConnectionClosed => 800_108,
            Self::ConnectionFailed => 800_109,
            Self::RequestFailed => 800_110,
            Self::PassedInvalidAccessToken => 800_111,
            Self::SessionRefreshSucceeded => 800_112,
            Self::SessionRefreshFailed => 800_113,
            Self::PendingError => 800_114,
            Self::WebSocketConnectionClosed => 800_115,
            Self::WebSocketConnectionFailed => 800_116,

            Self::BadRequest => 400_100,
            Self::InvalidArgument => 400_101,
            Self::Unauthorized => 400_102,
            Self::InvalidSession => 400_108,
            Self::InvalidSessionKeyValue => 400_109,
            Self::Forbidden => 400_103,
            Self::NotFound => 400_104,
            Self::PreconditionFailed => 400_105,
            Self::ServerBusy => 400_106,
            Self::Internal => 400_107,
            Self::HttpTimeout => 400_110,

            Self::Unknown(code) => *code,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionRequired => "connection_required",
            Self::InvalidInit => "invalid_init",
            Self::InvalidParameter => "invalid_parameter",
            Self::Network => "network",
            Self::MalformedData => "malformed_data",
            Self::AckTimeout => "ack_timeout",
            Self::LoginTimeout => "login_timeout",
            Self::ConnectionClosed => "connection_closed",
            Self::ConnectionFailed => "connection_failed",
            Self::RequestFailed => "request_failed",
            Self::PassedInvalidAccessToken => "passed_invalid_access_token",
            Self::SessionRefreshSucceeded => "session_refresh_succeeded",
            Self::SessionRefreshFailed => "session_refresh_failed",
            Self::PendingError => "pending_error",
            Self::WebSocketConnectionClosed => "websocket_connection_closed",
            Self::WebSocketConnectionFailed => "websocket_connection_failed",
            Self::BadRequest => "bad_request",
            Self::InvalidArgument => "invalid_argument",
            Self::Unauthorized => "unauthorized",
            Self::InvalidSession => "invalid_session",
            Self::InvalidSessionKeyValue => "invalid_session_key_value",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::PreconditionFailed => "precondition_failed",
            Self::ServerBusy => "server_busy",
            Self::Internal => "internal",
            Self::HttpTimeout => "http_timeout",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Build an `SdkError` from a wire-carried numeric code, remapping a
    /// handful of superseded legacy codes to their current variant and
    /// falling back to `Unknown` for anything else (Design Notes: "treat
    /// unknown codes as Unknown rather than inventing mappings").
    pub fn from_code(code: u32) -> Self {
        remap_legacy_code(code).unwrap_or_else(|| match code {
            800_101 => Self::ConnectionRequired,
            800_102 => Self::InvalidInit,
            800_103 => Self::InvalidParameter,
            800_104 => Self::Network,
            800_105 => Self::MalformedData,
            800_106 => Self::AckTimeout,
            800_107 => Self::LoginTimeout,
            800_108 => Self::ConnectionClosed,
            800_109 => Self::ConnectionFailed,
            800_110 => Self::RequestFailed,
            800_111 => Self::PassedInvalidAccessToken,
            800_112 => Self::SessionRefreshSucceeded,
            800_113 => Self::SessionRefreshFailed,
            800_114 => Self::PendingError,
            800_115 => Self::WebSocketConnectionClosed,
            800_116 => Self::WebSocketConnectionFailed,
            400_100 => Self::BadRequest,
            400_101 => Self::InvalidArgument,
            400_102 => Self::Unauthorized,
            400_103 => Self::Forbidden,
            400_104 => Self::NotFound,
            400_105 => Self::PreconditionFailed,
            400_106 => Self::ServerBusy,
            400_107 => Self::Internal,
            400_108 => Self::InvalidSession,
            400_109 => Self::InvalidSessionKeyValue,
            400_110 => Self::HttpTimeout,
            other => Self::Unknown(other),
        })
    }
}

/// Legacy code -> current variant remap table.
///
/// Empty today; kept as the single seam the legacy-to-current migration
/// would extend, per Design Notes' "large legacy->current code remap...
/// represent as a static lookup".
fn remap_legacy_code(_code: u32) -> Option<SdkError> {
    None
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

impl std::error::Error for SdkError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
