// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconnection policy (C5): decides whether a disconnect is retriable and
//! produces the capped-exponential backoff delay sequence.
//!
//! Grounded on the teacher's upstream reconnect loop in `upstream/bridge.rs`
//! (`backoff_ms = (backoff_ms * 2).min(max_backoff_ms)`, reset to the floor
//! on a successful connect), split out here as a standalone policy object
//! so the Session Manager's state machine can consult it without owning the
//! loop itself.

use crate::config::ReconnectionConfig;
use crate::error::SdkError;
use crate::transport::CloseClass;

/// Whether a disconnect reason should trigger an automatic reconnect
/// attempt, per spec §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Transport-level failure; retry with backoff.
    Retriable,
    /// Auth/session-level failure; surface to the caller instead.
    NonRetriable,
}

/// Classify a close reason into a retry decision.
pub fn classify(close: &CloseClass) -> RetryClass {
    match close {
        CloseClass::Disconnected => RetryClass::NonRetriable,
        CloseClass::ConnectionFailed => RetryClass::Retriable,
        CloseClass::InternalError => RetryClass::Retriable,
        CloseClass::Unknown(_) => RetryClass::Retriable,
    }
}

/// Classify a connect-time (as opposed to post-open) failure.
pub fn classify_error(error: &SdkError) -> RetryClass {
    match error {
        SdkError::PassedInvalidAccessToken
        | SdkError::InvalidSession
        | SdkError::InvalidSessionKeyValue
        | SdkError::Forbidden
        | SdkError::Unauthorized => RetryClass::NonRetriable,
        _ => RetryClass::Retriable,
    }
}

/// Tracks the current backoff delay and attempt count across a single
/// reconnect campaign; reset on every successful connect.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectionConfig,
    current_delay: std::time::Duration,
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectionConfig) -> Self {
        Self { current_delay: config.initial_delay, config, attempt: 0 }
    }

    /// Whether another attempt is permitted under `max_retries`.
    pub fn can_retry(&self) -> bool {
        self.attempt < self.config.max_retries
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Consume one attempt and return the delay to wait before it, applying
    /// capped exponential backoff to the *next* call.
    pub fn next_delay(&mut self) -> std::time::Duration {
        let delay = self.current_delay;
        self.attempt += 1;
        self.current_delay = (self.current_delay * self.config.backoff_multiplier)
            .min(self.config.max_delay);
        delay
    }

    /// Reset the campaign to its initial state after a successful connect.
    pub fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt = 0;
    }
}

#[cfg(test)]
#[path = "reconnect_tests.rs"]
mod tests;
