// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tunable knobs for the connection engine, each with the default from
//! spec §6. This is a library, not a CLI — overrides come from environment
//! variables with a parse-or-default fallback, not a `clap` surface.

use std::time::Duration;

fn env_duration_ms(var: &str, default_ms: u64) -> Duration {
    Duration::from_millis(
        std::env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(default_ms),
    )
}

fn env_u32(var: &str, default: u32) -> u32 {
    std::env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Ack-timeout configuration: a short default plus a longer one for
/// message sends.
#[derive(Debug, Clone, Copy)]
pub struct AckTimeouts {
    pub default: Duration,
    pub send_message: Duration,
}

impl Default for AckTimeouts {
    fn default() -> Self {
        Self {
            default: env_duration_ms("CHATCORE_ACK_TIMEOUT_MS", 5_000),
            send_message: env_duration_ms("CHATCORE_ACK_TIMEOUT_SEND_MESSAGE_MS", 15_000),
        }
    }
}

/// Reconnection backoff configuration (spec §4.5, §6).
#[derive(Debug, Clone, Copy)]
pub struct ReconnectionConfig {
    pub initial_delay: Duration,
    pub backoff_multiplier: u32,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            initial_delay: env_duration_ms("CHATCORE_RECONNECT_INITIAL_MS", 1_000),
            backoff_multiplier: env_u32("CHATCORE_RECONNECT_MULTIPLIER", 2),
            max_delay: env_duration_ms("CHATCORE_RECONNECT_MAX_MS", 30_000),
            max_retries: env_u32("CHATCORE_RECONNECT_MAX_RETRIES", 3),
        }
    }
}

/// Token-refresh timing configuration (spec §4.6, §6).
#[derive(Debug, Clone, Copy)]
pub struct TokenRefreshConfig {
    pub timeout: Duration,
    pub proactive_refresh: Duration,
}

impl Default for TokenRefreshConfig {
    fn default() -> Self {
        Self {
            timeout: clamp_timeout(env_duration_ms("CHATCORE_TOKEN_REFRESH_TIMEOUT_MS", 60_000)),
            proactive_refresh: env_duration_ms("CHATCORE_PROACTIVE_REFRESH_MS", 300_000),
        }
    }
}

/// Clamp the refresh timeout to [60s, 1800s] per spec §3.
fn clamp_timeout(d: Duration) -> Duration {
    d.clamp(Duration::from_secs(60), Duration::from_secs(1800))
}

/// Auto-resend queue configuration (spec §4.7, §6).
#[derive(Debug, Clone, Copy)]
pub struct AutoResendConfig {
    pub max_retries: u32,
    pub ttl: Duration,
    pub base_backoff: Duration,
    pub max_jitter: Duration,
}

impl Default for AutoResendConfig {
    fn default() -> Self {
        Self {
            max_retries: env_u32("CHATCORE_AUTO_RESEND_MAX_RETRIES", 3),
            ttl: Duration::from_secs(
                env_u32("CHATCORE_AUTO_RESEND_TTL_HOURS", 24) as u64 * 3600,
            ),
            base_backoff: env_duration_ms("CHATCORE_AUTO_RESEND_BASE_BACKOFF_MS", 1_000),
            max_jitter: env_duration_ms("CHATCORE_AUTO_RESEND_MAX_JITTER_MS", 200),
        }
    }
}

/// Auth-handshake timeout (spec §4.8): 10s between transport open and a
/// successful/failed LOGI.
pub fn auth_timeout() -> Duration {
    env_duration_ms("CHATCORE_AUTH_TIMEOUT_MS", 10_000)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
