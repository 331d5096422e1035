// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;

#[test]
fn defaults_match_spec() {
    let ack = AckTimeouts::default();
    assert_eq!(ack.default, Duration::from_secs(5));
    assert_eq!(ack.send_message, Duration::from_secs(15));

    let reconnect = ReconnectionConfig::default();
    assert_eq!(reconnect.initial_delay, Duration::from_secs(1));
    assert_eq!(reconnect.backoff_multiplier, 2);
    assert_eq!(reconnect.max_delay, Duration::from_secs(30));
    assert_eq!(reconnect.max_retries, 3);

    let refresh = TokenRefreshConfig::default();
    assert_eq!(refresh.timeout, Duration::from_secs(60));
    assert_eq!(refresh.proactive_refresh, Duration::from_secs(300));

    let resend = AutoResendConfig::default();
    assert_eq!(resend.max_retries, 3);
    assert_eq!(resend.ttl, Duration::from_secs(24 * 3600));
    assert_eq!(resend.base_backoff, Duration::from_millis(1000));
    assert_eq!(resend.max_jitter, Duration::from_millis(200));
}

#[test]
fn refresh_timeout_clamps_to_bounds() {
    assert_eq!(clamp_timeout(Duration::from_secs(1)), Duration::from_secs(60));
    assert_eq!(clamp_timeout(Duration::from_secs(10_000)), Duration::from_secs(1800));
    assert_eq!(clamp_timeout(Duration::from_secs(120)), Duration::from_secs(120));
}
