// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;

#[test]
fn classifies_normal_closure() {
    assert_eq!(classify_close_code(1000), CloseClass::Disconnected);
    assert_eq!(classify_close_code(1001), CloseClass::Disconnected);
}

#[test]
fn classifies_abnormal_closure() {
    assert_eq!(classify_close_code(1006), CloseClass::ConnectionFailed);
}

#[test]
fn classifies_server_internal_error() {
    assert_eq!(classify_close_code(1011), CloseClass::InternalError);
}

#[test]
fn classifies_unrecognized_codes_as_unknown() {
    assert_eq!(classify_close_code(4000), CloseClass::Unknown(4000));
}

#[test]
fn fresh_transport_starts_closed() {
    let transport = TungsteniteTransport::new();
    assert_eq!(transport.state(), TransportState::Closed);
}
