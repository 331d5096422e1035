// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;
use serde_json::json;

#[test]
fn encode_injects_req_id_for_ack_required_types() {
    let (req_id, frame) = encode(&CommandType::Mesg, json!({"channel_url": "c1"}));
    let req_id = req_id.expect("MESG is ack-required");
    assert_eq!(req_id.len(), 32);
    assert!(frame.starts_with("MESG"));
    assert!(frame.contains(&req_id));
}

#[test]
fn encode_does_not_inject_req_id_for_fire_and_forget() {
    let (req_id, frame) = encode(&CommandType::Pong, json!({}));
    assert!(req_id.is_none());
    assert!(frame.starts_with("PONG"));
    assert!(!frame.contains("req_id"));
}

#[test]
fn decode_is_left_inverse_of_encode_for_ack_required() {
    let (req_id, frame) = encode(&CommandType::Mesg, json!({"channel_url": "c1", "message": "hi"}));
    let decoded = decode(&frame).expect("valid frame");
    assert_eq!(decoded.kind, CommandType::Mesg);
    assert_eq!(decoded.req_id, req_id);
    assert_eq!(decoded.payload.get("message").and_then(|v| v.as_str()), Some("hi"));
}

#[test]
fn decode_is_left_inverse_of_encode_for_fire_and_forget() {
    let (_req_id, frame) = encode(&CommandType::Pong, json!({}));
    let decoded = decode(&frame).expect("valid frame");
    assert_eq!(decoded.kind, CommandType::Pong);
    assert_eq!(decoded.req_id, None);
}

#[test]
fn decode_unknown_type_surfaces_as_unknown() {
    let decoded = decode("ABCD{}").expect("valid frame");
    assert_eq!(decoded.kind, CommandType::Unknown("ABCD".to_owned()));
}

#[test]
fn decode_rejects_short_frames() {
    assert_eq!(decode("AB").unwrap_err(), SdkError::MalformedData);
}

#[test]
fn decode_rejects_invalid_json() {
    assert_eq!(decode("MESGnot-json").unwrap_err(), SdkError::MalformedData);
}

#[test]
fn decode_json_key_order_is_irrelevant() {
    let a = decode(r#"MESG{"a":1,"b":2}"#).expect("valid");
    let b = decode(r#"MESG{"b":2,"a":1}"#).expect("valid");
    assert_eq!(a.payload, b.payload);
}
