// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command codec (C1): encode outbound commands with request IDs, decode
//! inbound frames into `(type, payload, req_id)`.
//!
//! Wire form: a 4-character ASCII type code immediately followed by a JSON
//! object (spec §6). One structured parser (`serde_json::Value`) is used
//! throughout — no hand-written substring scanners, per Design Notes.

use crate::error::SdkError;
use crate::model::{Command, CommandType};

const TYPE_CODE_LEN: usize = 4;

/// Mint a fresh 32-character lowercase-hex request ID (a v4 UUID with
/// hyphens stripped, matching spec's "UUID-like, 32 hex chars").
pub fn new_req_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Encode a command for the wire. For ack-required types, mints a fresh
/// `req_id`, injects it into the payload, and returns it alongside the
/// bytes; fire-and-forget types inject nothing and return `None`.
pub fn encode(kind: &CommandType, mut payload: serde_json::Value) -> (Option<String>, String) {
    let req_id = if kind.ack_required() {
        let id = new_req_id();
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("req_id".to_owned(), serde_json::Value::String(id.clone()));
        }
        Some(id)
    } else {
        None
    };

    let mut frame = String::with_capacity(TYPE_CODE_LEN + 64);
    frame.push_str(kind.code());
    frame.push_str(&payload.to_string());
    (req_id, frame)
}

/// Decode an inbound wire frame into a `Command`.
///
/// Returns `MalformedData` if the frame is shorter than the 4-byte type
/// prefix or the remainder isn't valid JSON. The dispatcher logs and drops
/// these; they never fault the session (spec §4.1).
pub fn decode(frame: &str) -> Result<Command, SdkError> {
    if frame.len() < TYPE_CODE_LEN {
        return Err(SdkError::MalformedData);
    }
    // Wire codes are ASCII, so byte and char boundaries coincide.
    let (code, body) = frame.split_at(TYPE_CODE_LEN);
    let payload: serde_json::Value =
        serde_json::from_str(body).map_err(|_| SdkError::MalformedData)?;

    let req_id = payload
        .as_object()
        .and_then(|obj| obj.get("req_id"))
        .and_then(|v| v.as_str())
        .map(str::to_owned);

    Ok(Command { kind: CommandType::parse(code), req_id, payload })
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
