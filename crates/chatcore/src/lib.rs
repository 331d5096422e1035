// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime chat client connection engine.
//!
//! This crate implements the client-side half of a realtime chat protocol:
//! a command codec, a pending-ACK correlation table, a pluggable transport
//! adapter, an event dispatcher, a reconnection policy, a token-refresh
//! coordinator, an auto-resend queue, and the Session Manager that
//! orchestrates all of them behind a single logical task per session.
//!
//! The crate ships a reference [`transport::TungsteniteTransport`] over
//! `tokio-tungstenite`, but any [`transport::TransportAdapter`] impl works —
//! the socket library itself is an external collaborator, not something
//! this crate's core logic depends on directly.

pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod pending_ack;
pub mod reconnect;
pub mod resend_queue;
pub mod session;
pub mod token_refresh;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod test_support;

pub use dispatcher::{ChannelEvent, ConnectionEvent, PendingMessageEvent};
pub use error::SdkError;
pub use model::{Command, CommandType, ConnectionConfig, CreateMessageParams, Message, SessionState};
pub use session::{SessionConfig, SessionManager};
pub use transport::{TransportAdapter, TungsteniteTransport};
