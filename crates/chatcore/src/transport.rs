// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport adapter (C3): a thin wrapper over the full-duplex socket.
//!
//! The concrete socket library is an external collaborator per spec §1, but
//! the crate ships `TungsteniteTransport` as its reference implementation —
//! grounded directly on the teacher's `upstream/bridge.rs` run loop, which
//! drives `tokio_tungstenite::connect_async` the same way.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// Local connection state tracked by a transport adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Closed,
    Connecting,
    Open,
    Closing,
}

/// Classification of a WebSocket close code (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseClass {
    /// 1000/1001 — normal closure.
    Disconnected,
    /// 1006 — abnormal closure (no close frame received).
    ConnectionFailed,
    /// 1011 — server-internal error.
    InternalError,
    Unknown(u16),
}

/// Classify a raw close code per spec §4.3.
pub fn classify_close_code(code: u16) -> CloseClass {
    match code {
        1000 | 1001 => CloseClass::Disconnected,
        1006 => CloseClass::ConnectionFailed,
        1011 => CloseClass::InternalError,
        other => CloseClass::Unknown(other),
    }
}

/// Events surfaced by a transport adapter to its owner (the Session
/// Manager), mirroring spec §4.3's `{on_open, on_close, on_message,
/// on_error}` hook set as a single channel instead of four callbacks.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Open,
    Message(String),
    Close(CloseClass),
    Error(String),
}

/// Capability set a transport adapter must expose: connect, disconnect,
/// send, and a stream of `TransportEvent`s.
#[async_trait::async_trait]
pub trait TransportAdapter: Send {
    async fn connect(&mut self, url: &str) -> Result<(), String>;
    async fn send(&mut self, text: String) -> Result<(), String>;
    async fn disconnect(&mut self);
    fn state(&self) -> TransportState;
    /// Take ownership of this connection's event stream. Returns `Some` once,
    /// immediately after a successful `connect`; subsequent calls (or calls
    /// before any successful `connect`) return `None`.
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TransportEvent>>;
}

/// Reference `TransportAdapter` over `tokio-tungstenite`.
///
/// Events are delivered on an internal channel created at `connect` time;
/// callers obtain the receiver via [`TungsteniteTransport::take_events`].
pub struct TungsteniteTransport {
    state: TransportState,
    write: Option<futures_util::stream::SplitSink<
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
        WsMessage,
    >>,
    events_rx: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    read_task: Option<tokio::task::JoinHandle<()>>,
}

impl TungsteniteTransport {
    pub fn new() -> Self {
        Self { state: TransportState::Closed, write: None, events_rx: None, read_task: None }
    }
}

impl Default for TungsteniteTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TransportAdapter for TungsteniteTransport {
    async fn connect(&mut self, url: &str) -> Result<(), String> {
        self.state = TransportState::Connecting;
        let (ws_stream, _response) =
            tokio_tungstenite::connect_async(url).await.map_err(|e| e.to_string())?;

        let (write, mut read) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        self.write = Some(write);
        self.events_rx = Some(rx);
        self.state = TransportState::Open;

        let tx_open = tx.clone();
        let _ = tx_open.send(TransportEvent::Open);

        self.read_task = Some(tokio::spawn(async move {
            loop {
                match read.next().await {
                    Some(Ok(WsMessage::Text(text))) => {
                        if tx.send(TransportEvent::Message(text.to_string())).is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        let _ = tx.send(TransportEvent::Close(classify_close_frame(frame)));
                        break;
                    }
                    Some(Ok(_)) => {} // ping/pong/binary ignored
                    Some(Err(e)) => {
                        let _ = tx.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                    None => {
                        let _ = tx.send(TransportEvent::Close(CloseClass::ConnectionFailed));
                        break;
                    }
                }
            }
        }));

        Ok(())
    }

    async fn send(&mut self, text: String) -> Result<(), String> {
        match self.write.as_mut() {
            Some(write) => write.send(WsMessage::Text(text.into())).await.map_err(|e| e.to_string()),
            None => Err("not connected".to_owned()),
        }
    }

    async fn disconnect(&mut self) {
        self.state = TransportState::Closing;
        if let Some(mut write) = self.write.take() {
            let _ = write.close().await;
        }
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
        self.state = TransportState::Closed;
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events_rx.take()
    }
}

fn classify_close_frame(frame: Option<CloseFrame>) -> CloseClass {
    match frame {
        Some(frame) => classify_close_code(frame.code.into()),
        None => CloseClass::ConnectionFailed,
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
