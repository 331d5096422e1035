// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `TransportAdapter` test double, gated behind the `test-util`
//! feature so it never ships in a release build. Lets integration tests
//! drive the full `SessionManager` state machine without a real socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::transport::{CloseClass, TransportAdapter, TransportEvent, TransportState};

/// A fake transport whose "server side" is a channel pair the test owns
/// directly: the server handle pushes frames as if the backend sent them,
/// and observes frames the Session Manager sends.
///
/// Each `connect()` call mints a fresh event channel, mirroring
/// `TungsteniteTransport`'s behavior of opening a new channel per socket —
/// this is what lets a single `FakeServerHandle` keep working across a
/// reconnect cycle.
pub struct FakeTransport {
    state: TransportState,
    current_tx: Arc<Mutex<mpsc::UnboundedSender<TransportEvent>>>,
    events_rx: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    outbound_tx: mpsc::UnboundedSender<String>,
    /// Set by the test to force the next `connect` call to fail.
    pub fail_next_connect: Arc<AtomicBool>,
    /// Set by the test to force the next `send` call to fail, as if the
    /// write hit a severed socket.
    pub fail_next_send: Arc<AtomicBool>,
}

/// The test-facing handle for a `FakeTransport`'s "server side".
pub struct FakeServerHandle {
    current_tx: Arc<Mutex<mpsc::UnboundedSender<TransportEvent>>>,
    pub outbound_rx: mpsc::UnboundedReceiver<String>,
    pub fail_next_connect: Arc<AtomicBool>,
    pub fail_next_send: Arc<AtomicBool>,
}

impl FakeTransport {
    /// Build a connected pair: the transport under test, and a handle the
    /// test uses to push server frames in, force failures, and observe
    /// client sends out.
    pub fn pair() -> (Self, FakeServerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let current_tx = Arc::new(Mutex::new(tx));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let fail_next_connect = Arc::new(AtomicBool::new(false));
        let fail_next_send = Arc::new(AtomicBool::new(false));
        let transport = Self {
            state: TransportState::Closed,
            current_tx: current_tx.clone(),
            events_rx: Some(rx),
            outbound_tx,
            fail_next_connect: fail_next_connect.clone(),
            fail_next_send: fail_next_send.clone(),
        };
        (transport, FakeServerHandle { current_tx, outbound_rx, fail_next_connect, fail_next_send })
    }
}

impl FakeServerHandle {
    /// Push a raw frame to the client as if received from the server.
    pub fn send_frame(&self, frame: impl Into<String>) {
        self.send_event(TransportEvent::Message(frame.into()));
    }

    /// Simulate the socket closing with the given close classification.
    pub fn close(&self, class: CloseClass) {
        self.send_event(TransportEvent::Close(class));
    }

    fn send_event(&self, event: TransportEvent) {
        let Ok(tx) = self.current_tx.lock() else { return };
        let _ = tx.send(event);
    }
}

#[async_trait::async_trait]
impl TransportAdapter for FakeTransport {
    async fn connect(&mut self, _url: &str) -> Result<(), String> {
        if self.fail_next_connect.swap(false, Ordering::SeqCst) {
            return Err("simulated connect failure".to_owned());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let Ok(mut current) = self.current_tx.lock() else {
            return Err("fake transport lock poisoned".to_owned());
        };
        *current = tx.clone();
        drop(current);

        self.events_rx = Some(rx);
        self.state = TransportState::Open;
        let _ = tx.send(TransportEvent::Open);
        Ok(())
    }

    async fn send(&mut self, text: String) -> Result<(), String> {
        if self.fail_next_send.swap(false, Ordering::SeqCst) {
            return Err("simulated send failure".to_owned());
        }
        self.outbound_tx.send(text).map_err(|e| e.to_string())
    }

    async fn disconnect(&mut self) {
        self.state = TransportState::Closed;
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events_rx.take()
    }
}
