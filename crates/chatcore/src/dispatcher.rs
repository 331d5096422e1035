// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event dispatcher (C4): routes decoded frames to type-specific handlers
//! and exposes a broadcast stream for application (channel) handlers.
//!
//! Grounded on the teacher's `Aggregator` (`events.rs`, a `broadcast::Sender`
//! fanning events out to subscribers) and on `upstream/bridge.rs`'s pattern
//! of snapshotting a handler/client map under a read lock before iterating,
//! so in-flight registration changes never race a dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::SdkError;
use crate::model::{CommandType, Message, PendingMessage};

/// Connection-level lifecycle events delivered to connection handlers.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    Connected { user_id: String },
    Disconnected,
    ReconnectStarted,
    ReconnectSucceeded,
    ReconnectFailed,
    /// The application must call `SessionManager::provide_token`.
    TokenRefreshRequired,
    SessionRefreshed,
    SessionError(SdkError),
}

/// A channel-scoped broadcast, delivered to group-channel handlers.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    MessageReceived(Message),
    MessageUpdated(Message),
}

/// Terminal outcome of a queued outbound message, delivered to resend-queue
/// observers (spec §4.7's per-message `on_success`/`on_failed` hooks).
#[derive(Debug, Clone)]
pub enum PendingMessageEvent {
    Succeeded(PendingMessage),
    Failed(PendingMessage),
}

type ConnectionHandler = Arc<dyn Fn(ConnectionEvent) + Send + Sync>;
type ChannelHandler = Arc<dyn Fn(ChannelEvent) + Send + Sync>;
type PendingMessageHandler = Arc<dyn Fn(PendingMessageEvent) + Send + Sync>;
/// Handler for a raw decoded frame of a specific `CommandType`, used
/// internally by the Session Manager to wire in its own routing (LOGI,
/// MESG/MEDI ack-or-broadcast, EROR, EXPR) ahead of any application handler.
type FrameHandler = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Main-thread marshalling hook (spec §5): callback delivery to application
/// handlers is done through this single injected function rather than the
/// dispatcher assuming anything about UI threading. `None` (the default)
/// invokes handlers inline, on the dispatcher's own task.
type PostToApp = Arc<dyn Fn(Box<dyn FnOnce() + Send>) + Send + Sync>;

/// Routes decoded frames to type-specific handlers and fans broadcasts out
/// to registered application handler bundles.
#[derive(Clone)]
pub struct EventDispatcher {
    frame_handlers: Arc<RwLock<HashMap<CommandType, Vec<FrameHandler>>>>,
    connection_handlers: Arc<RwLock<HashMap<String, ConnectionHandler>>>,
    channel_handlers: Arc<RwLock<HashMap<String, ChannelHandler>>>,
    pending_message_handlers: Arc<RwLock<HashMap<String, PendingMessageHandler>>>,
    post_to_app: Arc<RwLock<Option<PostToApp>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            frame_handlers: Arc::new(RwLock::new(HashMap::new())),
            connection_handlers: Arc::new(RwLock::new(HashMap::new())),
            channel_handlers: Arc::new(RwLock::new(HashMap::new())),
            pending_message_handlers: Arc::new(RwLock::new(HashMap::new())),
            post_to_app: Arc::new(RwLock::new(None)),
        }
    }

    /// Inject the hook callback delivery is marshalled through. Typically
    /// set once at startup by the façade layer (e.g. to hop onto a UI
    /// thread); left unset, handlers run inline on the dispatcher's task.
    pub async fn set_post_to_app(
        &self,
        hook: impl Fn(Box<dyn FnOnce() + Send>) + Send + Sync + 'static,
    ) {
        *self.post_to_app.write().await = Some(Arc::new(hook));
    }

    /// Run `f` through the injected `post_to_app` hook if one is set,
    /// otherwise inline; either way, a panic inside `f` is caught and
    /// logged rather than propagated (spec §4.4, §7).
    async fn dispatch(&self, f: impl FnOnce() + Send + 'static) {
        let hook = self.post_to_app.read().await.clone();
        match hook {
            Some(hook) => hook(Box::new(move || invoke_guarded(f))),
            None => invoke_guarded(f),
        }
    }

    pub async fn on_frame(
        &self,
        kind: CommandType,
        handler: impl Fn(&serde_json::Value) + Send + Sync + 'static,
    ) {
        self.frame_handlers.write().await.entry(kind).or_default().push(Arc::new(handler));
    }

    /// Invoke every handler registered for `kind` with `payload`.
    ///
    /// A panicking handler is caught and logged; it never prevents the
    /// remaining handlers from running and never propagates to the caller
    /// (spec §4.4). Iteration snapshots the handler list so concurrent
    /// registration/removal is safe.
    pub async fn process(&self, kind: &CommandType, payload: &serde_json::Value) {
        let snapshot: Vec<FrameHandler> = {
            let handlers = self.frame_handlers.read().await;
            handlers.get(kind).cloned().unwrap_or_default()
        };
        let payload = payload.clone();
        for handler in snapshot {
            let payload = payload.clone();
            self.dispatch(move || handler(&payload)).await;
        }
    }

    pub async fn add_connection_handler(
        &self,
        id: impl Into<String>,
        handler: impl Fn(ConnectionEvent) + Send + Sync + 'static,
    ) {
        self.connection_handlers.write().await.insert(id.into(), Arc::new(handler));
    }

    pub async fn remove_connection_handler(&self, id: &str) {
        self.connection_handlers.write().await.remove(id);
    }

    pub async fn broadcast_connection(&self, event: ConnectionEvent) {
        let snapshot: Vec<ConnectionHandler> =
            self.connection_handlers.read().await.values().cloned().collect();
        for handler in snapshot {
            let event = event.clone();
            self.dispatch(move || handler(event)).await;
        }
    }

    pub async fn add_channel_handler(
        &self,
        id: impl Into<String>,
        handler: impl Fn(ChannelEvent) + Send + Sync + 'static,
    ) {
        self.channel_handlers.write().await.insert(id.into(), Arc::new(handler));
    }

    pub async fn remove_channel_handler(&self, id: &str) {
        self.channel_handlers.write().await.remove(id);
    }

    pub async fn broadcast_channel(&self, event: ChannelEvent) {
        let snapshot: Vec<ChannelHandler> =
            self.channel_handlers.read().await.values().cloned().collect();
        for handler in snapshot {
            let event = event.clone();
            self.dispatch(move || handler(event)).await;
        }
    }

    pub async fn add_pending_message_handler(
        &self,
        id: impl Into<String>,
        handler: impl Fn(PendingMessageEvent) + Send + Sync + 'static,
    ) {
        self.pending_message_handlers.write().await.insert(id.into(), Arc::new(handler));
    }

    pub async fn remove_pending_message_handler(&self, id: &str) {
        self.pending_message_handlers.write().await.remove(id);
    }

    pub async fn broadcast_pending_message(&self, event: PendingMessageEvent) {
        let snapshot: Vec<PendingMessageHandler> =
            self.pending_message_handlers.read().await.values().cloned().collect();
        for handler in snapshot {
            let event = event.clone();
            self.dispatch(move || handler(event)).await;
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `f`, catching and logging a panic instead of letting it unwind into
/// the dispatcher's caller. A poisoned handler closure can't corrupt shared
/// state it doesn't hold `&mut` access to, so asserting unwind-safety here
/// is sound — mirrors the pack's own subscriber-dispatch panic guard.
fn invoke_guarded(f: impl FnOnce() + Send) {
    if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        tracing::error!(panic = %message, "application handler panicked");
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
