// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session Manager (C8): orchestrates C1-C7 behind a single logical task.
//!
//! Grounded on the teacher's `upstream/bridge.rs` run loop — one task owns
//! the connection, the pending-request table, and reconnection backoff,
//! driven by a `tokio::select!` over inbound socket frames and outbound
//! work — generalized here into an actor that also owns the auth/session
//! state machine, the token-refresh coordinator, and the auto-resend queue.
//! Callers never touch connection state directly: every public method goes
//! through `cmd_tx` to the actor, per the Redesign Flags' call to pick one
//! concurrency primitive and stop wiring components back-to-back.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::config::{AckTimeouts, AutoResendConfig, ReconnectionConfig, TokenRefreshConfig};
use crate::dispatcher::{ChannelEvent, ConnectionEvent, EventDispatcher, PendingMessageEvent};
use crate::error::SdkError;
use crate::model::{Command, CommandType, ConnectionConfig, CreateMessageParams, Message, PendingMessage, PendingMessageStatus, SessionState};
use crate::pending_ack::PendingAckTable;
use crate::reconnect::{self, ReconnectPolicy, RetryClass};
use crate::resend_queue::{self, AutoResendQueue, ResendClass};
use crate::token_refresh::{TokenRefreshCoordinator, TokenRefreshEvent};
use crate::transport::{CloseClass, TransportAdapter, TransportEvent};

/// Which authentication flow a pending LOGI belongs to, so the actor knows
/// which events to emit and which reply (if any) to resolve on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginPhase {
    Initial,
    Reconnect,
    Refresh,
}

enum SessionCommand {
    Connect(ConnectionConfig, oneshot::Sender<Result<(), SdkError>>),
    Send {
        kind: CommandType,
        payload: serde_json::Value,
        reply: oneshot::Sender<Result<serde_json::Value, SdkError>>,
    },
    Disconnect(oneshot::Sender<()>),
    CheckAndReconnect,
    Update,
    ProvideToken(Option<String>),
    AuthTimeoutFired,
    ReconnectDelayElapsed,
    QueryState(oneshot::Sender<SessionState>),
}

/// Tunable knobs bundled at construction, matching the teacher's practice of
/// taking one config struct per concern rather than a dozen constructor args.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    pub ack_timeouts: AckTimeouts,
    pub reconnection: ReconnectionConfig,
    pub token_refresh: TokenRefreshConfig,
    pub auto_resend: AutoResendConfig,
    pub auth_timeout: std::time::Duration,
}

/// Public handle to a running Session Manager. Cheap to clone; every clone
/// talks to the same background actor.
#[derive(Clone)]
pub struct SessionManager {
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    dispatcher: EventDispatcher,
    resend_queue: AutoResendQueue,
}

impl SessionManager {
    /// Spawn a new Session Manager owning `transport`, using
    /// environment-derived defaults for every timing knob.
    pub fn new(transport: Box<dyn TransportAdapter>) -> Self {
        Self::with_config(
            transport,
            SessionConfig {
                ack_timeouts: AckTimeouts::default(),
                reconnection: ReconnectionConfig::default(),
                token_refresh: TokenRefreshConfig::default(),
                auto_resend: AutoResendConfig::default(),
                auth_timeout: crate::config::auth_timeout(),
            },
        )
    }

    pub fn with_config(transport: Box<dyn TransportAdapter>, config: SessionConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let dispatcher = EventDispatcher::new();
        let resend_queue = AutoResendQueue::new(config.auto_resend);
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let token_refresh = TokenRefreshCoordinator::new(config.token_refresh, refresh_tx);

        let actor = SessionActor {
            transport,
            transport_events: None,
            cmd_tx: cmd_tx.clone(),
            dispatcher: dispatcher.clone(),
            pending_ack: PendingAckTable::new(),
            resend_queue: resend_queue.clone(),
            reconnect_policy: ReconnectPolicy::new(config.reconnection),
            token_refresh,
            ack_timeouts: config.ack_timeouts,
            auth_timeout: config.auth_timeout,
            state: SessionState::Closed,
            config: None,
            session_key: None,
            intentional_disconnect: false,
            logi_received: false,
            login_phase: LoginPhase::Initial,
            pending_login_reply: None,
            auth_cancel: None,
            reconnect_cancel: None,
        };

        tokio::spawn(actor.run(cmd_rx, refresh_rx));

        Self { cmd_tx, dispatcher, resend_queue }
    }

    /// Connect using `config`, running the transport-open -> LOGI handshake.
    /// Resolves once the initial LOGI succeeds, fails, or the 10s auth
    /// timeout elapses.
    pub async fn connect(&self, config: ConnectionConfig) -> Result<(), SdkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(SessionCommand::Connect(config, reply_tx))?;
        reply_rx.await.unwrap_or(Err(SdkError::ConnectionFailed))
    }

    /// Send a raw command frame. For ack-required types this suspends until
    /// the server's ACK arrives or the per-type timeout elapses.
    pub async fn send(
        &self,
        kind: CommandType,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, SdkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(SessionCommand::Send { kind, payload, reply: reply_tx })?;
        reply_rx.await.unwrap_or(Err(SdkError::ConnectionClosed))
    }

    /// Send a user message, queuing it for auto-resend if the send fails
    /// with an auto-resendable error.
    pub async fn send_message(
        &self,
        channel_url: String,
        params: CreateMessageParams,
    ) -> Result<Message, SdkError> {
        let mut payload = serde_json::to_value(&params).unwrap_or(serde_json::Value::Null);
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("channel_url".to_owned(), serde_json::Value::String(channel_url.clone()));
        }

        match self.send(CommandType::Mesg, payload).await {
            Ok(value) => Ok(Message::from_payload(&value)),
            Err(err) => {
                if matches!(resend_queue::classify(&err), ResendClass::AutoResendable) {
                    let req_id = codec::new_req_id();
                    self.resend_queue
                        .register(PendingMessage::new(req_id, channel_url, params))
                        .await;
                }
                Err(err)
            }
        }
    }

    /// Enable or disable the auto-resend queue. Disabling drains every
    /// queued message, reporting each as `Failed` via the pending-message
    /// event stream (spec §4.7, §6 `set_enable_message_auto_resend`).
    pub async fn set_enable_message_auto_resend(&self, enabled: bool) {
        let drained = self.resend_queue.set_enabled(enabled).await;
        for msg in drained {
            self.dispatcher.broadcast_pending_message(PendingMessageEvent::Failed(msg)).await;
        }
    }

    /// User-initiated disconnect. No reconnection follows.
    pub async fn disconnect(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.send_command(SessionCommand::Disconnect(reply_tx)).is_ok() {
            let _ = reply_rx.await;
        }
    }

    /// Reset the intentional-disconnect flag and attempt reconnection,
    /// for the app-state-monitoring collaborator described in spec §4.8.
    pub fn check_and_reconnect(&self) {
        let _ = self.send_command(SessionCommand::CheckAndReconnect);
    }

    /// Periodic tick driving C6's timeout timer and proactive-refresh check.
    pub fn update(&self) {
        let _ = self.send_command(SessionCommand::Update);
    }

    /// The application's answer to a `TokenRefreshRequired` event.
    pub fn provide_token(&self, token: Option<String>) {
        let _ = self.send_command(SessionCommand::ProvideToken(token));
    }

    pub async fn state(&self) -> SessionState {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.send_command(SessionCommand::QueryState(reply_tx)).is_err() {
            return SessionState::Closed;
        }
        reply_rx.await.unwrap_or(SessionState::Closed)
    }

    /// Inject the main-thread marshalling hook (spec §5 `post_to_app`):
    /// every subsequent application-handler invocation (connection, channel,
    /// pending-message) is routed through `hook` instead of running inline.
    pub async fn set_post_to_app(
        &self,
        hook: impl Fn(Box<dyn FnOnce() + Send>) + Send + Sync + 'static,
    ) {
        self.dispatcher.set_post_to_app(hook).await;
    }

    pub async fn on_connection_event(
        &self,
        id: impl Into<String>,
        handler: impl Fn(ConnectionEvent) + Send + Sync + 'static,
    ) {
        self.dispatcher.add_connection_handler(id, handler).await;
    }

    pub async fn on_channel_event(
        &self,
        id: impl Into<String>,
        handler: impl Fn(ChannelEvent) + Send + Sync + 'static,
    ) {
        self.dispatcher.add_channel_handler(id, handler).await;
    }

    pub async fn on_pending_message_event(
        &self,
        id: impl Into<String>,
        handler: impl Fn(PendingMessageEvent) + Send + Sync + 'static,
    ) {
        self.dispatcher.add_pending_message_handler(id, handler).await;
    }

    fn send_command(&self, cmd: SessionCommand) -> Result<(), SdkError> {
        self.cmd_tx.send(cmd).map_err(|_| SdkError::ConnectionRequired)
    }
}

/// The actor's private state, run on its own spawned task.
struct SessionActor {
    transport: Box<dyn TransportAdapter>,
    transport_events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    dispatcher: EventDispatcher,
    pending_ack: PendingAckTable,
    resend_queue: AutoResendQueue,
    reconnect_policy: ReconnectPolicy,
    token_refresh: TokenRefreshCoordinator,
    ack_timeouts: AckTimeouts,
    auth_timeout: std::time::Duration,

    state: SessionState,
    config: Option<ConnectionConfig>,
    session_key: Option<String>,
    intentional_disconnect: bool,
    logi_received: bool,
    login_phase: LoginPhase,
    pending_login_reply: Option<oneshot::Sender<Result<(), SdkError>>>,
    auth_cancel: Option<CancellationToken>,
    reconnect_cancel: Option<CancellationToken>,
}

impl SessionActor {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
        mut refresh_rx: mpsc::UnboundedReceiver<TokenRefreshEvent>,
    ) {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => break,
                    }
                }
                event = recv_transport_event(&mut self.transport_events) => {
                    if let Some(event) = event {
                        self.handle_transport_event(event).await;
                    }
                }
                Some(event) = refresh_rx.recv() => {
                    self.handle_refresh_event(event).await;
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Connect(config, reply) => self.begin_connect(config, reply).await,
            SessionCommand::Send { kind, payload, reply } => self.begin_send(kind, payload, reply).await,
            SessionCommand::Disconnect(reply) => {
                self.do_disconnect().await;
                let _ = reply.send(());
            }
            SessionCommand::CheckAndReconnect => {
                self.intentional_disconnect = false;
                if self.state == SessionState::Closed {
                    if let Some(config) = self.config.clone() {
                        self.login_phase = LoginPhase::Reconnect;
                        self.open_transport(config).await;
                    }
                }
            }
            SessionCommand::Update => self.maybe_proactive_refresh().await,
            SessionCommand::ProvideToken(token) => self.token_refresh.provide_token(token).await,
            SessionCommand::AuthTimeoutFired => self.on_auth_timeout().await,
            SessionCommand::ReconnectDelayElapsed => self.on_reconnect_delay_elapsed().await,
            SessionCommand::QueryState(reply) => {
                let _ = reply.send(self.state);
            }
        }
    }

    async fn begin_connect(&mut self, config: ConnectionConfig, reply: oneshot::Sender<Result<(), SdkError>>) {
        if self.state != SessionState::Closed {
            let _ = reply.send(Err(SdkError::InvalidInit));
            return;
        }
        self.login_phase = LoginPhase::Initial;
        self.pending_login_reply = Some(reply);
        self.intentional_disconnect = false;
        self.open_transport(config).await;
    }

    async fn open_transport(&mut self, config: ConnectionConfig) {
        self.config = Some(config.clone());
        self.state = SessionState::Connecting;
        self.logi_received = false;

        match self.transport.connect(&config.connection_url()).await {
            Ok(()) => {
                self.transport_events = self.transport.take_events();
            }
            Err(_) => {
                self.finish_connect_failure(SdkError::ConnectionFailed).await;
            }
        }
    }

    async fn finish_connect_failure(&mut self, err: SdkError) {
        self.state = SessionState::Closed;
        match self.login_phase {
            LoginPhase::Initial => {
                if let Some(reply) = self.pending_login_reply.take() {
                    let _ = reply.send(Err(err));
                }
            }
            // Auth-class errors are routed to C6 and never trigger
            // reconnection, even when discovered mid reconnect campaign
            // (spec §7 propagation policy applies "from any path").
            LoginPhase::Reconnect if reconnect::classify_error(&err) == RetryClass::NonRetriable => {
                self.login_phase = LoginPhase::Refresh;
                self.token_refresh.request_refresh().await;
            }
            LoginPhase::Reconnect => self.begin_reconnect_or_give_up().await,
            LoginPhase::Refresh => self.token_refresh.fail(err).await,
        }
    }

    async fn begin_send(
        &mut self,
        kind: CommandType,
        payload: serde_json::Value,
        reply: oneshot::Sender<Result<serde_json::Value, SdkError>>,
    ) {
        if self.state != SessionState::Open {
            let _ = reply.send(Err(SdkError::ConnectionRequired));
            return;
        }

        let (req_id, frame) = codec::encode(&kind, payload);

        if let Some(req_id) = req_id {
            let timeout = self.ack_timeout_for(&kind);
            let waiter = self.pending_ack.register(req_id.clone(), timeout).await;
            match self.transport.send(frame).await {
                Ok(()) => {
                    // Suspends on the waiter independently of the actor loop,
                    // so an inbound ACK can still be processed while this
                    // task is parked (spec §5: "suspends twice").
                    tokio::spawn(async move {
                        let result = waiter.await.ok().flatten();
                        let _ = reply.send(result.ok_or(SdkError::AckTimeout));
                    });
                }
                Err(_) => {
                    self.pending_ack.complete(&req_id, None).await;
                    let _ = reply.send(Err(SdkError::Network));
                }
            }
        } else {
            match self.transport.send(frame).await {
                Ok(()) => {
                    let _ = reply.send(Ok(serde_json::Value::Null));
                }
                Err(_) => {
                    let _ = reply.send(Err(SdkError::Network));
                }
            }
        }
    }

    fn ack_timeout_for(&self, kind: &CommandType) -> std::time::Duration {
        match kind {
            CommandType::Mesg | CommandType::File => self.ack_timeouts.send_message,
            _ => self.ack_timeouts.default,
        }
    }

    async fn do_disconnect(&mut self) {
        self.intentional_disconnect = true;
        self.cancel_auth_timer();
        self.cancel_reconnect_timer();
        self.pending_ack.clear_all(SdkError::ConnectionClosed).await;
        self.transport.disconnect().await;
        self.state = SessionState::Closed;
        self.session_key = None;
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => {
                self.state = SessionState::Authenticating;
                self.arm_auth_timer();
            }
            TransportEvent::Message(text) => match codec::decode(&text) {
                Ok(command) => self.route_command(command).await,
                Err(_) => tracing::debug!("dropping malformed inbound frame"),
            },
            TransportEvent::Close(class) => self.handle_close(class).await,
            TransportEvent::Error(err) => tracing::warn!(err = %err, "transport error"),
        }
    }

    async fn route_command(&mut self, command: Command) {
        match command.kind {
            CommandType::Logi => self.handle_logi(command.payload).await,
            CommandType::Mesg => {
                self.complete_ack(&command).await;
                let message = Message::from_payload(&command.payload);
                self.dispatcher.broadcast_channel(ChannelEvent::MessageReceived(message)).await;
            }
            CommandType::Medi => {
                self.complete_ack(&command).await;
                let message = Message::from_payload(&command.payload);
                self.dispatcher.broadcast_channel(ChannelEvent::MessageUpdated(message)).await;
            }
            CommandType::File => {
                self.complete_ack(&command).await;
            }
            CommandType::Eror => {
                if let Some(req_id) = &command.req_id {
                    self.pending_ack.complete(req_id, None).await;
                } else {
                    self.dispatcher.process(&command.kind, &command.payload).await;
                }
            }
            CommandType::Pong => {}
            CommandType::Expr => self.handle_expr().await,
            CommandType::Unknown(_) => {
                self.dispatcher.process(&command.kind, &command.payload).await;
            }
        }
    }

    async fn complete_ack(&mut self, command: &Command) {
        if let Some(req_id) = &command.req_id {
            // Always completed *and* broadcast above: the server echoes a
            // MESG both as the sender's ACK and the channel-wide broadcast
            // (spec Design Notes — confirmed intentional, not a bug).
            self.pending_ack.complete(req_id, Some(command.payload.clone())).await;
            self.resend_queue.unregister(req_id).await;
        }
    }

    async fn handle_logi(&mut self, payload: serde_json::Value) {
        let session_key = payload.get("session_key").and_then(|v| v.as_str()).filter(|s| !s.is_empty());
        self.cancel_auth_timer();

        match session_key {
            Some(key) => {
                self.logi_received = true;
                self.session_key = Some(key.to_owned());
                self.reconnect_policy.reset();
                self.state = SessionState::Open;

                match self.login_phase {
                    LoginPhase::Initial => {
                        if let Some(reply) = self.pending_login_reply.take() {
                            let _ = reply.send(Ok(()));
                        }
                        let user_id = self.config.as_ref().map(|c| c.user_id.clone()).unwrap_or_default();
                        self.dispatcher.broadcast_connection(ConnectionEvent::Connected { user_id }).await;
                    }
                    LoginPhase::Reconnect => {
                        self.dispatcher.broadcast_connection(ConnectionEvent::ReconnectSucceeded).await;
                    }
                    LoginPhase::Refresh => {
                        self.token_refresh.complete().await;
                    }
                }
                self.drain_resend_queue().await;
            }
            None => {
                let code = payload
                    .get("error")
                    .and_then(|v| v.get("code"))
                    .and_then(|v| v.as_u64())
                    .map(|c| SdkError::from_code(c as u32))
                    .unwrap_or(SdkError::Unauthorized);
                self.finish_connect_failure(code).await;
            }
        }
    }

    async fn handle_expr(&mut self) {
        self.cancel_auth_timer();
        self.pending_ack.clear_all(SdkError::ConnectionClosed).await;
        self.transport.disconnect().await;
        self.state = SessionState::Refreshing;
        self.login_phase = LoginPhase::Refresh;
        self.token_refresh.request_refresh().await;
    }

    async fn handle_refresh_event(&mut self, event: TokenRefreshEvent) {
        match event {
            TokenRefreshEvent::TokenRefreshRequired => {
                self.dispatcher.broadcast_connection(ConnectionEvent::TokenRefreshRequired).await;
            }
            TokenRefreshEvent::NewTokenReceived(token) => {
                if let Some(mut config) = self.config.clone() {
                    config.access_token = token;
                    self.login_phase = LoginPhase::Refresh;
                    self.open_transport(config).await;
                }
            }
            TokenRefreshEvent::SessionRefreshed => {
                self.dispatcher.broadcast_connection(ConnectionEvent::SessionRefreshed).await;
            }
            TokenRefreshEvent::SessionError(err) => {
                self.state = SessionState::Closed;
                self.dispatcher.broadcast_connection(ConnectionEvent::SessionError(err)).await;
            }
        }
    }

    async fn handle_close(&mut self, class: CloseClass) {
        self.cancel_auth_timer();

        if self.intentional_disconnect {
            self.state = SessionState::Closed;
            return;
        }

        match reconnect::classify(&class) {
            RetryClass::NonRetriable => {
                if self.logi_received {
                    self.state = SessionState::Closed;
                    self.session_key = None;
                    self.dispatcher.broadcast_connection(ConnectionEvent::Disconnected).await;
                } else {
                    self.finish_connect_failure(SdkError::LoginTimeout).await;
                }
            }
            RetryClass::Retriable => {
                if self.logi_received {
                    self.logi_received = false;
                    self.session_key = None;
                    self.pending_ack.clear_all(SdkError::ConnectionClosed).await;
                }
                self.login_phase = LoginPhase::Reconnect;
                self.begin_reconnect_or_give_up().await;
            }
        }
    }

    async fn on_auth_timeout(&mut self) {
        if self.logi_received {
            // The LOGI already arrived; this timer fired on the losing side
            // of the race against a normal LOGI success (spec's open
            // question) and must be a no-op.
            return;
        }
        self.finish_connect_failure(SdkError::LoginTimeout).await;
    }

    async fn begin_reconnect_or_give_up(&mut self) {
        if !self.reconnect_policy.can_retry() {
            self.state = SessionState::Closed;
            self.dispatcher.broadcast_connection(ConnectionEvent::ReconnectFailed).await;
            return;
        }

        self.state = SessionState::Reconnecting;
        self.dispatcher.broadcast_connection(ConnectionEvent::ReconnectStarted).await;

        let delay = self.reconnect_policy.next_delay();
        let cancel = CancellationToken::new();
        self.reconnect_cancel = Some(cancel.clone());
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = cmd_tx.send(SessionCommand::ReconnectDelayElapsed);
                }
            }
        });
    }

    async fn on_reconnect_delay_elapsed(&mut self) {
        self.reconnect_cancel = None;
        if let Some(config) = self.config.clone() {
            self.state = SessionState::Connecting;
            self.open_transport(config).await;
        }
    }

    async fn maybe_proactive_refresh(&mut self) {
        if self.state != SessionState::Open {
            return;
        }
        let Some(config) = self.config.clone() else { return };
        if self.token_refresh.is_refreshing().await {
            return;
        }
        if self.token_refresh.should_refresh_proactively(&config.access_token) {
            self.handle_expr().await;
        }
    }

    async fn drain_resend_queue(&mut self) {
        for expired in self.resend_queue.cleanup_expired().await {
            self.dispatcher.broadcast_pending_message(PendingMessageEvent::Failed(expired)).await;
        }

        loop {
            if self.state != SessionState::Open {
                break;
            }
            let Some(mut msg) = self.resend_queue.try_dequeue().await else { break };

            if msg.retry_count > 0 {
                let cancel = self.reconnect_cancel.clone().unwrap_or_default();
                self.resend_queue.wait_backoff(msg.retry_count, &cancel).await;
            }

            msg.set_status(PendingMessageStatus::Sending, None);
            let mut payload = serde_json::to_value(&msg.create_params).unwrap_or(serde_json::Value::Null);
            if let Some(obj) = payload.as_object_mut() {
                obj.insert("channel_url".to_owned(), serde_json::Value::String(msg.channel_url.clone()));
                obj.insert("req_id".to_owned(), serde_json::Value::String(msg.req_id.clone()));
            }

            let waiter = self.pending_ack.register(msg.req_id.clone(), self.ack_timeouts.send_message).await;
            let sent = self.transport.send(format!("{}{}", CommandType::Mesg.code(), payload)).await;
            if sent.is_err() {
                self.pending_ack.complete(&msg.req_id, None).await;
                msg.set_status(PendingMessageStatus::Pending, None);
                self.resend_queue.requeue_front(msg).await;
                break;
            }

            // The ACK for this req_id is only ever delivered by completing
            // `waiter` from route_command, which runs on this same actor's
            // select loop. Awaiting it here would park the loop and starve
            // that very completion, so the wait (and everything after it)
            // is handed off to its own task, mirroring begin_send above.
            let resend_queue = self.resend_queue.clone();
            let dispatcher = self.dispatcher.clone();
            let max_retries = self.resend_queue.max_retries();
            tokio::spawn(async move {
                match waiter.await.ok().flatten() {
                    Some(_ack_payload) => {
                        msg.set_status(PendingMessageStatus::Succeeded, None);
                        dispatcher.broadcast_pending_message(PendingMessageEvent::Succeeded(msg)).await;
                    }
                    None => {
                        msg.retry_count += 1;
                        if msg.can_retry(max_retries) {
                            msg.set_status(PendingMessageStatus::Pending, Some(SdkError::AckTimeout));
                            resend_queue.requeue_back(msg).await;
                        } else {
                            msg.set_status(PendingMessageStatus::Failed, Some(SdkError::AckTimeout));
                            dispatcher.broadcast_pending_message(PendingMessageEvent::Failed(msg)).await;
                        }
                    }
                }
            });
        }
    }

    fn arm_auth_timer(&mut self) {
        let cancel = CancellationToken::new();
        self.auth_cancel = Some(cancel.clone());
        let timeout = self.auth_timeout;
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    let _ = cmd_tx.send(SessionCommand::AuthTimeoutFired);
                }
            }
        });
    }

    fn cancel_auth_timer(&mut self) {
        if let Some(cancel) = self.auth_cancel.take() {
            cancel.cancel();
        }
    }

    fn cancel_reconnect_timer(&mut self) {
        if let Some(cancel) = self.reconnect_cancel.take() {
            cancel.cancel();
        }
    }
}

async fn recv_transport_event(
    events: &mut Option<mpsc::UnboundedReceiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
