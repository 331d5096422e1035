// SPDX-License-Identifier: MIT OR Apache-2.0

//! Auto-resend queue (C7): a FIFO of outbound user messages that couldn't
//! be confirmed sent, replayed with jittered backoff on reconnect.
//!
//! Grounded on the teacher's pending-request resend pattern in
//! `upstream/bridge.rs` (`let stale: Vec<PendingRequest> = pending.drain()...`
//! replayed after reconnect), generalized into a capacity-bounded FIFO with
//! per-message TTL and retry accounting per spec §4.7.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::AutoResendConfig;
use crate::error::SdkError;
use crate::model::{PendingMessage, PendingMessageStatus};

/// Error classes a failed send can fall into, per spec §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendClass {
    /// Safe to retry automatically.
    AutoResendable,
    /// Only a user-initiated manual retry should resend this.
    UserResendableOnly,
}

/// Classify the error a failed send completed with.
pub fn classify(error: &SdkError) -> ResendClass {
    match error {
        SdkError::ConnectionRequired
        | SdkError::WebSocketConnectionClosed
        | SdkError::WebSocketConnectionFailed
        | SdkError::Network
        | SdkError::RequestFailed => ResendClass::AutoResendable,
        _ => ResendClass::UserResendableOnly,
    }
}

const DEFAULT_CAPACITY: usize = 1_000;

struct QueueState {
    enabled: bool,
    entries: VecDeque<PendingMessage>,
}

/// FIFO store of pending outbound user messages awaiting resend.
#[derive(Clone)]
pub struct AutoResendQueue {
    config: AutoResendConfig,
    capacity: usize,
    state: Arc<Mutex<QueueState>>,
}

impl AutoResendQueue {
    pub fn new(config: AutoResendConfig) -> Self {
        Self {
            config,
            capacity: DEFAULT_CAPACITY,
            state: Arc::new(Mutex::new(QueueState { enabled: true, entries: VecDeque::new() })),
        }
    }

    /// Enqueue `msg` if the queue is enabled and under capacity.
    pub async fn register(&self, msg: PendingMessage) -> bool {
        let mut state = self.state.lock().await;
        if !state.enabled || state.entries.len() >= self.capacity {
            return false;
        }
        state.entries.push_back(msg);
        true
    }

    /// Pop the oldest queued message, FIFO.
    pub async fn try_dequeue(&self) -> Option<PendingMessage> {
        self.state.lock().await.entries.pop_front()
    }

    /// Push `msg` back onto the front of the queue (used when a dequeued
    /// message can't be sent right now, or needs a fresh attempt later).
    pub async fn requeue_front(&self, msg: PendingMessage) {
        self.state.lock().await.entries.push_front(msg);
    }

    /// Push `msg` onto the back of the queue, for a retry that should wait
    /// its turn behind anything already queued.
    pub async fn requeue_back(&self, msg: PendingMessage) {
        self.state.lock().await.entries.push_back(msg);
    }

    /// Remove a specific queued entry by `req_id`, e.g. after a successful
    /// send outside the resend loop.
    pub async fn unregister(&self, req_id: &str) -> bool {
        let mut state = self.state.lock().await;
        let before = state.entries.len();
        state.entries.retain(|m| m.req_id != req_id);
        state.entries.len() != before
    }

    /// Enable or disable the queue. Disabling drains every entry, marking
    /// each `Canceled` and returning them so the caller can invoke
    /// `on_failed` for each — the queue itself never calls application
    /// callbacks directly.
    pub async fn set_enabled(&self, enabled: bool) -> Vec<PendingMessage> {
        let mut state = self.state.lock().await;
        state.enabled = enabled;
        if enabled {
            return Vec::new();
        }
        let mut drained: Vec<PendingMessage> = state.entries.drain(..).collect();
        for msg in &mut drained {
            msg.set_status(PendingMessageStatus::Canceled, None);
        }
        drained
    }

    /// Remove and return every entry whose TTL has elapsed.
    pub async fn cleanup_expired(&self) -> Vec<PendingMessage> {
        let mut state = self.state.lock().await;
        let ttl = self.config.ttl;
        let (expired, remaining): (VecDeque<_>, VecDeque<_>) =
            state.entries.drain(..).partition(|m| m.is_expired(ttl));
        state.entries = remaining;
        expired.into_iter().collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Jittered backoff for a message's `retry_count`-th retry:
    /// `base_backoff_ms * 2^retry_count + uniform_random(0, max_jitter_ms)`.
    pub fn backoff_for(&self, retry_count: u32) -> std::time::Duration {
        let base = self.config.base_backoff.as_millis() as u64;
        let doubled = base.saturating_mul(1u64 << retry_count.min(20));
        let jitter_bound = self.config.max_jitter.as_millis() as u64;
        let jitter = if jitter_bound == 0 { 0 } else { rand::rng().random_range(0..jitter_bound) };
        std::time::Duration::from_millis(doubled.saturating_add(jitter))
    }

    /// Sleep for a message's backoff window, cancellable by `cancel` (e.g.
    /// session shutdown or a new disconnect).
    pub async fn wait_backoff(&self, retry_count: u32, cancel: &CancellationToken) {
        if retry_count == 0 {
            return;
        }
        let delay = self.backoff_for(retry_count);
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
#[path = "resend_queue_tests.rs"]
mod tests;
