// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending-ACK table (C2): maps `req_id` -> waiter, completed by inbound
//! ACK, timeout, or disconnect — whichever happens first.
//!
//! Grounded on the teacher's correlation table in `upstream/bridge.rs`
//! (`pending: HashMap<String, PendingRequest>`), generalized from a
//! single-connection resend table into a waiter registry with cancellable
//! per-entry timeouts.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::SdkError;

struct PendingAckEntry {
    waiter: oneshot::Sender<Option<serde_json::Value>>,
    /// Cancelled when the waiter is resolved by any other path, so the
    /// timeout task guarding this entry stops without firing.
    timeout_cancel: CancellationToken,
    #[allow(dead_code)]
    created_at: std::time::Instant,
}

/// Registers in-flight ack-required sends and resolves them exactly once.
#[derive(Clone)]
pub struct PendingAckTable {
    inner: Arc<Mutex<HashMap<String, PendingAckEntry>>>,
}

impl PendingAckTable {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Register a new waiter for `req_id` and arm a `timeout`-duration
    /// cancellable timer that completes the entry with `None` if nothing
    /// else resolves it first.
    ///
    /// Returns the receiver half of the waiter. Panics (as a programmer
    /// error, per spec §3) are not raised here — a duplicate registration
    /// instead silently replaces the stale entry, since by construction
    /// `req_id`s are freshly minted per send and never reused within a
    /// session lifetime.
    pub async fn register(
        &self,
        req_id: String,
        timeout: std::time::Duration,
    ) -> oneshot::Receiver<Option<serde_json::Value>> {
        let (tx, rx) = oneshot::channel();
        let timeout_cancel = CancellationToken::new();
        {
            let mut table = self.inner.lock().await;
            table.insert(
                req_id.clone(),
                PendingAckEntry {
                    waiter: tx,
                    timeout_cancel: timeout_cancel.clone(),
                    created_at: std::time::Instant::now(),
                },
            );
        }

        let table = self.inner.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = timeout_cancel.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    let mut table = table.lock().await;
                    if let Some(entry) = table.remove(&req_id) {
                        let _ = entry.waiter.send(None);
                    }
                }
            }
        });

        rx
    }

    /// Resolve `req_id` with `payload` (ACK arrival) or `None` (server
    /// error / explicit failure), removing the entry and cancelling its
    /// timeout task. Returns whether an entry was found.
    pub async fn complete(&self, req_id: &str, payload: Option<serde_json::Value>) -> bool {
        let entry = self.inner.lock().await.remove(req_id);
        match entry {
            Some(entry) => {
                entry.timeout_cancel.cancel();
                let _ = entry.waiter.send(payload);
                true
            }
            None => false,
        }
    }

    /// Resolve every outstanding waiter with a `ConnectionClosed` failure
    /// and clear the table. Used on disconnect, refresh start, and
    /// disposal (spec §4.2, §5).
    pub async fn clear_all(&self, _reason: SdkError) {
        let mut table = self.inner.lock().await;
        for (_, entry) in table.drain() {
            entry.timeout_cancel.cancel();
            let _ = entry.waiter.send(None);
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for PendingAckTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "pending_ack_tests.rs"]
mod tests;
