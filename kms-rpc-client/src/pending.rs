//! Pending request registry
//!
//! Correlates outbound requests with their eventual responses.
//!
//! # Request Lifecycle
//!
//! 1. **Issue**: the facade takes a fresh id from its atomic counter
//! 2. **Register**: a oneshot slot is stored under that id
//! 3. **Send**: the request is written to the socket
//! 4. **Wait**: the caller awaits the oneshot receiver (raced against its timeout)
//! 5. **Resolve**: the reader loop removes the slot and completes it
//!
//! Removal and completion happen under one lock, so an id is resolved at
//! most once. Whichever of `resolve`, `remove` (timeout) or `fail_all`
//! (connection loss) takes the slot first wins; the others are no-ops.
//!
//! A response whose id has no slot (late after a timeout, duplicated, or
//! simply unexpected) is logged and discarded; it is not an engine fault.

use kms_rpc_core::{Error, Outcome, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

/// Receiving half of a pending slot
pub type PendingResponse = oneshot::Receiver<Result<Outcome>>;

#[derive(Default)]
struct RegistryState {
    slots: HashMap<u64, oneshot::Sender<Result<Outcome>>>,
    /// Set once the connection is terminally closed; later registrations fail
    closed: Option<String>,
}

/// Thread-safe map of in-flight request ids to single-use completion slots
#[derive(Clone, Default)]
pub struct PendingRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl PendingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a completion slot for `id`
    ///
    /// Fails with `DuplicateId` if `id` is already pending and with
    /// `ConnectionLost` once the registry has been closed.
    pub async fn register(&self, id: u64) -> Result<PendingResponse> {
        let mut state = self.state.lock().await;

        if let Some(reason) = &state.closed {
            return Err(Error::ConnectionLost(reason.clone()));
        }
        if state.slots.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }

        let (tx, rx) = oneshot::channel();
        state.slots.insert(id, tx);
        Ok(rx)
    }

    /// Complete the slot for `id` with `outcome`
    ///
    /// Returns false when no slot exists; the outcome is then discarded.
    pub async fn resolve(&self, id: u64, outcome: Outcome) -> bool {
        let slot = self.state.lock().await.slots.remove(&id);

        match slot {
            Some(tx) => {
                if tx.send(Ok(outcome)).is_err() {
                    tracing::debug!(id, "Caller went away before its response arrived");
                }
                true
            }
            None => {
                tracing::warn!(id, "Discarding response for a request that is not pending");
                false
            }
        }
    }

    /// Drop the slot for `id` without completing it (caller timed out)
    pub async fn remove(&self, id: u64) -> bool {
        self.state.lock().await.slots.remove(&id).is_some()
    }

    /// Fail every pending slot with `ConnectionLost(reason)`
    ///
    /// Returns the number of slots failed. Calling it again with nothing
    /// pending is a no-op.
    pub async fn fail_all(&self, reason: &str) -> usize {
        let drained: Vec<_> = {
            let mut state = self.state.lock().await;
            state.slots.drain().collect()
        };

        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(Err(Error::ConnectionLost(reason.to_string())));
        }

        if count > 0 {
            tracing::debug!(count, reason, "Failed pending requests");
        }
        count
    }

    /// Terminal variant of [`fail_all`](Self::fail_all): later registrations
    /// are rejected with `ConnectionLost(reason)`
    pub async fn close(&self, reason: &str) -> usize {
        {
            let mut state = self.state.lock().await;
            if state.closed.is_none() {
                state.closed = Some(reason.to_string());
            }
        }
        self.fail_all(reason).await
    }

    /// Whether [`close`](Self::close) has been called
    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed.is_some()
    }

    /// Number of requests awaiting a response
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.slots.len()
    }
}
