//! Connection lifecycle state
//!
//! ```text
//! Disconnected → Connecting → Connected → Reconnecting ─┐
//!       ↑             │                       ↑  │       │
//!       └── failure ──┘                       └──┘       │
//!                                         retry failed   │
//! any state ── close() ──────────────────────────→ Closed ←┘ retries exhausted
//! ```
//!
//! [`StateTracker`] holds the current state and the reconnection policy and
//! performs the policy-driven transitions. `Closed` is terminal: once
//! entered, no transition leaves it.

use crate::metrics::ClientMetrics;
use crate::reconnect::ReconnectPolicy;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected yet, or the first connect failed
    Disconnected,
    /// Opening the transport
    Connecting,
    /// Transport open, reader loop running
    Connected,
    /// Transport dropped; `attempt` attempts made so far
    Reconnecting { attempt: u32 },
    /// Terminal
    Closed,
}

impl ConnectionState {
    /// Numeric code recorded in the connection state gauge
    pub fn as_metric(&self) -> i64 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Reconnecting { .. } => 3,
            ConnectionState::Closed => 4,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

/// Current state plus the policy that drives reconnection
#[derive(Debug)]
pub struct StateTracker {
    state: RwLock<ConnectionState>,
    policy: Box<dyn ReconnectPolicy>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl StateTracker {
    pub fn new(policy: Box<dyn ReconnectPolicy>, metrics: Option<Arc<ClientMetrics>>) -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            policy,
            metrics,
        }
    }

    /// Current state
    pub async fn get(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Move to `next` unless already closed
    ///
    /// Returns false when the tracker is closed and the transition was refused.
    pub async fn set(&self, next: ConnectionState) -> bool {
        let mut state = self.state.write().await;
        if state.is_closed() {
            return false;
        }
        *state = next;
        self.record(next);
        true
    }

    /// Enter the terminal state
    ///
    /// Returns false if it was already closed.
    pub async fn close(&self) -> bool {
        let mut state = self.state.write().await;
        if state.is_closed() {
            return false;
        }
        *state = ConnectionState::Closed;
        self.record(ConnectionState::Closed);
        true
    }

    /// Ask the policy for the next attempt's delay and advance the counter
    ///
    /// Moves to `Closed` and returns `None` when the policy gives up or the
    /// tracker is not reconnecting.
    pub async fn next_reconnect_delay(&self) -> Option<Duration> {
        let mut state = self.state.write().await;

        let attempt = match *state {
            ConnectionState::Reconnecting { attempt } => attempt,
            ConnectionState::Closed => return None,
            _ => 0,
        };

        match self.policy.next_delay(attempt) {
            Some(delay) => {
                *state = ConnectionState::Reconnecting {
                    attempt: attempt + 1,
                };
                self.record(*state);
                if let Some(ref m) = self.metrics {
                    m.record_reconnection_attempt();
                }
                Some(delay)
            }
            None => {
                *state = ConnectionState::Closed;
                self.record(ConnectionState::Closed);
                None
            }
        }
    }

    fn record(&self, state: ConnectionState) {
        if let Some(ref m) = self.metrics {
            m.update_connection_state(state.as_metric());
        }
    }
}
