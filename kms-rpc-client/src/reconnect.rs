//! Reconnection policies
//!
//! When an established connection drops, the connection manager asks its
//! policy how long to wait before the next attempt, and whether to keep
//! trying at all. The policy only computes delays; the manager owns the
//! attempt counter and the state transitions.
//!
//! # Built-in Policies
//!
//! - **ExponentialBackoff**: doubling delays up to a cap
//! - **FixedDelay**: constant delay between attempts
//! - **NoReconnect**: give up immediately (the connection closes)
//!
//! Implement [`ReconnectPolicy`] for anything else.
//!
//! # Examples
//!
//! ```rust
//! use kms_rpc_client::{ExponentialBackoff, ReconnectPolicy};
//! use std::time::Duration;
//!
//! // 100ms doubling up to 30s, 10 attempts, with jitter
//! let default = ExponentialBackoff::default();
//! assert!(default.next_delay(0).is_some());
//!
//! // 1s doubling up to 60s, never gives up
//! let patient = ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60));
//! assert_eq!(patient.next_delay(1), Some(Duration::from_secs(2)));
//! ```

use rand::Rng;
use std::fmt::Debug;
use std::time::Duration;

/// Decides the delay before each reconnection attempt
pub trait ReconnectPolicy: Send + Sync + Debug {
    /// Delay before attempt number `attempt` (0-indexed), or `None` to give up
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Exponential backoff with optional attempt cap and jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    max_attempts: Option<u32>,
    jitter: bool,
}

impl ExponentialBackoff {
    /// `initial * 2^attempt`, capped at `max`, unlimited attempts, no jitter
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            max_attempts: None,
            jitter: false,
        }
    }

    /// Give up after `max_attempts` attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Add a random 0-25% on top of each delay
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(30))
            .with_max_attempts(10)
            .with_jitter()
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }

        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let delay = self.initial.saturating_mul(factor).min(self.max);

        if !self.jitter {
            return Some(delay);
        }

        let spread = delay.as_millis() as u64 / 4;
        let extra = rand::thread_rng().gen_range(0..=spread);
        Some(delay + Duration::from_millis(extra))
    }
}

/// Constant delay between attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Give up after `max_attempts` attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt >= max => None,
            _ => Some(self.delay),
        }
    }
}

/// Never reconnect
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectPolicy for NoReconnect {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }
}
