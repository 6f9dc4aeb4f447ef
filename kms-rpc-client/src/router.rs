//! Subscription router
//!
//! Maps an event type to any number of registered callbacks and fans each
//! incoming [`Notification`] out to every callback registered for its type.
//!
//! # Delivery Model
//!
//! Every registration gets its own worker task fed by a bounded ring
//! (a tokio `broadcast` receiver on the event type's channel). The reader
//! loop only pushes into the ring, so a slow or stuck callback never stalls
//! response correlation or the delivery of other notifications.
//!
//! - Events of one type reach a callback in arrival order.
//! - When a callback falls more than `backlog` events behind, the oldest
//!   undelivered events for that callback are dropped; the count is logged
//!   and recorded in metrics. Other callbacks are unaffected. The backlog is
//!   rounded up to a power of two and capped at [`MAX_EVENT_BACKLOG`].
//! - A notification whose type has no registration is discarded.
//! - A panicking callback is logged; its registration keeps receiving.
//!
//! The router does not filter by object id. Callbacks that care about one
//! object compare [`Notification::object_id`] themselves.
//!
//! # Examples
//!
//! ```rust
//! use kms_rpc_client::SubscriptionRouter;
//!
//! # async fn example() {
//! let router = SubscriptionRouter::new(64);
//!
//! let handle = router
//!     .add("OnIceCandidate", |event| async move {
//!         println!("candidate from {}: {}", event.object_id, event.payload);
//!     })
//!     .await;
//!
//! assert_eq!(router.listener_count("OnIceCandidate").await, 1);
//! router.remove(&handle).await;
//! # }
//! ```

use crate::metrics::ClientMetrics;
use futures::FutureExt;
use kms_rpc_core::Notification;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

/// Largest per-callback backlog; the ring is allocated up front
pub const MAX_EVENT_BACKLOG: usize = 1 << 16;

/// Backlog actually used for a requested size: at least 1, at most
/// [`MAX_EVENT_BACKLOG`], rounded up to a power of two
pub fn effective_backlog(requested: usize) -> usize {
    requested.clamp(1, MAX_EVENT_BACKLOG).next_power_of_two()
}

/// Type-erased event callback
pub type EventCallback =
    Arc<dyn Fn(Notification) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Identifies one registration, for later removal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    event_type: String,
}

impl SubscriptionHandle {
    /// Router-unique registration id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Event type the callback is registered for
    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

struct Listener {
    id: u64,
    worker: JoinHandle<()>,
}

struct Route {
    sender: broadcast::Sender<Notification>,
    listeners: Vec<Listener>,
}

/// Event type → callbacks dispatch table
#[derive(Clone)]
pub struct SubscriptionRouter {
    routes: Arc<Mutex<HashMap<String, Route>>>,
    next_id: Arc<AtomicU64>,
    backlog: usize,
    metrics: Option<Arc<ClientMetrics>>,
}

impl SubscriptionRouter {
    /// Create a router whose callbacks may each fall `backlog` events behind
    ///
    /// See [`effective_backlog`] for how `backlog` is adjusted.
    pub fn new(backlog: usize) -> Self {
        Self {
            routes: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            backlog: effective_backlog(backlog),
            metrics: None,
        }
    }

    /// Per-callback backlog in effect
    pub fn backlog(&self) -> usize {
        self.backlog
    }

    /// Record dropped events in `metrics`
    pub fn with_metrics(mut self, metrics: Option<Arc<ClientMetrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Register `callback` for `event_type`
    ///
    /// Callbacks accumulate; registering twice for one type delivers every
    /// event to both.
    pub async fn add<F, Fut>(&self, event_type: impl Into<String>, callback: F) -> SubscriptionHandle
    where
        F: Fn(Notification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: EventCallback = Arc::new(move |event| Box::pin(callback(event)));
        self.add_callback(event_type.into(), callback).await
    }

    /// Register an already type-erased callback
    pub async fn add_callback(&self, event_type: String, callback: EventCallback) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut routes = self.routes.lock().await;

        let route = routes.entry(event_type.clone()).or_insert_with(|| Route {
            sender: broadcast::channel(self.backlog).0,
            listeners: Vec::new(),
        });

        let worker = tokio::spawn(run_listener(
            event_type.clone(),
            id,
            route.sender.subscribe(),
            callback,
            self.metrics.clone(),
        ));
        route.listeners.push(Listener { id, worker });

        tracing::debug!(event_type = %event_type, listener = id, "Event listener registered");
        SubscriptionHandle { id, event_type }
    }

    /// Remove exactly the registration behind `handle`
    ///
    /// Returns false if it was already removed.
    pub async fn remove(&self, handle: &SubscriptionHandle) -> bool {
        let mut routes = self.routes.lock().await;
        let Some(route) = routes.get_mut(&handle.event_type) else {
            return false;
        };
        let Some(position) = route.listeners.iter().position(|l| l.id == handle.id) else {
            return false;
        };

        let listener = route.listeners.remove(position);
        listener.worker.abort();

        if route.listeners.is_empty() {
            routes.remove(&handle.event_type);
        }

        tracing::debug!(event_type = %handle.event_type, listener = handle.id, "Event listener removed");
        true
    }

    /// Queue `notification` for every callback registered for its type
    ///
    /// Returns the number of callbacks it was queued for; 0 means it was
    /// discarded.
    pub async fn dispatch(&self, notification: Notification) -> usize {
        let routes = self.routes.lock().await;

        match routes.get(&notification.event_type) {
            Some(route) => {
                let event_type = notification.event_type.clone();
                match route.sender.send(notification) {
                    Ok(receivers) => receivers,
                    Err(_) => {
                        tracing::debug!(event_type = %event_type, "Event route has no live listener");
                        0
                    }
                }
            }
            None => {
                tracing::debug!(
                    event_type = %notification.event_type,
                    object_id = %notification.object_id,
                    "No listener for event, discarding"
                );
                0
            }
        }
    }

    /// Drop every registration
    ///
    /// Events already queued are still delivered; workers then exit.
    pub async fn clear(&self) -> usize {
        let drained: Vec<(String, Route)> = self.routes.lock().await.drain().collect();
        let count = drained.iter().map(|(_, route)| route.listeners.len()).sum();

        if count > 0 {
            tracing::debug!(count, "Event listeners cleared");
        }
        count
    }

    /// Number of callbacks registered for `event_type`
    pub async fn listener_count(&self, event_type: &str) -> usize {
        self.routes
            .lock()
            .await
            .get(event_type)
            .map_or(0, |route| route.listeners.len())
    }

    /// Event types with at least one registration
    pub async fn event_types(&self) -> Vec<String> {
        self.routes.lock().await.keys().cloned().collect()
    }
}

async fn run_listener(
    event_type: String,
    listener: u64,
    mut receiver: broadcast::Receiver<Notification>,
    callback: EventCallback,
    metrics: Option<Arc<ClientMetrics>>,
) {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                if AssertUnwindSafe(callback(event)).catch_unwind().await.is_err() {
                    tracing::error!(event_type = %event_type, listener, "Event callback panicked");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    event_type = %event_type,
                    listener,
                    skipped,
                    "Event backlog overflowed, oldest events dropped"
                );
                if let Some(ref m) = metrics {
                    m.record_dropped_events(&event_type, skipped);
                }
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
