//! Async JSON-RPC client engine for the Kurento media server
//!
//! Speaks the media server's JSON-RPC 2.0 dialect over one WebSocket:
//! correlates responses to requests by id, routes server-pushed events to
//! registered listeners, and manages the connection lifecycle.
//!
//! # Components
//!
//! - **KmsClient**: the RPC facade (`call`, `create`, `invoke`, `subscribe`, ...)
//! - **PendingRegistry**: in-flight request ids and their completion slots
//! - **SubscriptionRouter**: event type → listener fan-out, off the reader loop
//! - **Connection manager**: socket, single writer, reader loop, reconnection
//! - **ReconnectPolicy**: pacing of reconnection attempts
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kms_rpc_client::{KmsClient, ObjectSpec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = KmsClient::connect("ws://localhost:8888/kurento").await?;
//!
//!     let pipeline = client.create(ObjectSpec::new("MediaPipeline")).await?;
//!     println!("pipeline {} in session {}", pipeline.object_id, pipeline.session_id);
//!
//!     client
//!         .on_event("OnIceCandidate", |event| async move {
//!             println!("candidate from {}: {}", event.object_id, event.payload);
//!         })
//!         .await;
//!
//!     client.release(&pipeline.object_id, &pipeline.session_id).await?;
//!     client.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # With Reconnection
//!
//! ```rust,no_run
//! use kms_rpc_client::{ClientBuilder, ExponentialBackoff};
//! use std::time::Duration;
//!
//! # async fn example() -> kms_rpc_core::Result<()> {
//! let client = ClientBuilder::new("ws://localhost:8888/kurento")
//!     .with_reconnect(Box::new(
//!         ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(30))
//!             .with_max_attempts(10)
//!             .with_jitter(),
//!     ))
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Reconnecting does not replay anything: requests in flight when the
//! connection dropped have already failed with `ConnectionLost`, and
//! server-side subscriptions must be made again by the caller.

mod client;
mod client_builder;
mod connection;
mod connection_state;
mod metrics;
mod pending;
mod reconnect;
mod router;

pub use client::{Created, KmsClient, ObjectSpec};
pub use client_builder::{
    ClientBuilder, DEFAULT_CONNECT_TIMEOUT, DEFAULT_EVENT_BACKLOG, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_WRITE_TIMEOUT,
};
pub use connection_state::ConnectionState;
pub use metrics::ClientMetrics;
pub use pending::{PendingRegistry, PendingResponse};
pub use reconnect::{ExponentialBackoff, FixedDelay, NoReconnect, ReconnectPolicy};
pub use router::{
    effective_backlog, EventCallback, SubscriptionHandle, SubscriptionRouter, MAX_EVENT_BACKLOG,
};

pub use kms_rpc_core::{Error, Notification, Result, ServerErrorData};
