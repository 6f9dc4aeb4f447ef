//! Client builder
//!
//! Fluent configuration consumed by [`ClientBuilder::connect`]:
//! - request, connect and write timeouts
//! - per-listener event backlog
//! - automatic reconnection policy (off by default)
//! - OpenTelemetry observability
//!
//! # Examples
//!
//! ```rust,no_run
//! use kms_rpc_client::{ClientBuilder, ExponentialBackoff};
//! use std::time::Duration;
//!
//! # async fn example() -> kms_rpc_core::Result<()> {
//! let client = ClientBuilder::new("ws://localhost:8888/kurento")
//!     .request_timeout(Duration::from_secs(10))
//!     .with_reconnect(Box::new(ExponentialBackoff::default()))
//!     .connect()
//!     .await?;
//!
//! let traced = ClientBuilder::new("ws://localhost:8888/kurento")
//!     .with_default_observability()
//!     .service_name("media-app")
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::connection::Connection;
use crate::reconnect::{ExponentialBackoff, NoReconnect, ReconnectPolicy};
use crate::router::{effective_backlog, SubscriptionRouter};
use crate::{ClientMetrics, KmsClient};
use kms_rpc_core::{Error, ObservabilityConfig, Result};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_EVENT_BACKLOG: usize = 256;

/// Builder for [`KmsClient`]
#[derive(Debug)]
pub struct ClientBuilder {
    url: String,
    request_timeout: Duration,
    connect_timeout: Duration,
    write_timeout: Duration,
    event_backlog: usize,
    reconnect_policy: Option<Box<dyn ReconnectPolicy>>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            event_backlog: DEFAULT_EVENT_BACKLOG,
            reconnect_policy: None,
            observability_config: None,
            service_name: None,
        }
    }

    /// Timeout for every request made without an explicit one
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Timeout for opening the WebSocket, initial and on reconnect
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Longest a single frame write may make no progress
    ///
    /// Past it the transport is treated as lost: pending requests fail with
    /// `ConnectionLost` and the reconnection policy takes over.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Events a listener may fall behind before the oldest are dropped
    ///
    /// Rounded up to a power of two, between 1 and
    /// [`MAX_EVENT_BACKLOG`](crate::MAX_EVENT_BACKLOG).
    pub fn event_backlog(mut self, backlog: usize) -> Self {
        self.event_backlog = effective_backlog(backlog);
        self
    }

    /// Reconnect after a dropped connection, pacing attempts with `policy`
    pub fn with_reconnect(mut self, policy: Box<dyn ReconnectPolicy>) -> Self {
        self.reconnect_policy = Some(policy);
        self
    }

    /// Reconnect with [`ExponentialBackoff::default`]
    pub fn with_default_reconnect(self) -> Self {
        self.with_reconnect(Box::new(ExponentialBackoff::default()))
    }

    /// Close on the first dropped connection (default)
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect_policy = None;
        self
    }

    /// Install observability with `config` when connecting
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Service name reported by observability, if enabled
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Build the client and open the connection
    pub async fn connect(self) -> Result<KmsClient> {
        let metrics = match self.observability_config {
            Some(mut config) => {
                if let Some(name) = self.service_name {
                    config.service_name = name;
                }
                kms_rpc_core::init_observability(config).map_err(|e| {
                    Error::Internal(format!("Failed to initialize observability: {}", e))
                })?;
                Some(Arc::new(ClientMetrics::new()))
            }
            None => None,
        };

        let policy = self
            .reconnect_policy
            .unwrap_or_else(|| Box::new(NoReconnect));
        let router = SubscriptionRouter::new(self.event_backlog).with_metrics(metrics.clone());
        let connection = Connection::new(
            self.url,
            self.connect_timeout,
            self.write_timeout,
            policy,
            router,
            metrics.clone(),
        );

        connection.connect().await?;
        Ok(KmsClient::from_parts(
            connection,
            self.request_timeout,
            metrics,
        ))
    }
}
