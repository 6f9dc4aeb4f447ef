//! RPC facade over one media-server connection
//!
//! [`KmsClient`] is what applications and the media-object layer talk to.
//! It issues request ids, registers them, sends through the connection
//! manager and awaits the outcome, and exposes the server's RPC methods
//! (`create`, `invoke`, `subscribe`, `unsubscribe`, `release`, `ping`) plus
//! event listener registration.
//!
//! # Cloning
//!
//! `KmsClient` is cheap to clone; clones share the connection, the pending
//! registry and the router. When the last clone is dropped the reader loop
//! is told to stop. [`KmsClient::close`] is the explicit, awaited shutdown.
//!
//! # Request Ids
//!
//! Ids come from a single atomic counter per client, starting at 1, so
//! concurrent callers never share an id.

use crate::client_builder::ClientBuilder;
use crate::connection::Connection;
use crate::connection_state::ConnectionState;
use crate::metrics::ClientMetrics;
use crate::router::SubscriptionHandle;
use kms_rpc_core::{method, Error, Notification, Request, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Description of a server object to create
///
/// Serializes to the `create` params:
/// `{"type", "constructorParams", "properties", "sessionId"?}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub constructor_params: Map<String, Value>,
    pub properties: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ObjectSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            constructor_params: Map::new(),
            properties: Map::new(),
            session_id: None,
        }
    }

    pub fn with_constructor_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constructor_params.insert(key.into(), value.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Create the object inside an existing session
    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Result of a successful `create`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Created {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "value")]
    pub object_id: String,
}

/// Connection to a Kurento media server
#[derive(Clone)]
pub struct KmsClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    connection: Connection,
    next_id: AtomicU64,
    request_timeout: Duration,
    metrics: Option<Arc<ClientMetrics>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.connection.signal_shutdown();
    }
}

impl fmt::Debug for KmsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmsClient")
            .field("url", &self.inner.connection.url())
            .field("request_timeout", &self.inner.request_timeout)
            .finish_non_exhaustive()
    }
}

impl KmsClient {
    /// Connect with default settings and no reconnection
    ///
    /// Use [`KmsClient::builder`] for timeouts, reconnection and
    /// observability.
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        ClientBuilder::new(url).connect().await
    }

    /// Start configuring a client
    pub fn builder(url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    pub(crate) fn from_parts(
        connection: Connection,
        request_timeout: Duration,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                connection,
                next_id: AtomicU64::new(1),
                request_timeout,
                metrics,
            }),
        }
    }

    /// Server URL
    pub fn url(&self) -> &str {
        self.inner.connection.url()
    }

    /// Timeout used by every method that does not take one
    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout
    }

    /// Send `method` with `params` and wait up to `timeout` for its outcome
    ///
    /// Once the request is queued, fails with exactly one of
    /// `Error::Server`, `Error::Timeout` or `Error::ConnectionLost`.
    /// `Error::NotConnected` means it was never queued.
    ///
    /// `timeout` bounds the whole round trip, including a write stuck behind
    /// a peer that stopped reading. On timeout the pending entry is dropped;
    /// a response arriving later is discarded.
    #[tracing::instrument(skip(self, params), fields(method = %method))]
    pub async fn call(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
        let start = Instant::now();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(id, method, params);
        let result = self.round_trip(&request, timeout).await;

        let elapsed = start.elapsed().as_secs_f64();
        match &result {
            Ok(_) => {
                tracing::debug!(id, duration_secs = elapsed, "Request completed");
            }
            Err(Error::Server(server)) => {
                tracing::debug!(id, code = server.code, message = %server.message, "Server rejected request");
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "Request failed");
            }
        }
        if let Some(ref m) = self.inner.metrics {
            let status = if result.is_ok() { "success" } else { "error" };
            m.record_request(method, status, elapsed);
            if let Err(ref e) = result {
                m.record_error(e.kind());
            }
        }

        result
    }

    async fn round_trip(&self, request: &Request, timeout: Duration) -> Result<Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        let registry = self.inner.connection.registry();
        let response = registry.register(request.id).await?;

        // One deadline covers queueing and the wait for the response
        let outcome = tokio::time::timeout_at(deadline, async {
            match self.inner.connection.send(request).await {
                Ok(()) => response.await.map_err(|_| {
                    Error::ConnectionLost("pending entry dropped without a response".to_string())
                }),
                Err(e) => Err(e),
            }
        })
        .await;

        match outcome {
            Ok(Ok(outcome)) => outcome?.into_result(),
            Ok(Err(e)) => {
                registry.remove(request.id).await;
                Err(e)
            }
            Err(_) => {
                registry.remove(request.id).await;
                Err(Error::Timeout(timeout))
            }
        }
    }

    /// Typed [`call`](Self::call) with the default timeout
    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        let result = self.call(method, params, self.inner.request_timeout).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Allocate a server object
    pub async fn create(&self, spec: ObjectSpec) -> Result<Created> {
        let params = serde_json::to_value(&spec)?;
        let result = self
            .call(method::CREATE, params, self.inner.request_timeout)
            .await?;

        serde_json::from_value(result.clone()).map_err(|e| {
            Error::Protocol(format!("unexpected create result {}: {}", result, e))
        })
    }

    /// Invoke `operation` on an object
    ///
    /// Returns the whole result object; the operation's return value is
    /// under `"value"`.
    pub async fn invoke(
        &self,
        object_id: &str,
        operation: &str,
        operation_params: Option<Value>,
        session_id: &str,
    ) -> Result<Value> {
        let mut params = json!({
            "object": object_id,
            "operation": operation,
            "sessionId": session_id,
        });
        if let Some(operation_params) = operation_params {
            params["operationParams"] = operation_params;
        }

        self.call(method::INVOKE, params, self.inner.request_timeout)
            .await
    }

    /// Ask the server to push `event_type` events raised by an object
    ///
    /// Only the server side; register a listener with
    /// [`on_event`](Self::on_event) to receive them. The subscription id is
    /// under `"value"` in the result.
    pub async fn subscribe(&self, object_id: &str, event_type: &str, session_id: &str) -> Result<Value> {
        let params = json!({
            "object": object_id,
            "type": event_type,
            "sessionId": session_id,
        });
        self.call(method::SUBSCRIBE, params, self.inner.request_timeout)
            .await
    }

    /// Cancel a server-side subscription
    pub async fn unsubscribe(&self, object_id: &str, subscription_id: &str, session_id: &str) -> Result<Value> {
        let params = json!({
            "object": object_id,
            "subscription": subscription_id,
            "sessionId": session_id,
        });
        self.call(method::UNSUBSCRIBE, params, self.inner.request_timeout)
            .await
    }

    /// Release a server object
    pub async fn release(&self, object_id: &str, session_id: &str) -> Result<Value> {
        let params = json!({
            "object": object_id,
            "sessionId": session_id,
        });
        self.call(method::RELEASE, params, self.inner.request_timeout)
            .await
    }

    /// Round-trip check; any failure is returned, never swallowed
    pub async fn ping(&self) -> Result<()> {
        self.call(method::PING, json!({}), self.inner.request_timeout)
            .await
            .map(|_| ())
    }

    /// Register a listener for pushed events of `event_type`
    ///
    /// Listeners see events from every object; filter on
    /// [`Notification::object_id`] if needed.
    ///
    /// A callback that captures this client (or anything holding it, such as
    /// a media object) keeps the client alive through the router, so dropping
    /// the other handles no longer shuts the connection down; call
    /// [`close`](Self::close) explicitly in that case.
    pub async fn on_event<F, Fut>(&self, event_type: impl Into<String>, callback: F) -> SubscriptionHandle
    where
        F: Fn(Notification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner
            .connection
            .router()
            .add(event_type, callback)
            .await
    }

    /// Remove the listener behind `handle`
    pub async fn remove_listener(&self, handle: &SubscriptionHandle) -> bool {
        self.inner.connection.router().remove(handle).await
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state().await
    }

    pub async fn is_connected(&self) -> bool {
        self.connection_state().await.is_connected()
    }

    /// Number of requests awaiting a response
    pub async fn pending_requests(&self) -> usize {
        self.inner.connection.registry().pending_count().await
    }

    /// Close the connection
    ///
    /// Pending requests fail with `ConnectionLost`, listeners are removed
    /// and later calls fail. Closing twice is harmless.
    pub async fn close(&self) -> Result<()> {
        self.inner.connection.close().await;
        Ok(())
    }
}
