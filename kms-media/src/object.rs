//! The one media object type
//!
//! Every server object (pipeline, endpoint, filter, hub) is a
//! [`MediaObject`]: an id and session on a shared [`KmsClient`]. What a
//! given type can do is expressed by the [`Operation`] builders in
//! [`endpoints`](crate::endpoints) and [`filters`](crate::filters), applied
//! with [`MediaObject::apply`].

use crate::kind::MediaKind;
use kms_rpc_client::{KmsClient, Notification, SubscriptionHandle};
use kms_rpc_core::{Error, Result};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;

/// One `invoke` on a media object: operation name and its params
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub name: &'static str,
    pub params: Option<Value>,
}

impl Operation {
    pub fn new(name: &'static str) -> Self {
        Self { name, params: None }
    }

    pub fn with_params(name: &'static str, params: Value) -> Self {
        Self {
            name,
            params: Some(params),
        }
    }
}

/// Handle to a server-side media object
#[derive(Debug, Clone)]
pub struct MediaObject {
    client: KmsClient,
    session_id: String,
    object_id: String,
    kind: MediaKind,
}

impl MediaObject {
    /// Wrap an object that already exists on the server
    pub fn new(
        client: KmsClient,
        session_id: impl Into<String>,
        object_id: impl Into<String>,
        kind: MediaKind,
    ) -> Self {
        Self {
            client,
            session_id: session_id.into(),
            object_id: object_id.into(),
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.object_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn kind(&self) -> &MediaKind {
        &self.kind
    }

    pub fn client(&self) -> &KmsClient {
        &self.client
    }

    /// Invoke `operation` and return its `"value"` (`Null` when absent)
    pub async fn invoke(&self, operation: &str, params: Option<Value>) -> Result<Value> {
        let mut result = self
            .client
            .invoke(&self.object_id, operation, params, &self.session_id)
            .await?;
        Ok(result
            .get_mut("value")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    /// Invoke a prepared [`Operation`]
    pub async fn apply(&self, operation: Operation) -> Result<Value> {
        self.invoke(operation.name, operation.params).await
    }

    /// Send this object's media to `sink`
    pub async fn connect(&self, sink: &MediaObject) -> Result<()> {
        self.connect_to(&sink.object_id).await
    }

    /// Send this object's media back into itself (loopback)
    pub async fn loopback(&self) -> Result<()> {
        self.connect_to(&self.object_id).await
    }

    async fn connect_to(&self, sink_id: &str) -> Result<()> {
        tracing::debug!(source = %self.object_id, sink = %sink_id, "Connecting media objects");
        self.invoke("connect", Some(json!({ "sink": sink_id })))
            .await
            .map(|_| ())
    }

    /// Stop sending media to `sink`
    pub async fn disconnect(&self, sink: &MediaObject) -> Result<()> {
        self.invoke("disconnect", Some(json!({ "sink": sink.object_id })))
            .await
            .map(|_| ())
    }

    /// Ask the server to push this object's `event_type` events
    ///
    /// Returns the server's subscription id.
    pub async fn subscribe(&self, event_type: &str) -> Result<String> {
        let result = self
            .client
            .subscribe(&self.object_id, event_type, &self.session_id)
            .await?;

        match result.get("value").and_then(Value::as_str) {
            Some(id) => Ok(id.to_string()),
            None => Err(Error::Protocol(format!(
                "subscribe result has no subscription id: {}",
                result
            ))),
        }
    }

    /// Cancel a server-side subscription made with [`subscribe`](Self::subscribe)
    pub async fn unsubscribe(&self, subscription_id: &str) -> Result<()> {
        self.client
            .unsubscribe(&self.object_id, subscription_id, &self.session_id)
            .await
            .map(|_| ())
    }

    /// Register a local listener for this object's `event_type` events
    ///
    /// Events of the same type raised by other objects are skipped.
    pub async fn on_event<F, Fut>(&self, event_type: &str, callback: F) -> SubscriptionHandle
    where
        F: Fn(Notification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let object_id: Arc<str> = Arc::from(self.object_id.as_str());
        let callback = Arc::new(callback);

        self.client
            .on_event(event_type, move |event: Notification| {
                let matched = (event.object_id == *object_id).then(|| callback(event));
                async move {
                    if let Some(delivery) = matched {
                        delivery.await;
                    }
                }
            })
            .await
    }

    /// Register a listener, then subscribe on the server
    ///
    /// The listener goes first so no event raised right after the
    /// subscription is missed. Returns the subscription id and the
    /// listener handle.
    pub async fn listen<F, Fut>(&self, event_type: &str, callback: F) -> Result<(String, SubscriptionHandle)>
    where
        F: Fn(Notification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = self.on_event(event_type, callback).await;
        match self.subscribe(event_type).await {
            Ok(subscription) => Ok((subscription, handle)),
            Err(e) => {
                self.client.remove_listener(&handle).await;
                Err(e)
            }
        }
    }

    /// Release the object on the server
    pub async fn release(self) -> Result<()> {
        tracing::debug!(object_id = %self.object_id, kind = %self.kind, "Releasing media object");
        self.client
            .release(&self.object_id, &self.session_id)
            .await
            .map(|_| ())
    }
}
