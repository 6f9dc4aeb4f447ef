//! Wire-level data model
//!
//! One long-lived connection carries three kinds of traffic:
//!
//! 1. **Request**: client → server, tagged with a connection-unique integer id
//! 2. **Response**: server → client, carries the id of the request it answers
//!    and either a result payload or an error object
//! 3. **Notification**: server → client push, not correlated to any id; it
//!    names an event type and the server-side object that raised it
//!
//! Inbound frames are classified by [`crate::codec::decode`] into a [`Frame`].
//! Anything that is neither a response nor a notification is kept as
//! [`Frame::Malformed`] so it can be reported.

use crate::error::{Result, ServerErrorData};
use serde::{Deserialize, Serialize};
use std::fmt;

/// JSON-RPC protocol version tag carried by every outbound request
pub const JSONRPC_VERSION: &str = "2.0";

/// Method names understood by the media server
pub mod method {
    /// Allocate a server-side object (pipeline, element, hub)
    pub const CREATE: &str = "create";
    /// Run an operation on a server-side object
    pub const INVOKE: &str = "invoke";
    /// Ask the server to push an event type for one object
    pub const SUBSCRIBE: &str = "subscribe";
    /// Cancel a subscription
    pub const UNSUBSCRIBE: &str = "unsubscribe";
    /// Free a server-side object
    pub const RELEASE: &str = "release";
    /// Liveness check
    pub const PING: &str = "ping";
    /// Method name the server uses for pushed events
    pub const ON_EVENT: &str = "onEvent";
}

/// An outbound call
///
/// Field order is the wire order: `{"id":..,"method":..,"params":..,"jsonrpc":"2.0"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, unique among the requests pending on one connection
    pub id: u64,

    /// Method name (see [`method`])
    pub method: String,

    /// Structured parameters, an empty object when the method takes none
    pub params: serde_json::Value,

    /// Always "2.0"
    pub jsonrpc: String,
}

impl Request {
    /// Create a request; `Value::Null` params are sent as `{}`
    pub fn new(id: u64, method: impl Into<String>, params: serde_json::Value) -> Self {
        let params = if params.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            params
        };

        Self {
            id,
            method: method.into(),
            params,
            jsonrpc: JSONRPC_VERSION.to_string(),
        }
    }
}

/// What a response says about its request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// `result` member
    Success(serde_json::Value),
    /// `error` member
    Failure(ServerErrorData),
}

impl Outcome {
    /// True for `Outcome::Success`
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Convert into the caller-facing result: a failure becomes `Error::Server`
    pub fn into_result(self) -> Result<serde_json::Value> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(error) => Err(error.into()),
        }
    }
}

/// An inbound answer to a request
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Id of the request being answered
    pub id: u64,
    /// Result or error
    pub outcome: Outcome,
}

impl Response {
    /// Successful response
    pub fn success(id: u64, result: serde_json::Value) -> Self {
        Self {
            id,
            outcome: Outcome::Success(result),
        }
    }

    /// Failed response
    pub fn failure(id: u64, error: ServerErrorData) -> Self {
        Self {
            id,
            outcome: Outcome::Failure(error),
        }
    }
}

/// An unsolicited event pushed by the server
///
/// On the wire: `{"method":..,"params":{"value":{"type":..,"object":..,"data":..}}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Top-level method of the frame (normally "onEvent")
    pub method: String,
    /// `params.value.type`, the key the router dispatches on
    pub event_type: String,
    /// `params.value.object`, the server object that raised the event
    pub object_id: String,
    /// `params.value.data`
    pub payload: serde_json::Value,
}

/// A frame that matched no known shape
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedFrame {
    /// The frame text as received
    pub raw: String,
    /// Why classification failed
    pub reason: String,
}

impl fmt::Display for MalformedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.raw)
    }
}

/// Classification of one inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Answer to a pending request
    Response(Response),
    /// Server-pushed event
    Notification(Notification),
    /// Anything else
    Malformed(MalformedFrame),
}

impl Frame {
    /// True for `Frame::Response`
    pub fn is_response(&self) -> bool {
        matches!(self, Frame::Response(_))
    }

    /// True for `Frame::Notification`
    pub fn is_notification(&self) -> bool {
        matches!(self, Frame::Notification(_))
    }

    /// True for `Frame::Malformed`
    pub fn is_malformed(&self) -> bool {
        matches!(self, Frame::Malformed(_))
    }
}
