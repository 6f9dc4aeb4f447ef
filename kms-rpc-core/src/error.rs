//! Error types for kms-rpc
//!
//! Two error types live here:
//!
//! - **Error**: everything a client operation can fail with (uses thiserror)
//! - **ServerErrorData**: the `error` object a media server puts in a failed
//!   response, carried verbatim inside `Error::Server`
//!
//! # Error Taxonomy
//!
//! | Variant          | Raised when                                              |
//! |------------------|----------------------------------------------------------|
//! | `Connection`     | the transport could not be established                   |
//! | `ConnectionLost` | an established connection dropped or was closed          |
//! | `NotConnected`   | a frame was written while no socket was available        |
//! | `Protocol`       | an inbound frame matched no known shape                  |
//! | `Timeout`        | no response arrived before the caller's deadline         |
//! | `Server`         | the far end answered with an error object                |
//!
//! Transport and decode failures are handled inside the connection manager
//! (logged, state transition). Only errors belonging to a specific call are
//! ever returned to a caller.
//!
//! # Examples
//!
//! ```rust
//! use kms_rpc_core::{Error, ServerErrorData};
//! use serde_json::json;
//!
//! let data = ServerErrorData::with_data(40208, "already negotiated", json!({"type": "SDP"}));
//! assert!(data.is_already_negotiated());
//!
//! let error = Error::Server(data);
//! assert!(error.to_string().contains("40208"));
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type for kms-rpc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for kms-rpc operations
///
/// `Clone` so that one connection failure can be handed to every pending
/// caller at once.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The transport could not be established
    #[error("Connection error: {0}")]
    Connection(String),

    /// An established connection dropped (or was closed) while the
    /// operation was outstanding
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// A frame had to be written but the connection is not in the
    /// `Connected` state
    #[error("Not connected")]
    NotConnected,

    /// An inbound frame did not match any known shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No response arrived within the caller's deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Application-level fault reported by the media server
    #[error("Server error: {0}")]
    Server(#[from] ServerErrorData),

    /// A pending entry already exists for this request id
    #[error("Request id {0} is already pending")]
    DuplicateId(u64),

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invariant violation inside the client
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short, stable label for the error kind, used as a metric attribute
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Connection(_) => "connection",
            Error::ConnectionLost(_) => "connection_lost",
            Error::NotConnected => "not_connected",
            Error::Protocol(_) => "protocol",
            Error::Timeout(_) => "timeout",
            Error::Server(_) => "server",
            Error::DuplicateId(_) => "duplicate_id",
            Error::Serialization(_) => "serialization",
            Error::Internal(_) => "internal",
        }
    }

    /// The server error object, if this is an `Error::Server`
    pub fn server_error(&self) -> Option<&ServerErrorData> {
        match self {
            Error::Server(data) => Some(data),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// The `error` member of a failed response
///
/// ```json
/// {"code": 40208, "message": "already negotiated", "data": {"type": "SDP"}}
/// ```
///
/// `data` is optional on the wire and defaults to `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerErrorData {
    /// Numeric error code
    pub code: i64,

    /// Human-readable error message
    pub message: String,

    /// Additional error information (the media server puts a `type` here)
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ServerErrorData {
    /// The SDP endpoint has already negotiated a session description
    pub const SDP_END_POINT_ALREADY_NEGOTIATED: i64 = 40208;

    /// Create an error object without additional data
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: serde_json::Value::Null,
        }
    }

    /// Create an error object carrying additional data
    pub fn with_data(code: i64, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    /// The `data.type` string, when the server supplied one
    pub fn error_type(&self) -> Option<&str> {
        self.data.get("type").and_then(|t| t.as_str())
    }

    /// True for error code 40208
    pub fn is_already_negotiated(&self) -> bool {
        self.code == Self::SDP_END_POINT_ALREADY_NEGOTIATED
    }
}

impl std::fmt::Display for ServerErrorData {
    /// Formats as "[code] message", with the error type appended when present
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(kind) = self.error_type() {
            write!(f, " ({})", kind)?;
        }
        Ok(())
    }
}

impl std::error::Error for ServerErrorData {}
