//! Core types and codec for the Kurento media server JSON-RPC protocol
//!
//! This crate holds everything about the protocol that needs no socket:
//!
//! - **Types**: requests, responses, server-pushed notifications, frame classification
//! - **Codec**: JSON encoding of requests and classification of inbound frames
//! - **Error handling**: the error taxonomy every client operation reports with
//! - **Observability**: tracing/OpenTelemetry bootstrap for applications
//!
//! The `kms-rpc-client` crate builds the connection, correlation and
//! dispatch engine on top of it.
//!
//! # Example
//!
//! ```rust
//! use kms_rpc_core::{codec, Frame, Outcome, Request};
//! use serde_json::json;
//!
//! let request = Request::new(7, "create", json!({"type": "MediaPipeline"}));
//! let text = codec::encode(&request).unwrap();
//! assert!(text.ends_with(r#""jsonrpc":"2.0"}"#));
//!
//! match codec::decode(r#"{"id":7,"result":{"sessionId":"s1","value":"p1"}}"#) {
//!     Frame::Response(response) => {
//!         assert_eq!(response.id, 7);
//!         assert!(matches!(response.outcome, Outcome::Success(_)));
//!     }
//!     other => panic!("unexpected frame {:?}", other),
//! }
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

pub use error::{Error, Result, ServerErrorData};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    method, Frame, MalformedFrame, Notification, Outcome, Request, Response, JSONRPC_VERSION,
};
