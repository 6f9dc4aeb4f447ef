//! Wire codec
//!
//! Stateless translation between [`Request`]/[`Response`]/[`Notification`]
//! values and the JSON text carried in WebSocket frames.
//!
//! # Classification Rules
//!
//! [`decode`] never fails. Every frame lands in exactly one [`Frame`] variant:
//!
//! - `"method"` at top level with `params.value.{type, object, data}`
//!   → `Frame::Notification`
//! - `"id"` (unsigned integer) plus `"result"` or `"error"`
//!   → `Frame::Response` (`error` wins when both are present)
//! - anything else → `Frame::Malformed` with the reason and the raw text
//!
//! Malformed frames are returned rather than swallowed so the caller can
//! report them.
//!
//! # Examples
//!
//! ```rust
//! use kms_rpc_core::{codec, Frame, Request};
//! use serde_json::json;
//!
//! let request = Request::new(42, "ping", json!({}));
//! let text = codec::encode(&request).unwrap();
//! assert_eq!(text, r#"{"id":42,"method":"ping","params":{},"jsonrpc":"2.0"}"#);
//!
//! let frame = codec::decode(r#"{"id":42,"result":{"value":"pong"}}"#);
//! assert!(frame.is_response());
//! ```

use crate::error::{Error, Result, ServerErrorData};
use crate::types::{Frame, MalformedFrame, Notification, Outcome, Request, Response};
use serde_json::{json, Map, Value};

/// Encode an outbound request to its JSON text
pub fn encode(request: &Request) -> Result<String> {
    serde_json::to_string(request).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode an outbound request to bytes
pub fn encode_to_vec(request: &Request) -> Result<Vec<u8>> {
    serde_json::to_vec(request).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode a response in the shape the server sends it
///
/// Used by mock servers and by tests of the decoding path.
pub fn encode_response(response: &Response) -> String {
    let frame = match &response.outcome {
        Outcome::Success(result) => json!({"id": response.id, "result": result}),
        Outcome::Failure(error) => json!({"id": response.id, "error": error}),
    };
    frame.to_string()
}

/// Encode a notification in the shape the server sends it
pub fn encode_notification(notification: &Notification) -> String {
    json!({
        "method": notification.method,
        "params": {
            "value": {
                "type": notification.event_type,
                "object": notification.object_id,
                "data": notification.payload,
            }
        }
    })
    .to_string()
}

/// Classify one inbound text frame
pub fn decode(data: &str) -> Frame {
    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => return malformed(data, format!("invalid JSON: {}", e)),
    };

    let Some(object) = value.as_object() else {
        return malformed(data, "frame is not a JSON object");
    };

    // Events are checked first; a push frame never carries a result
    let notification_error = match object.get("method") {
        Some(method) => match decode_notification(method, object) {
            Ok(notification) => return Frame::Notification(notification),
            Err(reason) => Some(reason),
        },
        None => None,
    };

    if object.contains_key("id")
        && (object.contains_key("result") || object.contains_key("error"))
    {
        return match decode_response(object) {
            Ok(response) => Frame::Response(response),
            Err(reason) => malformed(data, reason),
        };
    }

    let reason = notification_error
        .unwrap_or_else(|| "frame has neither an event shape nor an id with result/error".into());
    malformed(data, reason)
}

/// Classify one inbound binary frame
///
/// The server speaks text; binary frames are accepted when they hold UTF-8.
pub fn decode_bytes(data: &[u8]) -> Frame {
    match std::str::from_utf8(data) {
        Ok(text) => decode(text),
        Err(e) => Frame::Malformed(MalformedFrame {
            raw: String::from_utf8_lossy(data).into_owned(),
            reason: format!("binary frame is not UTF-8: {}", e),
        }),
    }
}

fn decode_notification(
    method: &Value,
    object: &Map<String, Value>,
) -> std::result::Result<Notification, String> {
    let method = method
        .as_str()
        .ok_or_else(|| "\"method\" is not a string".to_string())?;

    let event = object
        .get("params")
        .and_then(|params| params.get("value"))
        .and_then(Value::as_object)
        .ok_or_else(|| format!("\"{}\" frame has no params.value object", method))?;

    let event_type = event
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| "params.value.type is missing or not a string".to_string())?;
    let object_id = event
        .get("object")
        .and_then(Value::as_str)
        .ok_or_else(|| "params.value.object is missing or not a string".to_string())?;
    let payload = event
        .get("data")
        .cloned()
        .ok_or_else(|| "params.value.data is missing".to_string())?;

    Ok(Notification {
        method: method.to_string(),
        event_type: event_type.to_string(),
        object_id: object_id.to_string(),
        payload,
    })
}

fn decode_response(object: &Map<String, Value>) -> std::result::Result<Response, String> {
    let id = object
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| "\"id\" is not an unsigned integer".to_string())?;

    if let Some(error) = object.get("error") {
        let error: ServerErrorData = serde_json::from_value(error.clone())
            .map_err(|e| format!("invalid error object: {}", e))?;
        return Ok(Response::failure(id, error));
    }

    let result = object.get("result").cloned().unwrap_or(Value::Null);
    Ok(Response::success(id, result))
}

fn malformed(raw: &str, reason: impl Into<String>) -> Frame {
    Frame::Malformed(MalformedFrame {
        raw: raw.to_string(),
        reason: reason.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_field_order() {
        let request = Request::new(7, "create", json!({"type": "MediaPipeline"}));
        let text = encode(&request).unwrap();
        assert_eq!(
            text,
            r#"{"id":7,"method":"create","params":{"type":"MediaPipeline"},"jsonrpc":"2.0"}"#
        );
    }

    #[test]
    fn test_ping_round_trip() {
        let request = Request::new(42, "ping", json!({}));
        let bytes = encode_to_vec(&request).unwrap();
        let decoded: Request = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(decoded.id, 42);
        assert_eq!(decoded.method, "ping");
        assert_eq!(decoded.params, json!({}));
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_decode_success() {
        let frame = decode(r#"{"id":7,"result":{"sessionId":"s1","value":"p1"}}"#);
        assert_eq!(
            frame,
            Frame::Response(Response::success(7, json!({"sessionId": "s1", "value": "p1"})))
        );
    }

    #[test]
    fn test_decode_null_result_is_still_a_response() {
        let frame = decode(r#"{"jsonrpc":"2.0","id":3,"result":null}"#);
        assert_eq!(frame, Frame::Response(Response::success(3, Value::Null)));
    }

    #[test]
    fn test_decode_error() {
        let frame = decode(
            r#"{"id":9,"error":{"code":40208,"message":"already negotiated","data":{"type":"SDP"}}}"#,
        );
        match frame {
            Frame::Response(Response {
                id: 9,
                outcome: Outcome::Failure(error),
            }) => {
                assert_eq!(error.code, 40208);
                assert_eq!(error.message, "already negotiated");
                assert_eq!(error.error_type(), Some("SDP"));
            }
            other => panic!("expected failure response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_notification() {
        let frame = decode(
            r#"{"jsonrpc":"2.0","method":"onEvent","params":{"value":{"type":"OnIceCandidate","object":"X","data":{"candidate":"c1"}}}}"#,
        );
        assert_eq!(
            frame,
            Frame::Notification(Notification {
                method: "onEvent".into(),
                event_type: "OnIceCandidate".into(),
                object_id: "X".into(),
                payload: json!({"candidate": "c1"}),
            })
        );
    }

    #[test]
    fn test_notification_encoding_decodes_back() {
        let notification = Notification {
            method: "onEvent".into(),
            event_type: "EndOfStream".into(),
            object_id: "player-1".into(),
            payload: json!({"tags": []}),
        };
        assert_eq!(
            decode(&encode_notification(&notification)),
            Frame::Notification(notification)
        );
    }

    #[test]
    fn test_decode_malformed_shapes() {
        let cases = [
            ("not json", "invalid JSON"),
            ("[1,2]", "not a JSON object"),
            (r#"{"id":1}"#, "neither"),
            (r#"{"method":"onEvent","params":{}}"#, "params.value"),
            (
                r#"{"method":"onEvent","params":{"value":{"type":"T","data":{}}}}"#,
                "params.value.object",
            ),
            (r#"{"id":"abc","result":{}}"#, "unsigned integer"),
            (r#"{"id":1,"error":{"message":"no code"}}"#, "invalid error object"),
        ];

        for (raw, expected) in cases {
            match decode(raw) {
                Frame::Malformed(m) => {
                    assert!(m.reason.contains(expected), "{}: {}", raw, m.reason);
                    assert_eq!(m.raw, raw);
                }
                other => panic!("{} decoded as {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_decode_bytes() {
        assert!(decode_bytes(br#"{"id":1,"result":{}}"#).is_response());
        assert!(decode_bytes(&[0xff, 0xfe]).is_malformed());
    }
}
