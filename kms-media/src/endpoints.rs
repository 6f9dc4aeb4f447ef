//! Endpoint operations and constructor params

/// WebRtcEndpoint: SDP negotiation and ICE
pub mod webrtc {
    use crate::object::{MediaObject, Operation};
    use kms_rpc_client::Notification;
    use kms_rpc_core::{Error, Result};
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    /// Event raised for every local candidate once gathering has started
    pub const ON_ICE_CANDIDATE: &str = "OnIceCandidate";

    /// An ICE candidate as exchanged with the browser
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct IceCandidate {
        pub candidate: String,
        pub sdp_mid: String,
        #[serde(rename = "sdpMLineIndex")]
        pub sdp_m_line_index: u32,
    }

    impl IceCandidate {
        /// Candidate carried by an `OnIceCandidate` event
        pub fn from_event(event: &Notification) -> Result<Self> {
            let candidate = event.payload.get("candidate").ok_or_else(|| {
                Error::Protocol(format!("{} event has no candidate", event.event_type))
            })?;
            Ok(serde_json::from_value(candidate.clone())?)
        }
    }

    /// Answer the remote SDP `offer`; the result value is the SDP answer
    pub fn process_offer(offer: &str) -> Operation {
        Operation::with_params("processOffer", json!({ "offer": offer }))
    }

    /// Add a remote ICE candidate
    pub fn add_ice_candidate(candidate: &IceCandidate) -> Operation {
        Operation::with_params("addIceCandidate", json!({ "candidate": candidate }))
    }

    /// Start gathering local candidates
    pub fn gather_candidates() -> Operation {
        Operation::new("gatherCandidates")
    }

    /// Treat "SDP endpoint already negotiated" (40208) as `Ok(None)`
    ///
    /// Every other error passes through unchanged.
    pub fn tolerate_already_negotiated<T>(result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(Error::Server(ref data)) if data.is_already_negotiated() => {
                tracing::debug!(message = %data.message, "Endpoint already negotiated");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Process `offer` and return the SDP answer
    ///
    /// `None` when the endpoint had already been negotiated.
    pub async fn negotiate(endpoint: &MediaObject, offer: &str) -> Result<Option<String>> {
        let answer = tolerate_already_negotiated(endpoint.apply(process_offer(offer)).await)?;
        answer
            .map(|value| match value {
                Value::String(sdp) => Ok(sdp),
                other => Err(Error::Protocol(format!(
                    "processOffer returned a non-string answer: {}",
                    other
                ))),
            })
            .transpose()
    }
}

/// PlayerEndpoint: reads media from a URI
pub mod player {
    use crate::object::Operation;
    use serde_json::{Map, Value};

    /// Raised when the media reaches its end
    pub const END_OF_STREAM: &str = "EndOfStream";

    pub fn constructor(uri: &str) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("uri".to_string(), Value::from(uri));
        params
    }

    pub fn play() -> Operation {
        Operation::new("play")
    }

    pub fn pause() -> Operation {
        Operation::new("pause")
    }

    pub fn stop() -> Operation {
        Operation::new("stop")
    }
}

/// RecorderEndpoint: writes media to a URI
pub mod recorder {
    use crate::object::Operation;
    use serde_json::{Map, Value};

    pub fn constructor(uri: &str) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("uri".to_string(), Value::from(uri));
        params
    }

    pub fn record() -> Operation {
        Operation::new("record")
    }

    pub fn stop() -> Operation {
        Operation::new("stop")
    }
}
