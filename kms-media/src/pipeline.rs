//! Media pipelines
//!
//! A pipeline owns the session every element inside it is created in.

use crate::kind::MediaKind;
use crate::object::MediaObject;
use kms_rpc_client::{KmsClient, ObjectSpec};
use kms_rpc_core::{Error, Result};
use serde_json::{Map, Value};
use std::ops::Deref;

/// A `MediaPipeline` object plus element creation
#[derive(Debug, Clone)]
pub struct MediaPipeline {
    object: MediaObject,
}

impl MediaPipeline {
    /// Create a pipeline in a new session
    pub async fn create(client: &KmsClient) -> Result<Self> {
        let created = client.create(ObjectSpec::new(MediaKind::MediaPipeline.as_str())).await?;
        tracing::info!(
            pipeline = %created.object_id,
            session = %created.session_id,
            "Media pipeline created"
        );

        Ok(Self {
            object: MediaObject::new(
                client.clone(),
                created.session_id,
                created.object_id,
                MediaKind::MediaPipeline,
            ),
        })
    }

    /// Create an element of `kind` inside this pipeline
    ///
    /// `extra` is merged into the constructor params after `mediaPipeline`.
    pub async fn create_element(&self, kind: MediaKind, extra: Map<String, Value>) -> Result<MediaObject> {
        if kind == MediaKind::MediaPipeline {
            return Err(Error::Internal(
                "a pipeline cannot be created inside a pipeline".to_string(),
            ));
        }

        let mut spec = ObjectSpec::new(kind.as_str())
            .with_constructor_param("mediaPipeline", self.object.id())
            .in_session(self.object.session_id());
        spec.constructor_params.extend(extra);

        let created = self.object.client().create(spec).await?;
        tracing::debug!(kind = %kind, element = %created.object_id, "Media element created");

        Ok(MediaObject::new(
            self.object.client().clone(),
            created.session_id,
            created.object_id,
            kind,
        ))
    }

    pub async fn create_webrtc_endpoint(&self) -> Result<MediaObject> {
        self.create_element(MediaKind::WebRtcEndpoint, Map::new()).await
    }

    /// Player for `uri` (file, http or rtsp)
    pub async fn create_player_endpoint(&self, uri: &str) -> Result<MediaObject> {
        self.create_element(
            MediaKind::PlayerEndpoint,
            crate::endpoints::player::constructor(uri),
        )
        .await
    }

    /// Recorder writing to `uri`
    pub async fn create_recorder_endpoint(&self, uri: &str) -> Result<MediaObject> {
        self.create_element(
            MediaKind::RecorderEndpoint,
            crate::endpoints::recorder::constructor(uri),
        )
        .await
    }

    /// The pipeline as a plain media object
    pub fn object(&self) -> &MediaObject {
        &self.object
    }

    /// Release the pipeline and, on the server, everything in it
    pub async fn release(self) -> Result<()> {
        self.object.release().await
    }
}

impl Deref for MediaPipeline {
    type Target = MediaObject;

    fn deref(&self) -> &MediaObject {
        &self.object
    }
}
