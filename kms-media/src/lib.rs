//! Media objects on top of the kms-rpc client
//!
//! Pipelines, endpoints, filters and hubs all share one handle type,
//! [`MediaObject`]. Type-specific behaviour lives in the [`endpoints`] and
//! [`filters`] modules as [`Operation`] builders.
//!
//! ```rust,no_run
//! use kms_media::{endpoints::webrtc, MediaPipeline};
//! use kms_rpc_client::KmsClient;
//!
//! # async fn run(offer: &str) -> kms_rpc_core::Result<()> {
//! let client = KmsClient::connect("ws://localhost:8888/kurento").await?;
//! let pipeline = MediaPipeline::create(&client).await?;
//!
//! let endpoint = pipeline.create_webrtc_endpoint().await?;
//! endpoint.loopback().await?;
//!
//! let _answer = webrtc::negotiate(&endpoint, offer).await?;
//! endpoint.apply(webrtc::gather_candidates()).await?;
//!
//! pipeline.release().await?;
//! # Ok(())
//! # }
//! ```

pub mod endpoints;
pub mod filters;
mod kind;
mod object;
mod pipeline;

pub use filters::Placement;
pub use kind::{Category, MediaKind};
pub use object::{MediaObject, Operation};
pub use pipeline::MediaPipeline;
