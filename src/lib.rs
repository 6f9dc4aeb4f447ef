//! KMS-RPC - Kurento media server JSON-RPC over WebSocket
//!
//! Convenience crate re-exporting the workspace crates:
//!
//! - **kms-rpc-core**: wire types, codec, error taxonomy, observability
//! - **kms-rpc-client**: connection, request correlation and event dispatch
//! - **kms-media**: pipelines, endpoints and filters on top of the client
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kms_rpc::media::MediaPipeline;
//! use kms_rpc::KmsClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = KmsClient::builder("ws://localhost:8888/kurento")
//!         .with_default_reconnect()
//!         .connect()
//!         .await?;
//!
//!     let pipeline = MediaPipeline::create(&client).await?;
//!     let player = pipeline.create_player_endpoint("file:///tmp/video.webm").await?;
//!     player.on_event("EndOfStream", |event| async move {
//!         println!("finished: {}", event.object_id);
//!     }).await;
//!
//!     pipeline.release().await?;
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

pub use kms_media as media;
pub use kms_rpc_client as client;
pub use kms_rpc_core as core;

pub use kms_rpc_client::{ClientBuilder, KmsClient};
