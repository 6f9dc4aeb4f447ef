//! WebRTC loopback demo
//!
//! Reads an SDP offer on stdin, answers it from a WebRtcEndpoint connected
//! back to itself, and prints the local ICE candidates as JSON lines.
//!
//! Run with: cargo run --example webrtc_loopback < offer.sdp

use kms_rpc::media::endpoints::webrtc;
use kms_rpc::media::MediaPipeline;
use kms_rpc::KmsClient;
use std::io::Read;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("info,kms_rpc_client=debug")
        .init();

    let mut offer = String::new();
    std::io::stdin().read_to_string(&mut offer)?;

    let url = std::env::var("KMS_URL").unwrap_or_else(|_| "ws://localhost:8888/kurento".into());
    let client = KmsClient::builder(url)
        .with_default_reconnect()
        .connect()
        .await?;

    let pipeline = MediaPipeline::create(&client).await?;
    let endpoint = pipeline.create_webrtc_endpoint().await?;
    endpoint.loopback().await?;

    endpoint
        .listen(webrtc::ON_ICE_CANDIDATE, |event| async move {
            match webrtc::IceCandidate::from_event(&event) {
                Ok(candidate) => match serde_json::to_string(&candidate) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::warn!(error = %e, "Cannot encode candidate"),
                },
                Err(e) => tracing::warn!(error = %e, "Bad candidate event"),
            }
        })
        .await?;

    match webrtc::negotiate(&endpoint, &offer).await? {
        Some(answer) => println!("{}", answer),
        None => tracing::info!("Endpoint was already negotiated"),
    }
    endpoint.apply(webrtc::gather_candidates()).await?;

    tokio::time::sleep(Duration::from_secs(30)).await;

    pipeline.release().await?;
    client.close().await?;
    Ok(())
}
