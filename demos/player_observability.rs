//! Player demo with OpenTelemetry export
//!
//! Plays a URI into a recorder and exports traces and metrics over OTLP.
//!
//! Run with: cargo run --example player_observability -- <uri> <record-uri>

use kms_rpc::core::ObservabilityConfig;
use kms_rpc::media::endpoints::{player, recorder};
use kms_rpc::media::MediaPipeline;
use kms_rpc::KmsClient;
use tokio::sync::oneshot;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let uri = args
        .next()
        .unwrap_or_else(|| "http://files.openvidu.io/video/format/sintel.webm".into());
    let target = args.next().unwrap_or_else(|| "file:///tmp/recording.webm".into());

    let otel_config = ObservabilityConfig::new("kms-player-demo")
        .with_endpoint("http://localhost:4317")
        .with_log_level("debug");

    let client = KmsClient::builder("ws://localhost:8888/kurento")
        .with_observability(otel_config)
        .connect()
        .await?;

    let pipeline = MediaPipeline::create(&client).await?;
    let source = pipeline.create_player_endpoint(&uri).await?;
    let sink = pipeline.create_recorder_endpoint(&target).await?;
    source.connect(&sink).await?;

    let (done_tx, done_rx) = oneshot::channel();
    let done_tx = std::sync::Mutex::new(Some(done_tx));
    source
        .listen(player::END_OF_STREAM, move |_| {
            let sender = done_tx.lock().ok().and_then(|mut slot| slot.take());
            async move {
                if let Some(sender) = sender {
                    let _ = sender.send(());
                }
            }
        })
        .await?;

    sink.apply(recorder::record()).await?;
    source.apply(player::play()).await?;
    tracing::info!(%uri, %target, "Playing");

    let _ = done_rx.await;
    sink.apply(recorder::stop()).await?;

    pipeline.release().await?;
    client.close().await?;
    kms_rpc::core::shutdown_observability();
    Ok(())
}
