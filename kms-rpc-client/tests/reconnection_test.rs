//! Automatic reconnection integration tests

mod common;

use common::{echo, eventually, MockServer};
use kms_rpc_client::{ClientBuilder, ConnectionState, Error, FixedDelay, Notification};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

fn fast_retry(attempts: u32) -> Box<FixedDelay> {
    Box::new(FixedDelay::new(Duration::from_millis(20)).with_max_attempts(attempts))
}

#[tokio::test]
async fn test_reconnect_after_drop() {
    let server = MockServer::start(echo).await;
    let client = ClientBuilder::new(server.url())
        .with_reconnect(fast_retry(10))
        .connect()
        .await
        .unwrap();

    client.ping().await.unwrap();
    server.drop_connections();

    eventually(|| async { server.accepted() == 2 }).await;
    eventually(|| async { client.connection_state().await == ConnectionState::Connected }).await;

    let result = client.call("ping", json!({"after": "reconnect"}), Duration::from_secs(2)).await.unwrap();
    assert_eq!(result["value"]["after"], "reconnect");
}

#[tokio::test]
async fn test_pending_calls_fail_on_drop_even_with_reconnect() {
    let server = MockServer::silent().await;
    let client = ClientBuilder::new(server.url())
        .with_reconnect(fast_retry(10))
        .connect()
        .await
        .unwrap();

    let calls: Vec<_> = (0..3)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.call("invoke", json!({}), Duration::from_secs(30)).await })
        })
        .collect();
    eventually(|| async { client.pending_requests().await == 3 }).await;

    server.drop_connections();

    for call in calls {
        let result = tokio::time::timeout(Duration::from_secs(1), call).await.unwrap().unwrap();
        assert!(matches!(result, Err(Error::ConnectionLost(_))));
    }
    eventually(|| async { client.is_connected().await }).await;
}

#[tokio::test]
async fn test_local_listeners_survive_reconnect() {
    let server = MockServer::silent().await;
    let client = ClientBuilder::new(server.url())
        .with_reconnect(fast_retry(10))
        .connect()
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();
    client
        .on_event("OnIceCandidate", move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event);
            }
        })
        .await;

    server.drop_connections();
    eventually(|| async { server.accepted() == 2 && server.active() == 1 }).await;
    eventually(|| async { client.is_connected().await }).await;

    server.push_event("OnIceCandidate", "w1", json!({"n": 1}));
    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.payload["n"], 1);
}

#[tokio::test]
async fn test_reconnect_gives_up() {
    let server = MockServer::silent().await;
    let client = ClientBuilder::new(server.url())
        .with_reconnect(fast_retry(2))
        .connect_timeout(Duration::from_millis(200))
        .connect()
        .await
        .unwrap();

    server.shutdown();

    eventually(|| async { client.connection_state().await == ConnectionState::Closed }).await;
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionLost(_) | Error::NotConnected));
}

#[tokio::test]
async fn test_without_reconnect_closes_on_drop() {
    let server = MockServer::silent().await;
    let client = ClientBuilder::new(server.url())
        .with_default_reconnect()
        .without_reconnect()
        .connect()
        .await
        .unwrap();

    server.drop_connections();
    eventually(|| async { client.connection_state().await == ConnectionState::Closed }).await;
    assert_eq!(server.accepted(), 1);
}
