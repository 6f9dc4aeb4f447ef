//! Connection lifecycle integration tests

mod common;

use common::{eventually, MockServer};
use kms_rpc_client::{ConnectionState, Error, KmsClient};
use serde_json::json;
use std::time::Duration;

const LONG: Duration = Duration::from_secs(30);

#[tokio::test]
async fn test_connect_and_close() {
    let server = MockServer::silent().await;
    let client = KmsClient::connect(server.url()).await.unwrap();

    assert_eq!(client.connection_state().await, ConnectionState::Connected);
    assert_eq!(client.url(), server.url());

    client.close().await.unwrap();
    assert_eq!(client.connection_state().await, ConnectionState::Closed);

    // Idempotent
    client.close().await.unwrap();
    eventually(|| async { server.active() == 0 }).await;
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = KmsClient::connect(format!("ws://{}", addr)).await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
}

#[tokio::test]
async fn test_connect_invalid_url() {
    let err = KmsClient::connect("not a url").await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
}

#[tokio::test]
async fn test_transport_drop_fails_every_pending_call() {
    let server = MockServer::silent().await;
    let client = KmsClient::connect(server.url()).await.unwrap();

    let calls: Vec<_> = (0..5)
        .map(|n| {
            let client = client.clone();
            tokio::spawn(async move { client.call("invoke", json!({"n": n}), LONG).await })
        })
        .collect();

    eventually(|| async { client.pending_requests().await == 5 }).await;
    server.drop_connections();

    for call in calls {
        let result = tokio::time::timeout(Duration::from_secs(1), call)
            .await
            .expect("pending call hung")
            .unwrap();
        assert!(matches!(result, Err(Error::ConnectionLost(_))));
    }

    // No reconnection configured: the connection is gone for good
    eventually(|| async { client.connection_state().await == ConnectionState::Closed }).await;
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionLost(_) | Error::NotConnected));
}

#[tokio::test]
async fn test_close_fails_pending_calls() {
    let server = MockServer::silent().await;
    let client = KmsClient::connect(server.url()).await.unwrap();

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.call("invoke", json!({}), LONG).await })
    };
    eventually(|| async { client.pending_requests().await == 1 }).await;

    client.close().await.unwrap();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(Error::ConnectionLost(ref reason)) if reason == "client closed"));
    assert_eq!(client.pending_requests().await, 0);
}

#[tokio::test]
async fn test_dropping_last_handle_closes_transport() {
    let server = MockServer::silent().await;
    let client = KmsClient::connect(server.url()).await.unwrap();
    let clone = client.clone();

    eventually(|| async { server.active() == 1 }).await;

    drop(client);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.active(), 1);

    drop(clone);
    eventually(|| async { server.active() == 0 }).await;
}

#[tokio::test]
async fn test_listeners_cleared_on_close() {
    let server = MockServer::silent().await;
    let client = KmsClient::connect(server.url()).await.unwrap();

    let handle = client.on_event("EndOfStream", |_| async {}).await;
    client.close().await.unwrap();

    assert!(!client.remove_listener(&handle).await);
}

#[tokio::test]
async fn test_close_releases_listener_holding_client() {
    let server = MockServer::silent().await;
    let client = KmsClient::connect(server.url()).await.unwrap();

    let captured = client.clone();
    client
        .on_event("EndOfStream", move |_| {
            let captured = captured.clone();
            async move {
                let _ = captured.ping().await;
            }
        })
        .await;
    eventually(|| async { server.active() == 1 }).await;

    // The listener keeps the client alive; close() is what ends the connection
    client.close().await.unwrap();
    eventually(|| async { server.active() == 0 }).await;
    assert_eq!(client.connection_state().await, ConnectionState::Closed);
}
