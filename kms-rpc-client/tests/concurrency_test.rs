//! Concurrent callers: id uniqueness and correlation under reordering

mod common;

use common::{echo, MockServer};
use kms_rpc_client::KmsClient;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_get_distinct_ids() {
    let mut server = MockServer::start(echo).await;
    let client = KmsClient::connect(server.url()).await.unwrap();

    let mut tasks = Vec::new();
    for n in 0..50 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            client.call("ping", json!({"n": n}), TIMEOUT).await
        }));
    }

    for (n, task) in tasks.into_iter().enumerate() {
        let result = task.await.unwrap().unwrap();
        assert_eq!(result["value"]["n"], n);
    }

    let mut ids = HashSet::new();
    for _ in 0..50 {
        let request = server.next_request().await;
        assert!(ids.insert(request["id"].as_u64().unwrap()));
    }
    assert_eq!(ids.len(), 50);
    assert_eq!(client.pending_requests().await, 0);
}

#[tokio::test]
async fn test_reordered_responses_reach_their_callers() {
    // Replies for ids [1, 2, 3] leave the server as [3, 1, 2]
    let server = MockServer::start_reordered(echo, vec![2, 0, 1]).await;
    let client = KmsClient::connect(server.url()).await.unwrap();

    let calls = (0..3).map(|n| {
        let client = client.clone();
        tokio::spawn(async move { (n, client.call("invoke", json!({"n": n}), TIMEOUT).await) })
    });

    for call in calls.collect::<Vec<_>>() {
        let (n, result) = call.await.unwrap();
        assert_eq!(result.unwrap()["value"], json!({"n": n}));
    }
}

#[tokio::test]
async fn test_duplicate_response_is_ignored() {
    let server = MockServer::start(|request| {
        (request["method"] == "ping").then(|| common::ok(request, json!({"value": "pong"})))
    })
    .await;
    let client = KmsClient::connect(server.url()).await.unwrap();

    let first = client.call("ping", json!({}), TIMEOUT).await.unwrap();
    assert_eq!(first["value"], "pong");

    // A second reply for id 1 matches nothing and is dropped
    server.push(json!({"id": 1, "result": {"value": "again"}}).to_string());

    let second = client.call("ping", json!({}), TIMEOUT).await.unwrap();
    assert_eq!(second["value"], "pong");
}
