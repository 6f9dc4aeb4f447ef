//! Common test utilities for kms-media integration tests
//!
//! A fake media server that keeps just enough state to play along:
//! `create` hands out ids, `subscribe` hands out subscription ids,
//! `processOffer` answers once per endpoint and then reports 40208.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const SESSION: &str = "session-1";
pub const ANSWER: &str = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\n";

#[derive(Default)]
struct State {
    next_id: u64,
    negotiated: HashSet<String>,
}

/// Fake media server
pub struct MediaServer {
    addr: SocketAddr,
    requests: mpsc::UnboundedReceiver<Value>,
    push: broadcast::Sender<String>,
    accept_task: JoinHandle<()>,
}

impl MediaServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (request_tx, requests) = mpsc::unbounded_channel();
        let (push, _) = broadcast::channel(64);
        let state = Arc::new(Mutex::new(State::default()));

        let accept_task = {
            let push = push.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let push_rx = push.subscribe();
                    let request_tx = request_tx.clone();
                    let state = state.clone();
                    tokio::spawn(async move {
                        if let Ok(ws) = accept_async(stream).await {
                            serve(ws, state, request_tx, push_rx).await;
                        }
                    });
                }
            })
        };

        Self {
            addr,
            requests,
            push,
            accept_task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/kurento", self.addr)
    }

    /// Next request received, parsed
    pub async fn next_request(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("no request received")
            .expect("server stopped")
    }

    /// Next request whose method is `method`, skipping others
    pub async fn next_call(&mut self, method: &str) -> Value {
        loop {
            let request = self.next_request().await;
            if request["method"] == method {
                return request;
            }
        }
    }

    /// Push an `onEvent` notification raised by `object_id`
    pub fn push_event(&self, event_type: &str, object_id: &str, data: Value) {
        let frame = json!({
            "jsonrpc": "2.0",
            "method": "onEvent",
            "params": {"value": {"type": event_type, "object": object_id, "data": data}},
        });
        let _ = self.push.send(frame.to_string());
    }
}

impl Drop for MediaServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    state: Arc<Mutex<State>>,
    request_tx: mpsc::UnboundedSender<Value>,
    mut push: broadcast::Receiver<String>,
) {
    let (mut write, mut read) = ws.split();

    loop {
        let frame = tokio::select! {
            pushed = push.recv() => match pushed {
                Ok(frame) => frame,
                Err(_) => break,
            },
            message = read.next() => {
                let text = match message {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                let Ok(request) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                let _ = request_tx.send(request.clone());
                answer(&state, &request).to_string()
            }
        };

        if write.send(Message::Text(frame)).await.is_err() {
            break;
        }
    }
}

fn answer(state: &Mutex<State>, request: &Value) -> Value {
    let params = &request["params"];
    let mut state = state.lock().unwrap();

    let result = match request["method"].as_str().unwrap_or_default() {
        "create" => {
            state.next_id += 1;
            let id = format!("{}_{}", params["type"].as_str().unwrap_or("Object"), state.next_id);
            json!({"sessionId": SESSION, "value": id})
        }
        "subscribe" => {
            state.next_id += 1;
            json!({"sessionId": SESSION, "value": format!("sub_{}", state.next_id)})
        }
        "invoke" if params["operation"] == "processOffer" => {
            let object = params["object"].as_str().unwrap_or_default().to_string();
            if !state.negotiated.insert(object) {
                return json!({
                    "jsonrpc": "2.0",
                    "id": request["id"],
                    "error": {
                        "code": 40208,
                        "message": "Endpoint already negotiated",
                        "data": {"type": "SDP_END_POINT_ALREADY_NEGOTIATED"},
                    },
                });
            }
            json!({"sessionId": SESSION, "value": ANSWER})
        }
        _ => json!({"sessionId": SESSION}),
    };

    json!({"jsonrpc": "2.0", "id": request["id"], "result": result})
}

/// Poll `check` until it holds, failing the test after two seconds
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
