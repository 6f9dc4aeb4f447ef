//! Common test utilities for kms-rpc-client integration tests
//!
//! A mock media server speaking just enough of the JSON-RPC dialect:
//! it answers requests through a handler, can hold replies back and send
//! them in a chosen order, push events, and drop every open connection.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tokio_tungstenite::tungstenite::Message;

type Handler = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

#[derive(Clone, Debug)]
enum Control {
    Send(String),
    Drop,
}

/// Mock media server
pub struct MockServer {
    addr: SocketAddr,
    requests: mpsc::UnboundedReceiver<Value>,
    control: broadcast::Sender<Control>,
    accepted: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    accept_task: JoinHandle<()>,
}

impl MockServer {
    /// Answer each request with `handler(request)`; `None` means no reply
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        Self::spawn(Arc::new(handler), None).await
    }

    /// Never reply
    pub async fn silent() -> Self {
        Self::start(|_| None).await
    }

    /// Hold replies until `order.len()` are ready, then send them as
    /// `order` lists (indexes into arrival order)
    pub async fn start_reordered<F>(handler: F, order: Vec<usize>) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        Self::spawn(Arc::new(handler), Some(order)).await
    }

    async fn spawn(handler: Handler, order: Option<Vec<usize>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (request_tx, requests) = mpsc::unbounded_channel();
        let (control, _) = broadcast::channel(64);
        let accepted = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));

        let accept_task = {
            let control = control.clone();
            let accepted = accepted.clone();
            let active = active.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let control_rx = control.subscribe();
                    let handler = handler.clone();
                    let order = order.clone();
                    let request_tx = request_tx.clone();
                    let accepted = accepted.clone();
                    let active = active.clone();

                    tokio::spawn(async move {
                        let Ok(ws) = accept_async(stream).await else {
                            return;
                        };
                        accepted.fetch_add(1, Ordering::SeqCst);
                        active.fetch_add(1, Ordering::SeqCst);
                        serve(ws, handler, order, request_tx, control_rx).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            })
        };

        Self {
            addr,
            requests,
            control,
            accepted,
            active,
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

    /// Send a raw text frame on every open connection
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.control.send(Control::Send(frame.into()));
    }

    /// Push an `onEvent` notification on every open connection
    pub fn push_event(&self, event_type: &str, object_id: &str, data: Value) {
        self.push(event(event_type, object_id, data).to_string());
    }

    /// Drop every open connection without a close handshake
    pub fn drop_connections(&self) {
        let _ = self.control.send(Control::Drop);
    }

    /// Connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Connections currently open
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop listening and drop every open connection
    pub fn shutdown(&self) {
        self.accept_task.abort();
        self.drop_connections();
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn serve(
    ws: WebSocketStream<TcpStream>,
    handler: Handler,
    order: Option<Vec<usize>>,
    request_tx: mpsc::UnboundedSender<Value>,
    mut control: broadcast::Receiver<Control>,
) {
    let (mut write, mut read) = ws.split();
    let mut held: Vec<Value> = Vec::new();

    loop {
        tokio::select! {
            command = control.recv() => match command {
                Ok(Control::Send(text)) => {
                    if write.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Ok(Control::Drop) | Err(_) => break,
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

                let Some(reply) = handler(&request) else {
                    continue;
                };

                match &order {
                    None => {
                        if write.send(Message::Text(reply.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(order) => {
                        held.push(reply);
                        if held.len() == order.len() {
                            for &index in order {
                                let frame = held[index].to_string();
                                if write.send(Message::Text(frame)).await.is_err() {
                                    return;
                                }
                            }
                            held.clear();
                        }
                    }
                }
            }
        }
    }
}

/// Peer that completes the handshake and then never reads
///
/// Once the socket buffers fill, every client write stalls.
pub struct StalledServer {
    addr: SocketAddr,
    held: Arc<std::sync::Mutex<Vec<WebSocketStream<TcpStream>>>>,
    accept_task: JoinHandle<()>,
}

impl StalledServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let held = Arc::new(std::sync::Mutex::new(Vec::new()));

        let accept_task = {
            let held = held.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    if let Ok(ws) = accept_async(stream).await {
                        held.lock().unwrap().push(ws);
                    }
                }
            })
        };

        Self {
            addr,
            held,
            accept_task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/kurento", self.addr)
    }
}

impl Drop for StalledServer {
    fn drop(&mut self) {
        self.accept_task.abort();
        if let Ok(mut held) = self.held.lock() {
            held.clear();
        }
    }
}

/// Params large enough to fill the socket buffers of a peer that never reads
pub fn oversized_params() -> Value {
    json!({"blob": "x".repeat(16 << 20)})
}

/// Success reply echoing the request's id
pub fn ok(request: &Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": request["id"], "result": result})
}

/// Error reply echoing the request's id
pub fn fail(request: &Value, code: i64, message: &str, data: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": request["id"],
        "error": {"code": code, "message": message, "data": data},
    })
}

/// `onEvent` notification frame
pub fn event(event_type: &str, object_id: &str, data: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "onEvent",
        "params": {"value": {"type": event_type, "object": object_id, "data": data}},
    })
}

/// Answers every request with its own params under "value"
pub fn echo(request: &Value) -> Option<Value> {
    Some(ok(request, json!({"value": request["params"].clone()})))
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
