//! Connection manager
//!
//! Owns the WebSocket, the writer task and the reader loop, and wires
//! inbound frames to the [`PendingRegistry`] and the [`SubscriptionRouter`].
//!
//! # Writer Task
//!
//! Outgoing frames go through an unbounded queue to one writer task per
//! transport, so queueing a request never waits on the socket. A write that
//! fails, or makes no progress for `write_timeout`, marks the transport as
//! lost and the reader loop handles it like any other drop.
//!
//! # Reader Loop
//!
//! One task per connection reads frames until the transport drops or a
//! shutdown is signalled:
//!
//! - **Response** → `registry.resolve`
//! - **Notification** → `router.dispatch` (queues only, never waits on a callback)
//! - **Malformed** → logged and counted, the loop keeps reading
//!
//! When the transport drops (read side or write side), the writer is
//! detached first (so new sends fail with `NotConnected`), then every pending
//! request fails with `ConnectionLost`. The reconnection policy then decides between another
//! attempt and the terminal `Closed` state. A successful reconnect does not
//! replay requests or server-side subscriptions; callers re-establish them.
//!
//! On `Closed` the registry is closed and the router cleared.

use crate::connection_state::{ConnectionState, StateTracker};
use crate::metrics::ClientMetrics;
use crate::pending::PendingRegistry;
use crate::reconnect::ReconnectPolicy;
use crate::router::SubscriptionRouter;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use kms_rpc_core::{codec, Error, Frame, Request, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Reason recorded on pending requests when the client closes the connection
const CLIENT_CLOSED: &str = "client closed";

/// How long `close` lets the writer flush and send a close frame
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Queue and task of the writer for one transport
struct Writer {
    queue: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

impl Writer {
    /// Spawn the writer task; the receiver yields the reason if the write side fails
    fn spawn(sink: WsSink, write_timeout: Duration) -> (Self, oneshot::Receiver<String>) {
        let (queue, rx) = mpsc::unbounded_channel();
        let (lost_tx, lost_rx) = oneshot::channel();
        let task = tokio::spawn(run_writer(sink, rx, write_timeout, lost_tx));
        (Self { queue, task }, lost_rx)
    }

    /// Transport already gone: stop without flushing
    fn abort(self) {
        self.task.abort();
    }

    /// Let queued frames and a close frame go out, within `grace`
    async fn shutdown(self, grace: Duration) {
        drop(self.queue);
        let mut task = self.task;
        if tokio::time::timeout(grace, &mut task).await.is_err() {
            tracing::debug!("Writer did not finish in time, aborting");
            task.abort();
        }
    }
}

/// Handle to one logical connection; clones share it
#[derive(Clone)]
pub(crate) struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    url: String,
    connect_timeout: Duration,
    write_timeout: Duration,
    writer: Mutex<Option<Writer>>,
    state: StateTracker,
    registry: PendingRegistry,
    router: SubscriptionRouter,
    shutdown: watch::Sender<bool>,
    reader: Mutex<Option<JoinHandle<()>>>,
    connect_lock: Mutex<()>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl Connection {
    pub(crate) fn new(
        url: String,
        connect_timeout: Duration,
        write_timeout: Duration,
        policy: Box<dyn ReconnectPolicy>,
        router: SubscriptionRouter,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(ConnectionInner {
                url,
                connect_timeout,
                write_timeout,
                writer: Mutex::new(None),
                state: StateTracker::new(policy, metrics.clone()),
                registry: PendingRegistry::new(),
                router,
                shutdown,
                reader: Mutex::new(None),
                connect_lock: Mutex::new(()),
                metrics,
            }),
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.inner.url
    }

    pub(crate) fn registry(&self) -> &PendingRegistry {
        &self.inner.registry
    }

    pub(crate) fn router(&self) -> &SubscriptionRouter {
        &self.inner.router
    }

    pub(crate) async fn state(&self) -> ConnectionState {
        self.inner.state.get().await
    }

    /// Open the transport and start the reader loop
    ///
    /// A no-op when already connected.
    #[tracing::instrument(skip(self), fields(url = %self.inner.url))]
    pub(crate) async fn connect(&self) -> Result<()> {
        let _guard = self.inner.connect_lock.lock().await;

        match self.inner.state.get().await {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Closed => {
                return Err(Error::Connection("connection is closed".to_string()))
            }
            ConnectionState::Reconnecting { .. } => {
                return Err(Error::Connection("reconnection in progress".to_string()))
            }
            ConnectionState::Disconnected | ConnectionState::Connecting => {}
        }

        if !self.inner.state.set(ConnectionState::Connecting).await {
            return Err(Error::Connection("connection is closed".to_string()));
        }
        tracing::info!("Connecting to media server");

        let stream = match open(&self.inner.url, self.inner.connect_timeout).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "Connection failed");
                self.inner.state.set(ConnectionState::Disconnected).await;
                return Err(e);
            }
        };

        let (sink, source) = stream.split();
        let (writer, write_lost) = Writer::spawn(sink, self.inner.write_timeout);
        *self.inner.writer.lock().await = Some(writer);

        if !self.inner.state.set(ConnectionState::Connected).await {
            self.inner.detach_writer().await;
            return Err(Error::Connection("closed while connecting".to_string()));
        }

        let reader = tokio::spawn(run_reader(self.inner.clone(), source, write_lost));
        *self.inner.reader.lock().await = Some(reader);

        tracing::info!("Connected");
        Ok(())
    }

    /// Queue one request for the writer task
    ///
    /// Returns once queued; it never waits on the socket.
    pub(crate) async fn send(&self, request: &Request) -> Result<()> {
        let text = codec::encode(request)?;

        let writer = self.inner.writer.lock().await;
        let writer = writer.as_ref().ok_or(Error::NotConnected)?;
        writer
            .queue
            .send(Message::Text(text))
            .map_err(|_| Error::ConnectionLost("writer stopped".to_string()))?;

        tracing::debug!(id = request.id, method = %request.method, "Request queued");
        Ok(())
    }

    /// Terminal shutdown
    ///
    /// Fails every pending request, stops the reader loop, clears the
    /// router and closes the transport. A stalled writer delays this by at
    /// most `CLOSE_GRACE`. Safe to call repeatedly.
    pub(crate) async fn close(&self) {
        let first = self.inner.state.close().await;
        self.inner.shutdown.send_replace(true);
        let failed = self.inner.registry.close(CLIENT_CLOSED).await;

        let writer = self.inner.writer.lock().await.take();
        if let Some(writer) = writer {
            writer.shutdown(CLOSE_GRACE).await;
        }
        self.inner.router.clear().await;

        let reader = self.inner.reader.lock().await.take();
        if let Some(reader) = reader {
            if let Err(e) = reader.await {
                tracing::debug!(error = %e, "Reader task ended abnormally");
            }
        }

        if first {
            tracing::info!(url = %self.inner.url, failed, "Connection closed");
        }
    }

    /// Ask the reader loop to stop without waiting for it
    pub(crate) fn signal_shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }
}

async fn open(url: &str, timeout: Duration) -> Result<WsStream> {
    match tokio::time::timeout(timeout, connect_async(url)).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(Error::Connection(e.to_string())),
        Err(_) => Err(Error::Connection(format!(
            "connect timed out after {:?}",
            timeout
        ))),
    }
}

/// Resolves once shutdown has been signalled (or the signal is gone)
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn run_writer(
    mut sink: WsSink,
    mut queue: mpsc::UnboundedReceiver<Message>,
    write_timeout: Duration,
    lost: oneshot::Sender<String>,
) {
    while let Some(message) = queue.recv().await {
        let reason = match tokio::time::timeout(write_timeout, sink.send(message)).await {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("write stalled for {:?}", write_timeout),
        };
        tracing::error!(reason = %reason, "WebSocket write failed");
        let _ = lost.send(reason);
        return;
    }

    // Queue closed by `close`: say goodbye if the peer still listens
    match tokio::time::timeout(write_timeout, sink.close()).await {
        Ok(Err(e)) => tracing::debug!(error = %e, "Error closing WebSocket"),
        Err(_) => tracing::debug!("Close frame not sent in time"),
        Ok(Ok(())) => {}
    }
}

async fn run_reader(
    inner: Arc<ConnectionInner>,
    mut source: WsSource,
    mut write_lost: oneshot::Receiver<String>,
) {
    let mut shutdown = inner.shutdown.subscribe();
    let mut reason = CLIENT_CLOSED.to_string();

    loop {
        let Some(lost) = read_frames(&inner, &mut source, &mut write_lost, &mut shutdown).await else {
            break;
        };

        inner.detach_writer().await;
        if !inner.state.set(ConnectionState::Reconnecting { attempt: 0 }).await {
            break;
        }

        let failed = inner.registry.fail_all(&lost).await;
        tracing::warn!(reason = %lost, failed, "Connection lost");
        if let Some(ref m) = inner.metrics {
            m.record_error("connection_lost");
        }
        reason = lost;

        match reconnect(&inner, &mut shutdown).await {
            Some((next, lost)) => {
                source = next;
                write_lost = lost;
            }
            None => break,
        }
    }

    inner.state.close().await;
    inner.registry.close(&reason).await;
    inner.detach_writer().await;
    inner.router.clear().await;
    tracing::debug!("Reader loop stopped");
}

/// Read until the transport drops (returns the reason) or shutdown (returns None)
async fn read_frames(
    inner: &ConnectionInner,
    source: &mut WsSource,
    write_lost: &mut oneshot::Receiver<String>,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<String> {
    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => return None,
            lost = &mut *write_lost => {
                // A dropped sender means the writer was stopped on purpose
                return match lost {
                    Ok(reason) => Some(reason),
                    Err(_) if *shutdown.borrow() => None,
                    Err(_) => Some("writer stopped".to_string()),
                };
            }
            message = source.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => inner.handle_frame(codec::decode(&text)).await,
            Some(Ok(Message::Binary(bytes))) => inner.handle_frame(codec::decode_bytes(&bytes)).await,
            Some(Ok(Message::Close(frame))) => {
                let reason = match frame {
                    Some(frame) if !frame.reason.is_empty() => {
                        format!("closed by server: {}", frame.reason)
                    }
                    _ => "closed by server".to_string(),
                };
                return Some(reason);
            }
            // Ping/pong are answered by tungstenite
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::error!(error = %e, "WebSocket error");
                return Some(e.to_string());
            }
            None => return Some("connection closed".to_string()),
        }
    }
}

async fn reconnect(
    inner: &ConnectionInner,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<(WsSource, oneshot::Receiver<String>)> {
    while let Some(delay) = inner.state.next_reconnect_delay().await {
        let attempt = match inner.state.get().await {
            ConnectionState::Reconnecting { attempt } => attempt,
            _ => 0,
        };
        tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

        let opened = tokio::select! {
            _ = shutdown_requested(shutdown) => return None,
            opened = async {
                tokio::time::sleep(delay).await;
                open(&inner.url, inner.connect_timeout).await
            } => opened,
        };

        match opened {
            Ok(stream) => {
                let (sink, source) = stream.split();
                let (writer, write_lost) = Writer::spawn(sink, inner.write_timeout);
                *inner.writer.lock().await = Some(writer);

                if !inner.state.set(ConnectionState::Connected).await {
                    inner.detach_writer().await;
                    return None;
                }
                if let Some(ref m) = inner.metrics {
                    m.record_reconnection_success();
                }
                tracing::info!(attempt, "Reconnected");
                return Some((source, write_lost));
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Reconnection attempt failed");
                if let Some(ref m) = inner.metrics {
                    m.record_error("reconnection");
                }
            }
        }
    }

    if !*shutdown.borrow() {
        tracing::error!(url = %inner.url, "Reconnection abandoned");
    }
    None
}

impl ConnectionInner {
    /// Drop the current writer, if any, without waiting on the socket
    async fn detach_writer(&self) {
        let writer = self.writer.lock().await.take();
        if let Some(writer) = writer {
            writer.abort();
        }
    }

    async fn handle_frame(&self, frame: Frame) {
        match frame {
            Frame::Response(response) => {
                tracing::debug!(id = response.id, success = response.outcome.is_success(), "Response received");
                self.registry.resolve(response.id, response.outcome).await;
            }
            Frame::Notification(notification) => {
                tracing::debug!(
                    event_type = %notification.event_type,
                    object_id = %notification.object_id,
                    "Event received"
                );
                if let Some(ref m) = self.metrics {
                    m.record_notification(&notification.event_type);
                }
                self.router.dispatch(notification).await;
            }
            Frame::Malformed(malformed) => {
                let error = Error::Protocol(malformed.reason);
                tracing::warn!(error = %error, raw = %malformed.raw, "Discarding malformed frame");
                if let Some(ref m) = self.metrics {
                    m.record_malformed_frame();
                    m.record_error(error.kind());
                }
            }
        }
    }
}
