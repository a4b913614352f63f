//! In-memory transport, connector and recorders shared by the integration
//! tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::value::RawValue;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use polygon_stream::{
    Client, CloseReason, Config, Connector, DialError, EventHandler, EventType, Frame,
    KeepaliveConfig, LogLevel, Logger, Transport, TransportError, WsConnector,
};

// =============================================================================
// Transport
// =============================================================================

/// Transport fed by the test through [`MockTransport::push`].
///
/// Every attempted send is recorded, including sends that fail.
pub struct MockTransport {
    inbound_tx: mpsc::UnboundedSender<Frame>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
    sent: Mutex<Vec<Frame>>,
    closed: CancellationToken,
    close_calls: AtomicUsize,
    auto_pong: bool,
    fail_writes: AtomicBool,
}

impl MockTransport {
    /// Transport that never answers pings.
    pub fn new() -> Arc<Self> {
        Self::build(false)
    }

    /// Transport that answers every ping with a pong.
    pub fn with_auto_pong() -> Arc<Self> {
        Self::build(true)
    }

    fn build(auto_pong: bool) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            sent: Mutex::new(Vec::new()),
            closed: CancellationToken::new(),
            close_calls: AtomicUsize::new(0),
            auto_pong,
            fail_writes: AtomicBool::new(false),
        })
    }

    /// Deliver a frame as if the server sent it.
    pub fn push(&self, frame: Frame) {
        let _ = self.inbound_tx.send(frame);
    }

    /// Deliver a text frame as if the server sent it.
    pub fn push_text(&self, text: &str) {
        self.push(Frame::Text(text.to_string()));
    }

    /// Make every later write fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Every frame the client tried to send.
    pub fn sent(&self) -> Vec<Frame> {
        self.sent.lock().clone()
    }

    /// Text frames the client tried to send, in order.
    pub fn sent_text(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|frame| match frame {
                Frame::Text(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Close frames the client tried to send.
    pub fn close_frames(&self) -> Vec<Option<CloseReason>> {
        self.sent
            .lock()
            .iter()
            .filter_map(|frame| match frame {
                Frame::Close(reason) => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of pings the client sent.
    pub fn ping_count(&self) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|frame| matches!(frame, Frame::Ping(_)))
            .count()
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Number of `close` calls.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, frame: Frame, _deadline: Duration) -> Result<(), TransportError> {
        let is_ping = matches!(frame, Frame::Ping(_));
        self.sent.lock().push(frame);

        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::WriteTimeout(Duration::ZERO));
        }
        if is_ping && self.auto_pong {
            self.push(Frame::Pong(Vec::new()));
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Frame, TransportError> {
        let mut inbound = self.inbound_rx.lock().await;
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(TransportError::Closed),
            frame = inbound.recv() => frame.ok_or(TransportError::Closed),
        }
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.cancel();
    }
}

// =============================================================================
// Connector
// =============================================================================

/// Connector handing out one [`MockTransport`].
pub struct MockConnector {
    transport: Arc<MockTransport>,
    dials: AtomicUsize,
    refuse: bool,
}

impl MockConnector {
    /// Connector that always succeeds with `transport`.
    pub fn new(transport: Arc<MockTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            dials: AtomicUsize::new(0),
            refuse: false,
        })
    }

    /// Connector whose handshake always fails.
    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            transport: MockTransport::new(),
            dials: AtomicUsize::new(0),
            refuse: true,
        })
    }

    /// Number of dial attempts.
    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn dial(
        &self,
        _url: &str,
        _max_message_size: usize,
    ) -> Result<Arc<dyn Transport>, DialError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(DialError::Other("connection refused".to_string()));
        }
        let transport: Arc<dyn Transport> = self.transport.clone();
        Ok(transport)
    }
}

/// Dials a fixed local address with the real WebSocket connector.
pub struct LoopbackConnector {
    url: String,
    inner: WsConnector,
}

impl LoopbackConnector {
    pub fn new(url: String, inner: WsConnector) -> Arc<Self> {
        Arc::new(Self { url, inner })
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn dial(
        &self,
        _url: &str,
        max_message_size: usize,
    ) -> Result<Arc<dyn Transport>, DialError> {
        self.inner.dial(&self.url, max_message_size).await
    }
}

/// Local WebSocket server that completes the handshake and never reads.
///
/// The socket stays open until the returned sender is dropped.
pub async fn stalled_peer() -> (String, tokio::sync::oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let _ = release_rx.await;
        drop(ws);
    });
    (format!("ws://{addr}/stocks"), release_tx)
}

// =============================================================================
// Recorders
// =============================================================================

/// Logger that keeps every line.
#[derive(Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Lines logged at `level`.
    pub fn at(&self, level: LogLevel) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    /// Number of lines at `level` starting with `prefix`.
    pub fn count(&self, level: LogLevel, prefix: &str) -> usize {
        self.at(level)
            .iter()
            .filter(|msg| msg.starts_with(prefix))
            .count()
    }

    /// Whether a line at `level` starts with `prefix`.
    pub fn has(&self, level: LogLevel, prefix: &str) -> bool {
        self.count(level, prefix) > 0
    }
}

impl Logger for RecordingLogger {
    fn debug(&self, msg: &str) {
        self.lines.lock().push((LogLevel::Debug, msg.to_string()));
    }

    fn info(&self, msg: &str) {
        self.lines.lock().push((LogLevel::Info, msg.to_string()));
    }

    fn error(&self, msg: &str) {
        self.lines.lock().push((LogLevel::Error, msg.to_string()));
    }
}

/// Event handler that keeps every envelope.
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<(EventType, String)>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(EventType, String)> {
        self.events.lock().clone()
    }

    pub fn types(&self) -> Vec<EventType> {
        self.events.lock().iter().map(|(t, _)| *t).collect()
    }
}

impl EventHandler for RecordingHandler {
    fn on_event(&self, event_type: EventType, envelope: &RawValue) {
        self.events
            .lock()
            .push((event_type, envelope.get().to_string()));
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A client wired to in-memory collaborators.
pub struct Harness {
    pub client: Client,
    pub transport: Arc<MockTransport>,
    pub connector: Arc<MockConnector>,
    pub log: Arc<RecordingLogger>,
    pub events: Arc<RecordingHandler>,
}

impl Harness {
    /// Client with default keepalive timing.
    pub fn new() -> Self {
        Self::with(MockTransport::new(), KeepaliveConfig::default())
    }

    /// Client with custom transport and keepalive timing.
    pub fn with(transport: Arc<MockTransport>, keepalive: KeepaliveConfig) -> Self {
        let connector = MockConnector::new(Arc::clone(&transport));
        let log = RecordingLogger::new();
        let events = RecordingHandler::new();

        let config = Config::new("test-key")
            .with_logger(log.clone())
            .with_handler(events.clone())
            .with_keepalive(keepalive);
        let client = Client::with_connector(config, connector.clone()).unwrap();

        Self {
            client,
            transport,
            connector,
            log,
            events,
        }
    }

    /// Connect and wait until the auth message has been written.
    pub async fn connect(&self) {
        self.client.connect().await.unwrap();
        assert!(
            wait_until(Duration::from_secs(1), || !self.transport.sent_text().is_empty()).await,
            "auth message was never written"
        );
    }

    /// Wait for every client task to finish, failing after one second.
    pub async fn join(&self) {
        tokio::time::timeout(Duration::from_secs(1), self.client.join())
            .await
            .expect("client tasks did not stop");
    }
}

/// Short keepalive timing for deadline tests.
pub fn fast_keepalive() -> KeepaliveConfig {
    KeepaliveConfig::new(
        Duration::from_millis(30),
        Duration::from_millis(100),
        Duration::from_millis(50),
    )
}

/// Poll `condition` until it holds or `limit` elapses.
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let poll = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(limit, poll).await.is_ok()
}

/// Run `future` with a one second limit.
pub async fn within_a_second<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(1), future)
        .await
        .expect("timed out")
}
