//! Polygon WebSocket Client
//!
//! Owns the connection lifecycle: construction enqueues the authentication
//! message, `connect` dials the feed and starts the reader, writer and
//! processor tasks, `close` cancels them and sends a close frame.
//!
//! # Stream URL
//!
//! `wss://{feed}.polygon.io/{market}`, e.g. `wss://socket.polygon.io/stocks`.
//!
//! # Tasks
//!
//! ```text
//! Transport -> reader -> inbound queue -> processor -> status table / EventHandler
//! outbound queue -> writer -> Transport            (plus keepalive pings)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::keepalive::{KeepaliveConfig, MAX_MESSAGE_SIZE, ReadDeadline};
use super::{processor, reader, writer};
use crate::application::ports::{
    CloseReason, Connector, DialError, EventHandler, Frame, Logger, Transport, TransportError,
};
use crate::domain::envelope::ControlMessage;
use crate::domain::lifecycle::{ConnectionState, StateCell};
use crate::infrastructure::config::{Config, ConfigError};
use crate::infrastructure::logging::NopLogger;
use crate::infrastructure::metrics;
use crate::infrastructure::transport::WsConnector;

// =============================================================================
// Error Type
// =============================================================================

/// Errors raised when enqueuing an outbound frame.
#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    /// The client has been closed.
    #[error("client is closed")]
    Closed,
}

// =============================================================================
// Shared State
// =============================================================================

/// State shared by the client handle and its tasks.
pub(crate) struct Shared {
    pub(crate) cancel: CancellationToken,
    pub(crate) log: Arc<dyn Logger>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    state: StateCell,
    authenticated: AtomicBool,
    closing: AtomicBool,
    write_wait: Duration,
}

impl Shared {
    /// Current lifecycle state.
    pub(crate) fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Move the lifecycle forward to `next`.
    pub(crate) fn advance(&self, next: ConnectionState) {
        if self.state.advance(next) {
            metrics::set_connection_state(next);
        }
    }

    /// Record that the server accepted the credentials.
    pub(crate) fn mark_authenticated(&self) {
        self.authenticated.store(true, Ordering::SeqCst);
        self.advance(ConnectionState::Authenticated);
    }

    /// Cancel every task and send a close frame.
    ///
    /// No-op without a transport or when a close is already under way.
    pub(crate) async fn close(&self) -> Result<(), TransportError> {
        let transport = self.transport.read().clone();
        let Some(transport) = transport else {
            return Ok(());
        };
        if self.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.advance(ConnectionState::Closing);
        self.cancel.cancel();

        let result = transport
            .send(Frame::Close(Some(CloseReason::normal())), self.write_wait)
            .await;
        transport.close().await;
        self.advance(ConnectionState::Closed);

        match &result {
            Ok(()) => self.log.info("connection closed successfully"),
            Err(e) => self.log.error(&format!("failed to gracefully close: {e}")),
        }
        result
    }

    /// Release the transport after a loop lost the connection.
    ///
    /// Stops the other loops and turns a later `close` into a no-op.
    pub(crate) async fn mark_closed(&self, transport: &dyn Transport) {
        self.closing.store(true, Ordering::SeqCst);
        self.cancel.cancel();
        transport.close().await;
        self.advance(ConnectionState::Closed);
    }
}

#[cfg(test)]
impl Shared {
    /// Shared state with no transport, for exercising the processor alone.
    pub(crate) fn detached(log: Arc<dyn Logger>) -> Self {
        Self {
            cancel: CancellationToken::new(),
            log,
            transport: RwLock::new(None),
            state: StateCell::new(),
            authenticated: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            write_wait: super::keepalive::WRITE_WAIT,
        }
    }
}

/// Queue halves handed to the tasks on the first successful connect.
///
/// Taking them out of the client is what makes `connect` idempotent.
struct LoopChannels {
    outbound_rx: mpsc::Receiver<String>,
    inbound_tx: mpsc::Sender<String>,
    inbound_rx: mpsc::Receiver<String>,
}

// =============================================================================
// Client
// =============================================================================

/// Polygon WebSocket client.
///
/// One client serves one logical connection. Once its tasks have ended,
/// build a new client to reconnect.
pub struct Client {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    handler: Option<Arc<dyn EventHandler>>,
    url: String,
    keepalive: KeepaliveConfig,
    outbound_tx: mpsc::Sender<String>,
    channels: tokio::sync::Mutex<Option<LoopChannels>>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Client {
    /// Create a client that dials with `tokio-tungstenite`.
    ///
    /// Enqueues the authentication message; performs no network I/O.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the settings are invalid.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let connector = WsConnector::with_close_timeout(config.keepalive.write_wait);
        Self::with_connector(config, Arc::new(connector))
    }

    /// Create a client that dials through `connector`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the settings are invalid.
    pub fn with_connector(
        config: Config,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let url = config.stream_url();
        let log = config.log.unwrap_or_else(|| Arc::new(NopLogger));

        let (outbound_tx, outbound_rx) = mpsc::channel(config.queues.outbound_capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(config.queues.inbound_capacity);

        let auth = ControlMessage::auth(config.api_key)
            .to_json()
            .map_err(ConfigError::AuthMessage)?;
        outbound_tx
            .try_send(auth)
            .map_err(|_| ConfigError::InvalidCapacity("outbound"))?;

        let shared = Arc::new(Shared {
            cancel: CancellationToken::new(),
            log,
            transport: RwLock::new(None),
            state: StateCell::new(),
            authenticated: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            write_wait: config.keepalive.write_wait,
        });

        Ok(Self {
            shared,
            connector,
            handler: config.handler,
            url,
            keepalive: config.keepalive,
            outbound_tx,
            channels: tokio::sync::Mutex::new(Some(LoopChannels {
                outbound_rx,
                inbound_tx,
                inbound_rx,
            })),
            tasks: tokio::sync::Mutex::new(Vec::new()),
        })
    }

    /// Dial the feed and start the reader, writer and processor tasks.
    ///
    /// Returns once the tasks are running; authentication completes
    /// asynchronously. A no-op once a previous call has connected.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake fails.
    pub async fn connect(&self) -> Result<(), DialError> {
        let mut slot = self.channels.lock().await;
        let Some(channels) = slot.take() else {
            return Ok(());
        };

        self.shared.advance(ConnectionState::Connecting);
        self.shared.log.debug(&format!("dialing {}", self.url));

        let transport = match self.connector.dial(&self.url, MAX_MESSAGE_SIZE).await {
            Ok(transport) => transport,
            Err(e) => {
                *slot = Some(channels);
                self.shared.state.reset(ConnectionState::Unconnected);
                metrics::set_connection_state(ConnectionState::Unconnected);
                return Err(e);
            }
        };

        let deadline = Arc::new(ReadDeadline::new(self.keepalive.pong_wait));
        *self.shared.transport.write() = Some(Arc::clone(&transport));
        self.shared.advance(ConnectionState::Connected);

        let handler: Arc<dyn EventHandler> = match &self.handler {
            Some(handler) => Arc::clone(handler),
            None => Arc::new(processor::LogEventHandler::new(Arc::clone(&self.shared.log))),
        };

        let reader = tokio::spawn(reader::run(
            Arc::clone(&self.shared),
            Arc::clone(&transport),
            channels.inbound_tx,
            deadline,
        ));
        let writer = tokio::spawn(writer::run(
            Arc::clone(&self.shared),
            transport,
            channels.outbound_rx,
            self.keepalive,
        ));
        let processor = tokio::spawn(processor::run(
            Arc::clone(&self.shared),
            channels.inbound_rx,
            handler,
        ));
        self.tasks.lock().await.extend([reader, writer, processor]);

        self.shared.log.debug("connected");
        Ok(())
    }

    /// Cancel the tasks and send a close frame.
    ///
    /// A no-op before `connect` and after the first call.
    ///
    /// # Errors
    ///
    /// Returns the error from writing the close frame. The tasks stop
    /// regardless.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.shared.close().await
    }

    /// Enqueue a raw text frame for the writer.
    ///
    /// Frames are written in enqueue order after the authentication message.
    /// Waits while the outbound queue is full.
    ///
    /// # Errors
    ///
    /// Returns an error once the client has been closed.
    pub async fn send_raw(&self, frame: impl Into<String>) -> Result<(), EnqueueError> {
        if self.shared.cancel.is_cancelled() {
            return Err(EnqueueError::Closed);
        }
        tokio::select! {
            biased;
            () = self.shared.cancel.cancelled() => Err(EnqueueError::Closed),
            sent = self.outbound_tx.send(frame.into()) => sent.map_err(|_| EnqueueError::Closed),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Number of frames waiting in the outbound queue.
    #[must_use]
    pub fn queued_outbound(&self) -> usize {
        self.outbound_tx.max_capacity() - self.outbound_tx.capacity()
    }

    /// Whether the server ever accepted the credentials on this client.
    #[must_use]
    pub fn authenticated(&self) -> bool {
        self.shared.authenticated.load(Ordering::SeqCst)
    }

    /// Wait until the reader, writer and processor tasks have all ended.
    ///
    /// Returns immediately if the client never connected. Cancel-safe: a
    /// dropped `join` leaves the unfinished tasks for the next call.
    pub async fn join(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(handle) = tasks.last_mut() {
            let result = handle.await;
            tasks.pop();
            if let Err(e) = result {
                self.shared.log.error(&format!("task failed: {e}"));
            }
        }
    }

    /// URL this client dials.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pop_outbound(client: &Client) -> Option<String> {
        client
            .channels
            .try_lock()
            .ok()?
            .as_mut()
            .and_then(|c| c.outbound_rx.try_recv().ok())
    }

    #[test]
    fn new_enqueues_single_auth_message() {
        let client = Client::new(Config::new("my-key")).unwrap();
        assert_eq!(client.queued_outbound(), 1);
        assert_eq!(
            pop_outbound(&client).as_deref(),
            Some(r#"{"action":"auth","params":"my-key"}"#)
        );
        assert!(pop_outbound(&client).is_none());
    }

    #[test]
    fn new_rejects_empty_key() {
        assert!(matches!(
            Client::new(Config::new("")),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn new_starts_unconnected() {
        let client = Client::new(Config::new("key")).unwrap();
        assert_eq!(client.state(), ConnectionState::Unconnected);
        assert_eq!(client.url(), "wss://socket.polygon.io/stocks");
    }

    #[tokio::test]
    async fn close_before_connect_is_noop() {
        let client = Client::new(Config::new("key")).unwrap();
        assert!(client.close().await.is_ok());
        assert_eq!(client.state(), ConnectionState::Unconnected);
        assert!(!client.shared.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn join_without_connect_returns() {
        let client = Client::new(Config::new("key")).unwrap();
        client.join().await;
    }

    proptest! {
        #[test]
        fn auth_message_references_key(key in "[A-Za-z0-9_]{1,40}") {
            let client = Client::new(Config::new(key.clone())).unwrap();
            prop_assert_eq!(client.queued_outbound(), 1);

            let frame = pop_outbound(&client).unwrap();
            let message: ControlMessage = serde_json::from_str(&frame).unwrap();
            prop_assert_eq!(message.action, "auth");
            prop_assert_eq!(message.params, key);
        }
    }
}
