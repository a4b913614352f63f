//! WebSocket Transport Adapter
//!
//! Implements the `Connector` and `Transport` ports on top of
//! `tokio-tungstenite`. The socket is split so the reader can block on the
//! stream half while the writer and `close` share the sink half.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{
    CloseReason, Connector, DialError, Frame, Transport, TransportError,
};
use crate::infrastructure::polygon::keepalive::WRITE_WAIT;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials Polygon feeds with `tokio-tungstenite`.
#[derive(Debug, Clone, Copy)]
pub struct WsConnector {
    close_timeout: Duration,
}

impl WsConnector {
    /// Create a connector whose transports wait up to [`WRITE_WAIT`] to
    /// flush on close.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_close_timeout(WRITE_WAIT)
    }

    /// Create a connector whose transports wait up to `close_timeout` to
    /// flush on close.
    #[must_use]
    pub const fn with_close_timeout(close_timeout: Duration) -> Self {
        Self { close_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn dial(
        &self,
        url: &str,
        max_message_size: usize,
    ) -> Result<Arc<dyn Transport>, DialError> {
        let config = WebSocketConfig::default()
            .max_message_size(Some(max_message_size))
            .max_frame_size(Some(max_message_size));

        let (ws_stream, response) =
            tokio_tungstenite::connect_async_with_config(url, Some(config), false)
                .await
                .map_err(DialError::Handshake)?;

        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            return Err(DialError::UnexpectedStatus(response.status().as_u16()));
        }

        Ok(Arc::new(WsTransport::new(ws_stream, self.close_timeout)))
    }
}

/// A connected WebSocket.
///
/// `close` gives up after `close_timeout`: a peer that stopped reading
/// never drains the flush. The socket is then released when the transport
/// is dropped.
pub struct WsTransport {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: AtomicBool,
    close_timeout: Duration,
}

impl WsTransport {
    /// Wrap an established WebSocket stream.
    #[must_use]
    pub fn new(ws_stream: WsStream, close_timeout: Duration) -> Self {
        let (sink, stream) = ws_stream.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: AtomicBool::new(false),
            close_timeout,
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, frame: Frame, deadline: Duration) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let message = to_message(frame);
        let write = async { self.sink.lock().await.send(message).await };

        match tokio::time::timeout(deadline, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::Write(e)),
            Err(_) => Err(TransportError::WriteTimeout(deadline)),
        }
    }

    async fn recv(&self) -> Result<Frame, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Frame(_))) => {}
                Some(Ok(message)) => return Ok(from_message(message)),
                Some(Err(e)) => return Err(TransportError::Read(e)),
                None => return Err(TransportError::Closed),
            }
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let flush = async { self.sink.lock().await.close().await };
        // Already-closed sockets report an error here; nothing left to release.
        let _ = tokio::time::timeout(self.close_timeout, flush).await;
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data.into()),
        Frame::Ping(data) => Message::Ping(data.into()),
        Frame::Pong(data) => Message::Pong(data.into()),
        Frame::Close(reason) => Message::Close(reason.map(|r| CloseFrame {
            code: CloseCode::from(r.code),
            reason: r.reason.into(),
        })),
    }
}

fn from_message(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Binary(data) => Frame::Binary(data.to_vec()),
        Message::Ping(data) => Frame::Ping(data.to_vec()),
        Message::Pong(data) => Frame::Pong(data.to_vec()),
        Message::Close(frame) => Frame::Close(frame.map(|f| CloseReason {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_owned(),
        })),
        // Raw frames are filtered out by `recv`.
        Message::Frame(_) => Frame::Binary(Vec::new()),
    }
}
