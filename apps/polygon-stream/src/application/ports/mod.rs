//! Port Interfaces
//!
//! Defines the interfaces (ports) the streaming client is built against,
//! following the Hexagonal Architecture pattern. Infrastructure adapters
//! implement them; tests substitute in-memory versions.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Connector` / `Transport`: dialing and framing of the WebSocket link
//! - `Logger`: leveled logging sink
//!
//! ## Extension Points
//!
//! - `EventHandler`: receives market data envelopes
//! - `ReconnectPolicy`: schedules rebuilds of a dropped connection

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::value::RawValue;

use crate::domain::envelope::EventType;

// =============================================================================
// Frames
// =============================================================================

/// WebSocket close code for a normal closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Code and reason carried by a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// Close code.
    pub code: u16,
    /// Close reason text.
    pub reason: String,
}

impl CloseReason {
    /// A normal-closure reason with no text.
    #[must_use]
    pub const fn normal() -> Self {
        Self {
            code: NORMAL_CLOSURE,
            reason: String::new(),
        }
    }

    /// Check if this is a normal closure.
    #[must_use]
    pub const fn is_normal(&self) -> bool {
        self.code == NORMAL_CLOSURE
    }
}

/// One transport-level frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text payload.
    Text(String),
    /// Binary payload.
    Binary(Vec<u8>),
    /// Keepalive ping.
    Ping(Vec<u8>),
    /// Keepalive pong.
    Pong(Vec<u8>),
    /// Close control frame.
    Close(Option<CloseReason>),
}

// =============================================================================
// Errors
// =============================================================================

/// Errors raised by a [`Transport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Frame could not be written before the write deadline.
    #[error("write deadline of {0:?} exceeded")]
    WriteTimeout(Duration),

    /// Writing a frame failed.
    #[error("write failed: {0}")]
    Write(#[source] tokio_tungstenite::tungstenite::Error),

    /// Reading a frame failed.
    #[error("read failed: {0}")]
    Read(#[source] tokio_tungstenite::tungstenite::Error),

    /// The transport has been closed.
    #[error("connection closed")]
    Closed,
}

/// Errors raised while dialing.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    /// WebSocket handshake failed.
    #[error("failed to dial server: {0}")]
    Handshake(#[source] tokio_tungstenite::tungstenite::Error),

    /// Server answered the handshake without switching protocols.
    #[error("server failed to switch protocols (status {0})")]
    UnexpectedStatus(u16),

    /// Dial failed for a connector-specific reason.
    #[error("failed to dial server: {0}")]
    Other(String),
}

// =============================================================================
// Transport Ports
// =============================================================================

/// Bidirectional message-framed connection.
///
/// Exactly one task reads; writes come from the writer loop and from
/// `Client::close`. `close` must be idempotent.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one frame, failing if it cannot be written within `deadline`.
    async fn send(&self, frame: Frame, deadline: Duration) -> Result<(), TransportError>;

    /// Read the next frame. Returns [`TransportError::Closed`] once the
    /// stream has ended.
    async fn recv(&self) -> Result<Frame, TransportError>;

    /// Release the connection. Safe to call more than once.
    async fn close(&self);
}

/// Establishes [`Transport`]s.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Dial `url`, rejecting inbound messages larger than `max_message_size`.
    async fn dial(
        &self,
        url: &str,
        max_message_size: usize,
    ) -> Result<Arc<dyn Transport>, DialError>;
}

// =============================================================================
// Logging Port
// =============================================================================

/// Leveled logging sink.
#[cfg_attr(test, mockall::automock)]
pub trait Logger: Send + Sync {
    /// Routine progress.
    fn debug(&self, msg: &str);
    /// Noteworthy events.
    fn info(&self, msg: &str);
    /// Failures.
    fn error(&self, msg: &str);
}

// =============================================================================
// Extension Points
// =============================================================================

/// Receives recognized market data envelopes, in arrival order.
///
/// Implementations run on the processor task and should not block.
#[cfg_attr(test, mockall::automock)]
pub trait EventHandler: Send + Sync {
    /// Handle one raw envelope of type `event_type`.
    fn on_event(&self, event_type: EventType, envelope: &RawValue);
}

/// Schedules attempts to rebuild a dropped connection.
///
/// The client never reconnects by itself; callers consult a policy after
/// the loops of a client have ended.
pub trait ReconnectPolicy: Send {
    /// Delay before the next attempt, or `None` to give up.
    fn next_delay(&mut self) -> Option<Duration>;

    /// Forget previous failures after a successful connection.
    fn reset(&mut self);
}
