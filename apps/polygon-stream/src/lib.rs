#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Polygon Stream - WebSocket Client for Polygon.io Market Data
//!
//! Maintains one authenticated WebSocket connection to a Polygon.io feed,
//! decodes the JSON envelope batches it delivers and routes them to a
//! control handler or a caller-supplied event handler.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Protocol types with no I/O
//!   - `envelope`: inbound envelopes, outbound control messages, event tags
//!   - `status`: status disposition table
//!   - `lifecycle`: connection state
//!
//! - **Application**: Port definitions
//!   - `ports`: transport, connector, logger, event handler, reconnect policy
//!
//! - **Infrastructure**: Adapters and the client itself
//!   - `polygon`: client, reader/writer/processor tasks, keepalive, backoff
//!   - `transport`: `tokio-tungstenite` adapter
//!   - `config`: configuration and environment loading
//!   - `logging`, `metrics`, `telemetry`: observability
//!
//! # Data Flow
//!
//! ```text
//!                       +--------+    inbound     +-----------+    +----------------+
//! Polygon WS ---------->| reader |---- queue ---->| processor |--->| status table   |
//!      ^                +--------+                +-----------+    | EventHandler   |
//!      |                +--------+    outbound                     +----------------+
//!      +----------------| writer |<--- queue ---- Client (auth, send_raw)
//!                       +--------+
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Protocol types with no external dependencies.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::envelope::{ControlMessage, DecodeError, EventType};
pub use domain::lifecycle::ConnectionState;
pub use domain::status::{LogLevel, Status};

// Ports
pub use application::ports::{
    CloseReason, Connector, DialError, EventHandler, Frame, Logger, ReconnectPolicy, Transport,
    TransportError,
};

// Client
pub use infrastructure::polygon::{
    BackoffConfig, BackoffPolicy, Client, EnqueueError, KeepaliveConfig, KeepaliveError,
    LogEventHandler,
};

// Infrastructure config
pub use infrastructure::config::{Config, ConfigError, Feed, Market, QueueSettings};

// Adapters
pub use infrastructure::logging::{NopLogger, TracingLogger};
pub use infrastructure::transport::{WsConnector, WsTransport};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
