//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the streaming client itself plus the concrete
//! implementations of the port interfaces defined in the application layer.

/// Polygon WebSocket client and its per-connection tasks.
pub mod polygon;

/// `tokio-tungstenite` transport adapter.
pub mod transport;

/// Client configuration and environment loading.
pub mod config;

/// Logger adapters.
pub mod logging;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
