//! Prometheus Metrics Module
//!
//! Records client activity through the `metrics` facade. Recording is a
//! no-op until a recorder is installed; the binary installs a Prometheus
//! exporter with an HTTP listener.
//!
//! # Metrics Categories
//!
//! - **Frames**: text frames received and sent, pings sent
//! - **Envelopes**: envelopes routed by kind, decode failures
//! - **Connection**: lifecycle state, authentication failures

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::lifecycle::ConnectionState;

// =============================================================================
// Installation
// =============================================================================

/// Install the Prometheus exporter, serving `/metrics` on `addr`.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or a recorder is
/// already installed.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    register_metrics();
    Ok(())
}

fn register_metrics() {
    describe_counter!(
        "polygon_ws_frames_received_total",
        "Total text frames received from the feed"
    );
    describe_counter!(
        "polygon_ws_frames_sent_total",
        "Total text frames written to the feed"
    );
    describe_counter!("polygon_ws_pings_sent_total", "Total keepalive pings sent");
    describe_counter!(
        "polygon_ws_decode_failures_total",
        "Total inbound frames dropped because they could not be decoded"
    );
    describe_counter!(
        "polygon_ws_envelopes_total",
        "Total envelopes routed, by kind"
    );
    describe_counter!(
        "polygon_ws_auth_failures_total",
        "Total auth_failed statuses received"
    );
    describe_gauge!(
        "polygon_ws_connection_state",
        "Connection lifecycle state (0 = unconnected .. 6 = closed)"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Envelope kind labels.
#[derive(Debug, Clone, Copy)]
pub enum EnvelopeKind {
    /// Control/status envelope.
    Control,
    /// Market data envelope.
    Event,
    /// Unrecognized discriminant.
    Unknown,
}

impl EnvelopeKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Event => "event",
            Self::Unknown => "unknown",
        }
    }
}

/// Record a text frame received.
pub fn record_frame_received() {
    counter!("polygon_ws_frames_received_total").increment(1);
}

/// Record a text frame sent.
pub fn record_frame_sent() {
    counter!("polygon_ws_frames_sent_total").increment(1);
}

/// Record a keepalive ping sent.
pub fn record_ping_sent() {
    counter!("polygon_ws_pings_sent_total").increment(1);
}

/// Record a frame dropped by the decoder.
pub fn record_decode_failure() {
    counter!("polygon_ws_decode_failures_total").increment(1);
}

/// Record a routed envelope.
pub fn record_envelope(kind: EnvelopeKind) {
    counter!("polygon_ws_envelopes_total", "kind" => kind.as_str()).increment(1);
}

/// Record an authentication failure.
pub fn record_auth_failure() {
    counter!("polygon_ws_auth_failures_total").increment(1);
}

/// Publish the connection state.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("polygon_ws_connection_state").set(f64::from(state as u8));
}
