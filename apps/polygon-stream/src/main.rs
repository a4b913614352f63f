//! Polygon Stream Binary
//!
//! Connects to a Polygon.io WebSocket feed and logs every envelope it
//! receives. When the connection drops, a fresh client is built after an
//! exponential backoff delay.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin polygon-stream
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `POLYGON_API_KEY`: Polygon.io API key
//!
//! ## Optional
//! - `POLYGON_FEED`: socket | delayed | nasdaqfeed | polyfeed | polyfeedplus (default: socket)
//! - `POLYGON_MARKET`: stocks | options | forex | crypto (default: stocks)
//! - `POLYGON_OUTBOUND_CAPACITY`: outbound queue capacity (default: 100)
//! - `POLYGON_INBOUND_CAPACITY`: inbound queue capacity (default: 10000)
//! - `POLYGON_METRICS_PORT`: Prometheus metrics port, 0 disables (default: 9090)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: polygon-stream)
//! - `RUST_LOG`: Log level (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use polygon_stream::{
    BackoffConfig, BackoffPolicy, Client, Config, EventHandler, EventType, ReconnectPolicy,
    TracingLogger, init_metrics, init_telemetry,
};
use serde_json::value::RawValue;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Default Prometheus metrics port.
const DEFAULT_METRICS_PORT: u16 = 9090;

/// Logs each market data envelope.
struct TapHandler;

impl EventHandler for TapHandler {
    fn on_event(&self, event_type: EventType, envelope: &RawValue) {
        tracing::debug!(event = %event_type, envelope = envelope.get(), "Event received");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = init_telemetry().context("failed to initialize telemetry")?;

    tracing::info!("Starting Polygon Stream");

    let metrics_port = metrics_port()?;
    if metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], metrics_port));
        init_metrics(addr).context("failed to install Prometheus exporter")?;
        tracing::info!(%addr, "Metrics endpoint listening");
    }

    let base_config = Config::from_env()
        .context("failed to load configuration")?
        .with_handler(Arc::new(TapHandler));
    tracing::info!(
        feed = base_config.feed.as_str(),
        market = base_config.market.as_str(),
        "Configuration loaded"
    );

    let shutdown_token = CancellationToken::new();
    tokio::spawn(await_shutdown(shutdown_token.clone()));

    run(base_config, shutdown_token).await?;

    tracing::info!("Polygon Stream stopped");
    Ok(())
}

/// Keep a client connected until shutdown, rebuilding it after each
/// disconnect.
async fn run(base_config: Config, shutdown_token: CancellationToken) -> anyhow::Result<()> {
    let mut policy = BackoffPolicy::new(BackoffConfig::default());

    loop {
        let logger = TracingLogger::new();
        let connection_id = logger.connection_id();
        let client = Client::new(base_config.clone().with_logger(Arc::new(logger)))?;

        tracing::info!(%connection_id, url = client.url(), "Connecting");
        match client.connect().await {
            Ok(()) => {
                tokio::select! {
                    biased;
                    () = shutdown_token.cancelled() => {
                        if let Err(e) = client.close().await {
                            tracing::warn!(error = %e, "Close frame not delivered");
                        }
                        client.join().await;
                        return Ok(());
                    }
                    () = client.join() => {
                        tracing::warn!(%connection_id, "Stream disconnected");
                    }
                }
                if client.authenticated() {
                    policy.reset();
                }
            }
            Err(e) => {
                tracing::error!(%connection_id, error = %e, "Failed to connect");
            }
        }

        let Some(delay) = policy.next_delay() else {
            anyhow::bail!("giving up after {} reconnect attempts", policy.attempts());
        };
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Reconnecting after delay"
        );

        tokio::select! {
            biased;
            () = shutdown_token.cancelled() => return Ok(()),
            () = tokio::time::sleep(delay) => {}
        }
    }
}

fn metrics_port() -> anyhow::Result<u16> {
    match std::env::var("POLYGON_METRICS_PORT") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("invalid POLYGON_METRICS_PORT: {value}")),
        Err(_) => Ok(DEFAULT_METRICS_PORT),
    }
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
