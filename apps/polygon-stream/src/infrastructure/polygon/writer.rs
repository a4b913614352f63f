//! Writer Loop
//!
//! Sole writer of application frames. Drains the outbound queue in FIFO
//! order and interleaves a keepalive ping every `ping_period`. Any write
//! failure ends the loop and releases the transport.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use super::client::Shared;
use super::keepalive::KeepaliveConfig;
use crate::application::ports::{Frame, Transport};
use crate::domain::lifecycle::ConnectionState;
use crate::infrastructure::metrics;

/// Run the writer until cancellation or a write failure.
pub(crate) async fn run(
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    mut outbound_rx: mpsc::Receiver<String>,
    keepalive: KeepaliveConfig,
) {
    let mut ticker = tokio::time::interval_at(
        Instant::now() + keepalive.ping_period,
        keepalive.ping_period,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut first_frame = true;

    let failed = loop {
        tokio::select! {
            biased;
            () = shared.cancel.cancelled() => break false,
            _ = ticker.tick() => {
                if let Err(e) = transport.send(Frame::Ping(Vec::new()), keepalive.write_wait).await {
                    if shared.cancel.is_cancelled() {
                        break false;
                    }
                    shared.log.error(&format!("failed to send ping message: {e}"));
                    break true;
                }
                metrics::record_ping_sent();
            }
            next = outbound_rx.recv() => {
                let Some(text) = next else { break false };
                if let Err(e) = transport.send(Frame::Text(text), keepalive.write_wait).await {
                    if shared.cancel.is_cancelled() {
                        break false;
                    }
                    shared.log.error(&format!("failed to send message: {e}"));
                    break true;
                }
                metrics::record_frame_sent();
                if first_frame {
                    first_frame = false;
                    shared.advance(ConnectionState::Authenticating);
                }
            }
        }
    };

    shared.log.debug("closing write thread");
    if failed {
        shared.mark_closed(transport.as_ref()).await;
    }
}
