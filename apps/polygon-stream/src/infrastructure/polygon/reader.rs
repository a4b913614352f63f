//! Reader Loop
//!
//! Moves inbound text frames onto the inbound queue in arrival order. Pongs
//! refresh the read deadline; anything else is dropped. The loop ends on
//! cancellation, on a close frame, on a read error, or when no pong arrives
//! before the deadline.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::client::Shared;
use super::keepalive::ReadDeadline;
use crate::application::ports::{Frame, Transport, TransportError};
use crate::infrastructure::metrics;

/// Why the reader stopped.
#[derive(Debug, PartialEq, Eq)]
enum Exit {
    /// Client cancellation. The transport belongs to `close`.
    Cancelled,
    /// Connection ended; the reader releases the transport.
    Disconnected,
}

/// Run the reader until cancellation or disconnect.
///
/// Dropping `inbound_tx` on return lets the processor drain and stop.
pub(crate) async fn run(
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    inbound_tx: mpsc::Sender<String>,
    deadline: Arc<ReadDeadline>,
) {
    let exit = read_loop(&shared, transport.as_ref(), &inbound_tx, &deadline).await;
    shared.log.debug("closing read thread");

    if exit == Exit::Disconnected {
        shared.mark_closed(transport.as_ref()).await;
    }
}

async fn read_loop(
    shared: &Shared,
    transport: &dyn Transport,
    inbound_tx: &mpsc::Sender<String>,
    deadline: &ReadDeadline,
) -> Exit {
    loop {
        let received = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => return Exit::Cancelled,
            received = tokio::time::timeout_at(deadline.get(), transport.recv()) => received,
        };

        let frame = match received {
            Ok(Ok(frame)) => frame,
            Ok(Err(TransportError::Closed)) => {
                if !shared.cancel.is_cancelled() {
                    shared.log.error("connection closed unexpectedly: stream ended");
                }
                return Exit::Disconnected;
            }
            Ok(Err(e)) => {
                if shared.cancel.is_cancelled() {
                    return Exit::Cancelled;
                }
                shared.log.error(&format!("failed to read message: {e}"));
                return Exit::Disconnected;
            }
            Err(_) => {
                shared.log.error("failed to read message: read deadline exceeded");
                return Exit::Disconnected;
            }
        };

        match frame {
            Frame::Text(text) => {
                metrics::record_frame_received();
                tokio::select! {
                    biased;
                    () = shared.cancel.cancelled() => return Exit::Cancelled,
                    sent = inbound_tx.send(text) => {
                        if sent.is_err() {
                            return Exit::Cancelled;
                        }
                    }
                }
            }
            Frame::Pong(_) => deadline.refresh(),
            Frame::Close(reason) => {
                match reason {
                    Some(reason) if reason.is_normal() => {}
                    Some(reason) => shared.log.error(&format!(
                        "connection closed unexpectedly: code {} {}",
                        reason.code, reason.reason
                    )),
                    None => shared
                        .log
                        .error("connection closed unexpectedly: no close status"),
                }
                return Exit::Disconnected;
            }
            Frame::Ping(_) | Frame::Binary(_) => {}
        }
    }
}
