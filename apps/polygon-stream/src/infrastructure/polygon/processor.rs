//! Processor Loop
//!
//! Decodes each inbound frame as a JSON array of envelopes and dispatches
//! them in array order. Only the routing fields are parsed here; market data
//! envelopes reach the [`EventHandler`] as raw JSON.

use std::sync::Arc;

use serde_json::value::RawValue;
use tokio::sync::mpsc;

use super::client::Shared;
use super::control::{self, Flow};
use crate::application::ports::{EventHandler, Logger};
use crate::domain::envelope::{Discriminant, EventType, Route, decode_batch};
use crate::infrastructure::metrics::{self, EnvelopeKind};

/// Event handler used when none is configured: logs each event at debug.
pub struct LogEventHandler {
    log: Arc<dyn Logger>,
}

impl LogEventHandler {
    /// Create a handler writing to `log`.
    #[must_use]
    pub fn new(log: Arc<dyn Logger>) -> Self {
        Self { log }
    }
}

impl EventHandler for LogEventHandler {
    fn on_event(&self, event_type: EventType, _envelope: &RawValue) {
        self.log.debug(&format!("received {event_type} event"));
    }
}

/// Run the processor until cancellation or until the reader drops its
/// sender.
pub(crate) async fn run(
    shared: Arc<Shared>,
    mut inbound_rx: mpsc::Receiver<String>,
    handler: Arc<dyn EventHandler>,
) {
    loop {
        tokio::select! {
            biased;
            () = shared.cancel.cancelled() => break,
            next = inbound_rx.recv() => match next {
                Some(text) => process_frame(&shared, handler.as_ref(), &text).await,
                None => break,
            },
        }
    }
    shared.log.debug("closing process thread");
}

/// Decode and dispatch one frame. Failures drop the frame (or the rest of
/// the batch) and are logged.
pub(crate) async fn process_frame(shared: &Shared, handler: &dyn EventHandler, text: &str) {
    let batch = match decode_batch(text) {
        Ok(batch) => batch,
        Err(e) => {
            metrics::record_decode_failure();
            shared.log.error(&format!("failed to process raw messages: {e}"));
            return;
        }
    };

    for raw in batch {
        let discriminant = match Discriminant::parse(raw) {
            Ok(discriminant) => discriminant,
            Err(e) => {
                metrics::record_decode_failure();
                shared.log.error(&format!("failed to process message: {e}"));
                return;
            }
        };

        match discriminant.route() {
            Route::Control => {
                metrics::record_envelope(EnvelopeKind::Control);
                if control::handle_status(shared, raw).await == Flow::Stop {
                    return;
                }
            }
            Route::Event(event_type) => {
                metrics::record_envelope(EnvelopeKind::Event);
                handler.on_event(event_type, raw);
            }
            Route::Unknown(tag) => {
                metrics::record_envelope(EnvelopeKind::Unknown);
                shared.log.debug(&format!("unknown message type '{tag}'"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockEventHandler, MockLogger};
    use mockall::Sequence;
    use mockall::predicate::{always, eq};

    fn quiet_logger() -> MockLogger {
        let mut log = MockLogger::new();
        log.expect_debug().returning(|_| ());
        log.expect_info().never();
        log
    }

    #[test]
    fn log_handler_names_event_type() {
        let mut log = MockLogger::new();
        log.expect_debug()
            .with(eq("received AM event"))
            .times(1)
            .return_const(());
        let handler = LogEventHandler::new(Arc::new(log));

        let raw = RawValue::from_string(r#"{"ev":"AM","sym":"MSFT"}"#.to_string()).unwrap();
        handler.on_event(EventType::MinuteAggregate, &raw);
    }

    #[tokio::test]
    async fn dispatches_events_in_batch_order() {
        let mut log = quiet_logger();
        log.expect_error().never();
        let shared = Shared::detached(Arc::new(log));

        let mut seq = Sequence::new();
        let mut handler = MockEventHandler::new();
        handler
            .expect_on_event()
            .with(eq(EventType::Trade), always())
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        handler
            .expect_on_event()
            .with(eq(EventType::Quote), always())
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        process_frame(&shared, &handler, r#"[{"ev":"T","p":1.5},{"ev":"Q","bp":1.4}]"#).await;
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_with_error() {
        let mut log = quiet_logger();
        log.expect_error()
            .withf(|msg| msg.starts_with("failed to process raw messages"))
            .times(1)
            .return_const(());
        let shared = Shared::detached(Arc::new(log));

        let mut handler = MockEventHandler::new();
        handler.expect_on_event().never();

        process_frame(&shared, &handler, "not json").await;
    }

    #[tokio::test]
    async fn bad_discriminant_aborts_rest_of_batch() {
        let mut log = quiet_logger();
        log.expect_error()
            .withf(|msg| msg.starts_with("failed to process message"))
            .times(1)
            .return_const(());
        let shared = Shared::detached(Arc::new(log));

        let mut handler = MockEventHandler::new();
        handler
            .expect_on_event()
            .with(eq(EventType::Trade), always())
            .times(1)
            .return_const(());
        handler
            .expect_on_event()
            .with(eq(EventType::Quote), always())
            .never();

        process_frame(&shared, &handler, r#"[{"ev":"T"},{"ev":5},{"ev":"Q"}]"#).await;
    }

    #[tokio::test]
    async fn null_tag_is_skipped_and_batch_continues() {
        let mut log = quiet_logger();
        log.expect_error().never();
        let shared = Shared::detached(Arc::new(log));

        let mut handler = MockEventHandler::new();
        handler
            .expect_on_event()
            .with(eq(EventType::Trade), always())
            .times(1)
            .return_const(());

        process_frame(&shared, &handler, r#"[{"ev":null},{"ev":"T"}]"#).await;
    }

    #[tokio::test]
    async fn unknown_tag_is_logged_at_debug() {
        let mut log = MockLogger::new();
        log.expect_debug()
            .with(eq("unknown message type 'ZZ'"))
            .times(1)
            .return_const(());
        log.expect_error().never();
        let shared = Shared::detached(Arc::new(log));

        let mut handler = MockEventHandler::new();
        handler.expect_on_event().never();

        process_frame(&shared, &handler, r#"[{"ev":"ZZ"}]"#).await;
    }

    #[tokio::test]
    async fn auth_failed_without_transport_stops_batch() {
        let mut log = quiet_logger();
        log.expect_error()
            .with(eq("authentication failed, closing connection"))
            .times(1)
            .return_const(());
        let shared = Shared::detached(Arc::new(log));

        let mut handler = MockEventHandler::new();
        handler.expect_on_event().never();

        process_frame(
            &shared,
            &handler,
            r#"[{"ev":"status","status":"auth_failed"},{"ev":"T"}]"#,
        )
        .await;
    }
}
