//! Control-Message Handler
//!
//! Applies the status disposition table to one `status` envelope.

use serde_json::value::RawValue;

use super::client::Shared;
use crate::domain::envelope::StatusMessage;
use crate::domain::status::{LifecycleAction, Status};
use crate::infrastructure::logging::log_at;
use crate::infrastructure::metrics;

/// Whether the rest of the batch should be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

/// Handle one control envelope.
pub(crate) async fn handle_status(shared: &Shared, raw: &RawValue) -> Flow {
    let message = match StatusMessage::parse(raw) {
        Ok(message) => message,
        Err(e) => {
            shared.log.error(&format!("failed to unmarshal message: {e}"));
            return Flow::Continue;
        }
    };

    let status = Status::parse(&message.status);
    let disposition = status.disposition();
    if status == Status::Unrecognized {
        log_at(
            shared.log.as_ref(),
            disposition.level,
            &format!("{} '{}'", disposition.message, message.status),
        );
    } else {
        log_at(shared.log.as_ref(), disposition.level, disposition.message);
    }

    match disposition.action {
        None => Flow::Continue,
        Some(LifecycleAction::MarkAuthenticated) => {
            shared.mark_authenticated();
            Flow::Continue
        }
        Some(LifecycleAction::Close) => {
            metrics::record_auth_failure();
            // Close reports its own failure through the logger.
            let _ = shared.close().await;
            Flow::Stop
        }
    }
}
