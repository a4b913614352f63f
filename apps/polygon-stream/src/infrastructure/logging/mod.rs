//! Logger Adapters
//!
//! - `NopLogger`: discards everything (the default sink)
//! - `TracingLogger`: forwards to `tracing` with a per-connection id

use uuid::Uuid;

use crate::application::ports::Logger;
use crate::domain::status::LogLevel;

/// Logger that discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopLogger;

impl Logger for NopLogger {
    fn debug(&self, _msg: &str) {}
    fn info(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
}

/// Logger that emits `tracing` events tagged with a connection id.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    connection_id: Uuid,
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingLogger {
    /// Create a logger with a fresh connection id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connection_id: Uuid::new_v4(),
        }
    }

    /// Connection id attached to every event.
    #[must_use]
    pub const fn connection_id(&self) -> Uuid {
        self.connection_id
    }
}

impl Logger for TracingLogger {
    fn debug(&self, msg: &str) {
        tracing::debug!(connection_id = %self.connection_id, "{msg}");
    }

    fn info(&self, msg: &str) {
        tracing::info!(connection_id = %self.connection_id, "{msg}");
    }

    fn error(&self, msg: &str) {
        tracing::error!(connection_id = %self.connection_id, "{msg}");
    }
}

/// Log `msg` at `level`.
pub fn log_at(log: &dyn Logger, level: LogLevel, msg: &str) {
    match level {
        LogLevel::Debug => log.debug(msg),
        LogLevel::Info => log.info(msg),
        LogLevel::Error => log.error(msg),
    }
}
