//! Keepalive Timing
//!
//! The writer pings every `ping_period`; the reader gives up when no pong
//! has arrived before its read deadline, which each pong pushes `pong_wait`
//! into the future. `ping_period` must be strictly shorter than `pong_wait`
//! so a live connection never trips the deadline.

use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

/// Time allowed to write a frame.
pub const WRITE_WAIT: Duration = Duration::from_secs(5);

const PONG_WAIT_MS: u64 = 10_000;

/// Time allowed between pongs before the connection is presumed dead.
pub const PONG_WAIT: Duration = Duration::from_millis(PONG_WAIT_MS);

/// Interval between pings. Nine tenths of `PONG_WAIT`.
pub const PING_PERIOD: Duration = Duration::from_millis(PONG_WAIT_MS * 9 / 10);

/// Maximum inbound message size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 1_000_000;

/// Keepalive timing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeepaliveError {
    /// Ping period does not fit inside the pong window.
    #[error("ping period {ping_period:?} must be shorter than pong wait {pong_wait:?}")]
    PingTooSlow {
        /// Configured ping period.
        ping_period: Duration,
        /// Configured pong wait.
        pong_wait: Duration,
    },

    /// A duration is zero.
    #[error("keepalive durations must be non-zero")]
    ZeroDuration,
}

/// Keepalive timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Interval between ping frames.
    pub ping_period: Duration,
    /// Read deadline window refreshed by each pong.
    pub pong_wait: Duration,
    /// Deadline for writing a single frame.
    pub write_wait: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_period: PING_PERIOD,
            pong_wait: PONG_WAIT,
            write_wait: WRITE_WAIT,
        }
    }
}

impl KeepaliveConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(ping_period: Duration, pong_wait: Duration, write_wait: Duration) -> Self {
        Self {
            ping_period,
            pong_wait,
            write_wait,
        }
    }

    /// Check the ping period fits inside the pong window.
    ///
    /// # Errors
    ///
    /// Returns an error if any duration is zero or `ping_period >= pong_wait`.
    pub fn validate(&self) -> Result<(), KeepaliveError> {
        if self.ping_period.is_zero() || self.pong_wait.is_zero() || self.write_wait.is_zero() {
            return Err(KeepaliveError::ZeroDuration);
        }
        if self.ping_period >= self.pong_wait {
            return Err(KeepaliveError::PingTooSlow {
                ping_period: self.ping_period,
                pong_wait: self.pong_wait,
            });
        }
        Ok(())
    }
}

/// Read deadline shared between the connect call and the reader loop.
#[derive(Debug)]
pub struct ReadDeadline {
    deadline: RwLock<Instant>,
    window: Duration,
}

impl ReadDeadline {
    /// Create a deadline `window` from now.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            deadline: RwLock::new(Instant::now() + window),
            window,
        }
    }

    /// Current deadline.
    #[must_use]
    pub fn get(&self) -> Instant {
        *self.deadline.read()
    }

    /// Push the deadline one window past now. Called on every pong.
    pub fn refresh(&self) {
        *self.deadline.write() = Instant::now() + self.window;
    }

    /// Check if the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = KeepaliveConfig::default();
        assert_eq!(config.pong_wait, Duration::from_secs(10));
        assert_eq!(config.ping_period, Duration::from_secs(9));
        assert_eq!(config.write_wait, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ping_must_be_shorter_than_pong_wait() {
        let config = KeepaliveConfig::new(
            Duration::from_secs(10),
            Duration::from_secs(10),
            WRITE_WAIT,
        );
        assert!(matches!(
            config.validate(),
            Err(KeepaliveError::PingTooSlow { .. })
        ));
    }

    #[test]
    fn zero_durations_rejected() {
        let config = KeepaliveConfig::new(Duration::ZERO, PONG_WAIT, WRITE_WAIT);
        assert_eq!(config.validate(), Err(KeepaliveError::ZeroDuration));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires_without_pong() {
        let deadline = ReadDeadline::new(Duration::from_secs(10));
        assert!(!deadline.is_expired());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_extends_deadline() {
        let deadline = ReadDeadline::new(Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(9)).await;
        deadline.refresh();
        tokio::time::advance(Duration::from_secs(9)).await;

        assert!(!deadline.is_expired());
    }
}
