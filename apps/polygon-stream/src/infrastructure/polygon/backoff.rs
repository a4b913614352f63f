//! Backoff Policy
//!
//! Exponential backoff with jitter for rebuilding a dropped client. The
//! client itself never reconnects; the stream binary asks this policy how
//! long to wait before building the next one.

use std::time::Duration;

use rand::Rng;

use crate::application::ports::ReconnectPolicy;

/// Backoff timing.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay.
    pub max_delay: Duration,
    /// Growth factor applied after each attempt.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = up to 10% either way).
    pub jitter_factor: f64,
    /// Attempts before giving up (0 = never give up).
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 0,
        }
    }
}

/// [`ReconnectPolicy`] with exponentially growing, jittered delays.
///
/// ```rust
/// use polygon_stream::{BackoffConfig, BackoffPolicy, ReconnectPolicy};
///
/// let mut policy = BackoffPolicy::new(BackoffConfig::default());
/// assert!(policy.next_delay().is_some());
/// policy.reset();
/// assert_eq!(policy.attempts(), 0);
/// ```
#[derive(Debug)]
pub struct BackoffPolicy {
    config: BackoffConfig,
    current: Duration,
    attempts: u32,
}

impl BackoffPolicy {
    /// Create a policy starting at `config.initial_delay`.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        let current = config.initial_delay;
        Self {
            config,
            current,
            attempts: 0,
        }
    }

    /// Attempts made since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    fn grow(&self) -> Duration {
        let grown = self.current.as_secs_f64() * self.config.multiplier.max(1.0);
        // Non-finite or overflowing products saturate at the cap.
        Duration::try_from_secs_f64(grown)
            .map_or(self.config.max_delay, |d| d.min(self.config.max_delay))
    }

    fn jitter(&self, delay: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 || delay.is_zero() {
            return delay;
        }
        let spread = self.config.jitter_factor.min(1.0);
        let factor = rand::rng().random_range((1.0 - spread)..=(1.0 + spread));
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
            .unwrap_or(delay)
            .max(Duration::from_millis(1))
    }
}

impl ReconnectPolicy for BackoffPolicy {
    fn next_delay(&mut self) -> Option<Duration> {
        if self.config.max_attempts > 0 && self.attempts >= self.config.max_attempts {
            return None;
        }
        self.attempts += 1;

        let delay = self.jitter(self.current);
        self.current = self.grow();
        Some(delay)
    }

    fn reset(&mut self) {
        self.current = self.config.initial_delay;
        self.attempts = 0;
    }
}
