//! Client Configuration Settings
//!
//! Configuration types for the streaming client, built in code or loaded
//! from environment variables.

use std::sync::Arc;

use crate::application::ports::{EventHandler, Logger};
use crate::infrastructure::polygon::keepalive::{KeepaliveConfig, KeepaliveError};

/// Host serving the WebSocket feeds.
pub const POLYGON_HOST: &str = "polygon.io";

/// Data feed (cluster subdomain) to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feed {
    /// Real-time data.
    #[default]
    RealTime,
    /// 15-minute delayed data.
    Delayed,
    /// Nasdaq basic feed.
    Nasdaq,
    /// Polygon feed.
    PolyFeed,
    /// Polygon feed plus.
    PolyFeedPlus,
}

impl Feed {
    /// Parse feed from string. Returns `None` for unknown feeds.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "socket" | "realtime" => Some(Self::RealTime),
            "delayed" => Some(Self::Delayed),
            "nasdaqfeed" => Some(Self::Nasdaq),
            "polyfeed" => Some(Self::PolyFeed),
            "polyfeedplus" => Some(Self::PolyFeedPlus),
            _ => None,
        }
    }

    /// Get the subdomain used in WebSocket URLs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RealTime => "socket",
            Self::Delayed => "delayed",
            Self::Nasdaq => "nasdaqfeed",
            Self::PolyFeed => "polyfeed",
            Self::PolyFeedPlus => "polyfeedplus",
        }
    }
}

/// Market (URL path) to stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Market {
    /// US equities.
    #[default]
    Stocks,
    /// US options.
    Options,
    /// Currencies.
    Forex,
    /// Cryptocurrencies.
    Crypto,
}

impl Market {
    /// Parse market from string. Returns `None` for unknown markets.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "stocks" => Some(Self::Stocks),
            "options" => Some(Self::Options),
            "forex" => Some(Self::Forex),
            "crypto" => Some(Self::Crypto),
            _ => None,
        }
    }

    /// Get the market path segment.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stocks => "stocks",
            Self::Options => "options",
            Self::Forex => "forex",
            Self::Crypto => "crypto",
        }
    }
}

/// Queue capacity settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// Outbound queue capacity. Small: control traffic is bursty but rare.
    pub outbound_capacity: usize,
    /// Inbound queue capacity. Large: absorbs market data bursts.
    pub inbound_capacity: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: 100,
            inbound_capacity: 10_000,
        }
    }
}

/// Complete client configuration.
#[derive(Clone, Default)]
pub struct Config {
    /// Polygon API key.
    pub api_key: String,
    /// Data feed.
    pub feed: Feed,
    /// Market.
    pub market: Market,
    /// Logging sink. A no-op logger is used when absent.
    pub log: Option<Arc<dyn Logger>>,
    /// Market data handler. Events are logged at debug when absent.
    pub handler: Option<Arc<dyn EventHandler>>,
    /// Keepalive timing.
    pub keepalive: KeepaliveConfig,
    /// Queue capacities.
    pub queues: QueueSettings,
}

impl Config {
    /// Create a configuration for an API key with default settings.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Set the data feed.
    #[must_use]
    pub const fn with_feed(mut self, feed: Feed) -> Self {
        self.feed = feed;
        self
    }

    /// Set the market.
    #[must_use]
    pub const fn with_market(mut self, market: Market) -> Self {
        self.market = market;
        self
    }

    /// Set the logging sink.
    #[must_use]
    pub fn with_logger(mut self, log: Arc<dyn Logger>) -> Self {
        self.log = Some(log);
        self
    }

    /// Set the market data handler.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Set the keepalive timing.
    #[must_use]
    pub const fn with_keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Set the queue capacities.
    #[must_use]
    pub const fn with_queues(mut self, queues: QueueSettings) -> Self {
        self.queues = queues;
        self
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `POLYGON_API_KEY` is missing or a selector has an
    /// unknown value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("POLYGON_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("POLYGON_API_KEY".to_string()))?;

        let feed = match std::env::var("POLYGON_FEED") {
            Ok(value) => Feed::from_str_case_insensitive(&value).ok_or_else(|| {
                ConfigError::InvalidValue {
                    key: "POLYGON_FEED".to_string(),
                    value,
                }
            })?,
            Err(_) => Feed::default(),
        };

        let market = match std::env::var("POLYGON_MARKET") {
            Ok(value) => Market::from_str_case_insensitive(&value).ok_or_else(|| {
                ConfigError::InvalidValue {
                    key: "POLYGON_MARKET".to_string(),
                    value,
                }
            })?,
            Err(_) => Market::default(),
        };

        let queues = QueueSettings {
            outbound_capacity: parse_env_usize(
                "POLYGON_OUTBOUND_CAPACITY",
                QueueSettings::default().outbound_capacity,
            ),
            inbound_capacity: parse_env_usize(
                "POLYGON_INBOUND_CAPACITY",
                QueueSettings::default().inbound_capacity,
            ),
        };

        Ok(Self::new(api_key)
            .with_feed(feed)
            .with_market(market)
            .with_queues(queues))
    }

    /// Check the settings a client is built from.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty API key, a zero queue capacity or
    /// inconsistent keepalive timing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.queues.outbound_capacity == 0 {
            return Err(ConfigError::InvalidCapacity("outbound"));
        }
        if self.queues.inbound_capacity == 0 {
            return Err(ConfigError::InvalidCapacity("inbound"));
        }
        self.keepalive.validate()?;
        Ok(())
    }

    /// Get the WebSocket URL for the configured feed and market.
    #[must_use]
    pub fn stream_url(&self) -> String {
        format!(
            "wss://{}.{POLYGON_HOST}/{}",
            self.feed.as_str(),
            self.market.as_str()
        )
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"[REDACTED]")
            .field("feed", &self.feed)
            .field("market", &self.market)
            .field("log", &self.log.is_some())
            .field("handler", &self.handler.is_some())
            .field("keepalive", &self.keepalive)
            .field("queues", &self.queues)
            .finish()
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// API key is empty.
    #[error("API key is required")]
    MissingApiKey,
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has an unknown value.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Rejected value.
        value: String,
    },
    /// Queue capacity is zero.
    #[error("{0} queue capacity must be greater than zero")]
    InvalidCapacity(&'static str),
    /// Keepalive timing is inconsistent.
    #[error(transparent)]
    Keepalive(#[from] KeepaliveError),
    /// Authentication message could not be encoded.
    #[error("failed to marshal auth message: {0}")]
    AuthMessage(#[source] serde_json::Error),
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
