//! Configuration Module
//!
//! Configuration loading for the streaming client.

mod settings;

pub use settings::{Config, ConfigError, Feed, Market, POLYGON_HOST, QueueSettings};
