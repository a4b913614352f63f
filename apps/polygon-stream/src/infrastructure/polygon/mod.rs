//! Polygon Streaming Client
//!
//! - `client`: lifecycle controller (construct, connect, close)
//! - `reader` / `writer` / `processor`: the per-connection tasks
//! - `control`: status envelope handling
//! - `keepalive`: ping/pong timing and the read deadline
//! - `backoff`: reconnect delays for callers that rebuild clients

pub mod backoff;
pub mod client;
mod control;
pub mod keepalive;
mod processor;
mod reader;
mod writer;

pub use backoff::{BackoffConfig, BackoffPolicy};
pub use client::{Client, EnqueueError};
pub use keepalive::{
    KeepaliveConfig, KeepaliveError, MAX_MESSAGE_SIZE, PING_PERIOD, PONG_WAIT, WRITE_WAIT,
};
pub use processor::LogEventHandler;
