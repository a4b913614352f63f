//! Application Layer - Port definitions.
//!
//! The interfaces the streaming client depends on, implemented by the
//! infrastructure layer or supplied by callers.

/// Port interfaces for transport, logging and extension points.
pub mod ports;
