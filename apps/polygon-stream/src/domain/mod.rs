//! Domain Layer - Protocol types and connection state.
//!
//! This layer contains the wire envelopes, the status disposition table and
//! the connection lifecycle, with no I/O of any kind.

/// Inbound envelopes and outbound control messages.
pub mod envelope;

/// Connection lifecycle state.
pub mod lifecycle;

/// Control status dispositions.
pub mod status;
