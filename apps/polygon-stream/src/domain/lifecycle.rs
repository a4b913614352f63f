//! Connection Lifecycle
//!
//! `Unconnected -> Connecting -> Connected -> Authenticating -> Authenticated
//! -> Closing -> Closed`. A fatal I/O error or `auth_failed` jumps straight to
//! `Closing`/`Closed`. Apart from a failed dial, the state only moves forward.

use std::sync::atomic::{AtomicU8, Ordering};

/// Current state of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum ConnectionState {
    /// No transport yet.
    #[default]
    Unconnected = 0,
    /// Dial in progress.
    Connecting = 1,
    /// Transport established, loops running.
    Connected = 2,
    /// Authentication message written, awaiting the verdict.
    Authenticating = 3,
    /// Server accepted the credentials.
    Authenticated = 4,
    /// Close requested.
    Closing = 5,
    /// Connection finished.
    Closed = 6,
}

impl ConnectionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Unconnected,
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Authenticating,
            4 => Self::Authenticated,
            5 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unconnected => "unconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    /// Check if the connection has finished or is finishing.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free cell holding a [`ConnectionState`].
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Create a cell in the `Unconnected` state.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Unconnected as u8))
    }

    /// Current state.
    #[must_use]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move forward to `next`. Returns `false` if the state is already at or
    /// past `next`.
    pub fn advance(&self, next: ConnectionState) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < next as u8).then_some(next as u8)
            })
            .is_ok()
    }

    /// Overwrite the state unconditionally.
    pub fn reset(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unconnected() {
        assert_eq!(StateCell::new().get(), ConnectionState::Unconnected);
    }

    #[test]
    fn advance_moves_forward_only() {
        let cell = StateCell::new();
        assert!(cell.advance(ConnectionState::Connected));
        assert!(cell.advance(ConnectionState::Authenticated));
        assert!(!cell.advance(ConnectionState::Authenticating));
        assert_eq!(cell.get(), ConnectionState::Authenticated);
    }

    #[test]
    fn closed_is_final() {
        let cell = StateCell::new();
        assert!(cell.advance(ConnectionState::Closed));
        assert!(!cell.advance(ConnectionState::Closing));
        assert!(!cell.advance(ConnectionState::Authenticated));
        assert!(cell.get().is_terminal());
    }

    #[test]
    fn reset_after_failed_dial() {
        let cell = StateCell::new();
        cell.advance(ConnectionState::Connecting);
        cell.reset(ConnectionState::Unconnected);
        assert_eq!(cell.get(), ConnectionState::Unconnected);
    }

    #[test]
    fn state_names() {
        assert_eq!(ConnectionState::Authenticating.to_string(), "authenticating");
        assert_eq!(ConnectionState::default(), ConnectionState::Unconnected);
    }
}
