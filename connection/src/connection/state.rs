//! Connection lifecycle tracking.
//!
//! A connection moves forward only.
//!
//! 1. **Connecting**: A connect sequence (attempts plus retries) is in flight.
//! 2. **Open**: The socket is established and requests may be sent.
//! 3. **Closed**: The connection was shut down locally or the socket failed mid-use.
//! 4. **Failed**: Every connect attempt failed. Terminal, there is no reconnect.
//!
//! A [`super::AsyncConnection`] itself is only ever `Open` or `Closed`, callers that
//! manage connect attempts (like a connection pool) use the other two states.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
    Failed,
}

impl ConnectionState {
    /// Whether requests can be sent in this state.
    pub fn is_usable(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Transition applied when the socket fails or is shut down.
    pub fn on_close(&self) -> Self {
        match self {
            ConnectionState::Open => ConnectionState::Closed,
            ConnectionState::Connecting => ConnectionState::Failed,
            _ => *self, // Already terminal
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closed => write!(f, "closed"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}
