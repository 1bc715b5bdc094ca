//! Error types for connection handling.

use crate::transport::TransportError;
use std::error::Error;
use std::fmt;
use std::io;

/// Errors that can occur during peer connection establishment and communication.
#[derive(Debug)]
pub enum ConnectionError {
    /// An I/O error occurred during network operations.
    Io(io::Error),
    /// The transport layer (framing and serialization) failed.
    TransportFailed(TransportError),
    /// A connect attempt or a request did not complete in time.
    Timeout,
    /// The peer answered with an error.
    Remote(String),
    /// The peer answered, but the payload didn't have the expected shape.
    UnexpectedResponse(serde_json::Error),
    /// The peer address is malformed.
    InvalidAddress(String),
    /// The connection is no longer open.
    Closed,
}

impl ConnectionError {
    /// Whether the error leaves the underlying stream unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConnectionError::Io(_) | ConnectionError::TransportFailed(_) | ConnectionError::Closed
        )
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::Io(err) => write!(f, "Peer socket error: {err}"),
            ConnectionError::TransportFailed(err) => write!(f, "Peer framing failed: {err}"),
            ConnectionError::Timeout => write!(f, "Peer did not respond in time"),
            ConnectionError::Remote(err) => write!(f, "Peer returned an error: {err}"),
            ConnectionError::UnexpectedResponse(err) => {
                write!(f, "Unexpected response payload: {err}")
            }
            ConnectionError::InvalidAddress(addr) => write!(f, "Invalid peer address: {addr:?}"),
            ConnectionError::Closed => write!(f, "Connection is closed"),
        }
    }
}

impl Error for ConnectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConnectionError::Io(err) => Some(err),
            ConnectionError::TransportFailed(err) => Some(err),
            ConnectionError::UnexpectedResponse(err) => Some(err),
            ConnectionError::Timeout
            | ConnectionError::Remote(_)
            | ConnectionError::InvalidAddress(_)
            | ConnectionError::Closed => None,
        }
    }
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        ConnectionError::Io(err)
    }
}

impl From<TransportError> for ConnectionError {
    fn from(err: TransportError) -> Self {
        ConnectionError::TransportFailed(err)
    }
}
