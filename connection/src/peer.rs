//! Peer addressing.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::connection::ConnectionError;

/// The network address of a peer.
///
/// Equality and hashing only consider the host. A crawl assumes one peer per host,
/// so two addresses which differ only by port name the same peer.
#[derive(Debug, Clone)]
pub struct PeerAddress {
    /// IP address or hostname of the peer.
    host: String,
    /// The port number the peer is listening on.
    port: u16,
}

impl PeerAddress {
    /// Create a new peer address.
    ///
    /// # Arguments
    ///
    /// * `host` - IP address or hostname of the peer.
    /// * `port` - The port the peer listens on.
    ///
    /// # Returns
    ///
    /// * `Ok(PeerAddress)` - A validated address.
    /// * `Err(ConnectionError::InvalidAddress)` - If the host is empty or obviously malformed.
    pub fn new<S: Into<String>>(host: S, port: u16) -> Result<Self, ConnectionError> {
        let host = host.into();
        let trimmed = host.trim();
        if trimmed.is_empty()
            || trimmed.chars().any(|c| c.is_whitespace() || c == '/')
            || trimmed != host
        {
            return Err(ConnectionError::InvalidAddress(host));
        }
        // Bracketed IPv6 literals, as they appear in URLs, are stored bare.
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .map(str::to_string)
            .unwrap_or(host);

        Ok(PeerAddress { host, port })
    }

    /// The host of the peer.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port of the peer.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl PartialEq for PeerAddress {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host
    }
}

impl Eq for PeerAddress {}

impl Hash for PeerAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for PeerAddress {
    type Err = ConnectionError;

    /// Parse a `host:port` pair, IPv6 hosts in brackets.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ConnectionError::InvalidAddress(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| ConnectionError::InvalidAddress(s.to_string()))?;
        PeerAddress::new(host, port)
    }
}
