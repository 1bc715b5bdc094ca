//! Seed parsing.

use log::debug;
use peers_connection::PeerAddress;
use std::fmt;
use url::Url;

/// Seed used when none is given.
pub const DEFAULT_SEED_URL: &str = "http://167.99.243.111:4003";

/// Errors that can occur while turning user input into a seed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedError {
    /// The input isn't a URL.
    InvalidUrl(url::ParseError),
    /// The URL has no host.
    MissingHost(String),
    /// The URL has no explicit port.
    MissingPort(String),
    /// The host can't be used as a peer address.
    InvalidHost(String),
}

impl fmt::Display for SeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedError::InvalidUrl(e) => write!(f, "Invalid seed URL: {e}"),
            SeedError::MissingHost(url) => write!(f, "Seed URL has no host: {url}"),
            SeedError::MissingPort(url) => write!(f, "Seed URL has no port: {url}"),
            SeedError::InvalidHost(host) => write!(f, "Invalid seed host: {host}"),
        }
    }
}

impl std::error::Error for SeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SeedError::InvalidUrl(e) => Some(e),
            _ => None,
        }
    }
}

impl From<url::ParseError> for SeedError {
    fn from(e: url::ParseError) -> Self {
        SeedError::InvalidUrl(e)
    }
}

/// Parse a seed given as a URL, e.g. `http://167.99.243.111:4003`.
///
/// A bare `host:port` is accepted too. The port must be explicit, a scheme's
/// default port is never the peer port.
pub fn parse_seed(input: &str) -> Result<PeerAddress, SeedError> {
    let input = input.trim();
    let url = if input.contains("://") {
        Url::parse(input)?
    } else {
        Url::parse(&format!("http://{input}"))?
    };

    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| SeedError::MissingHost(input.to_string()))?;
    let port = url
        .port()
        .ok_or_else(|| SeedError::MissingPort(input.to_string()))?;

    let seed = PeerAddress::new(host, port).map_err(|_| SeedError::InvalidHost(host.to_string()))?;
    debug!("Parsed seed {seed} from {input}");
    Ok(seed)
}
