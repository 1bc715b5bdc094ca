//! TCP-specific connections.

use super::{AsyncConnection, ConnectionConfiguration, ConnectionError};
use crate::peer::PeerAddress;
use log::debug;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// A TCP-based connection to a peer.
///
/// This is a convenience type alias for [`AsyncConnection`] with Tokio's TCP stream halves.
pub type TcpConnection = AsyncConnection<OwnedReadHalf, OwnedWriteHalf>;

/// Helper function to establish a single TCP connection with timeout and nodelay.
async fn establish_tcp_connection(
    address: &PeerAddress,
    connection_timeout: Duration,
) -> Result<TcpStream, ConnectionError> {
    match timeout(
        connection_timeout,
        TcpStream::connect((address.host(), address.port())),
    )
    .await
    {
        Ok(Ok(stream)) => {
            // Requests and responses are small, don't wait to coalesce them.
            stream.set_nodelay(true)?;
            Ok(stream)
        }
        Ok(Err(e)) => Err(ConnectionError::Io(e)),
        Err(_) => Err(ConnectionError::Timeout),
    }
}

/// Establish a TCP connection to a peer.
///
/// Makes up to `1 + configuration.retries` attempts, each bounded by
/// `configuration.connection_timeout`, and returns the last error if all fail.
pub async fn connect(
    address: PeerAddress,
    configuration: ConnectionConfiguration,
) -> Result<TcpConnection, ConnectionError> {
    let attempts = configuration.retries.saturating_add(1);
    let mut last_error = ConnectionError::Timeout;

    for attempt in 1..=attempts {
        match establish_tcp_connection(&address, configuration.connection_timeout).await {
            Ok(stream) => {
                let (reader, writer) = stream.into_split();
                debug!("Connected to {address} on attempt {attempt}");
                return Ok(AsyncConnection::new(address, configuration, reader, writer));
            }
            Err(e) => {
                debug!("Connect attempt {attempt}/{attempts} to {address} failed: {e}");
                last_error = e;
            }
        }
    }

    Err(last_error)
}
