//! Peer connections.
//!
//! A connection carries request/response exchanges with one peer over the framed
//! JSON [transport](crate::transport). The [`Connection`] type is the TCP flavor
//! most callers want.
//!
//! # Examples
//!
//! ```no_run
//! use peers_connection::{Connection, ConnectionConfiguration, PeerAddress};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let address = PeerAddress::new("127.0.0.1", 4001)?;
//! let connection = Connection::tcp(address, ConnectionConfiguration::default()).await?;
//!
//! let status = connection.get_status().await?;
//! println!("height {} at block {}", status.height, status.block_id);
//!
//! for peer in connection.get_peers().await? {
//!     println!("knows about {}", peer.ip);
//! }
//!
//! connection.disconnect().await?;
//! # Ok(())
//! # }
//! ```

mod configuration;
mod error;
mod io;
mod state;
mod tcp;

pub use configuration::{
    ConnectionConfiguration, DEFAULT_CONNECTION_TIMEOUT, DEFAULT_CONNECT_RETRIES,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use error::ConnectionError;
pub use io::AsyncConnection;
pub use state::ConnectionState;
pub use tcp::TcpConnection;

use crate::peer::PeerAddress;

/// A connection to a peer over TCP.
pub type Connection = TcpConnection;

impl TcpConnection {
    /// Establish a TCP connection to a peer.
    ///
    /// # Arguments
    ///
    /// * `address` - The peer to connect to.
    /// * `configuration` - Retry and timeout settings.
    ///
    /// # Returns
    ///
    /// * `Ok(`[`Self`]`)` - An open connection.
    /// * `Err(`[`ConnectionError`]`)` - If every connect attempt failed.
    pub async fn tcp(
        address: PeerAddress,
        configuration: ConnectionConfiguration,
    ) -> Result<Self, ConnectionError> {
        tcp::connect(address, configuration).await
    }

    /// The configuration this connection was built with.
    pub fn configuration(&self) -> &ConnectionConfiguration {
        &self.configuration
    }
}
