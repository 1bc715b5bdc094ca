//! Peer client abstractions for testing and mocking.
//!
//! The crawler talks to peers through the [`PeerClient`] trait and opens them through
//! a [`Connector`], so the pool and both crawl phases run unchanged against an
//! in-memory network in tests.

use log::debug;
use peers_connection::{
    Connection, ConnectionConfiguration, ConnectionError, PeerAddress, PeerInfo, PeerStatus,
};
use std::future::Future;

/// The calls the crawler makes on an open peer connection.
pub trait PeerClient: Send + Sync {
    /// Ask the peer for the peers it knows about.
    fn get_peers(&self) -> impl Future<Output = Result<Vec<PeerInfo>, ConnectionError>> + Send;

    /// Ask the peer for its chain tip and software version.
    fn get_status(&self) -> impl Future<Output = Result<PeerStatus, ConnectionError>> + Send;

    /// Close the connection.
    fn disconnect(&self) -> impl Future<Output = Result<(), ConnectionError>> + Send;

    /// Whether the connection can still carry requests.
    fn is_open(&self) -> bool;
}

/// Implementation of PeerClient for the TCP Connection type from peers-connection.
impl PeerClient for Connection {
    fn get_peers(&self) -> impl Future<Output = Result<Vec<PeerInfo>, ConnectionError>> + Send {
        Connection::get_peers(self)
    }

    fn get_status(&self) -> impl Future<Output = Result<PeerStatus, ConnectionError>> + Send {
        Connection::get_status(self)
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), ConnectionError>> + Send {
        Connection::disconnect(self)
    }

    fn is_open(&self) -> bool {
        Connection::is_open(self)
    }
}

/// Factory trait for creating peer clients.
///
/// This trait enables dependency injection for connection creation,
/// allowing different implementations for production and testing.
pub trait Connector: Send + Sync + 'static {
    type Client: PeerClient + 'static;

    /// Open a connection to the specified peer, retries included.
    fn connect(
        &self,
        address: &PeerAddress,
    ) -> impl Future<Output = Result<Self::Client, ConnectionError>> + Send;
}

/// Standard connector that creates real TCP connections.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    configuration: ConnectionConfiguration,
}

impl TcpConnector {
    /// Create a new connector with the given configuration.
    pub fn new(configuration: ConnectionConfiguration) -> Self {
        Self { configuration }
    }

    pub fn configuration(&self) -> &ConnectionConfiguration {
        &self.configuration
    }
}

impl Connector for TcpConnector {
    type Client = Connection;

    fn connect(
        &self,
        address: &PeerAddress,
    ) -> impl Future<Output = Result<Self::Client, ConnectionError>> + Send {
        let address = address.clone();
        let configuration = self.configuration;
        async move {
            debug!("Opening connection to {address}");
            Connection::tcp(address, configuration).await
        }
    }
}
