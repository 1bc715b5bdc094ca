//! Crawler for peer-to-peer networks which expose peer list and status calls.
//!
//! Discovery samples each peer list instead of following every edge, then a
//! scan asks every discovered peer for its chain height over the connections
//! discovery opened. See [`CrawlerBuilder`] to configure a [`Crawler`].

mod builder;
mod connection;
mod crawler;
mod discovery;
mod limit;
mod node;
mod pool;
mod report;
mod scan;
mod seed;

pub use builder::{CrawlerBuilder, CrawlerBuilderError, DEFAULT_SAMPLE_SIZE};
pub use connection::{Connector, PeerClient, TcpConnector};
pub use crawler::{CrawlError, CrawlPhase, Crawler, CrawlerConfig};
pub use discovery::{DiscoveryState, PortPolicy};
pub use node::{CrawlResult, NodeRecord, NodeTable, ScannedHeight};
pub use pool::ConnectionPool;
pub use report::{CrawlReport, HeightGroup, LatencyStats};
pub use seed::{parse_seed, SeedError, DEFAULT_SEED_URL};

// Re-exports.
pub use peers_connection::{
    ConnectionConfiguration, ConnectionError, ConnectionState, PeerAddress, PeerInfo, PeerStatus,
};
