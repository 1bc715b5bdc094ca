//! Builder pattern for configuring and creating crawler instances.

use crate::connection::{Connector, TcpConnector};
use crate::crawler::{Crawler, CrawlerConfig};
use crate::discovery::PortPolicy;
use peers_connection::ConnectionConfiguration;
use std::fmt;
use std::time::Duration;

/// Default number of listed peers visited per peer list.
pub const DEFAULT_SAMPLE_SIZE: usize = 8;

/// Errors that can occur during crawler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlerBuilderError {
    /// Sample size must be at least one, or discovery never leaves the seed.
    InvalidSampleSize(usize),
}

impl fmt::Display for CrawlerBuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlerBuilderError::InvalidSampleSize(size) => {
                write!(f, "Invalid sample size: {size}, must be at least 1")
            }
        }
    }
}

impl std::error::Error for CrawlerBuilderError {}

/// Builder for creating a customized [`Crawler`] instance.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), peers_crawler::CrawlerBuilderError> {
/// use peers_crawler::{CrawlerBuilder, PortPolicy};
/// use std::time::Duration;
///
/// // Create a crawler with the defaults
/// let basic_crawler = CrawlerBuilder::new().build();
///
/// // Create a crawler with custom settings
/// let custom_crawler = CrawlerBuilder::new()
///     .with_sample_size(16)?
///     .with_request_timeout(Duration::from_secs(5))
///     .with_port_policy(PortPolicy::Advertised)
///     .with_max_in_flight_requests(64)
///     .build();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CrawlerBuilder {
    /// Connect and request behavior of every peer connection.
    connection: ConnectionConfiguration,
    /// Peers sampled from each peer list for a visit.
    sample_size: usize,
    /// Port used for listed peers.
    port_policy: PortPolicy,
    /// Global cap on outstanding peer requests, unlimited if `None`.
    max_in_flight_requests: Option<usize>,
    /// Close the pool once the scan is done.
    disconnect_on_finish: bool,
}

impl Default for CrawlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlerBuilder {
    /// Create a new crawler builder with default settings.
    pub fn new() -> Self {
        CrawlerBuilder {
            connection: ConnectionConfiguration::default(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            port_policy: PortPolicy::default(),
            max_in_flight_requests: None,
            disconnect_on_finish: true,
        }
    }

    /// Set how many peers of each peer list are visited in turn.
    ///
    /// Every listed peer still ends up in the crawl result. A larger sample
    /// explores more of the network directly at the cost of more peer list
    /// requests.
    ///
    /// # Arguments
    ///
    /// * `sample_size` - Peers to visit per peer list (defaults to 8).
    ///
    /// # Returns
    ///
    /// * `Ok(Self)` - The builder for method chaining.
    /// * `Err(CrawlerBuilderError)` - If `sample_size` is zero.
    pub fn with_sample_size(mut self, sample_size: usize) -> Result<Self, CrawlerBuilderError> {
        if sample_size == 0 {
            return Err(CrawlerBuilderError::InvalidSampleSize(sample_size));
        }
        self.sample_size = sample_size;
        Ok(self)
    }

    /// Set how many times a failed connect is retried.
    pub fn with_connect_retries(mut self, retries: u32) -> Self {
        self.connection = self.connection.with_retries(retries);
        self
    }

    /// Set the timeout of a single connect attempt.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection = self.connection.with_connection_timeout(timeout);
        self
    }

    /// Set the timeout of a single peer request.
    ///
    /// A peer which doesn't answer in time is treated as failed for that
    /// request only, its connection stays open.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.connection = self.connection.with_request_timeout(timeout);
        self
    }

    /// Set which port is used for peers learned from peer lists.
    pub fn with_port_policy(mut self, policy: PortPolicy) -> Self {
        self.port_policy = policy;
        self
    }

    /// Cap the number of peer requests outstanding at once.
    ///
    /// Unlimited by default, matching the network's own fan-out. A cap helps on
    /// hosts with low file descriptor limits.
    pub fn with_max_in_flight_requests(mut self, max: usize) -> Self {
        self.max_in_flight_requests = Some(max.max(1));
        self
    }

    /// Set whether every connection is closed once a crawl finishes.
    ///
    /// Defaults to `true`. With `false` the connections stay in
    /// [`Crawler::pool`] for further use.
    pub fn with_disconnect_on_finish(mut self, disconnect: bool) -> Self {
        self.disconnect_on_finish = disconnect;
        self
    }

    /// Build the crawler with the configured options, connecting over TCP.
    ///
    /// # Returns
    ///
    /// A configured `Crawler` instance.
    pub fn build(self) -> Crawler<TcpConnector> {
        let connector = TcpConnector::new(self.connection);
        self.build_with_connector(connector)
    }

    /// Build the crawler around a custom [`Connector`].
    ///
    /// The connection settings of this builder are ignored, the connector
    /// owns how peers are reached.
    pub fn build_with_connector<C: Connector>(self, connector: C) -> Crawler<C> {
        Crawler::new(
            CrawlerConfig {
                sample_size: self.sample_size,
                port_policy: self.port_policy,
                max_in_flight_requests: self.max_in_flight_requests,
                disconnect_on_finish: self.disconnect_on_finish,
            },
            connector,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sample_size_rejected() {
        let result = CrawlerBuilder::new().with_sample_size(0);
        assert_eq!(result.err(), Some(CrawlerBuilderError::InvalidSampleSize(0)));
    }

    #[test]
    fn test_connection_settings_reach_connector() {
        let crawler = CrawlerBuilder::new()
            .with_connect_retries(3)
            .with_connection_timeout(Duration::from_millis(1500))
            .with_request_timeout(Duration::from_millis(700))
            .build();

        let configuration = crawler.pool().connector().configuration();
        assert_eq!(configuration.retries, 3);
        assert_eq!(configuration.connection_timeout, Duration::from_millis(1500));
        assert_eq!(configuration.request_timeout, Duration::from_millis(700));
    }

    #[test]
    fn test_defaults() {
        let crawler = CrawlerBuilder::new().build();
        assert_eq!(crawler.config().sample_size, DEFAULT_SAMPLE_SIZE);
        assert_eq!(crawler.config().port_policy, PortPolicy::Seed);
        assert!(crawler.config().disconnect_on_finish);
        assert_eq!(crawler.config().max_in_flight_requests, None);
    }
}
