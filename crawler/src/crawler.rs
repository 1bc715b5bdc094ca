use crate::connection::Connector;
use crate::discovery::{Discovery, DiscoveryConfig, PortPolicy};
use crate::limit::RequestLimit;
use crate::node::{lock, CrawlResult, NodeRecord, NodeTable};
use crate::pool::ConnectionPool;
use crate::scan::Scan;
use futures::FutureExt;
use log::{error, info};
use peers_connection::PeerAddress;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Mutex;
use std::time::{Instant, SystemTime};

/// Stages of a single crawl, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    Discovering,
    Scanning,
    Disconnecting,
    Done,
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlPhase::Idle => write!(f, "idle"),
            CrawlPhase::Discovering => write!(f, "discovering"),
            CrawlPhase::Scanning => write!(f, "scanning"),
            CrawlPhase::Disconnecting => write!(f, "disconnecting"),
            CrawlPhase::Done => write!(f, "done"),
        }
    }
}

/// Errors that can end a crawl.
#[derive(Debug)]
pub enum CrawlError {
    /// A fault escaped discovery or the scan. Carries whatever was gathered
    /// before it, connections were still closed as configured.
    Incomplete {
        result: Box<CrawlResult>,
        reason: String,
    },
}

impl fmt::Display for CrawlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlError::Incomplete { result, reason } => write!(
                f,
                "Crawl incomplete after discovering {} nodes: {reason}",
                result.nodes().len()
            ),
        }
    }
}

impl std::error::Error for CrawlError {}

/// Settings of a [`Crawler`], see [`crate::CrawlerBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlerConfig {
    pub sample_size: usize,
    pub port_policy: PortPolicy,
    pub max_in_flight_requests: Option<usize>,
    pub disconnect_on_finish: bool,
}

/// A crawler for a peer-to-peer network exposing peer list and status calls.
///
/// A crawl discovers peers from a seed by sampled recursive peer list requests,
/// then asks every discovered peer for its status once over the connections
/// opened during discovery.
#[derive(Debug)]
pub struct Crawler<C: Connector> {
    config: CrawlerConfig,
    pool: ConnectionPool<C>,
}

impl<C: Connector> Crawler<C> {
    pub(crate) fn new(config: CrawlerConfig, connector: C) -> Self {
        Crawler {
            config,
            pool: ConnectionPool::new(connector),
        }
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Connections of the crawler. Empty between crawls unless
    /// disconnecting on finish is turned off.
    pub fn pool(&self) -> &ConnectionPool<C> {
        &self.pool
    }

    /// Crawl the network reachable from `seed`.
    ///
    /// Listed peers are reached on the seed's port unless the port policy says
    /// otherwise. Unreachable peers never fail the crawl, they are just missing
    /// status in the result.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlResult)` - Every discovered node and every status answer.
    /// * `Err(CrawlError::Incomplete)` - If discovery or the scan blew up, with the partial result.
    pub async fn crawl(&self, seed: PeerAddress) -> Result<CrawlResult, CrawlError> {
        let started_at = SystemTime::now();
        let start = Instant::now();
        let phase = Mutex::new(CrawlPhase::Idle);

        let nodes = NodeTable::new();
        nodes.insert(NodeRecord::new(seed.clone()));
        let limit = RequestLimit::new(self.config.max_in_flight_requests);
        let discovery = Discovery::new(
            &self.pool,
            &nodes,
            &limit,
            DiscoveryConfig {
                sample_size: self.config.sample_size,
                port_policy: self.config.port_policy,
                default_port: seed.port(),
            },
        );
        let scan = Scan::new(&self.pool, &nodes, &limit);

        info!("Crawling from seed {seed}");
        let phases = async {
            advance(&phase, CrawlPhase::Discovering);
            discovery.run(seed).await;
            advance(&phase, CrawlPhase::Scanning);
            scan.run().await;
        };
        let fault = AssertUnwindSafe(phases)
            .catch_unwind()
            .await
            .err()
            .map(|payload| {
                let reason = format!("panic while {}: {}", *lock(&phase), panic_message(&*payload));
                error!("Crawl aborted, {reason}");
                reason
            });

        let peer_list_requests = discovery.summary().peer_list_requests;
        let scanned = scan.into_scanned();
        drop(discovery);

        advance(&phase, CrawlPhase::Disconnecting);
        if self.config.disconnect_on_finish {
            self.pool.disconnect_all().await;
        }
        advance(&phase, CrawlPhase::Done);

        let result = CrawlResult {
            nodes: nodes.into_nodes(),
            scanned,
            started_at,
            elapsed: start.elapsed(),
            peer_list_requests,
        };
        info!(
            "Crawl finished in {}ms: {} nodes, {} reported status",
            result.elapsed.as_millis(),
            result.nodes.len(),
            result.scanned.len()
        );

        match fault {
            None => Ok(result),
            Some(reason) => Err(CrawlError::Incomplete {
                result: Box::new(result),
                reason,
            }),
        }
    }
}

fn advance(phase: &Mutex<CrawlPhase>, next: CrawlPhase) {
    let mut current = lock(phase);
    info!("Crawl phase {} -> {next}", *current);
    *current = next;
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
