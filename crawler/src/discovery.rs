//! Sampled recursive peer discovery.
//!
//! Starting from a seed, each visited peer is asked for its peer list. Every
//! listed peer lands in the node table, but only a random sample of at most
//! `sample_size` listed peers is considered for a visit, and of those only
//! the ones nobody scheduled yet are visited. This keeps the number
//! of peer list requests proportional to the number of peers instead of the
//! number of edges in a densely connected network.
//!
//! # Termination
//!
//! A peer is marked [`DiscoveryState::Scheduled`] before its visit starts and
//! states only move forward, so no peer is visited twice and discovery ends
//! once the finite set of reachable peers is exhausted.

use crate::connection::{Connector, PeerClient};
use crate::limit::RequestLimit;
use crate::node::{lock, NodeRecord, NodeTable};
use crate::pool::ConnectionPool;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use log::{debug, info, warn};
use peers_connection::{PeerAddress, PeerInfo};
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Which port to use for peers learned from a peer list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortPolicy {
    /// Every peer listens on the seed's port.
    #[default]
    Seed,
    /// Use the port a listing advertises, falling back to the seed's port.
    Advertised,
}

impl fmt::Display for PortPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortPolicy::Seed => write!(f, "seed"),
            PortPolicy::Advertised => write!(f, "advertised"),
        }
    }
}

/// Discovery progress of a single peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    /// Selected for a visit, peer list not fetched yet.
    Scheduled,
    /// Peer list fetched.
    Visited,
    /// No connection, or the peer list request failed. Not retried this crawl.
    Unreachable,
}

/// Settings for one discovery run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DiscoveryConfig {
    pub sample_size: usize,
    pub port_policy: PortPolicy,
    pub default_port: u16,
}

/// Totals of a finished discovery run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DiscoverySummary {
    pub visited: usize,
    pub unreachable: usize,
    pub peer_list_requests: usize,
}

pub(crate) struct Discovery<'a, C: Connector> {
    pool: &'a ConnectionPool<C>,
    nodes: &'a NodeTable,
    limit: &'a RequestLimit,
    config: DiscoveryConfig,
    states: Mutex<HashMap<PeerAddress, DiscoveryState>>,
    peer_list_requests: AtomicUsize,
}

impl<'a, C: Connector> Discovery<'a, C> {
    pub(crate) fn new(
        pool: &'a ConnectionPool<C>,
        nodes: &'a NodeTable,
        limit: &'a RequestLimit,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            pool,
            nodes,
            limit,
            config,
            states: Mutex::new(HashMap::new()),
            peer_list_requests: AtomicUsize::new(0),
        }
    }

    /// Explore the network from `seed`. Resolves once every branch has finished.
    ///
    /// Branches are driven from one flat work set rather than nested futures,
    /// so a long chain of peers doesn't deepen the stack.
    pub(crate) async fn run(&self, seed: PeerAddress) {
        lock(&self.states).insert(seed.clone(), DiscoveryState::Scheduled);

        let mut work: FuturesUnordered<BoxFuture<'_, Vec<Step>>> = FuturesUnordered::new();
        work.push(self.step(Step::Visit(seed)));
        while let Some(next) = work.next().await {
            for step in next {
                work.push(self.step(step));
            }
        }

        let summary = self.summary();
        info!(
            "Discovery finished: {} nodes known, {} visited, {} unreachable, {} peer list requests",
            self.nodes.len(),
            summary.visited,
            summary.unreachable,
            summary.peer_list_requests
        );
    }

    fn step(&self, step: Step) -> BoxFuture<'_, Vec<Step>> {
        match step {
            Step::Visit(peer) => self.visit(peer).boxed(),
            Step::Connect(peer) => async move {
                self.pool.ensure(&peer).await;
                Vec::new()
            }
            .boxed(),
        }
    }

    pub(crate) fn state(&self, address: &PeerAddress) -> Option<DiscoveryState> {
        lock(&self.states).get(address).copied()
    }

    pub(crate) fn summary(&self) -> DiscoverySummary {
        let states = lock(&self.states);
        DiscoverySummary {
            visited: states
                .values()
                .filter(|s| **s == DiscoveryState::Visited)
                .count(),
            unreachable: states
                .values()
                .filter(|s| **s == DiscoveryState::Unreachable)
                .count(),
            peer_list_requests: self.peer_list_requests.load(Ordering::Relaxed),
        }
    }

    fn set_state(&self, address: &PeerAddress, state: DiscoveryState) {
        lock(&self.states).insert(address.clone(), state);
    }

    /// Visit one peer. Returns the follow-up work: connects to freshly seen
    /// peers and visits to the sampled ones.
    async fn visit(&self, peer: PeerAddress) -> Vec<Step> {
        let Some(client) = self.pool.ensure(&peer).await else {
            debug!("No connection to {peer}, ending branch");
            self.set_state(&peer, DiscoveryState::Unreachable);
            return Vec::new();
        };

        let listed = {
            let _permit = self.limit.acquire().await;
            self.peer_list_requests.fetch_add(1, Ordering::Relaxed);
            client.get_peers().await
        };
        let listed = match listed {
            Ok(listed) => listed,
            Err(e) => {
                warn!("There was a problem getting peer list from {peer}: {e}");
                self.set_state(&peer, DiscoveryState::Unreachable);
                return Vec::new();
            }
        };
        self.set_state(&peer, DiscoveryState::Visited);

        let advertised = self.advertised_addresses(&peer, &listed);
        debug!("{peer} listed {} peers", advertised.len());

        // Connect ahead to freshly seen peers so the scan finds them open.
        let mut steps: Vec<Step> = advertised
            .iter()
            .filter(|(address, info)| {
                self.nodes
                    .insert(NodeRecord::advertised((*address).clone(), info))
            })
            .map(|(address, _)| Step::Connect(address.clone()))
            .collect();

        let candidates: Vec<PeerAddress> =
            advertised.into_iter().map(|(address, _)| address).collect();
        steps.extend(self.schedule_sample(&candidates).into_iter().map(Step::Visit));
        steps
    }

    /// Turn a peer list into addresses, skipping the listing peer, duplicates and garbage.
    fn advertised_addresses<'p>(
        &self,
        peer: &PeerAddress,
        listed: &'p [PeerInfo],
    ) -> Vec<(PeerAddress, &'p PeerInfo)> {
        let mut seen = HashSet::new();
        listed
            .iter()
            .filter_map(|info| {
                let port = match self.config.port_policy {
                    PortPolicy::Seed => self.config.default_port,
                    PortPolicy::Advertised => info.port.unwrap_or(self.config.default_port),
                };
                match PeerAddress::new(info.ip.clone(), port) {
                    Ok(address) => Some((address, info)),
                    Err(e) => {
                        debug!("Ignoring peer listed by {peer}: {e}");
                        None
                    }
                }
            })
            .filter(|(address, _)| address != peer && seen.insert(address.clone()))
            .collect()
    }

    /// Draw up to `sample_size` of the listed peers and schedule those nobody
    /// has scheduled yet.
    ///
    /// Drawn peers which are already known are dropped, not replaced, so each
    /// visit spends at most `sample_size` follow-up requests. Check and mark
    /// happen under one lock, so parallel branches listing the same peer can't
    /// both pick it.
    fn schedule_sample(&self, candidates: &[PeerAddress]) -> Vec<PeerAddress> {
        let sample: Vec<&PeerAddress> = candidates
            .choose_multiple(&mut rand::thread_rng(), self.config.sample_size)
            .collect();

        let mut states = lock(&self.states);
        let mut scheduled = Vec::with_capacity(sample.len());
        for address in sample {
            if !states.contains_key(address) {
                states.insert(address.clone(), DiscoveryState::Scheduled);
                scheduled.push(address.clone());
            }
        }
        scheduled
    }
}

/// A unit of discovery work.
enum Step {
    /// Fetch a peer's list.
    Visit(PeerAddress),
    /// Open a connection without visiting.
    Connect(PeerAddress),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::test_utils::{address, info, MockNetwork, MockPeer, MOCK_PORT};
    use std::time::Duration;

    fn config(sample_size: usize) -> DiscoveryConfig {
        DiscoveryConfig {
            sample_size,
            port_policy: PortPolicy::Seed,
            default_port: MOCK_PORT,
        }
    }

    async fn discover(
        network: &MockNetwork,
        seed: &str,
        sample_size: usize,
    ) -> (NodeTable, DiscoverySummary, ConnectionPool<MockNetwork>) {
        let pool = ConnectionPool::new(network.clone());
        let nodes = NodeTable::new();
        let limit = RequestLimit::default();
        nodes.insert(NodeRecord::new(address(seed)));

        let summary = {
            let discovery = Discovery::new(&pool, &nodes, &limit, config(sample_size));
            discovery.run(address(seed)).await;
            discovery.summary()
        };
        (nodes, summary, pool)
    }

    #[tokio::test]
    async fn test_sample_bounds_direct_recursion() {
        let network = MockNetwork::new();
        let neighbors = ["B", "C", "D", "E", "F", "G"];
        network.add_healthy("10.0.0.1", &neighbors, 1);
        for host in neighbors {
            network.add_healthy(host, &[], 1);
        }

        let (nodes, summary, _pool) = discover(&network, "10.0.0.1", 3).await;

        // All six are known, only three were asked for their peers.
        assert_eq!(nodes.len(), 7);
        for host in neighbors {
            assert!(nodes.contains(&address(host)));
        }
        let calls = network.calls();
        let visited_children: usize = neighbors.iter().map(|h| calls.get_peers(h)).sum();
        assert_eq!(visited_children, 3);
        assert_eq!(calls.get_peers("10.0.0.1"), 1);
        assert_eq!(summary.peer_list_requests, 4);
        // The opportunistic connect reached every listed peer.
        for host in neighbors {
            assert_eq!(calls.connects(host), 1);
        }
    }

    #[tokio::test]
    async fn test_terminates_on_cycles_and_self_loops() {
        let network = MockNetwork::new();
        // A ring where every peer also lists itself.
        let hosts = ["n0", "n1", "n2", "n3", "n4"];
        for (i, host) in hosts.iter().copied().enumerate() {
            let next = hosts[(i + 1) % hosts.len()];
            let prev = hosts[(i + hosts.len() - 1) % hosts.len()];
            network.add_healthy(host, &[host, next, prev], i as u64);
        }

        let (nodes, summary, _pool) = discover(&network, "n0", 8).await;

        assert_eq!(nodes.len(), hosts.len());
        assert_eq!(summary.visited, hosts.len());
        let calls = network.calls();
        for host in hosts {
            assert_eq!(calls.get_peers(host), 1);
        }
    }

    /// Hosts of a network where every peer lists every other peer.
    fn complete_graph(network: &MockNetwork, size: usize) -> Vec<String> {
        let hosts: Vec<String> = (0..size).map(|i| format!("10.1.{}.{}", i / 256, i % 256)).collect();
        let all: Vec<&str> = hosts.iter().map(String::as_str).collect();
        for host in &all {
            let others: Vec<&str> = all.iter().copied().filter(|h| h != host).collect();
            network.add_healthy(host, &others, 1);
        }
        hosts
    }

    #[tokio::test]
    async fn test_complete_graph_request_bound() {
        let network = MockNetwork::new();
        let hosts = complete_graph(&network, 50);
        let all: Vec<&str> = hosts.iter().map(String::as_str).collect();

        let (nodes, summary, _pool) = discover(&network, all[0], 5).await;

        assert_eq!(nodes.len(), 50);
        // At most one peer list request per peer, far from 50 x 49.
        assert!(summary.peer_list_requests <= 50);
        let calls = network.calls();
        assert_eq!(calls.total_get_peers(), summary.peer_list_requests);
        for host in &all {
            assert!(calls.get_peers(host) <= 1);
            assert_eq!(calls.connects(host), 1);
        }
    }

    #[tokio::test]
    async fn test_sample_size_limits_requests() {
        let network = MockNetwork::new();
        let hosts = complete_graph(&network, 200);

        // With one draw per visit, a draw of a known peer ends the walk.
        let (nodes, narrow, _pool) = discover(&network, &hosts[0], 1).await;
        assert_eq!(nodes.len(), 200);
        assert!(narrow.peer_list_requests < 100);

        let network = MockNetwork::new();
        let hosts = complete_graph(&network, 200);
        let (nodes, wide, _pool) = discover(&network, &hosts[0], 199).await;
        assert_eq!(nodes.len(), 200);
        assert_eq!(wide.peer_list_requests, 200);
    }

    #[tokio::test]
    async fn test_long_chain() {
        let network = MockNetwork::new();
        let hosts: Vec<String> = (0..3000).map(|i| format!("chain-{i}")).collect();
        for pair in hosts.windows(2) {
            network.add_healthy(&pair[0], &[pair[1].as_str()], 1);
        }
        network.add_healthy(&hosts[2999], &[], 1);

        let (nodes, summary, _pool) = discover(&network, &hosts[0], 1).await;

        assert_eq!(nodes.len(), 3000);
        assert_eq!(summary.visited, 3000);
        assert_eq!(summary.peer_list_requests, 3000);
    }

    #[tokio::test]
    async fn test_large_complete_graph_single_sample() {
        let network = MockNetwork::new();
        let hosts = complete_graph(&network, 600);

        let (nodes, summary, pool) = discover(&network, &hosts[0], 1).await;

        assert_eq!(nodes.len(), 600);
        assert_eq!(pool.len(), 600);
        assert!(summary.peer_list_requests >= 1);
        assert_eq!(network.calls().total_get_peers(), summary.peer_list_requests);
    }

    #[tokio::test]
    async fn test_concurrent_branches_visit_once() {
        let network = MockNetwork::new();
        // A lists B and D, both list C, and C is slow to connect.
        network.add_healthy("A", &["B", "D"], 1);
        network.add_peer(
            "B",
            MockPeer {
                peers: vec![info("C")],
                peers_delay: Duration::from_millis(5),
                ..Default::default()
            },
        );
        network.add_peer(
            "D",
            MockPeer {
                peers: vec![info("C")],
                peers_delay: Duration::from_millis(5),
                ..Default::default()
            },
        );
        network.add_peer(
            "C",
            MockPeer {
                connect_delay: Duration::from_millis(30),
                ..Default::default()
            },
        );

        let (nodes, _summary, pool) = discover(&network, "A", 8).await;

        assert_eq!(nodes.len(), 4);
        let calls = network.calls();
        assert_eq!(calls.connects("C"), 1);
        assert_eq!(calls.get_peers("C"), 1);
        assert_eq!(pool.len(), 4);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let network = MockNetwork::new();
        network.add_healthy("A", &["X", "Y", "Z"], 1);
        network.add_peer(
            "X",
            MockPeer {
                unreachable: true,
                ..Default::default()
            },
        );
        network.add_peer(
            "Y",
            MockPeer {
                peers: vec![info("W")],
                peers_fail: true,
                ..Default::default()
            },
        );
        network.add_healthy("Z", &["W"], 1);
        network.add_healthy("W", &[], 1);

        let (nodes, summary, _pool) = discover(&network, "A", 8).await;

        // W is still found through Z.
        assert_eq!(nodes.len(), 5);
        assert!(nodes.contains(&address("W")));
        assert_eq!(summary.visited, 3);
        assert_eq!(summary.unreachable, 2);
        assert_eq!(network.calls().get_peers("X"), 0);
    }

    #[tokio::test]
    async fn test_unreachable_seed() {
        let network = MockNetwork::new();
        let (nodes, summary, _pool) = discover(&network, "A", 8).await;

        assert_eq!(nodes.len(), 1);
        assert_eq!(summary.peer_list_requests, 0);
        assert_eq!(summary.unreachable, 1);
    }

    #[tokio::test]
    async fn test_port_policy() {
        let network = MockNetwork::new();
        network.add_peer(
            "A",
            MockPeer {
                peers: vec![
                    PeerInfo {
                        ip: "B".to_string(),
                        port: Some(4100),
                        version: Some("2.5.0".to_string()),
                        height: Some(9),
                    },
                    PeerInfo {
                        ip: "C".to_string(),
                        port: None,
                        version: None,
                        height: None,
                    },
                    PeerInfo {
                        ip: "not a host".to_string(),
                        port: None,
                        version: None,
                        height: None,
                    },
                ],
                ..Default::default()
            },
        );

        let pool = ConnectionPool::new(network.clone());
        let nodes = NodeTable::new();
        let limit = RequestLimit::default();
        let discovery = Discovery::new(
            &pool,
            &nodes,
            &limit,
            DiscoveryConfig {
                sample_size: 0,
                port_policy: PortPolicy::Advertised,
                default_port: 4001,
            },
        );
        discovery.run(address("A")).await;

        assert_eq!(nodes.len(), 2);
        let b = nodes.get(&address("B")).unwrap();
        assert_eq!(b.address.port(), 4100);
        assert_eq!(b.advertised_version.as_deref(), Some("2.5.0"));
        assert_eq!(b.advertised_height, Some(9));
        assert_eq!(nodes.get(&address("C")).unwrap().address.port(), 4001);
        assert_eq!(discovery.state(&address("A")), Some(DiscoveryState::Visited));
        assert_eq!(discovery.state(&address("B")), None);
    }
}
