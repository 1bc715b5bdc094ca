//! The node table and the records a crawl produces.

use peers_connection::{PeerAddress, PeerInfo, PeerStatus};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

/// Everything learned about one peer during a crawl.
///
/// Created when the peer is first seen in some peer list, with no status.
/// The scan fills in the status fields once, if the peer answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    /// Address the crawler uses to reach the peer.
    pub address: PeerAddress,
    /// Height of the peer's chain tip.
    pub height: Option<u64>,
    /// Identifier of the block at `height`.
    pub block_id: Option<String>,
    /// Software version reported by the peer itself.
    pub version: Option<String>,
    /// Round trip time of the status request.
    pub latency: Option<Duration>,
    /// Version advertised for this peer by whoever listed it first.
    pub advertised_version: Option<String>,
    /// Height advertised for this peer by whoever listed it first.
    pub advertised_height: Option<u64>,
}

impl NodeRecord {
    /// A record for a peer with nothing known but its address.
    pub fn new(address: PeerAddress) -> Self {
        NodeRecord {
            address,
            height: None,
            block_id: None,
            version: None,
            latency: None,
            advertised_version: None,
            advertised_height: None,
        }
    }

    /// A record for a peer seen in another peer's list.
    pub fn advertised(address: PeerAddress, info: &PeerInfo) -> Self {
        NodeRecord {
            advertised_version: info.version.clone(),
            advertised_height: info.height,
            ..NodeRecord::new(address)
        }
    }

    /// Whether the peer answered its status request.
    pub fn is_online(&self) -> bool {
        self.height.is_some()
    }
}

impl fmt::Display for NodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.height, &self.version, &self.latency) {
            (Some(height), Some(version), Some(latency)) => write!(
                f,
                "{} (height: {height}, version: {version}, latency: {}ms)",
                self.address,
                latency.as_millis()
            ),
            _ => write!(f, "{} (offline)", self.address),
        }
    }
}

/// One successful status answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedHeight {
    pub address: PeerAddress,
    pub height: u64,
    pub block_id: String,
    pub version: String,
    pub latency: Duration,
}

/// Lock a mutex, recovering the data if a panicking task poisoned it.
///
/// Crawl state stays meaningful after a panic in some branch, and the crawler
/// still hands back what it gathered.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Mapping from peer address to its [`NodeRecord`], shared by both crawl phases.
///
/// The lock is never held across an await point.
#[derive(Debug, Default)]
pub struct NodeTable {
    nodes: Mutex<HashMap<PeerAddress, NodeRecord>>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless one exists for its address.
    ///
    /// # Returns
    ///
    /// `true` if the record was inserted.
    pub fn insert(&self, record: NodeRecord) -> bool {
        let mut nodes = lock(&self.nodes);
        if nodes.contains_key(&record.address) {
            return false;
        }
        nodes.insert(record.address.clone(), record);
        true
    }

    pub fn contains(&self, address: &PeerAddress) -> bool {
        lock(&self.nodes).contains_key(address)
    }

    pub fn get(&self, address: &PeerAddress) -> Option<NodeRecord> {
        lock(&self.nodes).get(address).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.nodes).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.nodes).is_empty()
    }

    /// Snapshot of every address in the table.
    pub fn addresses(&self) -> Vec<PeerAddress> {
        lock(&self.nodes).keys().cloned().collect()
    }

    /// Fill in the status fields of a record.
    ///
    /// # Returns
    ///
    /// `false` if the address isn't in the table.
    pub fn record_status(
        &self,
        address: &PeerAddress,
        status: &PeerStatus,
        latency: Duration,
    ) -> bool {
        match lock(&self.nodes).get_mut(address) {
            Some(record) => {
                record.height = Some(status.height);
                record.block_id = Some(status.block_id.clone());
                record.version = Some(status.version.clone());
                record.latency = Some(latency);
                true
            }
            None => false,
        }
    }

    pub fn into_nodes(self) -> HashMap<PeerAddress, NodeRecord> {
        match self.nodes.into_inner() {
            Ok(nodes) => nodes,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// The outcome of one crawl.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub(crate) nodes: HashMap<PeerAddress, NodeRecord>,
    pub(crate) scanned: Vec<ScannedHeight>,
    pub(crate) started_at: SystemTime,
    pub(crate) elapsed: Duration,
    pub(crate) peer_list_requests: usize,
}

impl CrawlResult {
    /// Every peer discovered, online or not.
    pub fn nodes(&self) -> &HashMap<PeerAddress, NodeRecord> {
        &self.nodes
    }

    /// Status answers, in arrival order.
    pub fn scanned(&self) -> &[ScannedHeight] {
        &self.scanned
    }

    /// Wall-clock time the crawl started.
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// How long the crawl took, disconnect included.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Number of peer list requests sent during discovery.
    pub fn peer_list_requests(&self) -> usize {
        self.peer_list_requests
    }

    /// Peers which never answered a status request.
    pub fn offline(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.values().filter(|record| !record.is_online())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(host: &str) -> PeerAddress {
        PeerAddress::new(host, 4001).unwrap()
    }

    #[test]
    fn test_insert_is_first_writer_wins() {
        let table = NodeTable::new();
        let info = PeerInfo {
            ip: "10.0.0.2".to_string(),
            port: None,
            version: Some("2.5.0".to_string()),
            height: Some(10),
        };

        assert!(table.insert(NodeRecord::advertised(address("10.0.0.2"), &info)));
        // Same host on another port is the same node.
        assert!(!table.insert(NodeRecord::new(PeerAddress::new("10.0.0.2", 4002).unwrap())));

        assert_eq!(table.len(), 1);
        let record = table.get(&address("10.0.0.2")).unwrap();
        assert_eq!(record.advertised_version.as_deref(), Some("2.5.0"));
        assert_eq!(record.address.port(), 4001);
    }

    #[test]
    fn test_record_status() {
        let table = NodeTable::new();
        table.insert(NodeRecord::new(address("10.0.0.1")));
        let status = PeerStatus {
            height: 99,
            block_id: "b99".to_string(),
            version: "2.6.0".to_string(),
        };

        assert!(table.record_status(&address("10.0.0.1"), &status, Duration::from_millis(12)));
        assert!(!table.record_status(&address("10.0.0.9"), &status, Duration::from_millis(12)));

        let record = table.get(&address("10.0.0.1")).unwrap();
        assert!(record.is_online());
        assert_eq!(record.height, Some(99));
        assert_eq!(record.to_string(), "10.0.0.1:4001 (height: 99, version: 2.6.0, latency: 12ms)");
    }
}
