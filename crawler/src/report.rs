//! Summary report of a crawl.

use crate::node::CrawlResult;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

/// Peers which reported the same height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeightGroup {
    pub height: u64,
    /// Number of peers at this height.
    pub count: usize,
    /// Number of peers per block id. More than one id means the peers disagree
    /// about the block at this height.
    pub block_ids: BTreeMap<String, usize>,
}

/// Minimum, mean and maximum status round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub min: Duration,
    pub avg: Duration,
    pub max: Duration,
}

/// Aggregated view of a [`CrawlResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// Every discovered peer.
    pub total: usize,
    /// Peers which answered a status request.
    pub online: usize,
    pub offline: usize,
    /// Sorted by height, highest first.
    pub heights: Vec<HeightGroup>,
    /// Peers per reported software version, most common first.
    pub versions: Vec<(String, usize)>,
    pub latency: Option<LatencyStats>,
    pub peer_list_requests: usize,
    pub elapsed: Duration,
}

impl CrawlReport {
    pub fn from_result(result: &CrawlResult) -> Self {
        let mut groups: BTreeMap<u64, HeightGroup> = BTreeMap::new();
        let mut versions: HashMap<&str, usize> = HashMap::new();
        for scanned in result.scanned() {
            let group = groups.entry(scanned.height).or_insert_with(|| HeightGroup {
                height: scanned.height,
                count: 0,
                block_ids: BTreeMap::new(),
            });
            group.count += 1;
            *group.block_ids.entry(scanned.block_id.clone()).or_default() += 1;
            *versions.entry(scanned.version.as_str()).or_default() += 1;
        }

        let mut versions: Vec<(String, usize)> = versions
            .into_iter()
            .map(|(version, count)| (version.to_string(), count))
            .collect();
        versions.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let latencies: Vec<Duration> = result.scanned().iter().map(|s| s.latency).collect();
        let latency = match (latencies.iter().min(), latencies.iter().max()) {
            (Some(min), Some(max)) => Some(LatencyStats {
                min: *min,
                avg: latencies.iter().sum::<Duration>() / latencies.len() as u32,
                max: *max,
            }),
            _ => None,
        };

        let online = result.scanned().len();
        let total = result.nodes().len();
        CrawlReport {
            total,
            online,
            offline: total.saturating_sub(online),
            heights: groups.into_values().rev().collect(),
            versions,
            latency,
            peer_list_requests: result.peer_list_requests(),
            elapsed: result.elapsed(),
        }
    }

    /// Highest height any peer reported.
    pub fn tip(&self) -> Option<u64> {
        self.heights.first().map(|group| group.height)
    }

    /// Share of online peers at the tip, from 0.0 to 1.0.
    pub fn tip_agreement(&self) -> Option<f64> {
        let tip = self.heights.first()?;
        Some(tip.count as f64 / self.online as f64)
    }
}

impl fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===========================================")?;
        writeln!(f, "Total nodes discovered: {}", self.total)?;
        writeln!(f, "Total nodes online: {}", self.online)?;
        writeln!(f, "Total nodes offline: {}", self.offline)?;
        writeln!(f, "Peer list requests: {}", self.peer_list_requests)?;
        writeln!(f, "-------------------------------------------")?;
        writeln!(f, "Block stats:")?;
        for group in &self.heights {
            writeln!(f, "  {}: {} nodes", group.height, group.count)?;
            for (id, count) in &group.block_ids {
                writeln!(f, "    {id}: {count}")?;
            }
        }
        if let (Some(tip), Some(agreement)) = (self.tip(), self.tip_agreement()) {
            writeln!(f, "Tip: {tip} ({:.1}% of online nodes)", agreement * 100.0)?;
        }
        writeln!(f, "-------------------------------------------")?;
        writeln!(f, "Versions:")?;
        for (version, count) in &self.versions {
            writeln!(f, "  {version}: {count}")?;
        }
        if let Some(latency) = &self.latency {
            writeln!(
                f,
                "Latency: min {}ms, avg {}ms, max {}ms",
                latency.min.as_millis(),
                latency.avg.as_millis(),
                latency.max.as_millis()
            )?;
        }
        writeln!(f, "-------------------------------------------")?;
        write!(f, "Finished scanning in {}ms", self.elapsed.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeRecord, ScannedHeight};
    use peers_connection::PeerAddress;
    use std::time::SystemTime;

    fn scanned(host: &str, height: u64, block_id: &str, version: &str, ms: u64) -> ScannedHeight {
        ScannedHeight {
            address: PeerAddress::new(host, 4001).unwrap(),
            height,
            block_id: block_id.to_string(),
            version: version.to_string(),
            latency: Duration::from_millis(ms),
        }
    }

    fn result(scanned: Vec<ScannedHeight>, offline: &[&str]) -> CrawlResult {
        let mut nodes = HashMap::new();
        for s in &scanned {
            nodes.insert(s.address.clone(), NodeRecord::new(s.address.clone()));
        }
        for host in offline {
            let address = PeerAddress::new(*host, 4001).unwrap();
            nodes.insert(address.clone(), NodeRecord::new(address));
        }
        CrawlResult {
            nodes,
            scanned,
            started_at: SystemTime::now(),
            elapsed: Duration::from_millis(1234),
            peer_list_requests: 3,
        }
    }

    #[test]
    fn test_report_groups_heights() {
        let report = CrawlReport::from_result(&result(
            vec![
                scanned("A", 100, "x", "2.6.0", 10),
                scanned("B", 101, "y", "2.6.0", 20),
                scanned("C", 101, "y", "2.5.1", 30),
                scanned("D", 101, "z", "2.6.0", 40),
            ],
            &["E"],
        ));

        assert_eq!(report.total, 5);
        assert_eq!(report.online, 4);
        assert_eq!(report.offline, 1);
        assert_eq!(report.tip(), Some(101));
        assert_eq!(report.tip_agreement(), Some(0.75));
        assert_eq!(report.heights.len(), 2);
        assert_eq!(report.heights[0].block_ids["y"], 2);
        assert_eq!(report.heights[0].block_ids["z"], 1);
        assert_eq!(report.heights[1].count, 1);
        assert_eq!(
            report.versions,
            vec![("2.6.0".to_string(), 3), ("2.5.1".to_string(), 1)]
        );
        assert_eq!(
            report.latency,
            Some(LatencyStats {
                min: Duration::from_millis(10),
                avg: Duration::from_millis(25),
                max: Duration::from_millis(40),
            })
        );

        let text = report.to_string();
        assert!(text.contains("Total nodes discovered: 5"));
        assert!(text.contains("  101: 3 nodes"));
        assert!(text.ends_with("Finished scanning in 1234ms"));
    }

    #[test]
    fn test_report_without_answers() {
        let report = CrawlReport::from_result(&result(Vec::new(), &["A"]));

        assert_eq!(report.offline, 1);
        assert_eq!(report.tip(), None);
        assert_eq!(report.tip_agreement(), None);
        assert_eq!(report.latency, None);
        assert!(!report.to_string().contains("Latency"));
    }
}
