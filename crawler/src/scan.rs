//! Status scan over every discovered peer.

use crate::connection::{Connector, PeerClient};
use crate::limit::RequestLimit;
use crate::node::{lock, NodeTable, ScannedHeight};
use crate::pool::ConnectionPool;
use futures::future::join_all;
use log::{debug, info, warn};
use peers_connection::PeerAddress;
use std::sync::Mutex;
use tokio::time::Instant;

/// One status request to every peer in the node table that has an open connection.
///
/// The scan never connects. Peers without a connection keep their record
/// untouched, as do peers whose status request fails.
pub(crate) struct Scan<'a, C: Connector> {
    pool: &'a ConnectionPool<C>,
    nodes: &'a NodeTable,
    limit: &'a RequestLimit,
    scanned: Mutex<Vec<ScannedHeight>>,
}

impl<'a, C: Connector> Scan<'a, C> {
    pub(crate) fn new(
        pool: &'a ConnectionPool<C>,
        nodes: &'a NodeTable,
        limit: &'a RequestLimit,
    ) -> Self {
        Self {
            pool,
            nodes,
            limit,
            scanned: Mutex::new(Vec::new()),
        }
    }

    /// Query all peers concurrently. Resolves once every request has finished.
    pub(crate) async fn run(&self) {
        let addresses = self.nodes.addresses();
        let total = addresses.len();
        join_all(addresses.iter().map(|address| self.scan(address))).await;

        info!(
            "Scan finished: {} of {total} nodes reported status",
            lock(&self.scanned).len()
        );
    }

    async fn scan(&self, address: &PeerAddress) {
        let Some(client) = self.pool.get(address) else {
            debug!("No open connection to {address}, skipping status");
            return;
        };

        let (status, latency) = {
            let _permit = self.limit.acquire().await;
            let start = Instant::now();
            let status = client.get_status().await;
            (status, start.elapsed())
        };

        match status {
            Ok(status) => {
                self.nodes.record_status(address, &status, latency);
                lock(&self.scanned).push(ScannedHeight {
                    address: address.clone(),
                    height: status.height,
                    block_id: status.block_id,
                    version: status.version,
                    latency,
                });
            }
            Err(e) => warn!("There was a problem getting status from {address}: {e}"),
        }
    }

    pub(crate) fn into_scanned(self) -> Vec<ScannedHeight> {
        match self.scanned.into_inner() {
            Ok(scanned) => scanned,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
