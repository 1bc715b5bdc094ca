//! Connection pool shared by the crawl phases.
//!
//! The pool owns at most one connection per peer for the lifetime of a crawl.
//! Connecting is lazy and coalesced: however many tasks ask for the same new
//! peer at once, exactly one connect sequence runs and every caller sees its
//! outcome. A failed connect is cached as a fact about the peer and never retried.

use crate::connection::{Connector, PeerClient};
use crate::node::lock;
use futures::future::join_all;
use log::{debug, info, warn};
use peers_connection::{ConnectionState, PeerAddress};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// The resolved outcome of a connect sequence.
#[derive(Debug)]
enum PoolEntry<T> {
    Open(Arc<T>),
    Failed,
}

type Slot<T> = Arc<OnceCell<PoolEntry<T>>>;

/// Connections keyed by peer address.
pub struct ConnectionPool<C: Connector> {
    connector: C,
    /// Each slot resolves once. An unresolved slot is a connect in flight.
    entries: Mutex<HashMap<PeerAddress, Slot<C::Client>>>,
}

impl<C: Connector> std::fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("entries", &self.len())
            .finish()
    }
}

impl<C: Connector> ConnectionPool<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Look up an open connection without connecting.
    pub fn get(&self, address: &PeerAddress) -> Option<Arc<C::Client>> {
        let slot = lock(&self.entries).get(address).cloned()?;
        match slot.get() {
            Some(PoolEntry::Open(client)) if client.is_open() => Some(client.clone()),
            _ => None,
        }
    }

    /// Get the connection for a peer, connecting if this is the first request for it.
    ///
    /// Transport failures are never returned, an unreachable or closed peer is
    /// simply `None`.
    pub async fn ensure(&self, address: &PeerAddress) -> Option<Arc<C::Client>> {
        let slot = lock(&self.entries)
            .entry(address.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let entry = slot
            .get_or_init(|| async {
                match self.connector.connect(address).await {
                    Ok(client) => {
                        debug!("Connected to {address}");
                        PoolEntry::Open(Arc::new(client))
                    }
                    Err(e) => {
                        debug!("There was a problem connecting to {address}: {e}");
                        PoolEntry::Failed
                    }
                }
            })
            .await;

        match entry {
            PoolEntry::Open(client) if client.is_open() => Some(client.clone()),
            _ => None,
        }
    }

    /// Lifecycle state of a peer's connection, `None` if the pool never saw the peer.
    pub fn state(&self, address: &PeerAddress) -> Option<ConnectionState> {
        let slot = lock(&self.entries).get(address).cloned()?;
        let state = match slot.get() {
            None => ConnectionState::Connecting,
            Some(PoolEntry::Failed) => ConnectionState::Failed,
            Some(PoolEntry::Open(client)) if client.is_open() => ConnectionState::Open,
            Some(PoolEntry::Open(_)) => ConnectionState::Closed,
        };
        Some(state)
    }

    /// Number of peers with an entry, whatever its state.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Close every open connection and empty the pool.
    ///
    /// Closes run concurrently. A failed close is logged and otherwise ignored.
    /// Returns once every close attempt has finished.
    pub async fn disconnect_all(&self) {
        let drained: Vec<(PeerAddress, Slot<C::Client>)> = lock(&self.entries).drain().collect();

        let open: Vec<(PeerAddress, Arc<C::Client>)> = drained
            .into_iter()
            .filter_map(|(address, slot)| match slot.get() {
                Some(PoolEntry::Open(client)) if client.is_open() => Some((address, client.clone())),
                _ => None,
            })
            .collect();

        let count = open.len();
        join_all(open.into_iter().map(|(address, client)| async move {
            if let Err(e) = client.disconnect().await {
                warn!("Error disconnecting from {address}: {e}");
            }
        }))
        .await;

        info!("Closed {count} peer connections");
    }
}
