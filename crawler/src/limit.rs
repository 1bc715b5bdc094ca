//! Optional global cap on in-flight peer requests.

use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Admission limit shared by discovery and scan.
///
/// Unlimited unless built with a cap, in which case at most that many peer
/// requests are outstanding at once across the whole crawl.
#[derive(Debug, Clone, Default)]
pub(crate) struct RequestLimit {
    semaphore: Option<Arc<Semaphore>>,
}

impl RequestLimit {
    pub(crate) fn new(max_in_flight: Option<usize>) -> Self {
        Self {
            semaphore: max_in_flight.map(|max| Arc::new(Semaphore::new(max))),
        }
    }

    /// Wait for a request slot. The slot is released when the permit drops.
    pub(crate) async fn acquire(&self) -> Option<SemaphorePermit<'_>> {
        match &self.semaphore {
            // The semaphore is never closed, so acquire only fails if it were.
            Some(semaphore) => semaphore.acquire().await.ok(),
            None => None,
        }
    }
}
