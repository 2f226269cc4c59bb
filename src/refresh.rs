//! Refresh signalling and request sequencing shared by the live components.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Cloneable hook that asks a poller to fetch immediately.
///
/// Requests coalesce: several calls before the poller wakes count as one.
#[derive(Debug, Clone, Default)]
pub struct RefreshHandle {
    notify: Arc<Notify>,
}

impl RefreshHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.notify.notify_one();
    }

    /// Resolves once a refresh has been requested since the last wake.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Stamp for one dispatched fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Last-request-wins ordering for overlapping fetches.
///
/// Every fetch takes a ticket before it is sent. A response is applied only
/// if no response with a newer ticket has been applied already, so a slow
/// fetch still lands while later ones are in flight but never overwrites a
/// newer result.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
    applied: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Claims `ticket` for applying. False if a newer ticket was already
    /// applied or the ticket was invalidated.
    pub fn accept(&self, ticket: Ticket) -> bool {
        self.applied.fetch_max(ticket.0, Ordering::SeqCst) < ticket.0
    }

    /// Rejects every ticket issued so far.
    pub fn invalidate(&self) {
        let fence = self.begin();
        self.applied.fetch_max(fence.0, Ordering::SeqCst);
    }
}
