//! Correlation table for outstanding agent requests
//!
//! Every request sent to the browser agent gets a fresh [`CorrelationId`] and a
//! [`Placeholder`]: a single-assignment slot the caller waits on. The reader
//! side resolves slots as replies come in. A placeholder is removed from the
//! table on every exit path (reply, timeout, disconnect, or the waiting
//! future being dropped) because its `Drop` impl does the removal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use tabwire_protocol::{CorrelationId, Envelope};

use super::channel::ConnectionId;

/// Why a placeholder finished without a reply
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplyError {
    #[error("browser agent did not reply within {}ms", .after.as_millis())]
    TimedOut { after: Duration },

    #[error("browser agent disconnected before replying")]
    Disconnected,
}

/// Result of handing a reply to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The waiting caller received the reply
    Resolved,
    /// No placeholder with this id (never issued, already resolved, or timed out)
    Unknown,
    /// The id is pending, but on a different connection than the one replying
    WrongConnection,
}

struct PendingEntry {
    connection: ConnectionId,
    created_at: Instant,
    slot: oneshot::Sender<Result<Envelope, ReplyError>>,
}

/// Maps correlation ids to their pending placeholders and issues new ids
pub struct CorrelationTable {
    next_id: AtomicU64,
    pending: DashMap<CorrelationId, PendingEntry>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            pending: DashMap::new(),
        }
    }

    /// Issue a fresh id and register its placeholder, bound to `connection`
    pub fn allocate(self: &Arc<Self>, connection: ConnectionId) -> Placeholder {
        let id = CorrelationId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (slot, rx) = oneshot::channel();

        self.pending.insert(
            id,
            PendingEntry {
                connection,
                created_at: Instant::now(),
                slot,
            },
        );
        debug!(request_id = %id, connection = %connection, "Allocated placeholder");

        Placeholder {
            id,
            table: Arc::clone(self),
            rx,
        }
    }

    /// Deliver a reply that arrived on `from`
    ///
    /// Only the connection that carried the request may resolve it; a
    /// matching id from any other connection leaves the placeholder pending.
    pub fn resolve(&self, id: CorrelationId, from: ConnectionId, reply: Envelope) -> ResolveOutcome {
        match self.pending.remove_if(&id, |_, entry| entry.connection == from) {
            Some((_, entry)) => {
                debug!(
                    request_id = %id,
                    elapsed_ms = entry.created_at.elapsed().as_millis() as u64,
                    "Resolved placeholder"
                );
                if entry.slot.send(Ok(reply)).is_err() {
                    debug!(request_id = %id, "Waiter already gone, reply dropped");
                }
                ResolveOutcome::Resolved
            }
            None if self.pending.contains_key(&id) => {
                warn!(
                    request_id = %id,
                    connection = %from,
                    "Reply arrived on a connection that did not carry the request"
                );
                ResolveOutcome::WrongConnection
            }
            None => ResolveOutcome::Unknown,
        }
    }

    /// Fail every placeholder bound to `connection`, returning how many there were
    pub fn fail_connection(&self, connection: ConnectionId) -> usize {
        let ids: Vec<CorrelationId> = self
            .pending
            .iter()
            .filter(|entry| entry.connection == connection)
            .map(|entry| *entry.key())
            .collect();

        let mut failed = 0;
        for id in ids {
            if let Some((_, entry)) = self.pending.remove(&id) {
                let _ = entry.slot.send(Err(ReplyError::Disconnected));
                failed += 1;
            }
        }
        failed
    }

    pub fn contains(&self, id: CorrelationId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of outstanding placeholders
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn discard(&self, id: CorrelationId) {
        self.pending.remove(&id);
    }
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

/// An outstanding request awaiting its reply
///
/// Dropping a placeholder removes it from the table, so an abandoned wait
/// never leaks an entry.
pub struct Placeholder {
    id: CorrelationId,
    table: Arc<CorrelationTable>,
    rx: oneshot::Receiver<Result<Envelope, ReplyError>>,
}

impl Placeholder {
    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// Wait for the reply or for `timeout`, whichever comes first
    pub async fn wait(mut self, timeout: Duration) -> Result<Envelope, ReplyError> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            // Sender dropped without a value: the entry was torn down
            Ok(Err(_)) => Err(ReplyError::Disconnected),
            Err(_) => {
                self.table.discard(self.id);
                warn!(request_id = %self.id, timeout_ms = timeout.as_millis() as u64, "Agent request timed out");
                Err(ReplyError::TimedOut { after: timeout })
            }
        }
    }
}

impl Drop for Placeholder {
    fn drop(&mut self) {
        self.table.discard(self.id);
    }
}
