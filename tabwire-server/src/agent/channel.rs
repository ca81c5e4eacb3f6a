//! Agent channel manager
//!
//! Owns the single active connection to the browser agent. A new connection
//! supersedes the current one: the old connection is retired (its liveness
//! token is cancelled, which also closes its socket tasks) and anything still
//! pending on it is left to the correlation table.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tabwire_protocol::Envelope;

use super::correlation::{CorrelationTable, ReplyError};

/// Identity of one accepted agent connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sending to the agent failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("no browser agent connected")]
    NoConnection,

    #[error("browser agent connection closed")]
    ConnectionClosed,
}

/// A request/reply round trip failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Reply(#[from] ReplyError),
}

/// Handle to one agent connection
///
/// Cloning is cheap; every clone shares the outbound queue and liveness token.
#[derive(Debug, Clone)]
pub struct AgentConnection {
    id: ConnectionId,
    remote: SocketAddr,
    connected_at: DateTime<Utc>,
    outbound: mpsc::UnboundedSender<Envelope>,
    liveness: CancellationToken,
}

impl AgentConnection {
    /// Wrap the outbound queue of a freshly accepted socket
    pub fn new(remote: SocketAddr, outbound: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            id: ConnectionId::new(),
            remote,
            connected_at: Utc::now(),
            outbound,
            liveness: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn is_alive(&self) -> bool {
        !self.liveness.is_cancelled() && !self.outbound.is_closed()
    }

    /// Queue a frame on this connection
    pub fn send(&self, envelope: Envelope) -> Result<(), SendError> {
        if self.liveness.is_cancelled() {
            return Err(SendError::NoConnection);
        }
        self.outbound
            .send(envelope)
            .map_err(|_| SendError::ConnectionClosed)
    }

    /// Resolves once the connection has been retired
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.liveness.cancelled()
    }

    /// Stop all further traffic on this connection
    pub fn retire(&self) {
        self.liveness.cancel();
    }
}

/// Manager for the one active agent connection
pub struct AgentChannel {
    active: RwLock<Option<AgentConnection>>,
    table: Arc<CorrelationTable>,
    fail_pending_on_disconnect: bool,
}

impl AgentChannel {
    pub fn new(table: Arc<CorrelationTable>, fail_pending_on_disconnect: bool) -> Self {
        Self {
            active: RwLock::new(None),
            table,
            fail_pending_on_disconnect,
        }
    }

    /// Make `connection` the active one and greet it with `server_ready`
    pub fn accept(&self, connection: AgentConnection) {
        let previous = self.active.write().replace(connection.clone());

        if let Some(old) = previous {
            warn!(
                old = %old.id(),
                old_remote = %old.remote(),
                new = %connection.id(),
                new_remote = %connection.remote(),
                "Superseding active agent connection"
            );
            old.retire();
        }

        info!(connection = %connection.id(), remote = %connection.remote(), "Agent connection accepted");

        if let Err(e) = connection.send(Envelope::server_ready()) {
            warn!(connection = %connection.id(), error = %e, "Failed to send server_ready");
        }
    }

    /// Send on the active connection, returning the id of the connection used
    pub fn send(&self, envelope: Envelope) -> Result<ConnectionId, SendError> {
        let connection = self.active().ok_or(SendError::NoConnection)?;
        connection.send(envelope)?;
        Ok(connection.id())
    }

    /// Send `envelope` as a correlated request and wait for the reply
    pub async fn request(
        &self,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<Envelope, RequestError> {
        let connection = self.active().ok_or(SendError::NoConnection)?;
        let placeholder = self.table.allocate(connection.id());
        let id = placeholder.id();

        // On failure the placeholder is dropped here, which removes it
        connection.send(envelope.with_request_id(id))?;
        debug!(request_id = %id, connection = %connection.id(), "Sent agent request");

        Ok(placeholder.wait(timeout).await?)
    }

    /// The active connection, if it is still usable
    pub fn active(&self) -> Option<AgentConnection> {
        self.active
            .read()
            .as_ref()
            .filter(|connection| connection.is_alive())
            .cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.active().is_some()
    }

    /// Called when a connection's socket closes
    ///
    /// A superseded connection closing does not disturb the active one.
    pub fn on_disconnect(&self, id: ConnectionId) {
        let removed = {
            let mut active = self.active.write();
            match active.as_ref() {
                Some(current) if current.id() == id => active.take(),
                _ => None,
            }
        };

        match removed {
            Some(connection) => {
                connection.retire();
                info!(connection = %id, remote = %connection.remote(), "Agent disconnected");
            }
            None => debug!(connection = %id, "Retired agent connection closed"),
        }

        if self.fail_pending_on_disconnect {
            let failed = self.table.fail_connection(id);
            if failed > 0 {
                info!(connection = %id, failed, "Failed pending requests of closed connection");
            }
        }
    }
}
