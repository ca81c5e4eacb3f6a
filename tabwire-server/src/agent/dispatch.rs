//! Inbound agent frame routing
//!
//! A frame whose `request_id` names a pending placeholder is a reply and goes
//! to the correlation table. Everything else is an unsolicited notification
//! and only ever touches [`AgentState`] and the log.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use tabwire_protocol::{kinds, Envelope};

use super::channel::AgentConnection;
use super::correlation::{CorrelationTable, ResolveOutcome};
use super::state::{AgentState, TabSnapshot};

/// What the dispatcher did with a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Handed to the correlation table
    Reply(ResolveOutcome),
    /// Handled as a side-channel notification
    Notification,
    /// Not a decodable envelope
    Malformed,
}

pub struct Dispatcher {
    table: Arc<CorrelationTable>,
    state: Arc<AgentState>,
}

impl Dispatcher {
    pub fn new(table: Arc<CorrelationTable>, state: Arc<AgentState>) -> Self {
        Self { table, state }
    }

    /// Decode and route one text frame received on `connection`
    pub fn dispatch_text(&self, connection: &AgentConnection, text: &str) -> Routed {
        match Envelope::from_text(text) {
            Ok(envelope) => self.dispatch(connection, envelope),
            Err(e) => {
                error!(connection = %connection.id(), error = %e, "Dropping undecodable agent frame");
                Routed::Malformed
            }
        }
    }

    pub fn dispatch(&self, connection: &AgentConnection, envelope: Envelope) -> Routed {
        debug!(connection = %connection.id(), kind = %envelope.kind(), "Agent frame received");

        if let Some(id) = envelope.correlation_id() {
            if self.table.contains(id) {
                return Routed::Reply(self.table.resolve(id, connection.id(), envelope));
            }
        }

        if let Some(request_id) = envelope.request_id() {
            info!(
                request_id = %request_id,
                kind = %envelope.kind(),
                "Reply for unknown or expired request ignored"
            );
        }

        self.handle_notification(connection, &envelope);
        Routed::Notification
    }

    fn handle_notification(&self, connection: &AgentConnection, envelope: &Envelope) {
        match envelope.kind() {
            kinds::EXTENSION_CONNECTED => {
                info!(connection = %connection.id(), "Browser extension ready");
                self.state.confirm(connection.id());
                if let Err(e) = connection.send(Envelope::connection_confirmed()) {
                    warn!(connection = %connection.id(), error = %e, "Failed to confirm connection");
                }
            }
            kinds::TAB_UPDATED => {
                let text = |key: &str| envelope.get(key).and_then(|v| v.as_str()).map(String::from);
                let tab = TabSnapshot {
                    url: text("url"),
                    title: text("title"),
                    tab_id: envelope.get("tabId").and_then(|v| v.as_i64()),
                    seen_at: Utc::now(),
                };
                info!(
                    url = tab.url.as_deref().unwrap_or("unknown"),
                    tab_id = ?tab.tab_id,
                    "Tab updated"
                );
                self.state.record_tab(tab);
            }
            kinds::ERROR => {
                let message = envelope
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Unknown error");
                error!(connection = %connection.id(), message = %message, "Browser agent reported an error");
                self.state.record_error(message);
            }
            kinds::TEST => {
                if let Err(e) = connection.send(Envelope::test_response()) {
                    warn!(connection = %connection.id(), error = %e, "Failed to answer test message");
                }
            }
            other => info!(kind = %other, "Unhandled agent message"),
        }
    }
}
