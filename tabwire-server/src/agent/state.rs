//! Observable side-channel state
//!
//! Updated from unsolicited agent notifications and read by the
//! `test_connection` tool. Nothing here participates in request correlation.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::channel::ConnectionId;

/// Last tab the agent reported via `tab_updated`
#[derive(Debug, Clone, PartialEq)]
pub struct TabSnapshot {
    pub url: Option<String>,
    pub title: Option<String>,
    pub tab_id: Option<i64>,
    pub seen_at: DateTime<Utc>,
}

/// Last error the agent reported via an `error` notification
#[derive(Debug, Clone, PartialEq)]
pub struct AgentErrorRecord {
    pub message: String,
    pub seen_at: DateTime<Utc>,
}

/// Point-in-time copy of [`AgentState`]
#[derive(Debug, Clone, Default)]
pub struct AgentStatus {
    pub listening_on: Option<SocketAddr>,
    pub confirmed: Option<ConnectionId>,
    pub last_tab: Option<TabSnapshot>,
    pub last_error: Option<AgentErrorRecord>,
}

#[derive(Debug, Default)]
pub struct AgentState {
    inner: Mutex<AgentStatus>,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_listening(&self, addr: SocketAddr) {
        self.inner.lock().listening_on = Some(addr);
    }

    pub fn confirm(&self, connection: ConnectionId) {
        self.inner.lock().confirmed = Some(connection);
    }

    pub fn record_tab(&self, tab: TabSnapshot) {
        self.inner.lock().last_tab = Some(tab);
    }

    pub fn record_error(&self, message: impl Into<String>) {
        self.inner.lock().last_error = Some(AgentErrorRecord {
            message: message.into(),
            seen_at: Utc::now(),
        });
    }

    /// Whether `connection` has completed the extension handshake
    pub fn is_confirmed(&self, connection: ConnectionId) -> bool {
        self.inner.lock().confirmed == Some(connection)
    }

    pub fn snapshot(&self) -> AgentStatus {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_updates() {
        let state = AgentState::new();
        assert!(state.snapshot().last_tab.is_none());

        let addr: SocketAddr = "127.0.0.1:8765".parse().unwrap();
        state.set_listening(addr);
        state.record_tab(TabSnapshot {
            url: Some("https://example.com".into()),
            title: Some("Example".into()),
            tab_id: Some(4),
            seen_at: Utc::now(),
        });
        state.record_error("content script missing");

        let status = state.snapshot();
        assert_eq!(status.listening_on, Some(addr));
        assert_eq!(status.last_tab.unwrap().tab_id, Some(4));
        assert_eq!(status.last_error.unwrap().message, "content script missing");
    }

    #[test]
    fn test_confirmation_is_per_connection() {
        let state = AgentState::new();
        let first = ConnectionId::new();
        let second = ConnectionId::new();

        state.confirm(first);
        assert!(state.is_confirmed(first));

        state.confirm(second);
        assert!(!state.is_confirmed(first));
        assert!(state.is_confirmed(second));
    }
}
