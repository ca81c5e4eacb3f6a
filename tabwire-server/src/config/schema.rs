//! Configuration schema structs

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub agent: AgentConfig,
    pub screenshots: ScreenshotConfig,
}

/// Identity reported to the control-channel client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `serverInfo.name` in the initialize result
    pub name: String,
    /// `serverInfo.version` in the initialize result
    pub version: String,
    /// MCP protocol revision announced on initialize
    pub protocol_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "chrome-html-viewer".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            protocol_version: "2024-11-05".into(),
        }
    }
}

/// Browser agent listener and request policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Address the WebSocket listener binds to
    pub listen_addr: String,
    /// How long a tool call waits for the agent's reply
    pub request_timeout_ms: u64,
    /// Interval between WebSocket pings
    pub ping_interval_secs: u64,
    /// Extra silence tolerated after a ping before the connection is dropped
    pub ping_timeout_secs: u64,
    /// Bind attempts before the listener gives up
    pub bind_attempts: u32,
    /// Delay between bind attempts
    pub bind_retry_delay_ms: u64,
    /// Fail pending requests immediately when their connection goes away
    pub fail_pending_on_disconnect: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8765".into(),
            request_timeout_ms: 10_000,
            ping_interval_secs: 20,
            ping_timeout_secs: 10,
            bind_attempts: 3,
            bind_retry_delay_ms: 2_000,
            fail_pending_on_disconnect: false,
        }
    }
}

impl AgentConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Longest silence accepted from a live connection
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.saturating_add(self.ping_timeout_secs))
    }

    pub fn bind_retry_delay(&self) -> Duration {
        Duration::from_millis(self.bind_retry_delay_ms)
    }
}

/// Where captured screenshots are written
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    /// Output directory; falls back to the XDG data dir
    pub dir: Option<PathBuf>,
}

impl ScreenshotConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(tabwire_utils::screenshots_dir)
    }
}
