//! Configuration loader

use std::net::SocketAddr;
use std::path::Path;

use tabwire_utils::{config_file, Result, TabwireError};

use super::AppConfig;

/// Upper bound for the keepalive settings, in seconds
const MAX_PING_SECS: u64 = 24 * 60 * 60;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default location
    pub fn load() -> Result<AppConfig> {
        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(AppConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| TabwireError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<AppConfig> {
        toml::from_str(content).map_err(|e| TabwireError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate configuration
    pub fn validate(config: &AppConfig) -> Result<()> {
        if config.server.name.trim().is_empty() {
            return Err(TabwireError::config("server.name must not be empty"));
        }

        if config.agent.request_timeout_ms == 0 {
            return Err(TabwireError::config(
                "agent.request_timeout_ms must be greater than 0",
            ));
        }

        if config.agent.bind_attempts == 0 {
            return Err(TabwireError::config("agent.bind_attempts must be at least 1"));
        }

        if config.agent.ping_interval_secs == 0 {
            return Err(TabwireError::config(
                "agent.ping_interval_secs must be greater than 0",
            ));
        }

        if config.agent.ping_interval_secs > MAX_PING_SECS
            || config.agent.ping_timeout_secs > MAX_PING_SECS
        {
            return Err(TabwireError::config(format!(
                "agent.ping_interval_secs and agent.ping_timeout_secs must not exceed {}",
                MAX_PING_SECS
            )));
        }

        config
            .agent
            .listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| {
                TabwireError::config(format!(
                    "agent.listen_addr '{}' is not a socket address: {}",
                    config.agent.listen_addr, e
                ))
            })?;

        Ok(())
    }

    /// Load from an explicit path when given, the default location otherwise
    ///
    /// Not validated yet: callers layer CLI overrides on top first.
    pub fn load_from(path: Option<&Path>) -> Result<AppConfig> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }
}
