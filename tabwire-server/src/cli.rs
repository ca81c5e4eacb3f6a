//! Command line arguments

use std::path::PathBuf;

use clap::Parser;

use crate::config::AppConfig;

/// MCP bridge between a JSON-RPC client and a browser extension
#[derive(Parser, Debug)]
#[command(name = "tabwire")]
#[command(about = "MCP stdio bridge to a browser extension over WebSocket")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/tabwire/config.toml)
    #[arg(long, env = "TABWIRE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address the extension WebSocket listener binds to
    #[arg(long, env = "TABWIRE_LISTEN")]
    pub listen: Option<String>,

    /// How long a tool call waits for the extension, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Log to stderr instead of the log file
    #[arg(long)]
    pub log_stderr: bool,

    /// Print the default configuration and exit
    #[arg(long)]
    pub print_default_config: bool,
}

impl Cli {
    /// Layer command line overrides on top of the file configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(listen) = &self.listen {
            config.agent.listen_addr = listen.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.agent.request_timeout_ms = timeout_ms;
        }
    }
}
