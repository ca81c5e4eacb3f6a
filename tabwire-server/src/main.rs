//! tabwire - MCP bridge to a browser extension
//!
//! Speaks MCP JSON-RPC on stdin/stdout and relays tool calls to the one
//! browser extension connected over WebSocket.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use tabwire_utils::{init_logging_with_config, LogConfig, Result, TabwireError};

mod agent;
mod cli;
mod config;
mod context;
mod mcp;
mod screenshot;

use cli::Cli;
use config::{ConfigLoader, DEFAULT_CONFIG_TOML};
use context::BridgeContext;
use mcp::McpBridge;

// One thread serves stdio, the agent socket and every timeout
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_default_config {
        print!("{}", DEFAULT_CONFIG_TOML);
        return Ok(());
    }

    // stdout carries JSON-RPC, so logs go to a file unless asked otherwise
    let log_config = if cli.log_stderr {
        LogConfig::development()
    } else {
        LogConfig::bridge()
    };
    let log_path = log_config.log_path();
    init_logging_with_config(log_config)?;

    let mut config = ConfigLoader::load_from(cli.config.as_deref())?;
    cli.apply(&mut config);
    ConfigLoader::validate(&config)?;

    info!(
        listen = %config.agent.listen_addr,
        timeout_ms = config.agent.request_timeout_ms,
        fail_pending_on_disconnect = config.agent.fail_pending_on_disconnect,
        "tabwire starting"
    );

    let ctx = BridgeContext::new(config).with_log_path(log_path);
    let shutdown = CancellationToken::new();
    tokio::spawn(agent::serve_agent(ctx.clone(), shutdown.clone()));

    let mut bridge = McpBridge::new(ctx);
    let result = bridge.run().await;

    shutdown.cancel();
    info!("tabwire stopped");

    result.map_err(|e| TabwireError::internal(e.to_string()))
}
