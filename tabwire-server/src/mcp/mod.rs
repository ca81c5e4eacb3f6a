//! MCP (Model Context Protocol) control channel
//!
//! Serves JSON-RPC over stdio and turns tool calls into requests for the
//! browser extension.
//!
//! MCP Protocol: <https://modelcontextprotocol.io/>

pub mod bridge;
mod error;
mod protocol;
mod tools;

pub use bridge::McpBridge;
