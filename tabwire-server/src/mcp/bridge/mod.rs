//! MCP Bridge - Connects the MCP control channel to the browser agent
//!
//! Reads line-delimited JSON-RPC from stdin and writes one response line per
//! request to stdout. Tool calls are served one at a time, in arrival order;
//! a call waiting on the agent holds up the next line until it completes.

pub mod handlers;


use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::context::BridgeContext;
use crate::mcp::error::McpError;
use crate::mcp::protocol::{
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolResult, ToolsListResult,
};
use crate::mcp::tools::get_tool_definitions;

use self::handlers::ToolHandlers;

/// Control-channel session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
}

/// MCP Bridge
///
/// Owns the control-channel session and serves it over any line-oriented
/// reader/writer pair.
pub struct McpBridge {
    ctx: BridgeContext,
    session: SessionState,
    initialize_seen: bool,
    /// Per-process request number used only for log correlation
    log_seq: u64,
}

impl McpBridge {
    /// Create a new MCP bridge
    pub fn new(ctx: BridgeContext) -> Self {
        Self {
            ctx,
            session: SessionState::Uninitialized,
            initialize_seen: false,
            log_seq: 0,
        }
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    /// Run the MCP bridge, reading from stdin and writing to stdout
    pub async fn run(&mut self) -> Result<(), McpError> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve the control channel until end of input
    pub async fn serve<R, W>(&mut self, mut reader: R, mut writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = Vec::new();

        info!("MCP bridge starting");

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }

            // Undecodable bytes are a malformed line, not a broken stream
            let response = match std::str::from_utf8(&buf) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    self.handle_line(line).await
                }
                Err(e) => {
                    error!(error = %e, len = buf.len(), "JSON-RPC input is not valid UTF-8");
                    Some(JsonRpcResponse::parse_error())
                }
            };

            if let Some(response) = response {
                let json = serde_json::to_string(&response)?;
                debug!(raw = %json, "Sending raw JSON-RPC response");
                writer.write_all(json.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        info!("End of input, MCP bridge shutting down");
        Ok(())
    }

    /// Handle one input line, returning the response to write (if any)
    pub async fn handle_line(&mut self, line: &str) -> Option<JsonRpcResponse> {
        self.log_seq += 1;
        let log_req_id = self.log_seq;

        // Raw input may contain page content, keep it at debug
        debug!(req_id = log_req_id, raw = %line, "Received raw JSON-RPC request");

        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                error!(req_id = log_req_id, error = %e, "Failed to parse JSON-RPC request");
                return Some(JsonRpcResponse::parse_error());
            }
        };

        if !value.is_object() {
            error!(req_id = log_req_id, "JSON-RPC request is not an object");
            return Some(JsonRpcResponse::error(
                None,
                McpError::InvalidRequest("request must be a JSON object".into()).into(),
            ));
        }

        let request: JsonRpcRequest = match serde_json::from_value(value.clone()) {
            Ok(request) => request,
            Err(e) => {
                error!(req_id = log_req_id, error = %e, "JSON-RPC request has the wrong shape");
                let id = value.get("id").filter(|id| !id.is_null()).cloned();
                return Some(JsonRpcResponse::error(
                    id,
                    McpError::InvalidRequest(e.to_string()).into(),
                ));
            }
        };

        info!(
            req_id = log_req_id,
            method = %request.method,
            jsonrpc_id = ?request.id,
            "Incoming JSON-RPC request"
        );

        if request.jsonrpc != "2.0" {
            error!(
                req_id = log_req_id,
                method = %request.method,
                got_version = %request.jsonrpc,
                "Invalid JSON-RPC version"
            );
            if request.is_notification() {
                return None;
            }
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::with_data(
                    JsonRpcError::INVALID_REQUEST,
                    "Invalid JSON-RPC version",
                    serde_json::json!({"expected": "2.0", "got": request.jsonrpc}),
                ),
            ));
        }

        let start = std::time::Instant::now();
        let method = request.method.clone();
        let response = self.handle_request(request).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &response {
            Some(response) if response.is_error() => warn!(
                req_id = log_req_id,
                method = %method,
                elapsed_ms,
                error = ?response.error,
                "JSON-RPC request completed with error"
            ),
            Some(_) => info!(
                req_id = log_req_id,
                method = %method,
                elapsed_ms,
                "JSON-RPC request completed successfully"
            ),
            None => debug!(
                req_id = log_req_id,
                method = %method,
                "Notification handled (no response)"
            ),
        }

        response
    }

    /// Handle a JSON-RPC request
    async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            self.handle_notification(&request.method);
            return None;
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => self.handle_tools_list(),
            "resources/list" => Ok(serde_json::json!({ "resources": [] })),
            "prompts/list" => Ok(serde_json::json!({ "prompts": [] })),
            "tools/call" => self.handle_tools_call(&request.params).await,
            _ => Err(McpError::MethodNotFound(request.method.clone())),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => JsonRpcResponse::error(request.id, e.into()),
        })
    }

    fn handle_notification(&mut self, method: &str) {
        match method {
            "initialized" | "notifications/initialized" => {
                if self.session == SessionState::Initialized {
                    debug!(method, "Repeated initialized notification");
                    return;
                }
                if !self.initialize_seen {
                    warn!(method, "Client sent initialized before initialize");
                }
                self.session = SessionState::Initialized;
                info!("MCP initialization complete");
            }
            _ => warn!(method, "Unknown notification"),
        }
    }

    /// Handle initialize request
    fn handle_initialize(&mut self) -> Result<Value, McpError> {
        if self.initialize_seen {
            debug!(session = ?self.session, "Repeated initialize request");
        }
        self.initialize_seen = true;
        info!("MCP bridge received initialize");

        let result = InitializeResult::from_config(&self.ctx.config.server);
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }

    /// Handle tools/list request
    fn handle_tools_list(&self) -> Result<Value, McpError> {
        let tools = get_tool_definitions();
        let result = ToolsListResult { tools };
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }

    /// Handle tools/call request
    async fn handle_tools_call(&mut self, params: &Value) -> Result<Value, McpError> {
        let name = params["name"]
            .as_str()
            .ok_or_else(|| McpError::InvalidParams("Missing 'name' parameter".into()))?;

        let arguments = &params["arguments"];

        if self.session == SessionState::Uninitialized {
            debug!(tool = %name, "Tool call before initialization completed");
        }

        info!(tool = %name, "Dispatching tool call");
        debug!(tool = %name, arguments = %arguments, "Tool call arguments");

        let handlers = ToolHandlers::new(&self.ctx);
        let result = match guard_tool(handlers.dispatch(name, arguments)).await {
            Ok(result) => {
                info!(tool = %name, is_error = result.is_error.unwrap_or(false), "Tool call completed");
                result
            }
            Err(McpError::UnknownTool(unknown)) => {
                warn!(tool = %unknown, "Unknown tool requested");
                ToolResult::error(format!("Unknown tool: {}", unknown))
            }
            Err(e) => {
                error!(
                    tool = %name,
                    error = %e,
                    arguments = %arguments,
                    "Tool call failed"
                );
                return Err(e);
            }
        };

        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }
}

/// Run a tool future, turning a panic inside it into an internal error
async fn guard_tool<F>(future: F) -> Result<ToolResult, McpError>
where
    F: Future<Output = Result<ToolResult, McpError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "tool handler panicked".to_string());
            error!(panic = %message, "Tool handler panicked");
            Err(McpError::Internal(message))
        }
    }
}
