//! Tool handlers for the MCP bridge
//!
//! Each handler sends its request over the agent channel and turns the reply
//! (or the reason there is none) into text for the caller.

use chrono::Local;
use serde_json::Value;
use tracing::{debug, warn};

use tabwire_protocol::{kinds, Envelope};

use crate::agent::RequestError;
use crate::context::BridgeContext;
use crate::mcp::error::McpError;
use crate::mcp::protocol::ToolResult;
use crate::mcp::tools::BrowserTool;
use crate::screenshot;

const CONNECT_HINT: &str =
    "Please ensure the browser extension is connected and you have an active tab.";

/// Tool handler context
pub struct ToolHandlers<'a> {
    ctx: &'a BridgeContext,
}

impl<'a> ToolHandlers<'a> {
    pub fn new(ctx: &'a BridgeContext) -> Self {
        Self { ctx }
    }

    /// Run the tool called `name`
    ///
    /// Agent-side failures come back as error *results*; only an unknown
    /// tool name is an `Err`.
    pub async fn dispatch(&self, name: &str, arguments: &Value) -> Result<ToolResult, McpError> {
        let tool =
            BrowserTool::from_name(name).ok_or_else(|| McpError::UnknownTool(name.to_string()))?;

        let request = match tool.build_request(arguments) {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(self.tool_test_connection()),
            Err(missing) => {
                debug!(tool = %name, error = %missing, "Tool call rejected before send");
                return Ok(ToolResult::error(format!("Error: {}", missing)));
            }
        };

        let result = match tool {
            BrowserTool::GetPageInfo => self.tool_get_page_info(request).await,
            BrowserTool::GetElementStyles => self.tool_get_element_styles(request).await,
            BrowserTool::GetAllStyles => self.tool_get_all_styles(request).await,
            BrowserTool::InjectCss => self.tool_inject_css(request).await,
            BrowserTool::TakeScreenshot => self.tool_take_screenshot(request).await,
            BrowserTool::TestConnection => self.tool_test_connection(),
        };
        Ok(result)
    }

    async fn request(&self, envelope: Envelope) -> Result<Envelope, RequestError> {
        self.ctx
            .agent
            .request(envelope, self.ctx.config.agent.request_timeout())
            .await
    }

    /// Local status report; never touches the agent channel
    pub fn tool_test_connection(&self) -> ToolResult {
        let status = self.ctx.state.snapshot();
        let active = self.ctx.agent.active();

        let listener = match status.listening_on {
            Some(addr) => format!("Listening on ws://{}", addr),
            None => format!("Not listening (configured {})", self.ctx.config.agent.listen_addr),
        };

        let extension = match &active {
            Some(conn) => {
                let handshake = if self.ctx.state.is_confirmed(conn.id()) {
                    "handshake confirmed"
                } else {
                    "awaiting handshake"
                };
                format!(
                    "Connected from {} since {} ({})",
                    conn.remote(),
                    conn.connected_at().format("%Y-%m-%d %H:%M:%S UTC"),
                    handshake
                )
            }
            None => "Not connected".to_string(),
        };

        let summary = if active.is_some() {
            "All systems connected and ready!"
        } else {
            "Browser extension not connected. Please check the extension is installed and its popup shows 'Connected'."
        };

        let last_tab = match &status.last_tab {
            Some(tab) => format!(
                "{} <{}> (tab {}, seen {})",
                tab.title.as_deref().unwrap_or("untitled"),
                tab.url.as_deref().unwrap_or("unknown"),
                tab.tab_id.map_or_else(|| "?".to_string(), |id| id.to_string()),
                tab.seen_at.format("%H:%M:%S UTC")
            ),
            None => "none seen".to_string(),
        };

        let log_file = self
            .ctx
            .log_path
            .as_ref()
            .map_or_else(|| "stderr".to_string(), |p| p.display().to_string());

        let mut text = format!(
            "Connection Status:\n\
             - MCP Server: Running\n\
             - WebSocket Server: {}\n\
             - Browser Extension: {}\n\
             \n\
             {}\n\
             \n\
             Last tab: {}\n",
            listener, extension, summary, last_tab
        );
        if let Some(err) = &status.last_error {
            text.push_str(&format!(
                "Last agent error: {} ({})\n",
                err.message,
                err.seen_at.format("%H:%M:%S UTC")
            ));
        }
        text.push_str(&format!(
            "\nDebug info:\n\
             - Pending requests: {}\n\
             - Log file: {}\n\
             - Process ID: {}",
            self.ctx.table.len(),
            log_file,
            std::process::id()
        ));

        ToolResult::text(text)
    }

    async fn tool_get_page_info(&self, request: Envelope) -> ToolResult {
        let reply = match agent_reply("get page info", self.request(request).await) {
            Ok(reply) => reply,
            Err(result) => return result,
        };
        match reply.data() {
            Some(data) if data.is_object() => ToolResult::text(format_page_info(data)),
            _ => ToolResult::error(format!("Failed to get page info: reply carried no page data. {}", CONNECT_HINT)),
        }
    }

    async fn tool_get_element_styles(&self, request: Envelope) -> ToolResult {
        let selector = request
            .get("selector")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let reply = match agent_reply("get element styles", self.request(request).await) {
            Ok(reply) => reply,
            Err(result) => return result,
        };
        match reply.data() {
            Some(Value::Array(elements)) => ToolResult::text(format_element_styles(&selector, elements)),
            _ => ToolResult::error("Failed to get element styles: reply carried no element list"),
        }
    }

    async fn tool_get_all_styles(&self, request: Envelope) -> ToolResult {
        let reply = match agent_reply("get styles", self.request(request).await) {
            Ok(reply) => reply,
            Err(result) => return result,
        };
        match reply.data() {
            Some(data) => ToolResult::text(format_all_styles(data)),
            None => ToolResult::error("Failed to get styles: reply carried no style data"),
        }
    }

    async fn tool_inject_css(&self, request: Envelope) -> ToolResult {
        let reply = match agent_reply("inject CSS", self.request(request).await) {
            Ok(reply) => reply,
            Err(result) => return result,
        };
        if reply.get("success").and_then(Value::as_bool) == Some(false) {
            return ToolResult::error("Failed to inject CSS: the extension reported failure");
        }
        ToolResult::text("CSS injected successfully")
    }

    async fn tool_take_screenshot(&self, request: Envelope) -> ToolResult {
        let reply = match agent_reply("take screenshot", self.request(request).await) {
            Ok(reply) => reply,
            Err(result) => return result,
        };
        let Some(data_url) = reply.data().and_then(Value::as_str) else {
            return ToolResult::error("Failed to take screenshot: reply carried no image data");
        };

        let dir = self.ctx.config.screenshots.resolved_dir();
        match screenshot::save_data_url(&dir, data_url, Local::now()).await {
            Ok(path) => ToolResult::text(format!("Screenshot saved as {}", path.display())),
            Err(e) => {
                warn!(error = %e, "Screenshot could not be saved");
                ToolResult::error(format!("Error saving screenshot: {}", e))
            }
        }
    }
}

/// Turn an agent round trip into its reply, or into the error result to return
fn agent_reply(
    action: &str,
    reply: Result<Envelope, RequestError>,
) -> Result<Envelope, ToolResult> {
    match reply {
        Ok(reply) if reply.kind() == kinds::ERROR => {
            let message = reply
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            Err(ToolResult::error(format!(
                "Failed to {}: the extension reported: {}",
                action, message
            )))
        }
        Ok(reply) => Ok(reply),
        Err(e) => {
            warn!(action, error = %e, "Agent request failed");
            Err(ToolResult::error(format!("Failed to {}: {}. {}", action, e, CONNECT_HINT)))
        }
    }
}

fn len_of(data: &Value, key: &str) -> usize {
    match data.get(key) {
        Some(Value::String(s)) => s.len(),
        Some(Value::Array(a)) => a.len(),
        _ => 0,
    }
}

fn display_or(value: Option<&Value>, fallback: &str) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => fallback.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Format a `page_info` payload
pub fn format_page_info(data: &Value) -> String {
    let viewport = data.get("viewport");
    format!(
        "Page Information:\n\
         URL: {}\n\
         Title: {}\n\
         Viewport: {}x{}\n\
         \n\
         HTML Length: {} characters\n\
         Stylesheets: {}\n\
         Inline Styles: {}\n\
         \n\
         Full data received successfully.",
        display_or(data.get("url"), "N/A"),
        display_or(data.get("title"), "N/A"),
        display_or(viewport.and_then(|v| v.get("width")), "?"),
        display_or(viewport.and_then(|v| v.get("height")), "?"),
        len_of(data, "html"),
        len_of(data, "stylesheets"),
        len_of(data, "inlineStyles"),
    )
}

/// Format the element list of an `element_styles` payload
pub fn format_element_styles(selector: &str, elements: &[Value]) -> String {
    if elements.is_empty() {
        return format!("No elements found matching selector: {}", selector);
    }
    format!(
        "Found {} element(s) matching '{}':\n\n{}",
        elements.len(),
        selector,
        pretty(&Value::Array(elements.to_vec()))
    )
}

/// Format an `all_styles` payload
pub fn format_all_styles(data: &Value) -> String {
    match data.as_array() {
        Some(rules) => format!("Found {} CSS rule(s):\n\n{}", rules.len(), pretty(data)),
        None => pretty(data),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
