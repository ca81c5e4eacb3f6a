//! Envelope `type` values used on the agent channel

// ==================== Handshake ====================

/// Sent by the bridge right after accepting a connection
pub const SERVER_READY: &str = "server_ready";
/// Sent by the agent once its socket is open
pub const EXTENSION_CONNECTED: &str = "chrome_extension_connected";
/// Bridge acknowledgement of [`EXTENSION_CONNECTED`]
pub const CONNECTION_CONFIRMED: &str = "connection_confirmed";

// ==================== Notifications ====================

/// Agent notification: a tab finished loading
pub const TAB_UPDATED: &str = "tab_updated";
/// Agent notification: something failed inside the agent
pub const ERROR: &str = "error";
/// Agent echo check
pub const TEST: &str = "test";
/// Bridge answer to [`TEST`]
pub const TEST_RESPONSE: &str = "test_response";

// ==================== Requests ====================

pub const GET_PAGE_INFO: &str = "get_page_info";
pub const GET_ELEMENT_STYLES: &str = "get_element_styles";
pub const GET_ALL_STYLES: &str = "get_all_styles";
pub const INJECT_CSS: &str = "inject_css";
pub const GET_SCREENSHOT: &str = "get_screenshot";
