//! Default configuration values
//!
//! These are embedded in the binary and used when no config file exists.

/// Default configuration as TOML (for reference/documentation)
pub const DEFAULT_CONFIG_TOML: &str = r##"
# tabwire configuration

[server]
name = "chrome-html-viewer"
protocol_version = "2024-11-05"

[agent]
listen_addr = "127.0.0.1:8765"
request_timeout_ms = 10000
ping_interval_secs = 20
ping_timeout_secs = 10
bind_attempts = 3
bind_retry_delay_ms = 2000
# Fail outstanding tool calls as soon as the extension disconnects instead
# of letting them run into request_timeout_ms.
fail_pending_on_disconnect = false

[screenshots]
# dir = "/home/me/screenshots"
"##;
