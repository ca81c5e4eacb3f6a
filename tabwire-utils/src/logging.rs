//! Logging infrastructure for tabwire
//!
//! Provides unified logging setup using the tracing ecosystem. The bridge
//! speaks JSON-RPC on stdout, so diagnostics never go there.

use std::path::PathBuf;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::{paths, Result, TabwireError};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "TABWIRE_LOG";

/// Default log file name
pub const DEFAULT_LOG_FILE: &str = "tabwire.log";

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stderr (development)
    Stderr,
    /// Log to file (default for the bridge)
    File,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output destination
    pub output: LogOutput,
    /// Log level filter (e.g., "info", "tabwire_server=debug,tokio=warn")
    pub filter: String,
    /// Include span events (enter/exit)
    pub span_events: bool,
    /// Include file/line in logs
    pub file_line: bool,
    /// Optional custom log file name (defaults to "tabwire.log")
    pub file_name: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "info".into(),
            span_events: false,
            file_line: false,
            file_name: None,
        }
    }
}

impl LogConfig {
    /// Config for the bridge binary (file logging, stdout stays clean)
    pub fn bridge() -> Self {
        Self {
            output: LogOutput::File,
            filter: std::env::var(LOG_ENV).unwrap_or_else(|_| "info".into()),
            span_events: false,
            file_line: true,
            file_name: None,
        }
    }

    /// Config for development (verbose stderr)
    pub fn development() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: std::env::var(LOG_ENV).unwrap_or_else(|_| "debug".into()),
            span_events: true,
            file_line: true,
            file_name: None,
        }
    }

    /// Where file output lands, if this config logs to a file
    pub fn log_path(&self) -> Option<PathBuf> {
        match self.output {
            LogOutput::File => Some(paths::log_file(
                self.file_name.as_deref().unwrap_or(DEFAULT_LOG_FILE),
            )),
            LogOutput::Stderr => None,
        }
    }
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| TabwireError::config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    let fmt_layer = if config.span_events {
        fmt_layer.with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    } else {
        fmt_layer
    };

    let fmt_layer = if config.file_line {
        fmt_layer.with_file(true).with_line_number(true)
    } else {
        fmt_layer.with_file(false).with_line_number(false)
    };

    match config.log_path() {
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| TabwireError::internal(format!("Failed to init logging: {}", e)))?;
        }
        Some(log_path) => {
            let log_dir = paths::log_dir();
            std::fs::create_dir_all(&log_dir).map_err(|e| TabwireError::FileWrite {
                path: log_dir.clone(),
                source: e,
            })?;

            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .map_err(|e| TabwireError::FileWrite {
                    path: log_path,
                    source: e,
                })?;

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(file).with_ansi(false))
                .try_init()
                .map_err(|e| TabwireError::internal(format!("Failed to init logging: {}", e)))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.output, LogOutput::Stderr);
        assert_eq!(config.filter, "info");
        assert!(!config.span_events);
        assert!(!config.file_line);
    }

    #[test]
    fn test_bridge_config_logs_to_file() {
        let config = LogConfig::bridge();
        assert_eq!(config.output, LogOutput::File);
        assert!(config.file_line);

        let path = config.log_path().unwrap();
        assert!(path.starts_with(paths::log_dir()));
        assert!(path.ends_with(DEFAULT_LOG_FILE));
    }

    #[test]
    fn test_custom_file_name() {
        let config = LogConfig {
            file_name: Some("bridge-test.log".into()),
            ..LogConfig::bridge()
        };
        assert!(config.log_path().unwrap().ends_with("bridge-test.log"));
    }

    #[test]
    fn test_stderr_has_no_log_path() {
        assert!(LogConfig::default().log_path().is_none());
        assert!(LogConfig::development().log_path().is_none());
    }

    #[test]
    fn test_development_is_verbose() {
        let dev = LogConfig::development();
        assert!(dev.span_events);
        assert!(dev.file_line);
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LogConfig {
            filter: "tabwire=notalevel[".into(),
            ..LogConfig::default()
        };
        let result = init_logging_with_config(config);
        assert!(matches!(result, Err(TabwireError::Config(_))));
    }
}
