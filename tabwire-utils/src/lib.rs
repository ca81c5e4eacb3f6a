//! tabwire-utils: shared error type, logging setup and path helpers

pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Result, TabwireError};
pub use logging::{init_logging_with_config, LogConfig, LogOutput};
pub use paths::{config_dir, config_file, data_dir, log_dir, log_file, screenshots_dir, state_dir};
