//! Configuration for the tabwire bridge
//!
//! Loaded once at startup from TOML; CLI flags are layered on top in `main`.

mod defaults;
mod loader;
mod schema;

pub use defaults::DEFAULT_CONFIG_TOML;
pub use loader::ConfigLoader;
pub use schema::*;
