//! Browser agent side of the bridge
//!
//! One WebSocket connection at a time, correlated request/reply traffic,
//! and the side-channel notifications the agent pushes on its own.

pub mod channel;
pub mod correlation;
pub mod dispatch;
pub mod listener;
pub mod state;

pub use channel::{AgentChannel, RequestError};
pub use correlation::CorrelationTable;
pub use dispatch::Dispatcher;
pub use listener::serve_agent;
pub use state::AgentState;
