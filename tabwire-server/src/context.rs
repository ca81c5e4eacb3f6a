//! Process-wide bridge context
//!
//! Built once in `main` and cloned into every task that needs the agent
//! channel or its state. Nothing in the bridge reaches for globals.

use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::{AgentChannel, AgentState, CorrelationTable, Dispatcher};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct BridgeContext {
    pub config: Arc<AppConfig>,
    pub table: Arc<CorrelationTable>,
    pub agent: Arc<AgentChannel>,
    pub state: Arc<AgentState>,
    pub dispatcher: Arc<Dispatcher>,
    /// Where diagnostics are being written, if logging to a file
    pub log_path: Option<PathBuf>,
}

impl BridgeContext {
    pub fn new(config: AppConfig) -> Self {
        let table = Arc::new(CorrelationTable::new());
        let state = Arc::new(AgentState::new());
        let agent = Arc::new(AgentChannel::new(
            Arc::clone(&table),
            config.agent.fail_pending_on_disconnect,
        ));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&table), Arc::clone(&state)));

        Self {
            config: Arc::new(config),
            table,
            agent,
            state,
            dispatcher,
            log_path: None,
        }
    }

    pub fn with_log_path(mut self, path: Option<PathBuf>) -> Self {
        self.log_path = path;
        self
    }
}
