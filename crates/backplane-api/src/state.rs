//! Application state for the backplane API

use std::sync::Arc;

use backplane_gateway::{BackendRegistry, CommandGate, StatusAggregator};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    aggregator: Arc<StatusAggregator>,
    gate: Arc<CommandGate>,
    /// Whether an assistant API key was supplied; the key itself is never held here
    assistant_configured: bool,
}

impl AppState {
    pub fn new(
        aggregator: Arc<StatusAggregator>,
        gate: Arc<CommandGate>,
        assistant_configured: bool,
    ) -> Self {
        Self {
            aggregator,
            gate,
            assistant_configured,
        }
    }

    pub fn aggregator(&self) -> &StatusAggregator {
        &self.aggregator
    }

    pub fn gate(&self) -> &CommandGate {
        &self.gate
    }

    pub fn registry(&self) -> &BackendRegistry {
        self.aggregator.registry()
    }

    pub fn assistant_configured(&self) -> bool {
        self.assistant_configured
    }
}
