//! Command gate - the only path from untrusted command text to a backend
//!
//! Gates run in order and fail closed:
//!
//! 1. the backend name must be registered
//! 2. the command must parse under the backend's grammar
//! 3. the backend must be healthy in the current snapshot
//! 4. execution must finish within the command timeout

use std::sync::Arc;
use std::time::Duration;

use backplane_core::{BackendError, BackendResult, CommandOutput, CommandSpec};
use tracing::{debug, info, warn};

use crate::aggregator::StatusAggregator;

/// Default bound on one command execution
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Validates and executes restricted commands
pub struct CommandGate {
    aggregator: Arc<StatusAggregator>,
    command_timeout: Duration,
}

impl CommandGate {
    pub fn new(aggregator: Arc<StatusAggregator>, command_timeout: Duration) -> Self {
        Self {
            aggregator,
            command_timeout,
        }
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Run `raw` against the backend registered as `name`
    pub async fn execute(&self, name: &str, raw: &str) -> BackendResult<CommandOutput> {
        let backend = self
            .aggregator
            .registry()
            .get(name)
            .ok_or_else(|| BackendError::UnknownBackend(name.to_string()))?;

        let spec = CommandSpec::parse(name, backend.kind(), raw).inspect_err(|e| {
            warn!(backend = %name, error = %e, "Command rejected");
        })?;

        match self.aggregator.backend_status(name).await {
            Some(status) if status.is_healthy() => {}
            Some(status) => {
                debug!(backend = %name, detail = %status.detail(), "Backend unhealthy, not executing");
                return Err(BackendError::BackendUnavailable {
                    name: name.to_string(),
                    detail: status.detail().to_string(),
                });
            }
            None => {
                return Err(BackendError::BackendUnavailable {
                    name: name.to_string(),
                    detail: "no status recorded".to_string(),
                });
            }
        }

        info!(backend = %name, verb = spec.verb(), "Executing command");
        let output =
            match tokio::time::timeout(self.command_timeout, backend.executor().execute(&spec))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    warn!(backend = %name, verb = spec.verb(), "Command timed out");
                    return Err(BackendError::ConnectionTimeout(format!(
                        "command did not complete within {}ms",
                        self.command_timeout.as_millis()
                    )));
                }
            };

        if spec.has_unordered_output() {
            Ok(output.sorted())
        } else {
            Ok(output)
        }
    }
}
