//! Common error types for backend probes and command execution

use thiserror::Error;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur while probing or querying a backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend did not answer within the allotted time
    #[error("Connection timed out: {0}")]
    ConnectionTimeout(String),

    /// The backend actively refused the connection (or could not be reached)
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// No backend is registered under this name
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// The backend is registered but currently reported unhealthy
    #[error("Backend unavailable: {name} ({detail})")]
    BackendUnavailable {
        /// Backend name
        name: String,
        /// Last health check detail
        detail: String,
    },

    /// The command is outside the backend's allow-list or malformed
    #[error("Command rejected at '{token}': {reason}")]
    CommandRejected {
        /// The offending token (verb or argument)
        token: String,
        /// Why it was rejected
        reason: String,
    },

    /// The backend failed while executing a valid command
    #[error("Backend execution error: {0}")]
    BackendExecution(String),
}

impl BackendError {
    /// Build a `CommandRejected` error for a token
    pub fn rejected(token: impl Into<String>, reason: impl Into<String>) -> Self {
        BackendError::CommandRejected {
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            BackendError::ConnectionTimeout(_) => 504,
            BackendError::ConnectionRefused(_) => 503,
            BackendError::UnknownBackend(_) => 404,
            BackendError::BackendUnavailable { .. } => 503,
            BackendError::CommandRejected { .. } => 400,
            BackendError::BackendExecution(_) => 502,
        }
    }

    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::ConnectionTimeout(_) => "connection_timeout",
            BackendError::ConnectionRefused(_) => "connection_refused",
            BackendError::UnknownBackend(_) => "unknown_backend",
            BackendError::BackendUnavailable { .. } => "backend_unavailable",
            BackendError::CommandRejected { .. } => "command_rejected",
            BackendError::BackendExecution(_) => "backend_execution_error",
        }
    }
}
