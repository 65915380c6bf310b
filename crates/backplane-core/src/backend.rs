//! BackendProbe and QueryExecutor traits - the core abstractions for data stores

use std::time::Duration;

use async_trait::async_trait;

use crate::command::CommandSpec;
use crate::error::{BackendError, BackendResult};
use crate::models::{BackendKind, BackendStatus, CommandOutput, Details, Summary};

/// Default bound on a single health check or summary call
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Liveness and summary checks against one data store.
///
/// Implementors provide the raw round-trips ([`ping`](Self::ping) and
/// [`collect_summary`](Self::collect_summary)); the provided
/// [`check_health`](Self::check_health) and [`summarize`](Self::summarize)
/// bound them by [`probe_timeout`](Self::probe_timeout) and fold every failure
/// into a result value, so a probe never propagates an error to its caller.
///
/// Probes hold no cached state; every call opens and releases its own
/// connection.
#[async_trait]
pub trait BackendProbe: Send + Sync {
    /// Logical backend name (e.g. "redis")
    fn name(&self) -> &str;

    /// Which kind of store this is
    fn kind(&self) -> BackendKind;

    /// Upper bound for one probe call
    fn probe_timeout(&self) -> Duration {
        DEFAULT_PROBE_TIMEOUT
    }

    /// Name of the metric reported as `"?"` when summarizing fails
    fn primary_metric(&self) -> &'static str;

    /// One minimal round-trip proving the store is alive
    async fn ping(&self) -> BackendResult<()>;

    /// Compute informational metrics about the store's data
    async fn collect_summary(&self) -> BackendResult<Summary>;

    /// Read sample records from the store; kinds without a detailed view
    /// keep the default
    async fn collect_details(&self) -> BackendResult<Details> {
        Ok(Details::unsupported())
    }

    /// Bounded health check; failures become an unhealthy status
    async fn check_health(&self) -> BackendStatus {
        let timeout = self.probe_timeout();
        let outcome = match tokio::time::timeout(timeout, self.ping()).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::ConnectionTimeout(format!(
                "no answer within {}ms",
                timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(()) => BackendStatus::healthy(self.name(), self.kind()),
            Err(e) => {
                tracing::debug!(backend = %self.name(), error = %e, "Health check failed");
                BackendStatus::unhealthy(self.name(), self.kind(), e.to_string())
            }
        }
    }

    /// Bounded, best-effort summary; failures become an error summary
    async fn summarize(&self) -> Summary {
        match tokio::time::timeout(self.probe_timeout(), self.collect_summary()).await {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => {
                tracing::debug!(backend = %self.name(), error = %e, "Summary failed");
                Summary::error(self.primary_metric())
            }
            Err(_) => {
                tracing::debug!(backend = %self.name(), "Summary timed out");
                Summary::error(self.primary_metric())
            }
        }
    }

    /// Bounded, best-effort detailed read; failures become error details
    async fn details(&self) -> Details {
        match tokio::time::timeout(self.probe_timeout(), self.collect_details()).await {
            Ok(Ok(details)) => details,
            Ok(Err(e)) => {
                tracing::debug!(backend = %self.name(), error = %e, "Detailed read failed");
                Details::error()
            }
            Err(_) => {
                tracing::debug!(backend = %self.name(), "Detailed read timed out");
                Details::error()
            }
        }
    }
}

/// Executes validated commands against one data store
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Which grammar this executor understands
    fn kind(&self) -> BackendKind;

    /// Run a validated command and return the backend's answer verbatim
    async fn execute(&self, spec: &CommandSpec) -> BackendResult<CommandOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StuckProbe;

    #[async_trait]
    impl BackendProbe for StuckProbe {
        fn name(&self) -> &str {
            "stuck"
        }

        fn kind(&self) -> BackendKind {
            BackendKind::Search
        }

        fn primary_metric(&self) -> &'static str {
            "document_count"
        }

        async fn ping(&self) -> BackendResult<()> {
            std::future::pending().await
        }

        async fn collect_summary(&self) -> BackendResult<Summary> {
            std::future::pending().await
        }

        async fn collect_details(&self) -> BackendResult<Details> {
            std::future::pending().await
        }
    }

    struct RefusingProbe;

    #[async_trait]
    impl BackendProbe for RefusingProbe {
        fn name(&self) -> &str {
            "refusing"
        }

        fn kind(&self) -> BackendKind {
            BackendKind::KeyValue
        }

        fn primary_metric(&self) -> &'static str {
            "key_count"
        }

        async fn ping(&self) -> BackendResult<()> {
            Err(BackendError::ConnectionRefused(
                "Error 111 connecting to localhost:6379. Connection refused. (os error 111)"
                    .to_string(),
            ))
        }

        async fn collect_summary(&self) -> BackendResult<Summary> {
            Err(BackendError::ConnectionRefused("refused".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn check_health_times_out_as_unhealthy() {
        let status = StuckProbe.check_health().await;
        assert!(!status.is_healthy());
        assert!(status.detail().starts_with("Connection timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn summarize_times_out_as_error_summary() {
        let summary = StuckProbe.summarize().await;
        assert!(summary.is_error());
        assert_eq!(
            summary.metric("document_count"),
            Some(&serde_json::Value::from("?"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn details_time_out_as_error() {
        assert!(StuckProbe.details().await.is_error());
    }

    #[tokio::test]
    async fn details_default_to_unsupported() {
        let details = RefusingProbe.details().await;
        assert_eq!(details.status, crate::models::DetailsStatus::Unsupported);
    }

    #[tokio::test]
    async fn failure_detail_is_truncated() {
        let status = RefusingProbe.check_health().await;
        assert!(!status.is_healthy());
        assert_eq!(status.name(), "refusing");
        assert!(status.detail().chars().count() <= crate::models::DETAIL_MAX_CHARS);
    }
}
