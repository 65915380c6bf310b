//! backplane-gateway - Status aggregation and command gating
//!
//! ```text
//!   caller ──► StatusAggregator ──► StatusCache (30 s)
//!                    │ miss/expired
//!                    ▼
//!        ┌───────────┼───────────┬───────────┐
//!        ▼           ▼           ▼           ▼
//!     redis     postgresql  elasticsearch  qdrant     (one task per probe)
//!
//!   caller ──► CommandGate ──► BackendRegistry ──► grammar ──► health ──► QueryExecutor
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut registry = BackendRegistry::new();
//! registry.register_backend(Arc::new(RedisBackend::new(&config.redis, timeout)?));
//!
//! let aggregator = Arc::new(StatusAggregator::new(Arc::new(registry), AggregatorConfig::default()));
//! let gate = CommandGate::new(aggregator.clone(), DEFAULT_COMMAND_TIMEOUT);
//!
//! let connected = aggregator.get_connected_count().await;
//! let members = gate.execute("redis", "SMEMBERS categories:all").await?;
//! ```

mod aggregator;
mod cache;
mod gate;
mod registry;

pub use aggregator::{AggregatorConfig, StatusAggregator, DEFAULT_STATUS_TTL, DEFAULT_SUMMARY_TTL};
pub use cache::StatusCache;
pub use gate::{CommandGate, DEFAULT_COMMAND_TIMEOUT};
pub use registry::{BackendRegistry, RegisteredBackend};

// Re-export core types for convenience
pub use backplane_core::{BackendError, BackendResult, BackendStatus, CommandOutput, StatusSnapshot};
