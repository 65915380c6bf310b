//! Status aggregator - probes every registered backend and caches the result

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backplane_core::{
    BackendError, BackendResult, BackendStatus, Details, StatusSnapshot, Summary,
};
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::StatusCache;
use crate::registry::BackendRegistry;

const SNAPSHOT_KEY: &str = "snapshot";

/// Default freshness window for liveness snapshots
pub const DEFAULT_STATUS_TTL: Duration = Duration::from_secs(30);

/// Default freshness window for data summaries
pub const DEFAULT_SUMMARY_TTL: Duration = Duration::from_secs(60);

/// Aggregator settings
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub status_ttl: Duration,
    pub summary_ttl: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            status_ttl: DEFAULT_STATUS_TTL,
            summary_ttl: DEFAULT_SUMMARY_TTL,
        }
    }
}

/// Fans health checks out to every backend and answers from cache within
/// the freshness window.
///
/// Refreshes are serialized. A non-forced caller that waited on an in-flight
/// refresh gets that refresh's snapshot; a forced caller always runs a round
/// of its own once the lock is free.
pub struct StatusAggregator {
    registry: Arc<BackendRegistry>,
    config: AggregatorConfig,
    statuses: StatusCache<StatusSnapshot>,
    summaries: StatusCache<Summary>,
    details: StatusCache<Details>,
    refresh_lock: Mutex<()>,
    /// Completed probe rounds
    rounds: AtomicU64,
}

impl StatusAggregator {
    pub fn new(registry: Arc<BackendRegistry>, config: AggregatorConfig) -> Self {
        Self {
            registry,
            config,
            statuses: StatusCache::new(),
            summaries: StatusCache::new(),
            details: StatusCache::new(),
            refresh_lock: Mutex::new(()),
            rounds: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Number of probe rounds run so far
    pub fn probe_rounds(&self) -> u64 {
        self.rounds.load(Ordering::SeqCst)
    }

    /// Current snapshot; probes every backend when the cache is stale or
    /// `force_refresh` is set
    pub async fn get_snapshot(&self, force_refresh: bool) -> StatusSnapshot {
        if !force_refresh {
            if let Some(snapshot) = self.statuses.get(SNAPSHOT_KEY) {
                return snapshot;
            }
        }

        let _guard = self.refresh_lock.lock().await;

        // A round finished while we waited; only a forced caller needs its own
        if !force_refresh {
            if let Some(snapshot) = self.statuses.get(SNAPSHOT_KEY) {
                return snapshot;
            }
        }

        let snapshot = self.probe_all().await;
        self.statuses
            .set(SNAPSHOT_KEY, snapshot.clone(), self.config.status_ttl);
        self.rounds.fetch_add(1, Ordering::SeqCst);
        snapshot
    }

    async fn probe_all(&self) -> StatusSnapshot {
        debug!(backends = self.registry.len(), "Probing backends");

        let tasks: Vec<_> = self
            .registry
            .iter()
            .map(|(name, backend)| {
                let probe = backend.probe().clone();
                let handle = tokio::spawn(async move { probe.check_health().await });
                (name.to_string(), backend.kind(), handle)
            })
            .collect();

        let statuses = join_all(tasks.into_iter().map(|(name, kind, handle)| async move {
            match handle.await {
                Ok(status) if status.name() == name => status,
                Ok(status) => rename(status, name),
                Err(e) => {
                    let detail = if e.is_panic() {
                        "probe panicked"
                    } else {
                        "probe cancelled"
                    };
                    warn!(backend = %name, error = %e, "Probe task failed");
                    BackendStatus::unhealthy(name, kind, detail)
                }
            }
        }))
        .await;

        let snapshot = StatusSnapshot::from_statuses(statuses);
        info!(
            connected = snapshot.connected_count(),
            total = snapshot.len(),
            "Backend status refreshed"
        );
        snapshot
    }

    /// Healthy backends in the current snapshot
    pub async fn get_connected_count(&self) -> usize {
        self.get_snapshot(false).await.connected_count()
    }

    /// Status of one backend from the current snapshot
    pub async fn backend_status(&self, name: &str) -> Option<BackendStatus> {
        self.get_snapshot(false).await.get(name).cloned()
    }

    /// Whether every registered backend is healthy (false with none registered)
    pub async fn all_healthy(&self) -> bool {
        self.get_snapshot(false).await.all_healthy()
    }

    /// Summary of one backend, served from the summary cache when fresh.
    ///
    /// Error summaries are returned but not cached.
    pub async fn summarize(&self, name: &str) -> BackendResult<Summary> {
        let backend = self
            .registry
            .get(name)
            .ok_or_else(|| BackendError::UnknownBackend(name.to_string()))?;

        if let Some(summary) = self.summaries.get(name) {
            return Ok(summary);
        }

        let summary = backend.probe().summarize().await;
        if !summary.is_error() {
            self.summaries
                .set(name, summary.clone(), self.config.summary_ttl);
        }
        Ok(summary)
    }

    /// Detailed data of one backend, cached for the summary window.
    ///
    /// Error details are returned but not cached.
    pub async fn details(&self, name: &str) -> BackendResult<Details> {
        let backend = self
            .registry
            .get(name)
            .ok_or_else(|| BackendError::UnknownBackend(name.to_string()))?;

        if let Some(details) = self.details.get(name) {
            return Ok(details);
        }

        let details = backend.probe().details().await;
        if !details.is_error() {
            self.details
                .set(name, details.clone(), self.config.summary_ttl);
        }
        Ok(details)
    }

    /// Summaries of every backend, collected concurrently
    pub async fn summaries(&self) -> BTreeMap<String, Summary> {
        let names: Vec<&str> = self.registry.names().collect();
        let results = join_all(names.iter().map(|name| self.summarize(name))).await;

        names
            .into_iter()
            .zip(results)
            .filter_map(|(name, result)| result.ok().map(|summary| (name.to_string(), summary)))
            .collect()
    }

    /// Drop every cached snapshot, summary and detail read
    pub fn invalidate(&self) {
        info!("Invalidating status, summary and detail caches");
        self.statuses.invalidate_all();
        self.summaries.invalidate_all();
        self.details.invalidate_all();
    }

    /// Invalidate caches and probe again
    pub async fn refresh(&self) -> StatusSnapshot {
        self.invalidate();
        self.get_snapshot(true).await
    }
}

/// Re-key a status under the name it was registered with
fn rename(status: BackendStatus, name: String) -> BackendStatus {
    let renamed = if status.is_healthy() {
        BackendStatus::healthy(name, status.kind())
    } else {
        BackendStatus::unhealthy(name, status.kind(), status.detail())
    };
    renamed.with_checked_at(status.checked_at())
}
