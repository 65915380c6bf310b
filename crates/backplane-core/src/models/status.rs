//! Backend liveness models

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of characters kept in a status detail
pub const DETAIL_MAX_CHARS: usize = 50;

/// Detail reported for a healthy backend
const HEALTHY_DETAIL: &str = "ok";

/// The four kinds of data store this crate knows how to probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Key-value store (Redis)
    KeyValue,
    /// Relational database (PostgreSQL)
    Relational,
    /// Full-text search engine (Elasticsearch)
    Search,
    /// Vector store (Qdrant)
    Vector,
}

impl BackendKind {
    /// All kinds, in display order
    pub const ALL: [BackendKind; 4] = [
        BackendKind::KeyValue,
        BackendKind::Relational,
        BackendKind::Search,
        BackendKind::Vector,
    ];

    /// Verbs accepted by this kind's command grammar
    pub fn allowed_verbs(&self) -> &'static [&'static str] {
        match self {
            BackendKind::KeyValue => &["KEYS", "GET", "HGETALL", "SMEMBERS", "LRANGE"],
            BackendKind::Relational => &["SELECT"],
            BackendKind::Search => &["SEARCH"],
            BackendKind::Vector => &["FILTER"],
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendKind::KeyValue => "key_value",
            BackendKind::Relational => "relational",
            BackendKind::Search => "search",
            BackendKind::Vector => "vector",
        };
        f.write_str(s)
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key_value" => Ok(BackendKind::KeyValue),
            "relational" => Ok(BackendKind::Relational),
            "search" => Ok(BackendKind::Search),
            "vector" => Ok(BackendKind::Vector),
            _ => Err(format!("Unknown backend kind: '{}'", s)),
        }
    }
}

/// Result of one health check against one backend.
///
/// Built only through [`BackendStatus::healthy`] and [`BackendStatus::unhealthy`],
/// so an unhealthy status always carries a non-empty detail. The detail is
/// truncated to [`DETAIL_MAX_CHARS`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendStatus {
    name: String,
    kind: BackendKind,
    healthy: bool,
    detail: String,
    checked_at: DateTime<Utc>,
}

impl BackendStatus {
    /// A passing health check, timestamped now
    pub fn healthy(name: impl Into<String>, kind: BackendKind) -> Self {
        Self {
            name: name.into(),
            kind,
            healthy: true,
            detail: HEALTHY_DETAIL.to_string(),
            checked_at: Utc::now(),
        }
    }

    /// A failing health check, timestamped now
    pub fn unhealthy(name: impl Into<String>, kind: BackendKind, detail: impl AsRef<str>) -> Self {
        let mut detail = truncate_detail(detail.as_ref().trim());
        if detail.is_empty() {
            detail = "unknown error".to_string();
        }
        Self {
            name: name.into(),
            kind,
            healthy: false,
            detail,
            checked_at: Utc::now(),
        }
    }

    /// Override the check timestamp
    pub fn with_checked_at(mut self, checked_at: DateTime<Utc>) -> Self {
        self.checked_at = checked_at;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn checked_at(&self) -> DateTime<Utc> {
        self.checked_at
    }
}

/// Truncate a diagnostic string to [`DETAIL_MAX_CHARS`] characters
pub fn truncate_detail(detail: &str) -> String {
    detail.chars().take(DETAIL_MAX_CHARS).collect()
}

/// Aggregated health state of every registered backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Timestamp of the oldest constituent check
    taken_at: DateTime<Utc>,
    /// Status per backend name
    backends: BTreeMap<String, BackendStatus>,
}

impl StatusSnapshot {
    /// Assemble a snapshot from one refresh cycle's results
    pub fn from_statuses(statuses: impl IntoIterator<Item = BackendStatus>) -> Self {
        let backends: BTreeMap<String, BackendStatus> = statuses
            .into_iter()
            .map(|status| (status.name.clone(), status))
            .collect();

        let taken_at = backends
            .values()
            .map(|s| s.checked_at)
            .min()
            .unwrap_or_else(Utc::now);

        Self { taken_at, backends }
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Status of one backend
    pub fn get(&self, name: &str) -> Option<&BackendStatus> {
        self.backends.get(name)
    }

    /// Iterate statuses in name order
    pub fn iter(&self) -> impl Iterator<Item = &BackendStatus> {
        self.backends.values()
    }

    /// Registered backend names in this snapshot
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Number of healthy backends
    pub fn connected_count(&self) -> usize {
        self.backends.values().filter(|s| s.healthy).count()
    }

    /// Whether every backend is healthy (false for an empty snapshot)
    pub fn all_healthy(&self) -> bool {
        !self.backends.is_empty() && self.backends.values().all(|s| s.healthy)
    }
}
