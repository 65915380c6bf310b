//! Data summary models

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder used for a metric that could not be computed
pub const UNKNOWN_METRIC: &str = "?";

/// Field names a metric may not take, since metrics flatten beside them
const RESERVED_FIELDS: &[&str] = &["status"];

/// Key under which a metric is stored: reserved names get a `metric_` prefix
pub fn metric_key(name: &str) -> String {
    if RESERVED_FIELDS.contains(&name) {
        format!("metric_{}", name)
    } else {
        name.to_string()
    }
}

/// Completeness of a summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    /// Every metric was computed
    Complete,
    /// Computation stopped early (e.g. key scan limit reached)
    Partial,
    /// The backend could not be summarized
    Error,
}

/// Informational metrics about a backend's data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub status: SummaryStatus,
    #[serde(flatten)]
    pub metrics: BTreeMap<String, Value>,
}

impl Summary {
    /// Empty summary with the given status
    pub fn new(status: SummaryStatus) -> Self {
        Self {
            status,
            metrics: BTreeMap::new(),
        }
    }

    /// Summary for a backend that failed; `primary_metric` is reported as `"?"`
    pub fn error(primary_metric: &str) -> Self {
        Self::new(SummaryStatus::Error).with_metric(primary_metric, UNKNOWN_METRIC)
    }

    /// Add a metric; see [`metric_key`] for reserved names
    pub fn with_metric(mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.metrics.insert(metric_key(name.as_ref()), value.into());
        self
    }

    pub fn metric(&self, name: &str) -> Option<&Value> {
        self.metrics.get(&metric_key(name))
    }

    pub fn is_error(&self) -> bool {
        self.status == SummaryStatus::Error
    }
}
