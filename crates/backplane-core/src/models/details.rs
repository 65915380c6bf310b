//! Detailed data models

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a detailed data read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailsStatus {
    Complete,
    /// The backend kind has no detailed view
    Unsupported,
    Error,
}

/// Sample records and derived figures from a backend's data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Details {
    pub status: DetailsStatus,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
}

impl Details {
    pub fn new() -> Self {
        Self {
            status: DetailsStatus::Complete,
            data: BTreeMap::new(),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            status: DetailsStatus::Unsupported,
            data: BTreeMap::new(),
        }
    }

    /// Details of a backend that could not be read; carries no data
    pub fn error() -> Self {
        Self {
            status: DetailsStatus::Error,
            data: BTreeMap::new(),
        }
    }

    pub fn with(mut self, section: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(section.into(), value.into());
        self
    }

    pub fn section(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn is_error(&self) -> bool {
        self.status == DetailsStatus::Error
    }
}

impl Default for Details {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sections_nest_under_data() {
        let details = Details::new().with("categories", vec!["Books", "Sports"]);
        assert_eq!(
            serde_json::to_value(&details).unwrap(),
            json!({"status": "complete", "data": {"categories": ["Books", "Sports"]}})
        );
    }

    #[test]
    fn error_details_are_empty() {
        let details = Details::error();
        assert!(details.is_error());
        assert!(details.data.is_empty());
    }
}
