//! Vector backend over Qdrant's REST API

use std::time::Duration;

use async_trait::async_trait;
use backplane_core::{
    BackendError, BackendKind, BackendProbe, BackendResult, Command, CommandOutput, CommandSpec,
    PriceRange, QueryExecutor, Summary, SummaryStatus,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::{ConfigError, QdrantConfig};
use crate::http::HttpEndpoint;

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionList {
    #[serde(default)]
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    #[serde(default)]
    points: Vec<Point>,
}

#[derive(Debug, Deserialize)]
struct Point {
    id: Value,
    #[serde(default)]
    payload: Value,
}

/// Qdrant probe and executor
pub struct QdrantBackend {
    name: String,
    collection: String,
    probe: HttpEndpoint,
    commands: HttpEndpoint,
    timeout: Duration,
}

impl QdrantBackend {
    pub fn new(
        config: &QdrantConfig,
        timeout: Duration,
        command_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            name: config.name.clone(),
            collection: config.collection.clone(),
            probe: HttpEndpoint::new(&config.name, &config.url, timeout)?,
            commands: HttpEndpoint::new(&config.name, &config.url, command_timeout)?,
            timeout,
        })
    }
}

/// Build the scroll request body for a FILTER command
pub fn scroll_body(category: Option<&str>, price: Option<PriceRange>, limit: u32) -> Value {
    let mut must = Vec::new();
    if let Some(category) = category {
        must.push(json!({ "key": "category", "match": { "value": category } }));
    }
    if let Some(price) = price {
        must.push(json!({ "key": "price", "range": { "gte": price.min, "lte": price.max } }));
    }

    let mut body = json!({
        "limit": limit,
        "with_payload": true,
        "with_vector": false,
    });
    if !must.is_empty() {
        body["filter"] = json!({ "must": must });
    }
    body
}

#[async_trait]
impl BackendProbe for QdrantBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Vector
    }

    fn probe_timeout(&self) -> Duration {
        self.timeout
    }

    fn primary_metric(&self) -> &'static str {
        "collection_count"
    }

    async fn ping(&self) -> BackendResult<()> {
        self.probe.get("/").await.map(|_| ())
    }

    async fn collect_summary(&self) -> BackendResult<Summary> {
        let response: QdrantResponse<CollectionList> = self.probe.get_json("/collections").await?;
        let names: Vec<String> = response
            .result
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect();

        Ok(Summary::new(SummaryStatus::Complete)
            .with_metric("collection_count", names.len())
            .with_metric("collections", names))
    }
}

#[async_trait]
impl QueryExecutor for QdrantBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Vector
    }

    async fn execute(&self, spec: &CommandSpec) -> BackendResult<CommandOutput> {
        let Command::Filter {
            category,
            price,
            limit,
        } = spec.command()
        else {
            return Err(BackendError::rejected(spec.verb(), "not a vector command"));
        };

        let body = scroll_body(category.as_deref(), *price, *limit);
        tracing::debug!(backend = %self.name, collection = %self.collection, "Scrolling points");

        let response: QdrantResponse<ScrollResult> = self
            .commands
            .post_json(
                &format!("/collections/{}/points/scroll", self.collection),
                &body,
            )
            .await?;

        let points = response
            .result
            .points
            .into_iter()
            .map(|point| json!({ "id": point.id, "payload": point.payload }).to_string())
            .collect();

        Ok(CommandOutput::List(points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unfiltered_scroll_has_no_filter() {
        let body = scroll_body(None, None, 5);
        assert_eq!(
            body,
            json!({ "limit": 5, "with_payload": true, "with_vector": false })
        );
    }

    #[test]
    fn category_and_price_become_must_conditions() {
        let body = scroll_body(
            Some("エレクトロニクス"),
            Some(PriceRange {
                min: 10000,
                max: 90000,
            }),
            3,
        );
        assert_eq!(
            body["filter"]["must"],
            json!([
                { "key": "category", "match": { "value": "エレクトロニクス" } },
                { "key": "price", "range": { "gte": 10000, "lte": 90000 } }
            ])
        );
        assert_eq!(body["limit"], json!(3));
    }
}
