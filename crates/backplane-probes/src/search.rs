//! Search backend over Elasticsearch's REST API

use std::time::Duration;

use async_trait::async_trait;
use backplane_core::{
    BackendError, BackendKind, BackendProbe, BackendResult, Command, CommandOutput, CommandSpec,
    QueryExecutor, SearchField, Summary, SummaryStatus,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::{ConfigError, ElasticsearchConfig};
use crate::http::HttpEndpoint;

/// Fields searched when no `IN <field>` clause is given; title hits weigh double
const MULTI_MATCH_FIELDS: [&str; 4] = ["title^2", "content", "category", "author"];

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Value,
    #[serde(default)]
    highlight: Value,
}

/// Elasticsearch probe and executor
pub struct ElasticsearchBackend {
    name: String,
    index: String,
    probe: HttpEndpoint,
    commands: HttpEndpoint,
    timeout: Duration,
}

impl ElasticsearchBackend {
    pub fn new(
        config: &ElasticsearchConfig,
        timeout: Duration,
        command_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            name: config.name.clone(),
            index: config.index.clone(),
            probe: HttpEndpoint::new(&config.name, &config.url, timeout)?,
            commands: HttpEndpoint::new(&config.name, &config.url, command_timeout)?,
            timeout,
        })
    }
}

/// Build the `_search` request body for a term and optional field
pub fn search_body(term: &str, field: Option<SearchField>) -> Value {
    match field {
        None => json!({
            "query": {
                "multi_match": {
                    "query": term,
                    "fields": MULTI_MATCH_FIELDS,
                }
            },
            "highlight": {
                "fields": { "title": {}, "content": {} }
            }
        }),
        Some(field) => {
            let field = field.as_str();
            json!({
                "query": { "match": { field: term } },
                "highlight": { "fields": { field: {} } }
            })
        }
    }
}

#[async_trait]
impl BackendProbe for ElasticsearchBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Search
    }

    fn probe_timeout(&self) -> Duration {
        self.timeout
    }

    fn primary_metric(&self) -> &'static str {
        "document_count"
    }

    async fn ping(&self) -> BackendResult<()> {
        self.probe.get("/_cluster/health").await.map(|_| ())
    }

    async fn collect_summary(&self) -> BackendResult<Summary> {
        let count: CountResponse = self
            .probe
            .get_json(&format!("/{}/_count", self.index))
            .await?;
        Ok(Summary::new(SummaryStatus::Complete).with_metric("document_count", count.count))
    }
}

#[async_trait]
impl QueryExecutor for ElasticsearchBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Search
    }

    async fn execute(&self, spec: &CommandSpec) -> BackendResult<CommandOutput> {
        let Command::Search { term, field } = spec.command() else {
            return Err(BackendError::rejected(spec.verb(), "not a search command"));
        };

        tracing::debug!(backend = %self.name, term = %term, "Searching");
        let response: SearchResponse = self
            .commands
            .post_json(
                &format!("/{}/_search", self.index),
                &search_body(term, *field),
            )
            .await?;

        let hits = response
            .hits
            .hits
            .into_iter()
            .map(|hit| {
                json!({
                    "id": hit.id,
                    "score": hit.score,
                    "source": hit.source,
                    "highlight": hit.highlight,
                })
                .to_string()
            })
            .collect();

        Ok(CommandOutput::List(hits))
    }
}
