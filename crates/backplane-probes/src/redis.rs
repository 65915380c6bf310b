//! Key-value backend over Redis

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use backplane_core::{
    BackendError, BackendKind, BackendProbe, BackendResult, Command, CommandOutput, CommandSpec,
    Details, QueryExecutor, Summary, SummaryStatus,
};
use redis::aio::MultiplexedConnection;
use redis::RedisError;
use tracing::debug;

use crate::config::{ConfigError, RedisConfig};

/// Keys counted before the summary gives up and reports a partial count
pub const KEY_SCAN_LIMIT: usize = 1000;

const SCAN_BATCH: usize = 100;

const SESSION_PATTERN: &str = "session:*";
const COUNTER_PREFIX: &str = "counter:";
const CATEGORIES_KEY: &str = "categories:all";
const RECENT_SEARCHES_KEY: &str = "search:recent";

/// Redis probe and executor.
///
/// Every call opens its own connection and drops it on return.
pub struct RedisBackend {
    name: String,
    client: redis::Client,
    timeout: Duration,
}

impl RedisBackend {
    pub fn new(config: &RedisConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let client =
            redis::Client::open(config.connection_url()).map_err(|e| ConfigError::InvalidUrl {
                backend: config.name.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            name: config.name.clone(),
            client,
            timeout,
        })
    }

    async fn connect(&self) -> BackendResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_error)
    }

    /// Count keys matching `pattern`, stopping once `limit` is exceeded
    async fn count_keys(
        conn: &mut MultiplexedConnection,
        pattern: &str,
        limit: Option<usize>,
    ) -> BackendResult<(usize, bool)> {
        let mut cursor: u64 = 0;
        let mut count = 0usize;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut *conn)
                .await
                .map_err(map_redis_error)?;

            count += batch.len();
            if let Some(limit) = limit {
                if count > limit {
                    return Ok((limit, true));
                }
            }

            if next == 0 {
                return Ok((count, false));
            }
            cursor = next;
        }
    }

    /// Every key matching `pattern`, sorted
    async fn scan_keys(conn: &mut MultiplexedConnection, pattern: &str) -> BackendResult<Vec<String>> {
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut *conn)
                .await
                .map_err(map_redis_error)?;
            keys.extend(batch);

            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

#[async_trait]
impl BackendProbe for RedisBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::KeyValue
    }

    fn probe_timeout(&self) -> Duration {
        self.timeout
    }

    fn primary_metric(&self) -> &'static str {
        "key_count"
    }

    async fn ping(&self) -> BackendResult<()> {
        let mut conn = self.connect().await?;
        let _pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn collect_summary(&self) -> BackendResult<Summary> {
        let mut conn = self.connect().await?;

        let (keys, truncated) = Self::count_keys(&mut conn, "*", Some(KEY_SCAN_LIMIT)).await?;
        if truncated {
            return Ok(Summary::new(SummaryStatus::Partial)
                .with_metric("key_count", format!("{}+", keys)));
        }

        let (sessions, _) = Self::count_keys(&mut conn, "session:*", None).await?;
        let (counters, _) = Self::count_keys(&mut conn, "counter:*", None).await?;

        Ok(Summary::new(SummaryStatus::Complete)
            .with_metric("key_count", keys.to_string())
            .with_metric("session_count", sessions)
            .with_metric("counter_count", counters))
    }

    async fn collect_details(&self) -> BackendResult<Details> {
        let mut conn = self.connect().await?;

        let mut sessions = Vec::new();
        for key in Self::scan_keys(&mut conn, SESSION_PATTERN).await? {
            let mut fields: BTreeMap<String, String> = redis::cmd("HGETALL")
                .arg(&key)
                .query_async(&mut conn)
                .await
                .map_err(map_redis_error)?;
            fields.insert("session_key".to_string(), key);
            sessions.push(fields);
        }

        let mut counters = BTreeMap::new();
        for key in Self::scan_keys(&mut conn, &format!("{}*", COUNTER_PREFIX)).await? {
            let value: Option<String> = redis::cmd("GET")
                .arg(&key)
                .query_async(&mut conn)
                .await
                .map_err(map_redis_error)?;
            counters.insert(counter_name(&key).to_string(), value);
        }

        let mut categories: Vec<String> = redis::cmd("SMEMBERS")
            .arg(CATEGORIES_KEY)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        categories.sort();

        let search_history: Vec<String> = redis::cmd("LRANGE")
            .arg(RECENT_SEARCHES_KEY)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        Ok(key_value_details(sessions, counters, categories, search_history))
    }
}

/// Counter name without its `counter:` prefix
fn counter_name(key: &str) -> &str {
    key.strip_prefix(COUNTER_PREFIX).unwrap_or(key)
}

/// Assemble the key-value detailed view
pub fn key_value_details(
    sessions: Vec<BTreeMap<String, String>>,
    counters: BTreeMap<String, Option<String>>,
    categories: Vec<String>,
    search_history: Vec<String>,
) -> Details {
    Details::new()
        .with("sessions", serde_json::json!(sessions))
        .with("counters", serde_json::json!(counters))
        .with("categories", categories)
        .with("search_history", search_history)
}

#[async_trait]
impl QueryExecutor for RedisBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::KeyValue
    }

    async fn execute(&self, spec: &CommandSpec) -> BackendResult<CommandOutput> {
        if spec.kind() != BackendKind::KeyValue {
            return Err(BackendError::rejected(spec.verb(), "not a key-value command"));
        }
        let mut conn = self.connect().await?;
        debug!(backend = %self.name, verb = spec.verb(), "Executing command");

        match spec.command() {
            Command::Keys { pattern } => {
                let keys: Vec<String> = redis::cmd("KEYS")
                    .arg(pattern)
                    .query_async(&mut conn)
                    .await
                    .map_err(map_redis_error)?;
                Ok(CommandOutput::List(keys))
            }
            Command::Get { key } => {
                let value: Option<String> = redis::cmd("GET")
                    .arg(key)
                    .query_async(&mut conn)
                    .await
                    .map_err(map_redis_error)?;
                Ok(CommandOutput::Scalar(
                    value.unwrap_or_else(|| "(nil)".to_string()),
                ))
            }
            Command::HGetAll { key } => {
                let fields: BTreeMap<String, String> = redis::cmd("HGETALL")
                    .arg(key)
                    .query_async(&mut conn)
                    .await
                    .map_err(map_redis_error)?;
                Ok(CommandOutput::Map(fields))
            }
            Command::SMembers { key } => {
                let members: Vec<String> = redis::cmd("SMEMBERS")
                    .arg(key)
                    .query_async(&mut conn)
                    .await
                    .map_err(map_redis_error)?;
                Ok(CommandOutput::List(members))
            }
            Command::LRange { key, start, stop } => {
                let items: Vec<String> = redis::cmd("LRANGE")
                    .arg(key)
                    .arg(*start)
                    .arg(*stop)
                    .query_async(&mut conn)
                    .await
                    .map_err(map_redis_error)?;
                Ok(CommandOutput::List(items))
            }
            _ => Err(BackendError::rejected(
                spec.verb(),
                "not a key-value command",
            )),
        }
    }
}

/// Map Redis client failures onto the backend error taxonomy
pub fn map_redis_error(e: RedisError) -> BackendError {
    if e.is_timeout() {
        BackendError::ConnectionTimeout(e.to_string())
    } else if e.is_connection_refusal() || e.is_io_error() {
        BackendError::ConnectionRefused(e.to_string())
    } else {
        BackendError::BackendExecution(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_prefix_is_stripped() {
        assert_eq!(counter_name("counter:page_views"), "page_views");
        assert_eq!(counter_name("page_views"), "page_views");
    }

    #[test]
    fn detailed_view_sections() {
        let session = BTreeMap::from([
            ("username".to_string(), "tanaka".to_string()),
            ("session_key".to_string(), "session:user1".to_string()),
        ]);
        let counters = BTreeMap::from([("page_views".to_string(), Some("1250".to_string()))]);

        let details = key_value_details(
            vec![session],
            counters,
            vec!["Books".to_string()],
            vec!["ノートPC".to_string()],
        );
        assert_eq!(
            details.section("sessions"),
            Some(&serde_json::json!([{"session_key": "session:user1", "username": "tanaka"}]))
        );
        assert_eq!(
            details.section("counters"),
            Some(&serde_json::json!({"page_views": "1250"}))
        );
        assert_eq!(
            details.section("search_history"),
            Some(&serde_json::json!(["ノートPC"]))
        );
    }

    #[test]
    fn rejects_unparseable_url() {
        let config = RedisConfig {
            url: Some("memcached://nope".to_string()),
            ..Default::default()
        };
        let err = RedisBackend::new(&config, Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn unreachable_server_is_unhealthy_not_an_error() {
        let config = RedisConfig {
            port: 9,
            host: "127.0.0.1".to_string(),
            ..Default::default()
        };
        let backend = RedisBackend::new(&config, Duration::from_secs(2)).unwrap();

        let status = backend.check_health().await;
        assert!(!status.is_healthy());
        assert_eq!(status.name(), "redis");
        assert!(status.detail().chars().count() <= backplane_core::DETAIL_MAX_CHARS);

        let summary = backend.summarize().await;
        assert!(summary.is_error());
        assert_eq!(
            summary.metric("key_count"),
            Some(&serde_json::Value::from("?"))
        );
    }

    #[tokio::test]
    async fn wrong_kind_command_is_rejected() {
        let backend = RedisBackend::new(&RedisConfig::default(), Duration::from_secs(1)).unwrap();
        let spec = CommandSpec::parse("postgresql", BackendKind::Relational, "SELECT 1").unwrap();
        let err = backend.execute(&spec).await.unwrap_err();
        assert!(matches!(err, BackendError::CommandRejected { .. }));
    }
}
