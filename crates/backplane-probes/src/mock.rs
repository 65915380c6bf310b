//! In-memory mock backend for tests and demo mode
//!
//! A [`MockBackend`] plays both roles (probe and executor) for any backend
//! kind. Health, latency and answers are settable at runtime, and call
//! counters let tests observe how often the backend was actually contacted.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backplane_core::{
    BackendError, BackendKind, BackendProbe, BackendResult, Command, CommandOutput, CommandSpec,
    Details, QueryExecutor, Summary, SummaryStatus, DEFAULT_PROBE_TIMEOUT,
};
use parking_lot::RwLock;
use serde_json::{json, Value};

/// Mock backend for testing
pub struct MockBackend {
    name: String,
    kind: BackendKind,
    probe_timeout: RwLock<Duration>,
    healthy: AtomicBool,
    panic_on_probe: AtomicBool,
    /// Error reported by ping while unhealthy
    failure: RwLock<BackendError>,
    /// Artificial latency for ping and execute
    delay: RwLock<Option<Duration>>,
    /// Error returned by every execution, if set
    execution_error: RwLock<Option<BackendError>>,
    /// Canned answers keyed by normalized command, then by verb
    responses: RwLock<HashMap<String, CommandOutput>>,
    /// Documents (search) or point payloads (vector) evaluated in memory
    records: RwLock<Vec<Value>>,
    summary: RwLock<Summary>,
    details: RwLock<Details>,
    health_checks: AtomicUsize,
    executions: AtomicUsize,
    summaries: AtomicUsize,
    detail_reads: AtomicUsize,
}

impl MockBackend {
    pub fn new(name: impl Into<String>, kind: BackendKind) -> Self {
        let name = name.into();
        Self {
            failure: RwLock::new(BackendError::ConnectionRefused(format!(
                "{} is not reachable",
                name
            ))),
            name,
            kind,
            probe_timeout: RwLock::new(DEFAULT_PROBE_TIMEOUT),
            healthy: AtomicBool::new(true),
            panic_on_probe: AtomicBool::new(false),
            delay: RwLock::new(None),
            execution_error: RwLock::new(None),
            responses: RwLock::new(HashMap::new()),
            records: RwLock::new(Vec::new()),
            summary: RwLock::new(Summary::new(SummaryStatus::Complete)),
            details: RwLock::new(Details::unsupported()),
            health_checks: AtomicUsize::new(0),
            executions: AtomicUsize::new(0),
            summaries: AtomicUsize::new(0),
            detail_reads: AtomicUsize::new(0),
        }
    }

    /// Set health state; unhealthy mocks fail ping with the configured failure
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Become unhealthy, failing ping with `error`
    pub fn fail_with(&self, error: BackendError) {
        *self.failure.write() = error;
        self.set_healthy(false);
    }

    /// Panic inside ping (simulates a crashing probe task)
    pub fn set_panic_on_probe(&self, panic: bool) {
        self.panic_on_probe.store(panic, Ordering::SeqCst);
    }

    /// Delay every ping and execution by `delay`
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    pub fn set_probe_timeout(&self, timeout: Duration) {
        *self.probe_timeout.write() = timeout;
    }

    pub fn set_execution_error(&self, error: Option<BackendError>) {
        *self.execution_error.write() = error;
    }

    /// Answer `command` (verb plus arguments, e.g. `"GET counter:page_views"`)
    /// or a bare verb (e.g. `"SELECT"`) with `output`
    pub fn add_response(&self, command: &str, output: CommandOutput) {
        self.responses.write().insert(normalize(command), output);
    }

    /// Records searched by SEARCH or filtered by FILTER when no canned answer matches
    pub fn set_records(&self, records: Vec<Value>) {
        *self.records.write() = records;
    }

    pub fn set_summary(&self, summary: Summary) {
        *self.summary.write() = summary;
    }

    pub fn set_details(&self, details: Details) {
        *self.details.write() = details;
    }

    pub fn health_checks(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn summaries(&self) -> usize {
        self.summaries.load(Ordering::SeqCst)
    }

    pub fn detail_reads(&self) -> usize {
        self.detail_reads.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn canned(&self, spec: &CommandSpec) -> Option<CommandOutput> {
        let full = normalize(&format!("{} {}", spec.verb(), spec.arguments().join(" ")));
        let responses = self.responses.read();
        responses
            .get(&full)
            .or_else(|| responses.get(spec.verb()))
            .cloned()
    }

    fn evaluate(&self, spec: &CommandSpec) -> CommandOutput {
        let records = self.records.read();
        match spec.command() {
            Command::Get { .. } => CommandOutput::Scalar("(nil)".to_string()),
            Command::HGetAll { .. } => CommandOutput::Map(BTreeMap::new()),
            Command::Search { term, field } => {
                let needle = term.to_lowercase();
                let hits = records
                    .iter()
                    .filter(|doc| {
                        let source = &doc["source"];
                        match field {
                            Some(field) => contains(&source[field.as_str()], &needle),
                            None => ["title", "content", "category", "author"]
                                .iter()
                                .any(|f| contains(&source[*f], &needle)),
                        }
                    })
                    .map(|doc| {
                        json!({
                            "id": doc["id"],
                            "score": 1.0,
                            "source": doc["source"],
                            "highlight": {},
                        })
                        .to_string()
                    })
                    .collect();
                CommandOutput::List(hits)
            }
            Command::Filter {
                category,
                price,
                limit,
            } => {
                let points = records
                    .iter()
                    .filter(|point| {
                        let payload = &point["payload"];
                        let category_ok = category
                            .as_ref()
                            .map_or(true, |c| payload["category"].as_str() == Some(c.as_str()));
                        let price_ok = price.map_or(true, |range| {
                            payload["price"]
                                .as_u64()
                                .is_some_and(|p| p >= range.min && p <= range.max)
                        });
                        category_ok && price_ok
                    })
                    .take(*limit as usize)
                    .map(|point| json!({ "id": point["id"], "payload": point["payload"] }).to_string())
                    .collect();
                CommandOutput::List(points)
            }
            _ => CommandOutput::List(Vec::new()),
        }
    }
}

fn normalize(command: &str) -> String {
    let mut tokens = command.split_whitespace();
    let verb = tokens.next().unwrap_or_default().to_ascii_uppercase();
    std::iter::once(verb)
        .chain(tokens.map(str::to_string))
        .collect::<Vec<_>>()
        .join(" ")
}

fn contains(value: &Value, needle: &str) -> bool {
    value
        .as_str()
        .is_some_and(|text| text.to_lowercase().contains(needle))
}

#[async_trait]
impl BackendProbe for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn probe_timeout(&self) -> Duration {
        *self.probe_timeout.read()
    }

    fn primary_metric(&self) -> &'static str {
        match self.kind {
            BackendKind::KeyValue => "key_count",
            BackendKind::Relational => "table_count",
            BackendKind::Search => "document_count",
            BackendKind::Vector => "collection_count",
        }
    }

    async fn ping(&self) -> BackendResult<()> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_probe.load(Ordering::SeqCst) {
            panic!("mock probe '{}' panicked", self.name);
        }
        self.pause().await;

        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(self.failure.read().clone())
        }
    }

    async fn collect_summary(&self) -> BackendResult<Summary> {
        self.summaries.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(self.summary.read().clone())
        } else {
            Err(self.failure.read().clone())
        }
    }

    async fn collect_details(&self) -> BackendResult<Details> {
        self.detail_reads.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(self.details.read().clone())
        } else {
            Err(self.failure.read().clone())
        }
    }
}

#[async_trait]
impl QueryExecutor for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn execute(&self, spec: &CommandSpec) -> BackendResult<CommandOutput> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if let Some(error) = self.execution_error.read().clone() {
            return Err(error);
        }
        Ok(self.canned(spec).unwrap_or_else(|| self.evaluate(spec)))
    }
}

// =============================================================================
// Demo data
// =============================================================================

const DEMO_CATEGORIES: &[&str] = &[
    "スポーツ",
    "エレクトロニクス",
    "本・メディア",
    "キッチン家電",
    "ファッション",
];

const DEMO_RECENT_SEARCHES: &[&str] = &[
    "ノートPC",
    "コーヒーメーカー",
    "ワイヤレスイヤホン",
    "ビジネスバッグ",
    "スニーカー",
];

impl MockBackend {
    /// Key-value store holding sessions, counters, categories and search history
    pub fn demo_key_value(name: impl Into<String>) -> Self {
        let mock = Self::new(name, BackendKind::KeyValue);

        let sessions = [
            ("session:user1", "1", "tanaka", "2024-01-15 10:30:00"),
            ("session:user2", "2", "sato", "2024-01-15 11:15:00"),
            ("session:user3", "3", "suzuki", "2024-01-15 09:45:00"),
        ];
        let counters = [
            ("counter:page_views", "1250"),
            ("counter:user_registrations", "89"),
            ("counter:sales_today", "15"),
            ("counter:active_sessions", "3"),
        ];

        for (key, user_id, username, login_time) in sessions {
            let fields = BTreeMap::from([
                ("user_id".to_string(), user_id.to_string()),
                ("username".to_string(), username.to_string()),
                ("login_time".to_string(), login_time.to_string()),
            ]);
            mock.add_response(&format!("HGETALL {}", key), CommandOutput::Map(fields));
        }
        for (key, value) in counters {
            mock.add_response(&format!("GET {}", key), CommandOutput::Scalar(value.to_string()));
        }

        let session_keys: Vec<String> = sessions.iter().map(|s| s.0.to_string()).collect();
        let counter_keys: Vec<String> = counters.iter().map(|c| c.0.to_string()).collect();
        let mut all_keys: Vec<String> = vec![
            "search:recent".to_string(),
            "categories:all".to_string(),
        ];
        all_keys.extend(counter_keys.iter().cloned());
        all_keys.extend(session_keys.iter().cloned());

        mock.add_response("KEYS *", CommandOutput::List(all_keys.clone()));
        mock.add_response("KEYS session:*", CommandOutput::List(session_keys.clone()));
        mock.add_response("KEYS counter:*", CommandOutput::List(counter_keys.clone()));
        mock.add_response(
            "SMEMBERS categories:all",
            CommandOutput::List(strings(DEMO_CATEGORIES)),
        );
        mock.add_response(
            "LRANGE search:recent 0 -1",
            CommandOutput::List(strings(DEMO_RECENT_SEARCHES)),
        );

        mock.set_summary(
            Summary::new(SummaryStatus::Complete)
                .with_metric("key_count", all_keys.len().to_string())
                .with_metric("session_count", session_keys.len())
                .with_metric("counter_count", counter_keys.len()),
        );

        let session_rows = sessions
            .iter()
            .map(|(key, user_id, username, login_time)| {
                BTreeMap::from([
                    ("user_id".to_string(), user_id.to_string()),
                    ("username".to_string(), username.to_string()),
                    ("login_time".to_string(), login_time.to_string()),
                    ("session_key".to_string(), key.to_string()),
                ])
            })
            .collect();
        let counter_values = counters
            .iter()
            .map(|(key, value)| {
                let name = key.trim_start_matches("counter:").to_string();
                (name, Some(value.to_string()))
            })
            .collect();
        let mut categories = strings(DEMO_CATEGORIES);
        categories.sort();
        mock.set_details(crate::redis::key_value_details(
            session_rows,
            counter_values,
            categories,
            strings(DEMO_RECENT_SEARCHES),
        ));
        mock
    }

    /// Relational store with customers, orders and products tables
    pub fn demo_relational(name: impl Into<String>) -> Self {
        let mock = Self::new(name, BackendKind::Relational);
        let customers = [
            json!({ "id": 1, "name": "田中太郎", "email": "tanaka@example.com", "city": "東京" }),
            json!({ "id": 2, "name": "佐藤花子", "email": "sato@example.com", "city": "大阪" }),
            json!({ "id": 3, "name": "鈴木一郎", "email": "suzuki@example.com", "city": "名古屋" }),
        ];
        mock.add_response(
            "SELECT",
            CommandOutput::List(customers.iter().map(Value::to_string).collect()),
        );
        mock.set_summary(
            Summary::new(SummaryStatus::Complete)
                .with_metric("table_count", 3)
                .with_metric("customers", 3)
                .with_metric("orders", 5)
                .with_metric("products", 5),
        );

        let products = [
            (1, "ノートPC", "エレクトロニクス", 89800),
            (2, "ワイヤレスイヤホン", "エレクトロニクス", 12800),
            (3, "コーヒーメーカー", "キッチン家電", 15600),
            (4, "ビジネスバッグ", "ファッション", 8900),
            (5, "スニーカー", "スポーツ", 9800),
        ];
        // (id, customer_id, product, price, quantity, order_date), newest first
        let orders = [
            (5, 3, "スニーカー", 9800, 2, "2024-01-19"),
            (4, 1, "ビジネスバッグ", 8900, 1, "2024-01-18"),
            (3, 2, "コーヒーメーカー", 15600, 1, "2024-01-17"),
            (2, 1, "ワイヤレスイヤホン", 12800, 2, "2024-01-16"),
            (1, 1, "ノートPC", 89800, 1, "2024-01-15"),
        ];
        let customer_name = |id: u64| {
            customers
                .iter()
                .find(|c| c["id"] == id)
                .map(|c| c["name"].clone())
                .unwrap_or(Value::Null)
        };
        let order_rows: Vec<Value> = orders
            .iter()
            .map(|(id, customer_id, product, price, quantity, order_date)| {
                json!({
                    "id": id,
                    "customer_id": customer_id,
                    "product_name": product,
                    "price": price,
                    "quantity": quantity,
                    "order_date": order_date,
                    "customer_name": customer_name(*customer_id),
                })
            })
            .collect();
        let product_rows: Vec<Value> = products
            .iter()
            .map(|(id, name, category, price)| {
                json!({ "id": id, "name": name, "category": category, "price": price })
            })
            .collect();
        let total_sales: f64 = orders.iter().map(|o| f64::from(o.3 * o.4)).sum();

        mock.set_details(
            Details::new()
                .with("customers", customers.to_vec())
                .with("orders", order_rows)
                .with("products", product_rows)
                .with("total_sales", total_sales),
        );
        mock
    }

    /// Search store with the blog article index
    pub fn demo_search(name: impl Into<String>) -> Self {
        let mock = Self::new(name, BackendKind::Search);
        let articles = [
            ("Python機械学習入門", "Pythonを使った機械学習の基礎を解説します。", "技術", "山田太郎"),
            ("Rustで始めるシステムプログラミング", "所有権と借用の考え方を紹介します。", "技術", "佐藤次郎"),
            ("在宅勤務の生産性向上術", "リモートワークを快適にするコツをまとめました。", "ライフスタイル", "鈴木花子"),
            ("データベース設計のベストプラクティス", "正規化とインデックス設計のポイント。", "技術", "山田太郎"),
            ("週末の登山ガイド", "初心者向けの山と装備を紹介します。", "趣味", "高橋美咲"),
        ];
        let documents = articles
            .iter()
            .enumerate()
            .map(|(i, (title, content, category, author))| {
                json!({
                    "id": (i + 1).to_string(),
                    "source": {
                        "title": title,
                        "content": content,
                        "category": category,
                        "author": author,
                    }
                })
            })
            .collect::<Vec<_>>();
        mock.set_summary(
            Summary::new(SummaryStatus::Complete).with_metric("document_count", documents.len()),
        );
        mock.set_records(documents);
        mock
    }

    /// Vector store with the product embedding collection
    pub fn demo_vector(name: impl Into<String>) -> Self {
        let mock = Self::new(name, BackendKind::Vector);
        let products = [
            (1, "高性能ノートPC", "エレクトロニクス", "最新CPU搭載の軽量ノートパソコン", 89800),
            (2, "ワイヤレスイヤホン", "エレクトロニクス", "ノイズキャンセリング対応", 12800),
            (3, "全自動コーヒーメーカー", "キッチン家電", "豆から挽きたてのコーヒーを", 15600),
            (4, "レザービジネスバッグ", "ファッション", "本革仕様のビジネスバッグ", 8900),
            (5, "ランニングシューズ", "スポーツ", "軽量でクッション性の高いシューズ", 9800),
        ];
        let points = products
            .iter()
            .map(|(id, name, category, description, price)| {
                json!({
                    "id": id,
                    "payload": {
                        "name": name,
                        "category": category,
                        "description": description,
                        "price": price,
                    }
                })
            })
            .collect();
        mock.set_records(points);
        mock.set_summary(
            Summary::new(SummaryStatus::Complete)
                .with_metric("collection_count", 1)
                .with_metric("collections", vec!["product_embeddings".to_string()]),
        );
        mock
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
