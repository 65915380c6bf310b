//! Relational backend over PostgreSQL

use std::time::Duration;

use async_trait::async_trait;
use backplane_core::{
    BackendError, BackendKind, BackendProbe, BackendResult, Command, CommandOutput, CommandSpec,
    Details, QueryExecutor, Summary, SummaryStatus,
};
use serde_json::Value;
use sqlx::postgres::PgConnection;
use sqlx::Connection;
use tracing::debug;

use crate::config::PostgresConfig;

const DETAIL_CUSTOMERS: &str = "SELECT * FROM customers ORDER BY id LIMIT 10";
const DETAIL_ORDERS: &str = "SELECT o.*, c.name AS customer_name \
     FROM orders o JOIN customers c ON o.customer_id = c.id \
     ORDER BY o.order_date DESC LIMIT 10";
const DETAIL_PRODUCTS: &str = "SELECT * FROM products ORDER BY id";
const DETAIL_TOTAL_SALES: &str = "SELECT SUM(price * quantity)::float8 FROM orders";

/// PostgreSQL probe and executor.
///
/// Connections are opened per call and closed on return; there is no pool.
/// Commands run inside a read-only transaction that is always rolled back.
pub struct PostgresBackend {
    name: String,
    url: Option<String>,
    summary_tables: Vec<String>,
    timeout: Duration,
}

impl PostgresBackend {
    pub fn new(config: &PostgresConfig, timeout: Duration) -> Self {
        Self {
            name: config.name.clone(),
            url: config.url.clone().filter(|url| !url.trim().is_empty()),
            summary_tables: config.summary_tables.clone(),
            timeout,
        }
    }

    async fn connect(&self) -> BackendResult<PgConnection> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| BackendError::BackendUnavailable {
                name: self.name.clone(),
                detail: "not configured".to_string(),
            })?;

        PgConnection::connect(url).await.map_err(map_sqlx_error)
    }

    /// Rows of `sql` as JSON objects
    async fn fetch_rows(conn: &mut PgConnection, sql: &str) -> BackendResult<Vec<Value>> {
        let rows: Vec<String> = sqlx::query_scalar(&row_json_query(sql))
            .fetch_all(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter()
            .map(|row| {
                serde_json::from_str(row)
                    .map_err(|e| BackendError::BackendExecution(format!("Invalid row JSON: {}", e)))
            })
            .collect()
    }
}

#[async_trait]
impl BackendProbe for PostgresBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn probe_timeout(&self) -> Duration {
        self.timeout
    }

    fn primary_metric(&self) -> &'static str {
        "table_count"
    }

    async fn ping(&self) -> BackendResult<()> {
        let conn = self.connect().await?;
        conn.close().await.map_err(map_sqlx_error)
    }

    async fn collect_summary(&self) -> BackendResult<Summary> {
        let mut conn = self.connect().await?;

        let mut summary = Summary::new(SummaryStatus::Complete)
            .with_metric("table_count", self.summary_tables.len());

        for table in &self.summary_tables {
            let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
            let count: i64 = sqlx::query_scalar(&sql)
                .fetch_one(&mut conn)
                .await
                .map_err(map_sqlx_error)?;
            summary = summary.with_metric(table.clone(), count);
        }

        conn.close().await.map_err(map_sqlx_error)?;
        Ok(summary)
    }

    async fn collect_details(&self) -> BackendResult<Details> {
        let mut conn = self.connect().await?;

        let customers = Self::fetch_rows(&mut conn, DETAIL_CUSTOMERS).await?;
        let orders = Self::fetch_rows(&mut conn, DETAIL_ORDERS).await?;
        let products = Self::fetch_rows(&mut conn, DETAIL_PRODUCTS).await?;
        let total_sales: Option<f64> = sqlx::query_scalar(DETAIL_TOTAL_SALES)
            .fetch_one(&mut conn)
            .await
            .map_err(map_sqlx_error)?;

        conn.close().await.map_err(map_sqlx_error)?;
        Ok(Details::new()
            .with("customers", customers)
            .with("orders", orders)
            .with("products", products)
            .with("total_sales", total_sales))
    }
}

#[async_trait]
impl QueryExecutor for PostgresBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    async fn execute(&self, spec: &CommandSpec) -> BackendResult<CommandOutput> {
        let Command::Select { sql } = spec.command() else {
            return Err(BackendError::rejected(spec.verb(), "not a relational command"));
        };

        let mut conn = self.connect().await?;
        debug!(backend = %self.name, "Executing SELECT");

        let wrapped = row_json_query(sql);
        let mut tx = conn.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let rows: Vec<String> = sqlx::query_scalar(&wrapped)
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.rollback().await.map_err(map_sqlx_error)?;

        conn.close().await.map_err(map_sqlx_error)?;
        Ok(CommandOutput::List(rows))
    }
}

/// Wrap a SELECT so each row comes back as one JSON object string
fn row_json_query(sql: &str) -> String {
    format!("SELECT row_to_json(q)::text FROM (\n{}\n) AS q", sql)
}

/// Quote an identifier for interpolation into SQL
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Map sqlx failures onto the backend error taxonomy
pub fn map_sqlx_error(e: sqlx::Error) -> BackendError {
    match &e {
        sqlx::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => {
            BackendError::ConnectionTimeout(e.to_string())
        }
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) => BackendError::ConnectionRefused(e.to_string()),
        sqlx::Error::PoolTimedOut => BackendError::ConnectionTimeout(e.to_string()),
        sqlx::Error::Database(db) => BackendError::BackendExecution(db.message().to_string()),
        _ => BackendError::BackendExecution(e.to_string()),
    }
}
