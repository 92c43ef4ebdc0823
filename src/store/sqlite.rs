//! SQLite-backed Log Store.
//!
//! Each store call acquires its own connection from the pool and returns
//! it when the guard drops, on every exit path. Appends run inside a
//! transaction that rolls back on drop unless committed.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use super::{
    LogStore, NewLogEntry, Operation, OperationLogEntry, OperationStatus, StoreError, StoreResult,
    UsageTotals,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS operation_logs (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        operation      TEXT    NOT NULL,
        inputs         TEXT    NOT NULL,
        result         REAL    NOT NULL,
        timestamp      TEXT    NOT NULL,
        execution_time INTEGER NOT NULL DEFAULT 0,
        status         TEXT    NOT NULL DEFAULT 'success'
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_operation_logs_operation ON operation_logs (operation)",
    "CREATE INDEX IF NOT EXISTS idx_operation_logs_timestamp ON operation_logs (timestamp)",
];

// ─── Configuration ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `None` means a private in-memory database.
    pub database_path: Option<PathBuf>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            database_path: Some(path.into()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// A single-connection in-memory database; the data lives as long as
    /// the pool's one connection does.
    pub fn in_memory() -> Self {
        StoreConfig {
            database_path: None,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
        }
    }

    /// Accepts `sqlite::memory:`, `sqlite://<path>`, `sqlite:<path>` or a
    /// bare file path. A path of `:memory:` in any of these forms is the
    /// single-connection in-memory database.
    pub fn from_url(url: &str) -> StoreResult<Self> {
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        let path = path.split('?').next().unwrap_or(path);
        if path == ":memory:" {
            return Ok(Self::in_memory());
        }
        if path.is_empty() {
            return Err(StoreError::ConnectionFailed(format!(
                "no database path in \"{url}\""
            )));
        }
        Ok(Self::new(path))
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        if self.database_path.is_some() {
            self.max_connections = max.max(1);
        }
        self
    }
}

// ─── Row mapping ─────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct LogRow {
    id: i64,
    operation: Operation,
    inputs: String,
    result: f64,
    timestamp: DateTime<Utc>,
    execution_time: i64,
    status: OperationStatus,
}

impl LogRow {
    fn into_entry(self) -> StoreResult<OperationLogEntry> {
        let inputs: Map<String, Value> = serde_json::from_str(&self.inputs)
            .map_err(|e| StoreError::corrupt(self.id, format!("inputs: {e}")))?;
        Ok(OperationLogEntry {
            id: self.id,
            operation: self.operation,
            inputs,
            result: self.result,
            timestamp: self.timestamp,
            execution_time: self.execution_time,
            status: self.status,
        })
    }
}

/// Fixed-width UTC text so lexical order in SQL equals time order.
fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ─── Store ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SqliteLogStore {
    pool: SqlitePool,
}

impl SqliteLogStore {
    pub async fn new(config: StoreConfig) -> StoreResult<Self> {
        let pool = match &config.database_path {
            Some(path) => {
                info!(path = %path.display(), "Opening SQLite log store");
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal)
                    .create_if_missing(true);
                SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(config.acquire_timeout)
                    .connect_with(options)
                    .await
            }
            None => {
                info!("Opening in-memory SQLite log store");
                let options = SqliteConnectOptions::from_str("sqlite::memory:")
                    .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
                // The database vanishes with its connection, so never let
                // the pool retire it.
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .acquire_timeout(config.acquire_timeout)
                    .connect_with(options)
                    .await
            }
        }
        .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        info!(max_connections = config.max_connections, "SQLite pool created");

        let store = SqliteLogStore { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *conn).await?;
        }
        debug!("operation_logs schema ready");
        Ok(())
    }
}

#[async_trait]
impl LogStore for SqliteLogStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn append(&self, entry: NewLogEntry) -> StoreResult<OperationLogEntry> {
        let inputs = serde_json::to_string(&entry.inputs)?;

        // The clock is read before the write lock is held, so a writer that
        // commits later may carry an earlier reading. Clamping to the newest
        // stored timestamp inside the INSERT keeps timestamp order equal to
        // id order.
        let mut tx = self.pool.begin().await?;
        let (id, timestamp): (i64, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO operation_logs (operation, inputs, result, timestamp, execution_time, status)
            VALUES (
                ?1, ?2, ?3,
                MAX(?4, COALESCE((SELECT MAX(timestamp) FROM operation_logs), ?4)),
                ?5, ?6
            )
            RETURNING id, timestamp
            "#,
        )
        .bind(entry.operation)
        .bind(&inputs)
        .bind(entry.result)
        .bind(encode_timestamp(&Utc::now()))
        .bind(entry.execution_time)
        .bind(entry.status)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(id, operation = %entry.operation, "Appended log entry");
        Ok(OperationLogEntry::from_new(id, timestamp, entry))
    }

    async fn history(&self) -> StoreResult<Vec<OperationLogEntry>> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<LogRow> = sqlx::query_as(
            r#"
            SELECT id, operation, inputs, result, timestamp, execution_time, status
            FROM operation_logs
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(LogRow::into_entry).collect()
    }

    async fn totals(&self) -> StoreResult<UsageTotals> {
        let mut conn = self.pool.acquire().await?;

        let (total_requests, total_execution_time, successes): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(execution_time), 0),
                COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0)
            FROM operation_logs
            "#,
        )
        .fetch_one(&mut *conn)
        .await?;

        let counts: Vec<(String, i64)> = sqlx::query_as(
            "SELECT operation, COUNT(*) FROM operation_logs GROUP BY operation",
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(UsageTotals {
            total_requests: total_requests.max(0) as u64,
            total_execution_time: total_execution_time.max(0) as u64,
            successes: successes.max(0) as u64,
            operation_counts: counts
                .into_iter()
                .map(|(op, n)| (op, n.max(0) as u64))
                .collect::<BTreeMap<_, _>>(),
        })
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn close(&self) {
        info!("Closing SQLite pool");
        self.pool.close().await;
    }
}

// ─── Tests ───────────────────────────────────────────────────────
