//! The Log Store: an append-only record of every compute request.
//!
//! Handlers only see the [`LogStore`] trait. Two backends implement it:
//! SQLite through sqlx (default) and Redis (selected by a `redis://` URL).

pub mod error;
pub mod redis_store;
pub mod sqlite;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::config::ServerConfig;

pub use error::{StoreError, StoreResult};
pub use sqlite::{SqliteLogStore, StoreConfig};

// ─── Domain types ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Operation {
    Power,
    Fibonacci,
    Factorial,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Power => "power",
            Operation::Fibonacci => "fibonacci",
            Operation::Factorial => "factorial",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum OperationStatus {
    Success,
    Error,
}

/// What a handler hands to the store. `id` and `timestamp` are assigned
/// by the store at write time.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub operation: Operation,
    pub inputs: Map<String, Value>,
    pub result: f64,
    pub execution_time: i64,
    pub status: OperationStatus,
}

/// One persisted row, as returned by `/api/history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLogEntry {
    pub id: i64,
    pub operation: Operation,
    pub inputs: Map<String, Value>,
    pub result: f64,
    pub timestamp: DateTime<Utc>,
    pub execution_time: i64,
    pub status: OperationStatus,
}

impl OperationLogEntry {
    fn from_new(id: i64, timestamp: DateTime<Utc>, entry: NewLogEntry) -> Self {
        Self {
            id,
            operation: entry.operation,
            inputs: entry.inputs,
            result: entry.result,
            timestamp,
            execution_time: entry.execution_time,
            status: entry.status,
        }
    }
}

/// Raw counters the Metrics Aggregator derives its ratios from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageTotals {
    pub total_requests: u64,
    pub total_execution_time: u64,
    pub successes: u64,
    pub operation_counts: BTreeMap<String, u64>,
}

impl UsageTotals {
    pub fn from_entries(entries: &[OperationLogEntry]) -> Self {
        let mut totals = UsageTotals::default();
        for entry in entries {
            totals.total_requests += 1;
            totals.total_execution_time += entry.execution_time.max(0) as u64;
            if entry.status == OperationStatus::Success {
                totals.successes += 1;
            }
            *totals
                .operation_counts
                .entry(entry.operation.as_str().to_string())
                .or_insert(0) += 1;
        }
        totals
    }
}

/// Most recent first; entries written within the same clock tick fall
/// back to insertion order.
pub(crate) fn sort_newest_first(entries: &mut [OperationLogEntry]) {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
}

// ─── Store trait ─────────────────────────────────────────────────

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Short backend name reported by the health endpoint.
    fn backend(&self) -> &'static str;

    /// Persist a new entry and return it with its assigned id and timestamp.
    async fn append(&self, entry: NewLogEntry) -> StoreResult<OperationLogEntry>;

    /// Every entry, newest first.
    async fn history(&self) -> StoreResult<Vec<OperationLogEntry>>;

    /// Aggregate counters over the whole store.
    async fn totals(&self) -> StoreResult<UsageTotals> {
        Ok(UsageTotals::from_entries(&self.history().await?))
    }

    async fn health_check(&self) -> bool;

    async fn close(&self) {}
}

/// Opens the backend named by `config.database_url`.
pub async fn open(config: &ServerConfig) -> StoreResult<Arc<dyn LogStore>> {
    let url = config.database_url.as_str();
    if url.starts_with("redis://") || url.starts_with("rediss://") {
        info!(url, "Using Redis log store");
        let store = redis_store::RedisLogStore::connect(url).await?;
        Ok(Arc::new(store))
    } else {
        let store_config =
            StoreConfig::from_url(url)?.max_connections(config.db_max_connections);
        let store = SqliteLogStore::new(store_config).await?;
        Ok(Arc::new(store))
    }
}
