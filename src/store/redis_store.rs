use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{
    sort_newest_first, LogStore, NewLogEntry, Operation, OperationLogEntry, OperationStatus,
    StoreError, StoreResult,
};

/// Monotonic id counter.
const NEXT_ID_KEY: &str = "oplog:next_id";
/// Newest assigned timestamp, in microseconds since the epoch.
const LAST_TS_KEY: &str = "oplog:last_ts";
/// Hash of `id` → JSON-encoded [`StoredEntry`].
const ENTRIES_KEY: &str = "oplog:entries";

/// Assigns id and timestamp and writes the entry in one atomic step.
/// The timestamp comes from the server clock, clamped so it never falls
/// behind the previous one. ARGV[1] is the entry body as a JSON object.
const APPEND_SCRIPT: &str = r#"
local id = redis.call('INCR', KEYS[1])
local now = redis.call('TIME')
local ts = now[1] .. string.format('%06d', tonumber(now[2]))
local last = redis.call('GET', KEYS[2])
if last and tonumber(last) > tonumber(ts) then
    ts = last
end
redis.call('SET', KEYS[2], ts)
local body = ARGV[1]
redis.call('HSET', KEYS[3], id,
    '{"id":' .. id .. ',"timestamp_us":' .. ts .. ',' .. string.sub(body, 2))
return {id, ts}
"#;

/// The fields the caller supplies; the script prepends `id` and
/// `timestamp_us`.
#[derive(Serialize)]
struct EntryBody<'a> {
    operation: Operation,
    inputs: &'a Map<String, Value>,
    result: f64,
    execution_time: i64,
    status: OperationStatus,
}

#[derive(Deserialize)]
struct StoredEntry {
    id: i64,
    timestamp_us: i64,
    operation: Operation,
    inputs: Map<String, Value>,
    result: f64,
    execution_time: i64,
    status: OperationStatus,
}

impl StoredEntry {
    fn into_entry(self) -> StoreResult<OperationLogEntry> {
        Ok(OperationLogEntry {
            id: self.id,
            operation: self.operation,
            inputs: self.inputs,
            result: self.result,
            timestamp: timestamp_from_micros(self.id, self.timestamp_us)?,
            execution_time: self.execution_time,
            status: self.status,
        })
    }
}

fn timestamp_from_micros(id: i64, micros: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::corrupt(id, format!("timestamp out of range: {micros}")))
}

/// Redis-backed Log Store.
///
/// `ConnectionManager` is cheaply cloneable and auto-reconnects; every call
/// works on its own clone, which shares the underlying multiplexed connection.
#[derive(Clone)]
pub struct RedisLogStore {
    conn: ConnectionManager,
}

impl RedisLogStore {
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::ConnectionFailed(format!("invalid Redis URL: {e}")))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::ConnectionFailed(format!("cannot connect to Redis: {e}")))?;

        info!("Connected to Redis log store");
        Ok(Self { conn })
    }
}

fn decode_entries(raw: Vec<String>) -> StoreResult<Vec<OperationLogEntry>> {
    let mut entries = Vec::with_capacity(raw.len());
    for s in &raw {
        entries.push(serde_json::from_str::<StoredEntry>(s)?.into_entry()?);
    }
    sort_newest_first(&mut entries);
    Ok(entries)
}

#[async_trait]
impl LogStore for RedisLogStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn append(&self, entry: NewLogEntry) -> StoreResult<OperationLogEntry> {
        let mut conn = self.conn.clone();

        let body = serde_json::to_string(&EntryBody {
            operation: entry.operation,
            inputs: &entry.inputs,
            result: entry.result,
            execution_time: entry.execution_time,
            status: entry.status,
        })?;
        let (id, ts): (i64, String) = Script::new(APPEND_SCRIPT)
            .key(NEXT_ID_KEY)
            .key(LAST_TS_KEY)
            .key(ENTRIES_KEY)
            .arg(body)
            .invoke_async(&mut conn)
            .await?;

        let micros = ts
            .parse::<i64>()
            .map_err(|e| StoreError::corrupt(id, format!("timestamp {ts:?}: {e}")))?;
        let stored = OperationLogEntry::from_new(id, timestamp_from_micros(id, micros)?, entry);

        debug!(id, operation = %stored.operation, "Appended log entry");
        Ok(stored)
    }

    async fn history(&self) -> StoreResult<Vec<OperationLogEntry>> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.hvals(ENTRIES_KEY).await?;
        decode_entries(raw)
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .is_ok()
    }
}
