//! Server configuration.
//!
//! Loaded from environment variables with fallback to defaults.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket the HTTP server binds to
    pub listen_addr: SocketAddr,

    /// `sqlite://<path>`, `sqlite::memory:` or `redis://host:port/db`
    pub database_url: String,

    /// SQLite pool size
    pub db_max_connections: u32,

    /// Directory with the dashboard's static build; `None` disables serving
    pub static_dir: Option<String>,

    /// `None` = any origin
    pub cors_allowed_origins: Option<Vec<String>>,

    /// Tick of the `/api/metrics/stream` SSE feed
    pub metrics_stream_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            database_url: "sqlite://operations.db".to_string(),
            db_max_connections: 5,
            static_dir: Some("static".to_string()),
            cors_allowed_origins: None,
            metrics_stream_interval: Duration::from_millis(500),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key → value source (the process
    /// environment in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let listen_addr = match lookup("LISTEN_ADDR") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("LISTEN_ADDR".to_string()))?,
            None => defaults.listen_addr,
        };

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);
        if database_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired("DATABASE_URL".to_string()));
        }

        let db_max_connections: u32 = match lookup("DB_MAX_CONNECTIONS") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            None => defaults.db_max_connections,
        };
        if db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        let static_dir = match lookup("STATIC_DIR") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(v),
            None => defaults.static_dir,
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS").and_then(|v| {
            let origins: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
            if origins.is_empty() || origins.iter().any(|o| o == "*") {
                None
            } else {
                Some(origins)
            }
        });

        let interval_ms: u64 = match lookup("METRICS_STREAM_INTERVAL_MS") {
            Some(v) => v.parse().map_err(|_| {
                ConfigError::InvalidValue("METRICS_STREAM_INTERVAL_MS".to_string())
            })?,
            None => defaults.metrics_stream_interval.as_millis() as u64,
        };
        if !(100..=60_000).contains(&interval_ms) {
            return Err(ConfigError::OutOfRange {
                key: "METRICS_STREAM_INTERVAL_MS".to_string(),
                min: 100,
                max: 60_000,
            });
        }

        Ok(ServerConfig {
            listen_addr,
            database_url,
            db_max_connections,
            static_dir,
            cors_allowed_origins,
            metrics_stream_interval: Duration::from_millis(interval_ms),
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("{key} must be between {min} and {max}")]
    OutOfRange { key: String, min: u64, max: u64 },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
