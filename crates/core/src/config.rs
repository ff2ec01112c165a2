use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub realtime: RealtimeConfig,
    pub executor: ExecutorConfig,
    pub queue: QueueConfig,
    pub postgres: PostgresConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// With a profile (e.g. `PROD`), every key is first looked up as
    /// `{PROFILE}_{KEY}`, falling back to `{KEY}`. Empty string = default.
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            realtime: RealtimeConfig::from_env_profiled(p),
            executor: ExecutorConfig::from_env_profiled(p),
            queue: QueueConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:    {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  realtime:  poll={}ms, heartbeat={}s, capacity={}",
            self.realtime.poll_interval_ms,
            self.realtime.heartbeat_interval_secs,
            self.realtime.channel_capacity
        );
        tracing::info!(
            "  executor:  attempts={}, backoff={}s, timeout={}s, engine={}",
            self.executor.max_attempts,
            self.executor.retry_backoff_secs,
            self.executor.crew_timeout_secs,
            self.executor.crew_engine_url.as_deref().unwrap_or("(none)")
        );
        tracing::info!(
            "  queue:     names={:?}, concurrency={}, result_ttl={}s",
            self.queue.names,
            self.queue.concurrency,
            self.queue.result_ttl_secs
        );
        tracing::info!("  postgres:  host={}, db={}", self.postgres.host, self.postgres.database);
        tracing::info!("  storage:   data_dir={}", self.storage.data_dir.display());
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "server": { "host": self.server.host, "port": self.server.port },
            "realtime": {
                "poll_interval_ms": self.realtime.poll_interval_ms,
                "heartbeat_interval_secs": self.realtime.heartbeat_interval_secs,
                "channel_capacity": self.realtime.channel_capacity,
            },
            "executor": {
                "max_attempts": self.executor.max_attempts,
                "retry_backoff_secs": self.executor.retry_backoff_secs,
                "crew_timeout_secs": self.executor.crew_timeout_secs,
                "crew_engine_configured": self.executor.crew_engine_url.is_some(),
            },
            "queue": {
                "names": self.queue.names,
                "concurrency": self.queue.concurrency,
                "result_ttl_secs": self.queue.result_ttl_secs,
            },
            "postgres": {
                "host": self.postgres.host,
                "port": self.postgres.port,
                "database": self.postgres.database,
                "configured": self.postgres.is_configured(),
            },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 8000),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }
}

// ── Realtime (SSE / WebSocket) ────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Max wait for the next event before a keepalive frame is emitted.
    pub poll_interval_ms: u64,
    pub heartbeat_interval_secs: u64,
    /// Per-connection outbound queue bound.
    pub channel_capacity: usize,
}

/// Floors for the realtime timers; zero would spin.
const MIN_POLL_INTERVAL_MS: u64 = 10;
const MIN_HEARTBEAT_INTERVAL_SECS: u64 = 1;

impl RealtimeConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            poll_interval_ms: profiled_env_u64(p, "SSE_POLL_INTERVAL_MS", 1000)
                .max(MIN_POLL_INTERVAL_MS),
            heartbeat_interval_secs: profiled_env_u64(p, "HEARTBEAT_INTERVAL_SECS", 30)
                .max(MIN_HEARTBEAT_INTERVAL_SECS),
            channel_capacity: profiled_env_u32(p, "CONNECTION_CHANNEL_CAPACITY", 256) as usize,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            heartbeat_interval_secs: 30,
            channel_capacity: 256,
        }
    }
}

// ── Executor ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub retry_backoff_secs: u64,
    pub crew_timeout_secs: u64,
    pub crew_engine_url: Option<String>,
}

impl ExecutorConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_attempts: profiled_env_u32(p, "EXECUTION_MAX_ATTEMPTS", 3).max(1),
            retry_backoff_secs: profiled_env_u64(p, "EXECUTION_RETRY_BACKOFF_SECS", 60),
            crew_timeout_secs: profiled_env_u64(p, "CREW_TIMEOUT_SECS", 300),
            crew_engine_url: profiled_env_opt(p, "CREW_ENGINE_URL"),
        }
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn crew_timeout(&self) -> Duration {
        Duration::from_secs(self.crew_timeout_secs)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_secs: 60,
            crew_timeout_secs: 300,
            crew_engine_url: None,
        }
    }
}

// ── Task queue ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub names: Vec<String>,
    /// Worker tasks per named queue.
    pub concurrency: usize,
    /// How long finished task records stay queryable.
    pub result_ttl_secs: u64,
}

impl QueueConfig {
    fn from_env_profiled(p: &str) -> Self {
        let names = profiled_env_or(p, "QUEUE_NAMES", "executions,maintenance")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            names,
            concurrency: profiled_env_u32(p, "QUEUE_CONCURRENCY", 4).max(1) as usize,
            result_ttl_secs: profiled_env_u64(p, "QUEUE_RESULT_TTL_SECS", 3600),
        }
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            names: vec!["executions".to_string(), "maintenance".to_string()],
            concurrency: 4,
            result_ttl_secs: 3600,
        }
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_u16(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "crewstream"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_u32(p, "PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            data_dir: PathBuf::from(profiled_env_or(p, "DATA_DIR", "data")),
        }
    }

    /// Graph definitions seeded into the in-memory backend.
    pub fn graphs_file(&self) -> PathBuf {
        self.data_dir.join("graphs.json")
    }
}
