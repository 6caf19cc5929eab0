use crate::TtlMs;
use std::time::Duration;
use tracing::warn;

/// Which backend the fast store and the notification bus run on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FastStore {
    InProcess,
    Redis(String), // connection url
}

/// Where likes and comments are persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Database {
    InMemory,
    Postgres { url: String, max_connections: u32 },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub fast_store: FastStore,
    pub database: Database,
    pub counter_ttl: TtlMs,
    pub notification_queue_cap: usize,
    pub notification_queue_ttl: TtlMs,
    pub sse_keepalive: Duration,
    pub sse_idle_timeout: Option<Duration>,
    pub session_ttl: TtlMs,
    pub session_secret: String,
    pub allowed_origins: Vec<String>,
}

impl Config {
    const DEFAULT_HOST: &str = "0.0.0.0";
    const DEFAULT_HTTP_PORT: u16 = 8080;
    const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
    const DEFAULT_COUNTER_TTL_SECS: u64 = 86_400;
    const DEFAULT_QUEUE_CAP: usize = 100;
    const DEFAULT_QUEUE_TTL_SECS: u64 = 30 * 86_400;
    const DEFAULT_KEEPALIVE_SECS: u64 = 15;
    const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
    const DEFAULT_SESSION_SECRET: &str = "skillnet-dev-secret";

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults
    /// for anything missing or unparsable.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str, default: u64| -> u64 {
            match var(key) {
                Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                    warn!("{key}={raw:?} is not a valid number, using {default}");
                    default
                }),
                None => default,
            }
        };

        let fast_store = match var("SKILLNET_REDIS_URL") {
            Some(url) => FastStore::Redis(url),
            None => FastStore::InProcess,
        };

        let database = match var("SKILLNET_DATABASE_URL") {
            Some(url) => Database::Postgres {
                url,
                max_connections: u32::try_from(parsed(
                    "SKILLNET_DATABASE_MAX_CONNECTIONS",
                    Self::DEFAULT_DB_MAX_CONNECTIONS as u64,
                ))
                .unwrap_or(Self::DEFAULT_DB_MAX_CONNECTIONS)
                .max(1),
            },
            None => Database::InMemory,
        };

        let idle_secs = parsed("SKILLNET_SSE_IDLE_TIMEOUT_SECS", 0);

        Self {
            host: var("SKILLNET_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string()),
            http_port: u16::try_from(parsed(
                "SKILLNET_HTTP_PORT",
                Self::DEFAULT_HTTP_PORT as u64,
            ))
            .unwrap_or(Self::DEFAULT_HTTP_PORT),
            fast_store,
            database,
            counter_ttl: TtlMs::from_secs(parsed(
                "SKILLNET_COUNTER_TTL_SECS",
                Self::DEFAULT_COUNTER_TTL_SECS,
            )),
            notification_queue_cap: parsed(
                "SKILLNET_NOTIFICATION_QUEUE_CAP",
                Self::DEFAULT_QUEUE_CAP as u64,
            )
            .max(1) as usize,
            notification_queue_ttl: TtlMs::from_secs(parsed(
                "SKILLNET_NOTIFICATION_QUEUE_TTL_SECS",
                Self::DEFAULT_QUEUE_TTL_SECS,
            )),
            sse_keepalive: Duration::from_secs(
                parsed("SKILLNET_SSE_KEEPALIVE_SECS", Self::DEFAULT_KEEPALIVE_SECS).max(1),
            ),
            sse_idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
            session_ttl: TtlMs::from_secs(parsed(
                "SKILLNET_SESSION_TTL_SECS",
                Self::DEFAULT_SESSION_TTL_SECS,
            )),
            session_secret: var("SKILLNET_SESSION_SECRET").unwrap_or_else(|| {
                warn!("SKILLNET_SESSION_SECRET not set, using the development secret");
                warn!("⚠️  WARNING: Set a real session secret before exposing this server!");
                Self::DEFAULT_SESSION_SECRET.to_string()
            }),
            allowed_origins: var("SKILLNET_ALLOWED_ORIGINS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
