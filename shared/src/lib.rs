// shared/src/lib.rs

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not found")]
    NotFound,
    #[error("cache write failed for {key}: {reason}")]
    CacheWrite { key: String, reason: String },
    #[error("cache read failed for {key}: {reason}")]
    CacheRead { key: String, reason: String },
    #[error("count unavailable for {key}: {reason}")]
    CountUnavailable { key: String, reason: String },
    #[error("failed to publish notification: {0}")]
    BusPublish(String),
    #[error("failed to drain notifications: {0}")]
    BusDrain(String),
    #[error("failed to subscribe to notifications: {0}")]
    BusSubscribe(String),
    #[error("stream unsupported: {0}")]
    StreamUnsupported(String),
    #[error("{0}")]
    Conflict(String),
    #[error("unauthorised action")]
    Forbidden,
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("store: {0}")]
    Store(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code, safe to hand to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound => "not_found",
            Error::CacheWrite { .. } => "cache_write_failed",
            Error::CacheRead { .. } => "cache_read_failed",
            Error::CountUnavailable { .. } => "count_unavailable",
            Error::BusPublish(_) => "bus_publish_failed",
            Error::BusDrain(_) => "bus_drain_failed",
            Error::BusSubscribe(_) => "bus_subscribe_failed",
            Error::StreamUnsupported(_) => "stream_unsupported",
            Error::Conflict(_) => "conflict",
            Error::Forbidden => "forbidden",
            Error::Unauthorized => "unauthorized",
            Error::InvalidInput(_) => "invalid_input",
            Error::Store(_) => "store_error",
            Error::Internal(_) => "internal",
        }
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        Error::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtlMs(pub u64);

impl TtlMs {
    pub fn from_secs(secs: u64) -> Self {
        TtlMs(secs.saturating_mul(1000))
    }

    pub fn as_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.0)
    }

    pub fn as_secs(&self) -> u64 {
        self.0 / 1000
    }
}

pub mod config;
