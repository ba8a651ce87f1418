//! Cache backend trait and errors

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache configuration error: {0}")]
    Config(String),

    #[error("Cache connection error: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Redis error: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
}

impl CacheError {
    /// The store could not be reached, as opposed to holding bad data
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Pool(_))
            || matches!(self, Self::Redis(e) if e.is_io_error() || e.is_timeout())
    }
}

/// Storage for short-lived auth state
///
/// Holds three key families (see `CacheKey`): login OTP challenges, reset
/// challenges and revoked-token markers. A revoked-token marker must stay
/// readable until its TTL runs out; backends may evict challenges under
/// memory pressure but never revocations.
///
/// Single-key operations are atomic. `replace` rewrites a challenge in place
/// without extending its lifetime and never recreates a consumed one.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store a value, replacing any previous one and its TTL
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>)
    -> Result<(), CacheError>;

    /// Overwrite an existing value, keeping its remaining TTL
    ///
    /// Returns `false` and writes nothing when the key is absent.
    async fn replace(&self, key: &str, value: Vec<u8>) -> Result<bool, CacheError>;

    /// Returns `true` if the key existed
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;

    /// List keys matching a glob pattern (`*`, `?` and `\` escapes)
    ///
    /// O(n) for the memory backend, SCAN for Redis
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    async fn health_check(&self) -> Result<(), CacheError>;

    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_errors() {
        assert!(CacheError::Connection("refused".into()).is_unavailable());
        assert!(!CacheError::Serialization("bad msgpack".into()).is_unavailable());
        assert!(!CacheError::Config("redis_url required".into()).is_unavailable());
    }

    #[test]
    fn test_error_display() {
        let err = CacheError::Config("redis_url required".to_string());
        assert_eq!(
            err.to_string(),
            "Cache configuration error: redis_url required"
        );
    }
}
