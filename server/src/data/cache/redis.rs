//! Redis-compatible cache backend using deadpool-redis
//!
//! Needed when several RxGate instances must see the same OTP challenges,
//! reset codes and revoked tokens. Accepts `redis://`, `rediss://` and
//! `redis+sentinel://` URLs; Valkey and Dragonfly work as drop-ins.
//!
//! Revoked-token markers must not be evicted before their TTL. Redis decides
//! eviction server-side, so the connection check warns when `maxmemory-policy`
//! would allow it.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{AsyncCommands, cmd};
use deadpool_redis::{Config, Connection, Pool, Runtime};

use super::backend::{CacheBackend, CacheError};

pub struct RedisCache {
    pool: Pool,
    name: &'static str,
}

impl RedisCache {
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let sanitized_url = sanitize_redis_url(redis_url);
        let name = backend_name_for(redis_url);

        let mut config = Config::from_url(redis_url);
        config.pool = Some(deadpool_redis::PoolConfig {
            max_size: 32,
            timeouts: deadpool_redis::Timeouts {
                wait: Some(Duration::from_secs(5)),
                create: Some(Duration::from_secs(5)),
                recycle: Some(Duration::from_secs(5)),
            },
            ..Default::default()
        });
        let pool = config.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            CacheError::Connection(format!(
                "Failed to create Redis pool for {sanitized_url}: {e}"
            ))
        })?;

        let mut conn = pool.get().await.map_err(|e| {
            CacheError::Connection(format!("Failed to connect to {sanitized_url}: {e}"))
        })?;
        ping(&mut conn).await.map_err(|e| {
            CacheError::Connection(format!("Redis PING failed for {sanitized_url}: {e}"))
        })?;
        check_eviction_policy(&mut conn).await;

        tracing::debug!(url = %sanitized_url, backend = name, "Redis cache connected");
        Ok(Self { pool, name })
    }
}

async fn ping(conn: &mut Connection) -> Result<(), CacheError> {
    cmd("PING").query_async::<String>(conn).await?;
    Ok(())
}

/// Warn if the server may evict keys that still carry a TTL
///
/// Managed services often block `CONFIG`; that is only logged.
async fn check_eviction_policy(conn: &mut Connection) {
    let reply: Result<Vec<String>, _> = cmd("CONFIG")
        .arg("GET")
        .arg("maxmemory-policy")
        .query_async(conn)
        .await;
    match reply {
        Ok(pair) => match pair.get(1) {
            Some(policy) if !eviction_keeps_revocations(policy) => tracing::warn!(
                policy = %policy,
                "Redis may evict revoked-token entries under memory pressure; set maxmemory-policy to noeviction"
            ),
            Some(_) => {}
            None => tracing::debug!("Redis returned no maxmemory-policy"),
        },
        Err(e) => tracing::debug!(error = %e, "Could not read Redis maxmemory-policy"),
    }
}

/// Policies under which a TTL-bearing key is never evicted early.
/// `volatile-*` policies target exactly those keys.
fn eviction_keeps_revocations(policy: &str) -> bool {
    policy == "noeviction"
}

fn backend_name_for(url: &str) -> &'static str {
    if url.starts_with("redis+sentinel://") || url.starts_with("rediss+sentinel://") {
        "redis-sentinel"
    } else {
        "redis"
    }
}

/// Mask the password in a Redis URL for logging
fn sanitize_redis_url(url: &str) -> String {
    // rfind: passwords may contain '@'
    if let Some(at_pos) = url.rfind('@') {
        let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
        if let Some(colon_pos) = url[scheme_end..at_pos].find(':') {
            let abs_colon = scheme_end + colon_pos;
            return format!("{}***{}", &url[..=abs_colon], &url[at_pos..]);
        }
    }
    url.to_string()
}

/// PSETEX argument. Sub-millisecond TTLs round up to 1ms, never to "no expiry".
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Interpret a PTTL reply (-2 missing, -1 no TTL)
fn parse_pttl(reply: i64) -> Option<Duration> {
    u64::try_from(reply)
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.pool.get().await?;
        Ok(conn.get(key).await?)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        match ttl {
            Some(ttl) => {
                let _: () = cmd("PSETEX")
                    .arg(key)
                    .arg(ttl_millis(ttl))
                    .arg(value)
                    .query_async(&mut conn)
                    .await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn replace(&self, key: &str, value: Vec<u8>) -> Result<bool, CacheError> {
        let mut conn = self.pool.get().await?;
        // XX: only if present; KEEPTTL: do not extend a challenge's deadline
        let reply: Option<String> = cmd("SET")
            .arg(key)
            .arg(value)
            .arg("XX")
            .arg("KEEPTTL")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.pool.get().await?;
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.pool.get().await?;
        Ok(conn.exists(key).await?)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let mut conn = self.pool.get().await?;
        let reply: i64 = cmd("PTTL").arg(key).query_async(&mut conn).await?;
        Ok(parse_pttl(reply))
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.pool.get().await?;
        let mut found = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;
            found.extend(keys);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        // SCAN may repeat keys across iterations
        found.sort();
        found.dedup();
        Ok(found)
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        ping(&mut conn).await
    }

    fn backend_name(&self) -> &'static str {
        self.name
    }
}
