//! In-memory cache implementation using moka
//!
//! Entries carry their own TTL. Challenges live in a size-bounded cache;
//! revoked-token markers live in a second cache with no capacity limit so
//! they are only ever dropped by expiry.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};

use super::backend::{CacheBackend, CacheError};
use super::key::CacheKey;
use crate::core::config::CacheConfig;

/// Cache entry with data and metadata
#[derive(Clone)]
struct CacheEntry {
    data: Vec<u8>,
    ttl: Option<Duration>,
    created_at: Instant,
}

/// Per-entry expiry tracking for variable TTLs
struct VariableTtlExpiry;

impl Expiry<String, CacheEntry> for VariableTtlExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    // `replace` keeps `created_at`, so the entry's original deadline holds
    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value
            .ttl
            .map(|ttl| ttl.saturating_sub(updated_at.saturating_duration_since(value.created_at)))
    }

    fn expire_after_read(
        &self,
        _key: &String,
        _value: &CacheEntry,
        _read_at: Instant,
        duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        duration_until_expiry
    }
}

/// In-memory cache implementation (single process only)
pub struct InMemoryCache {
    challenges: Cache<String, CacheEntry>,
    revocations: Cache<String, CacheEntry>,
}

impl InMemoryCache {
    pub fn new(config: &CacheConfig) -> Self {
        let challenges = Cache::builder()
            .max_capacity(config.max_entries)
            .initial_capacity((config.max_entries as usize / 4).min(10_000))
            .expire_after(VariableTtlExpiry)
            .build();
        // Unbounded: a marker leaves only when the token it revokes expires
        let revocations = Cache::builder().expire_after(VariableTtlExpiry).build();

        Self {
            challenges,
            revocations,
        }
    }

    fn store(&self, key: &str) -> &Cache<String, CacheEntry> {
        if CacheKey::is_revocation(key) {
            &self.revocations
        } else {
            &self.challenges
        }
    }
}

/// Match a key against a Redis-style glob pattern.
///
/// Supports `*`, `?` and backslash escapes. Other characters match literally.
pub(crate) fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0usize, 0usize);
    // Backtrack point: position after the last `*` and the key index it matched up to
    let mut star: Option<(usize, usize)> = None;

    while k < key.len() {
        if p < pattern.len() {
            match pattern[p] {
                '*' => {
                    star = Some((p + 1, k));
                    p += 1;
                    continue;
                }
                '?' => {
                    p += 1;
                    k += 1;
                    continue;
                }
                '\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == key[k] {
                        p += 2;
                        k += 1;
                        continue;
                    }
                }
                c if c == key[k] => {
                    p += 1;
                    k += 1;
                    continue;
                }
                _ => {}
            }
        }

        match star {
            Some((star_p, star_k)) => {
                p = star_p;
                k = star_k + 1;
                star = Some((star_p, star_k + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.store(key).get(key).await.map(|entry| entry.data))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry {
            data: value,
            ttl,
            created_at: Instant::now(),
        };
        self.store(key).insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn replace(&self, key: &str, value: Vec<u8>) -> Result<bool, CacheError> {
        let result = self
            .store(key)
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) => {
                        let old = entry.into_value();
                        Op::Put(CacheEntry {
                            data: value,
                            ttl: old.ttl,
                            created_at: old.created_at,
                        })
                    }
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        Ok(matches!(result, CompResult::ReplacedWith(_)))
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.store(key).remove(key).await.is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.store(key).contains_key(key))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        if let Some(entry) = self.store(key).get(key).await
            && let Some(ttl) = entry.ttl
            && let Some(remaining) = ttl.checked_sub(entry.created_at.elapsed())
            && remaining > Duration::ZERO
        {
            return Ok(Some(remaining));
        }
        Ok(None)
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        // moka iter returns Arc<String> keys and skips expired entries
        let keys = self
            .challenges
            .iter()
            .chain(self.revocations.iter())
            .filter(|(k, _)| glob_match(pattern, k))
            .map(|(k, _)| (*k).clone())
            .collect();
        Ok(keys)
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        // In-memory is always healthy
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
