//! Attempt-limited, time-boxed one-time codes
//!
//! Challenges live in the cache service so the store behaves the same on a
//! single node (moka) and across instances (Redis). Each challenge records its
//! own logical expiry; the cache TTL is that expiry plus a grace period so a
//! late verification reports `Expired` instead of `NotFound`. Only wrong
//! guesses count against the attempt budget.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::constants::{
    CODE_MAX, CODE_MIN, MAX_OUTSTANDING_RESETS, SECRET_EXPIRY_GRACE_SECS,
};
use crate::data::cache::{CacheError, CacheKey, CacheService};
use crate::utils::crypto::constant_time_eq;

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("no code issued")]
    NotFound,

    #[error("code expired")]
    Expired,

    #[error("too many attempts")]
    TooManyAttempts,

    #[error("code mismatch")]
    Mismatch,

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Stored challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Challenge {
    code: String,
    expires_at_ms: i64,
    attempts: u32,
    user_id: Option<String>,
}

/// A successfully verified challenge
#[derive(Debug, Clone)]
pub struct VerifiedCode {
    pub user_id: Option<String>,
}

/// Issues and verifies six-digit codes
pub struct SecretStore {
    cache: Arc<CacheService>,
    ttl: Duration,
    max_attempts: u32,
}

impl SecretStore {
    pub fn new(cache: Arc<CacheService>, ttl: Duration, max_attempts: u32) -> Self {
        Self {
            cache,
            ttl,
            max_attempts,
        }
    }

    /// Logical lifetime of an issued code
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a code under `key`, replacing any outstanding one
    pub async fn issue(&self, key: &str, user_id: Option<&str>) -> Result<String, SecretError> {
        self.issue_at(key, user_id, now_ms()).await
    }

    /// Check a code and delete it on success
    pub async fn verify(&self, key: &str, code: &str) -> Result<VerifiedCode, SecretError> {
        self.check_at(key, code, now_ms(), true).await
    }

    /// Check a code but keep it for one later consuming verification
    pub async fn verify_without_consuming(
        &self,
        key: &str,
        code: &str,
    ) -> Result<VerifiedCode, SecretError> {
        self.check_at(key, code, now_ms(), false).await
    }

    /// Issue a password-reset code
    ///
    /// Keys embed the issue instant, so several outstanding resets for one
    /// identifier coexist. At most `MAX_OUTSTANDING_RESETS` are kept; the
    /// oldest are dropped first.
    pub async fn issue_reset(&self, identifier: &str, user_id: &str) -> Result<String, SecretError> {
        self.prune_resets(identifier).await?;
        let now = now_ms();
        self.issue_at(&CacheKey::reset(identifier, now), Some(user_id), now)
            .await
    }

    /// Verify a reset code among every outstanding reset for `identifier`
    ///
    /// The entry whose code and user both match is checked under the usual
    /// rules. If none matches, each candidate belonging to the user is charged
    /// one attempt so guessing exhausts outstanding codes.
    pub async fn verify_reset(
        &self,
        identifier: &str,
        user_id: &str,
        code: &str,
        consume: bool,
    ) -> Result<VerifiedCode, SecretError> {
        let now = now_ms();
        let keys = self.reset_keys(identifier).await?;

        let mut candidates = Vec::new();
        for key in keys {
            let Some(challenge) = self.cache.get::<Challenge>(&key).await? else {
                continue;
            };
            if challenge.user_id.as_deref() != Some(user_id) {
                continue;
            }
            if constant_time_eq(&challenge.code, code) {
                return self.check_at(&key, code, now, consume).await;
            }
            candidates.push(key);
        }

        if candidates.is_empty() {
            return Err(SecretError::NotFound);
        }
        for key in &candidates {
            match self.check_at(key, code, now, false).await {
                Err(SecretError::Cache(e)) => return Err(e.into()),
                _ => continue,
            }
        }
        Err(SecretError::Mismatch)
    }

    async fn issue_at(
        &self,
        key: &str,
        user_id: Option<&str>,
        now_ms: i64,
    ) -> Result<String, SecretError> {
        let code = generate_code();
        let challenge = Challenge {
            code: code.clone(),
            expires_at_ms: now_ms + self.ttl.as_millis() as i64,
            attempts: 0,
            user_id: user_id.map(str::to_string),
        };
        let storage_ttl = self.ttl + Duration::from_secs(SECRET_EXPIRY_GRACE_SECS);
        self.cache.set(key, &challenge, Some(storage_ttl)).await?;
        tracing::debug!(key, "Code issued");
        Ok(code)
    }

    async fn check_at(
        &self,
        key: &str,
        code: &str,
        now_ms: i64,
        consume: bool,
    ) -> Result<VerifiedCode, SecretError> {
        let mut challenge: Challenge = self
            .cache
            .get(key)
            .await?
            .ok_or(SecretError::NotFound)?;

        if now_ms > challenge.expires_at_ms {
            self.cache.delete(key).await?;
            return Err(SecretError::Expired);
        }

        if challenge.attempts >= self.max_attempts {
            self.cache.delete(key).await?;
            tracing::debug!(key, "Code discarded after too many attempts");
            return Err(SecretError::TooManyAttempts);
        }

        if !constant_time_eq(&challenge.code, code) {
            challenge.attempts += 1;
            // The entry keeps its original TTL; a concurrently consumed code stays gone
            self.cache.replace(key, &challenge).await?;
            return Err(SecretError::Mismatch);
        }

        if consume {
            self.cache.delete(key).await?;
        }
        Ok(VerifiedCode {
            user_id: challenge.user_id,
        })
    }

    /// Reset keys for `identifier`, oldest first
    async fn reset_keys(&self, identifier: &str) -> Result<Vec<String>, SecretError> {
        let mut keys = self
            .cache
            .scan_keys(&CacheKey::reset_pattern(identifier))
            .await?;
        keys.sort_by_key(|key| CacheKey::reset_issued_at(key));
        Ok(keys)
    }

    /// Make room for one more reset code under `identifier`
    async fn prune_resets(&self, identifier: &str) -> Result<(), SecretError> {
        let keys = self.reset_keys(identifier).await?;
        let excess = (keys.len() + 1).saturating_sub(MAX_OUTSTANDING_RESETS);
        for key in keys.iter().take(excess) {
            self.cache.delete(key).await?;
        }
        if excess > 0 {
            tracing::debug!(dropped = excess, "Oldest reset codes discarded");
        }
        Ok(())
    }
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX).to_string()
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
