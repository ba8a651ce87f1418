//! Revoked session tokens
//!
//! Tokens are stored as an HMAC under a key derived from the signing secret.
//! The hash is deterministic, so a lookup is a single `EXISTS` instead of a
//! scan over every revoked entry.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::data::cache::{CacheError, CacheKey, CacheService};
use crate::utils::crypto::{derive_key, hmac_sha256_hex};

const BLACKLIST_KEY_PURPOSE: &str = "token-blacklist";

#[derive(Error, Debug)]
pub enum BlacklistError {
    #[error("token blacklist unavailable: {0}")]
    Cache(#[from] CacheError),
}

pub struct TokenBlacklist {
    cache: Arc<CacheService>,
    key: Vec<u8>,
}

impl TokenBlacklist {
    pub fn new(cache: Arc<CacheService>, signing_secret: &[u8]) -> Self {
        Self {
            cache,
            key: derive_key(signing_secret, BLACKLIST_KEY_PURPOSE),
        }
    }

    /// Revoke `token` until `expires_at` (epoch seconds)
    ///
    /// Tokens that are already expired are skipped: expiry validation
    /// rejects them without a blacklist entry.
    pub async fn add(&self, token: &str, expires_at: i64) -> Result<(), BlacklistError> {
        let ttl = expires_at - chrono::Utc::now().timestamp();
        if ttl <= 0 {
            return Ok(());
        }
        self.cache
            .set_raw(
                &self.cache_key(token),
                vec![1],
                Some(Duration::from_secs(ttl as u64)),
            )
            .await?;
        tracing::debug!(ttl_secs = ttl, "Token blacklisted");
        Ok(())
    }

    /// Whether `token` was revoked. Storage errors count as revoked.
    pub async fn is_blacklisted(&self, token: &str) -> bool {
        match self.cache.exists(&self.cache_key(token)).await {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    unavailable = e.is_unavailable(),
                    "Blacklist lookup failed, rejecting token"
                );
                true
            }
        }
    }

    fn cache_key(&self, token: &str) -> String {
        CacheKey::blacklist(&hmac_sha256_hex(&self.key, token.as_bytes()))
    }
}
