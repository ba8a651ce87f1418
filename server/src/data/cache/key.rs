//! Type-safe cache key builder with versioning

use crate::core::constants::CACHE_KEY_VERSION;

/// Type-safe cache key builder
///
/// All keys are prefixed with a version (e.g., "v1:") so stored challenges
/// can be invalidated wholesale on format changes.
pub struct CacheKey;

impl CacheKey {
    // =========================================================================
    // One-time codes
    // =========================================================================

    /// Login OTP challenge for a username (one outstanding code per user)
    pub fn otp(username: &str) -> String {
        format!("{}:otp:{}", CACHE_KEY_VERSION, username)
    }

    /// Password reset challenge issued for an identifier at a given instant
    pub fn reset(identifier: &str, issued_at_ms: i64) -> String {
        format!("{}:reset:{}:{}", CACHE_KEY_VERSION, identifier, issued_at_ms)
    }

    /// SCAN/glob pattern matching every reset challenge for an identifier
    ///
    /// The identifier is user input, so glob metacharacters are escaped.
    pub fn reset_pattern(identifier: &str) -> String {
        format!(
            "{}:reset:{}:*",
            CACHE_KEY_VERSION,
            escape_glob(identifier)
        )
    }

    /// Issue instant embedded in a reset key, used to order outstanding codes
    pub fn reset_issued_at(key: &str) -> Option<i64> {
        key.rsplit_once(':')?.1.parse().ok()
    }

    // =========================================================================
    // Token blacklist
    // =========================================================================

    /// Revoked-token marker keyed by the keyed hash of the token
    pub fn blacklist(token_hash: &str) -> String {
        format!("{}:blacklist:{}", CACHE_KEY_VERSION, token_hash)
    }

    /// Whether `key` marks a revoked token. These entries must outlive
    /// capacity pressure, so backends keep them apart from challenges.
    pub fn is_revocation(key: &str) -> bool {
        key.strip_prefix(CACHE_KEY_VERSION)
            .is_some_and(|rest| rest.starts_with(":blacklist:"))
    }
}

/// Escape Redis glob metacharacters so the input matches literally
fn escape_glob(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
