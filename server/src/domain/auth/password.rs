//! Password hashing

use async_trait::async_trait;
use thiserror::Error;

const BCRYPT_PREFIX: &str = "$2";

#[derive(Error, Debug)]
pub enum PasswordError {
    /// Stored hash is not a bcrypt hash (corrupt or legacy row)
    #[error("unsupported password hash format")]
    UnsupportedFormat,

    #[error("password hashing failed: {0}")]
    Hash(String),
}

#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, password: &str) -> Result<String, PasswordError>;

    /// Compare `password` with `hash`. A wrong password is `Ok(false)`.
    async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError>;
}

/// bcrypt on the blocking pool
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

/// Whether `hash` looks like something bcrypt can check
pub fn is_supported_hash(hash: &str) -> bool {
    hash.starts_with(BCRYPT_PREFIX)
}

#[async_trait]
impl PasswordHasher for BcryptHasher {
    async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| PasswordError::Hash(e.to_string()))?
            .map_err(|e| PasswordError::Hash(e.to_string()))
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        if !is_supported_hash(hash) {
            return Err(PasswordError::UnsupportedFormat);
        }
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| PasswordError::Hash(e.to_string()))?
            .map_err(|e| PasswordError::Hash(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hasher = BcryptHasher::new(4);
        let hash = hasher.hash("correct horse").await.unwrap();
        assert!(is_supported_hash(&hash));
        assert!(hasher.verify("correct horse", &hash).await.unwrap());
        assert!(!hasher.verify("wrong horse", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_legacy_hash_rejected() {
        let hasher = BcryptHasher::new(4);
        let result = hasher
            .verify("pw", "5f4dcc3b5aa765d61d8327deb882cf99")
            .await;
        assert!(matches!(result, Err(PasswordError::UnsupportedFormat)));
    }

    #[tokio::test]
    async fn test_corrupt_bcrypt_hash_is_error() {
        let hasher = BcryptHasher::new(4);
        let result = hasher.verify("pw", "$2b$04$truncated").await;
        assert!(matches!(result, Err(PasswordError::Hash(_))));
    }
}
