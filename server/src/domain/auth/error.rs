//! Auth core error taxonomy

use thiserror::Error;

use super::blacklist::BlacklistError;
use super::password::PasswordError;
use super::secrets::SecretError;
use super::token::TokenError;
use crate::data::DataError;
use crate::data::cache::CacheError;

/// Generic message for every identity failure. Never reveals which check failed.
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Errors surfaced by the auth session manager and permission resolver
///
/// The first four variants are domain outcomes and pass through to the HTTP
/// boundary with their own status. `Internal` carries diagnostic detail that
/// is logged but never shown to clients.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn unauthorized() -> Self {
        Self::Unauthorized(INVALID_CREDENTIALS.to_string())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<DataError> for AuthError {
    fn from(e: DataError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<CacheError> for AuthError {
    fn from(e: CacheError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<BlacklistError> for AuthError {
    fn from(e: BlacklistError) -> Self {
        Self::Internal(e.to_string())
    }
}

/// A token that fails validation is an authentication failure
impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(msg) => Self::Internal(msg),
            TokenError::Expired | TokenError::InvalidSignature | TokenError::Invalid(_) => {
                Self::unauthorized()
            }
        }
    }
}

/// Code verification failures collapse to a generic `Unauthorized`; storage
/// failures stay internal.
impl From<SecretError> for AuthError {
    fn from(e: SecretError) -> Self {
        match e {
            SecretError::Cache(e) => Self::Internal(e.to_string()),
            SecretError::NotFound
            | SecretError::Expired
            | SecretError::TooManyAttempts
            | SecretError::Mismatch => Self::Unauthorized("Invalid or expired code".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_errors_are_unauthorized() {
        for e in [
            SecretError::NotFound,
            SecretError::Expired,
            SecretError::TooManyAttempts,
            SecretError::Mismatch,
        ] {
            assert!(matches!(AuthError::from(e), AuthError::Unauthorized(_)));
        }
        let cache = SecretError::Cache(CacheError::Connection("down".into()));
        assert!(matches!(AuthError::from(cache), AuthError::Internal(_)));
    }

    #[test]
    fn test_token_errors_are_generic() {
        let err = AuthError::from(TokenError::Expired);
        assert_eq!(err.to_string(), INVALID_CREDENTIALS);
    }
}
