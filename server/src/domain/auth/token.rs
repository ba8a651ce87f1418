//! Signed session tokens (HS256 JWT)

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::data::types::{Role, UserRow};

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("session token has expired")]
    Expired,

    #[error("invalid session token signature")]
    InvalidSignature,

    #[error("invalid session token: {0}")]
    Invalid(String),

    #[error("failed to sign session token: {0}")]
    Signing(String),
}

/// Session token payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    /// Unique per token so two tokens signed in the same second differ
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub claims: Claims,
}

pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl TokenSigner {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs: ttl_secs as i64,
        }
    }

    /// Token lifetime in seconds
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Sign a fresh token for `user`
    pub fn sign(&self, user: &UserRow) -> Result<SignedToken, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            iat: now,
            exp: now + self.ttl_secs,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok(SignedToken { token, claims })
    }

    /// Verify signature and expiry
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        self.decode_with(token, &validation)
    }

    /// Best-effort decode for logout: the signature must hold, expiry is ignored.
    /// Never fails; problems yield `None`.
    pub fn decode(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        self.decode_with(token, &validation).ok()
    }

    fn decode_with(&self, token: &str, validation: &Validation) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserRow {
        UserRow {
            id: "u1".to_string(),
            username: "admin".to_string(),
            email: Some("admin@x.com".to_string()),
            phone: None,
            role: Role::Admin,
            password_hash: None,
            is_active: true,
            last_login_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn signer() -> TokenSigner {
        TokenSigner::new(&[7u8; 32], 3600)
    }

    #[test]
    fn test_sign_and_validate() {
        let signer = signer();
        let signed = signer.sign(&user()).unwrap();
        let claims = signer.validate(&signed.token).unwrap();

        assert_eq!(claims, signed.claims);
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.email.as_deref(), Some("admin@x.com"));
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_role_serialized_in_stored_form() {
        let signed = signer().sign(&user()).unwrap();
        let json = serde_json::to_value(&signed.claims).unwrap();
        assert_eq!(json["role"], "ADMIN");
    }

    #[test]
    fn test_wrong_key_rejected() {
        let signed = signer().sign(&user()).unwrap();
        let other = TokenSigner::new(&[8u8; 32], 3600);
        assert!(matches!(
            other.validate(&signed.token),
            Err(TokenError::InvalidSignature)
        ));
        assert!(other.decode(&signed.token).is_none());
    }

    #[test]
    fn test_expired_token() {
        let signer = signer();
        let mut claims = signer.sign(&user()).unwrap().claims;
        claims.iat -= 7200;
        claims.exp -= 7200;
        let token = encode(&Header::new(Algorithm::HS256), &claims, &signer.encoding).unwrap();

        assert!(matches!(signer.validate(&token), Err(TokenError::Expired)));
        // Logout still reads an expired token
        assert_eq!(signer.decode(&token).unwrap().exp, claims.exp);
    }

    #[test]
    fn test_garbage_token() {
        let signer = signer();
        assert!(matches!(
            signer.validate("not-a-jwt"),
            Err(TokenError::Invalid(_))
        ));
        assert!(signer.decode("not-a-jwt").is_none());
    }

    #[test]
    fn test_unique_jti() {
        let signer = signer();
        let a = signer.sign(&user()).unwrap();
        let b = signer.sign(&user()).unwrap();
        assert_ne!(a.claims.jti, b.claims.jti);
        assert_ne!(a.token, b.token);
    }
}
