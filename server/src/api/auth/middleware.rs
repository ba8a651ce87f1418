//! Authentication middleware

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;

use super::context::AuthContext;
use crate::api::types::ApiError;
use crate::core::constants::BEARER_PREFIX;
use crate::domain::auth::token::TokenError;
use crate::domain::auth::{AuthCore, PermissionResolver, TokenBlacklist, TokenSigner};

/// Shared auth state for middleware
#[derive(Clone)]
pub struct AuthState {
    pub signer: Arc<TokenSigner>,
    pub blacklist: Arc<TokenBlacklist>,
    /// Injected for the permission guards
    pub permissions: Arc<PermissionResolver>,
}

impl From<&AuthCore> for AuthState {
    fn from(core: &AuthCore) -> Self {
        Self {
            signer: core.signer.clone(),
            blacklist: core.blacklist.clone(),
            permissions: core.permissions.clone(),
        }
    }
}

/// Bearer token from the Authorization header, if present and non-empty
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authentication middleware
///
/// Revoked tokens are rejected before the signature is checked.
///
/// Injects into request extensions:
/// - `AuthContext` - identity decoded from the token
/// - `Arc<PermissionResolver>` - for guard extractors
pub async fn require_auth(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .map(str::to_string)
        .ok_or_else(|| ApiError::unauthorized("AUTH_REQUIRED", "Authentication required"))?;

    if state.blacklist.is_blacklisted(&token).await {
        tracing::debug!("Rejected revoked token");
        return Err(ApiError::unauthorized(
            "TOKEN_REVOKED",
            "Session has been revoked",
        ));
    }

    let claims = state.signer.validate(&token).map_err(|e| match e {
        TokenError::Expired => ApiError::unauthorized("TOKEN_EXPIRED", "Session has expired"),
        other => {
            tracing::debug!(error = %other, "Token validation failed");
            ApiError::unauthorized("TOKEN_INVALID", "Invalid session token")
        }
    })?;

    request.extensions_mut().insert(AuthContext::from(claims));
    request.extensions_mut().insert(state.permissions.clone());

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);
    }
}
