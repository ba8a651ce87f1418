//! Authenticated request context

use crate::data::types::Role;
use crate::domain::auth::Claims;

/// Identity attached to a request by `require_auth`
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    /// Token expiry (Unix seconds)
    pub expires_at: i64,
}

impl AuthContext {
    pub fn is_super_admin(&self) -> bool {
        self.role.is_super_admin()
    }
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
            email: claims.email,
            role: claims.role,
            expires_at: claims.exp,
        }
    }
}
