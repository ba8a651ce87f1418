//! Repository traits for multi-backend support
//!
//! The domain layer talks to storage only through these traits. Both the
//! PostgreSQL service and the in-memory store implement them.

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::types::{NewUser, PermissionRow, Role, UserOverrideRow, UserRow};

/// User lookup and the two fields the auth core is allowed to write
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRow>, DataError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRow>, DataError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRow>, DataError>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<UserRow>, DataError>;

    /// Resolve a login identifier: username, then email, then phone. First match wins.
    async fn find_by_login_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<UserRow>, DataError> {
        if let Some(user) = self.find_by_username(identifier).await? {
            return Ok(Some(user));
        }
        if let Some(user) = self.find_by_email(identifier).await? {
            return Ok(Some(user));
        }
        self.find_by_phone(identifier).await
    }

    async fn update_last_login(&self, id: &str, at: i64) -> Result<(), DataError>;

    /// Replace the password hash and bump `updated_at`
    async fn update_password_hash(&self, id: &str, hash: &str) -> Result<(), DataError>;

    /// Create a user (bootstrap seeding). Fails with `Conflict` on a taken username.
    async fn insert_user(&self, user: NewUser) -> Result<UserRow, DataError>;
}

/// Permission catalog, role grants and per-user overrides
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// Full catalog ordered by category, then name
    async fn list_permissions(&self) -> Result<Vec<PermissionRow>, DataError>;

    async fn find_permission_by_name(&self, name: &str)
    -> Result<Option<PermissionRow>, DataError>;

    async fn role_has_permission(&self, role: Role, permission_id: &str)
    -> Result<bool, DataError>;

    /// The override's `granted` flag, if an override exists
    async fn user_override(
        &self,
        user_id: &str,
        permission_id: &str,
    ) -> Result<Option<bool>, DataError>;

    async fn list_role_permissions(&self, role: Role) -> Result<Vec<PermissionRow>, DataError>;

    async fn list_user_overrides(&self, user_id: &str) -> Result<Vec<UserOverrideRow>, DataError>;

    /// Delete every grant of `role`, then insert `permission_ids`
    async fn replace_role_permissions(
        &self,
        role: Role,
        permission_ids: &[String],
    ) -> Result<(), DataError>;

    /// Insert or update an override
    async fn set_user_override(
        &self,
        user_id: &str,
        permission_id: &str,
        granted: bool,
    ) -> Result<(), DataError>;

    /// Returns `true` if an override existed
    async fn remove_user_override(
        &self,
        user_id: &str,
        permission_id: &str,
    ) -> Result<bool, DataError>;
}
