//! Repository trait implementations for PostgreSQL
//!
//! Implements the data-layer traits for `Arc<PostgresService>` by delegating
//! to the query functions in `repositories`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::data::error::DataError;
use crate::data::traits::{PermissionRepository, UserRepository};
use crate::data::types::{NewUser, PermissionRow, Role, UserOverrideRow, UserRow};

use super::PostgresService;
use super::repositories::{permission, user};

#[async_trait]
impl UserRepository for Arc<PostgresService> {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRow>, DataError> {
        user::find_by_id(self.pool(), id).await.map_err(Into::into)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRow>, DataError> {
        user::find_by_username(self.pool(), username)
            .await
            .map_err(Into::into)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRow>, DataError> {
        user::find_by_email(self.pool(), email)
            .await
            .map_err(Into::into)
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<UserRow>, DataError> {
        user::find_by_phone(self.pool(), phone)
            .await
            .map_err(Into::into)
    }

    async fn update_last_login(&self, id: &str, at: i64) -> Result<(), DataError> {
        user::update_last_login(self.pool(), id, at)
            .await
            .map_err(Into::into)
    }

    async fn update_password_hash(&self, id: &str, hash: &str) -> Result<(), DataError> {
        user::update_password_hash(self.pool(), id, hash)
            .await
            .map_err(Into::into)
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<UserRow, DataError> {
        user::insert_user(self.pool(), new_user)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl PermissionRepository for Arc<PostgresService> {
    async fn list_permissions(&self) -> Result<Vec<PermissionRow>, DataError> {
        permission::list_permissions(self.pool())
            .await
            .map_err(Into::into)
    }

    async fn find_permission_by_name(
        &self,
        name: &str,
    ) -> Result<Option<PermissionRow>, DataError> {
        permission::find_permission_by_name(self.pool(), name)
            .await
            .map_err(Into::into)
    }

    async fn role_has_permission(
        &self,
        role: Role,
        permission_id: &str,
    ) -> Result<bool, DataError> {
        permission::role_has_permission(self.pool(), role, permission_id)
            .await
            .map_err(Into::into)
    }

    async fn user_override(
        &self,
        user_id: &str,
        permission_id: &str,
    ) -> Result<Option<bool>, DataError> {
        permission::user_override(self.pool(), user_id, permission_id)
            .await
            .map_err(Into::into)
    }

    async fn list_role_permissions(&self, role: Role) -> Result<Vec<PermissionRow>, DataError> {
        permission::list_role_permissions(self.pool(), role)
            .await
            .map_err(Into::into)
    }

    async fn list_user_overrides(&self, user_id: &str) -> Result<Vec<UserOverrideRow>, DataError> {
        permission::list_user_overrides(self.pool(), user_id)
            .await
            .map_err(Into::into)
    }

    async fn replace_role_permissions(
        &self,
        role: Role,
        permission_ids: &[String],
    ) -> Result<(), DataError> {
        permission::replace_role_permissions(self.pool(), role, permission_ids)
            .await
            .map_err(Into::into)
    }

    async fn set_user_override(
        &self,
        user_id: &str,
        permission_id: &str,
        granted: bool,
    ) -> Result<(), DataError> {
        permission::set_user_override(self.pool(), user_id, permission_id, granted)
            .await
            .map_err(Into::into)
    }

    async fn remove_user_override(
        &self,
        user_id: &str,
        permission_id: &str,
    ) -> Result<bool, DataError> {
        permission::remove_user_override(self.pool(), user_id, permission_id)
            .await
            .map_err(Into::into)
    }
}
