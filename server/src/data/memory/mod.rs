//! In-memory transactional store
//!
//! Single-process backend for development and tests. Seeded with the same
//! permission catalog and default grants as PostgreSQL.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::data::catalog::{DEFAULT_PERMISSIONS, DEFAULT_ROLE_GRANTS};
use crate::data::error::DataError;
use crate::data::traits::{PermissionRepository, UserRepository};
use crate::data::types::{NewUser, PermissionRow, Role, UserOverrideRow, UserRow};

/// In-memory users, catalog, role grants and overrides
pub struct MemoryStore {
    users: DashMap<String, UserRow>,
    /// Serializes inserts so uniqueness checks and the insert are atomic
    insert_lock: Mutex<()>,
    permissions: RwLock<Vec<PermissionRow>>,
    role_grants: DashMap<Role, HashSet<String>>,
    overrides: DashMap<(String, String), bool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store seeded with the built-in catalog and role grants
    pub fn new() -> Self {
        let permissions: Vec<PermissionRow> = DEFAULT_PERMISSIONS
            .iter()
            .map(|(name, description, category)| PermissionRow {
                id: cuid2::create_id(),
                name: name.to_string(),
                description: description.to_string(),
                category: category.to_string(),
            })
            .collect();

        let role_grants = DashMap::new();
        for (role, names) in DEFAULT_ROLE_GRANTS {
            let ids: HashSet<String> = permissions
                .iter()
                .filter(|p| names.contains(&p.name.as_str()))
                .map(|p| p.id.clone())
                .collect();
            role_grants.insert(*role, ids);
        }

        Self {
            users: DashMap::new(),
            insert_lock: Mutex::new(()),
            permissions: RwLock::new(permissions),
            role_grants,
            overrides: DashMap::new(),
        }
    }

    fn find_user(&self, pred: impl Fn(&UserRow) -> bool) -> Option<UserRow> {
        self.users
            .iter()
            .find(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
    }

    #[cfg(test)]
    pub(crate) fn set_active(&self, id: &str, active: bool) {
        if let Some(mut user) = self.users.get_mut(id) {
            user.is_active = active;
        }
    }

    fn permission_by_id(&self, id: &str) -> Option<PermissionRow> {
        self.permissions.read().iter().find(|p| p.id == id).cloned()
    }
}

fn sort_permissions(rows: &mut [PermissionRow]) {
    rows.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
}

#[async_trait]
impl UserRepository for Arc<MemoryStore> {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRow>, DataError> {
        Ok(self.users.get(id).map(|u| u.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRow>, DataError> {
        Ok(self.find_user(|u| u.username == username))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRow>, DataError> {
        Ok(self.find_user(|u| {
            u.email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(email))
        }))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<UserRow>, DataError> {
        Ok(self.find_user(|u| u.phone.as_deref() == Some(phone)))
    }

    async fn update_last_login(&self, id: &str, at: i64) -> Result<(), DataError> {
        if let Some(mut user) = self.users.get_mut(id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn update_password_hash(&self, id: &str, hash: &str) -> Result<(), DataError> {
        if let Some(mut user) = self.users.get_mut(id) {
            user.password_hash = Some(hash.to_string());
            user.updated_at = chrono::Utc::now().timestamp();
        }
        Ok(())
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<UserRow, DataError> {
        let _guard = self.insert_lock.lock();

        let taken = self.users.iter().any(|entry| {
            let u = entry.value();
            u.username == new_user.username
                || (new_user.email.is_some() && u.email == new_user.email)
                || (new_user.phone.is_some() && u.phone == new_user.phone)
        });
        if taken {
            return Err(DataError::Conflict("user already exists".to_string()));
        }

        let now = chrono::Utc::now().timestamp();
        let user = UserRow {
            id: cuid2::create_id(),
            username: new_user.username,
            email: new_user.email,
            phone: new_user.phone,
            role: new_user.role,
            password_hash: new_user.password_hash,
            is_active: new_user.is_active,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }
}

#[async_trait]
impl PermissionRepository for Arc<MemoryStore> {
    async fn list_permissions(&self) -> Result<Vec<PermissionRow>, DataError> {
        let mut rows = self.permissions.read().clone();
        sort_permissions(&mut rows);
        Ok(rows)
    }

    async fn find_permission_by_name(
        &self,
        name: &str,
    ) -> Result<Option<PermissionRow>, DataError> {
        Ok(self
            .permissions
            .read()
            .iter()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn role_has_permission(
        &self,
        role: Role,
        permission_id: &str,
    ) -> Result<bool, DataError> {
        Ok(self
            .role_grants
            .get(&role)
            .is_some_and(|ids| ids.contains(permission_id)))
    }

    async fn user_override(
        &self,
        user_id: &str,
        permission_id: &str,
    ) -> Result<Option<bool>, DataError> {
        Ok(self
            .overrides
            .get(&(user_id.to_string(), permission_id.to_string()))
            .map(|g| *g.value()))
    }

    async fn list_role_permissions(&self, role: Role) -> Result<Vec<PermissionRow>, DataError> {
        let ids = self
            .role_grants
            .get(&role)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();
        let mut rows: Vec<PermissionRow> = self
            .permissions
            .read()
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect();
        sort_permissions(&mut rows);
        Ok(rows)
    }

    async fn list_user_overrides(&self, user_id: &str) -> Result<Vec<UserOverrideRow>, DataError> {
        let mut rows: Vec<UserOverrideRow> = self
            .overrides
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .filter_map(|entry| {
                self.permission_by_id(&entry.key().1)
                    .map(|permission| UserOverrideRow {
                        permission,
                        granted: *entry.value(),
                    })
            })
            .collect();
        rows.sort_by(|a, b| {
            (&a.permission.category, &a.permission.name)
                .cmp(&(&b.permission.category, &b.permission.name))
        });
        Ok(rows)
    }

    async fn replace_role_permissions(
        &self,
        role: Role,
        permission_ids: &[String],
    ) -> Result<(), DataError> {
        // Single insert replaces the whole set atomically
        self.role_grants
            .insert(role, permission_ids.iter().cloned().collect());
        Ok(())
    }

    async fn set_user_override(
        &self,
        user_id: &str,
        permission_id: &str,
        granted: bool,
    ) -> Result<(), DataError> {
        self.overrides
            .insert((user_id.to_string(), permission_id.to_string()), granted);
        Ok(())
    }

    async fn remove_user_override(
        &self,
        user_id: &str,
        permission_id: &str,
    ) -> Result<bool, DataError> {
        Ok(self
            .overrides
            .remove(&(user_id.to_string(), permission_id.to_string()))
            .is_some())
    }
}
