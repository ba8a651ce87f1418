//! Permission resolution
//!
//! A decision is layered in strict order:
//! 1. SUPER_ADMIN is allowed everything, before any lookup
//! 2. Unknown permission names are denied
//! 3. A user override, when present, is final
//! 4. Otherwise the role grant decides

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use super::error::AuthError;
use crate::core::constants::PERMISSION_MANAGE;
use crate::data::types::{PermissionRow, PermissionSource, Role, UserRow};
use crate::data::{PermissionRepository, UserRepository};

/// One entry of a user's effective permission set
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EffectivePermission {
    pub name: String,
    pub description: String,
    pub category: String,
    pub source: PermissionSource,
    /// False only for an override that denies a role grant
    pub granted: bool,
}

impl EffectivePermission {
    fn from_row(row: PermissionRow, source: PermissionSource, granted: bool) -> Self {
        Self {
            name: row.name,
            description: row.description,
            category: row.category,
            source,
            granted,
        }
    }
}

pub struct PermissionResolver {
    users: Arc<dyn UserRepository>,
    permissions: Arc<dyn PermissionRepository>,
}

impl PermissionResolver {
    pub fn new(users: Arc<dyn UserRepository>, permissions: Arc<dyn PermissionRepository>) -> Self {
        Self { users, permissions }
    }

    /// Whether `user_id` may exercise `permission`
    pub async fn has_permission(&self, user_id: &str, permission: &str) -> Result<bool, AuthError> {
        let user = self.load_user(user_id).await?;
        if user.role.is_super_admin() {
            return Ok(true);
        }

        let Some(row) = self.permissions.find_permission_by_name(permission).await? else {
            tracing::warn!(permission, user_id, "Permission check for unknown permission");
            return Ok(false);
        };

        if let Some(granted) = self.permissions.user_override(user_id, &row.id).await? {
            return Ok(granted);
        }
        Ok(self.permissions.role_has_permission(user.role, &row.id).await?)
    }

    /// Whether `user_id` holds at least one of `permissions`. An empty list allows.
    pub async fn has_any_permission(
        &self,
        user_id: &str,
        permissions: &[&str],
    ) -> Result<bool, AuthError> {
        if permissions.is_empty() {
            return Ok(true);
        }
        for permission in permissions {
            if self.has_permission(user_id, permission).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Role grants with the user's overrides applied by name
    pub async fn get_user_permissions(
        &self,
        user_id: &str,
    ) -> Result<Vec<EffectivePermission>, AuthError> {
        let user = self.load_user(user_id).await?;
        if user.role.is_super_admin() {
            return Ok(self
                .permissions
                .list_permissions()
                .await?
                .into_iter()
                .map(|row| EffectivePermission::from_row(row, PermissionSource::Role, true))
                .collect());
        }

        let mut effective: BTreeMap<String, EffectivePermission> = BTreeMap::new();
        for row in self.permissions.list_role_permissions(user.role).await? {
            effective.insert(
                row.name.clone(),
                EffectivePermission::from_row(row, PermissionSource::Role, true),
            );
        }
        for o in self.permissions.list_user_overrides(user_id).await? {
            effective.insert(
                o.permission.name.clone(),
                EffectivePermission::from_row(o.permission, PermissionSource::User, o.granted),
            );
        }

        let mut result: Vec<EffectivePermission> = effective.into_values().collect();
        result.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
        Ok(result)
    }

    pub async fn list_permissions(&self) -> Result<Vec<PermissionRow>, AuthError> {
        Ok(self.permissions.list_permissions().await?)
    }

    pub async fn get_role_permissions(&self, role: Role) -> Result<Vec<PermissionRow>, AuthError> {
        Ok(self.permissions.list_role_permissions(role).await?)
    }

    /// Replace every grant of `role` with `names`
    pub async fn update_role_permissions(
        &self,
        actor_id: &str,
        role: Role,
        names: &[String],
    ) -> Result<Vec<PermissionRow>, AuthError> {
        self.require_manage(actor_id).await?;

        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            if !seen.insert(name.as_str()) {
                continue;
            }
            ids.push(self.resolve_permission(name).await?.id);
        }

        self.permissions.replace_role_permissions(role, &ids).await?;
        tracing::info!(actor_id, role = %role, count = ids.len(), "Role permissions replaced");
        self.get_role_permissions(role).await
    }

    /// Grant or deny one permission to one user, overriding the role
    pub async fn set_user_permission(
        &self,
        actor_id: &str,
        user_id: &str,
        permission: &str,
        granted: bool,
    ) -> Result<(), AuthError> {
        self.require_manage(actor_id).await?;
        self.load_user(user_id).await?;
        let row = self.resolve_permission(permission).await?;

        self.permissions
            .set_user_override(user_id, &row.id, granted)
            .await?;
        tracing::info!(actor_id, user_id, permission, granted, "User permission override set");
        Ok(())
    }

    /// Drop a user override so the role grant applies again
    pub async fn remove_user_permission(
        &self,
        actor_id: &str,
        user_id: &str,
        permission: &str,
    ) -> Result<(), AuthError> {
        self.require_manage(actor_id).await?;
        let row = self.resolve_permission(permission).await?;

        if !self.permissions.remove_user_override(user_id, &row.id).await? {
            return Err(AuthError::NotFound(format!(
                "No override of '{}' for this user",
                permission
            )));
        }
        tracing::info!(actor_id, user_id, permission, "User permission override removed");
        Ok(())
    }

    async fn require_manage(&self, actor_id: &str) -> Result<(), AuthError> {
        match self.has_permission(actor_id, PERMISSION_MANAGE).await {
            Ok(true) => Ok(()),
            Ok(false) | Err(AuthError::NotFound(_)) => Err(AuthError::Forbidden(format!(
                "Requires '{}' permission",
                PERMISSION_MANAGE
            ))),
            Err(e) => Err(e),
        }
    }

    async fn load_user(&self, user_id: &str) -> Result<UserRow, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))
    }

    async fn resolve_permission(&self, name: &str) -> Result<PermissionRow, AuthError> {
        self.permissions
            .find_permission_by_name(name)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("Unknown permission '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryStore;
    use crate::data::types::NewUser;

    struct Fixture {
        resolver: PermissionResolver,
        store: Arc<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let resolver = PermissionResolver::new(Arc::new(store.clone()), Arc::new(store.clone()));
        Fixture { resolver, store }
    }

    async fn add_user(store: &Arc<MemoryStore>, username: &str, role: Role) -> String {
        store
            .insert_user(NewUser {
                username: username.to_string(),
                email: None,
                phone: None,
                role,
                password_hash: None,
                is_active: true,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let f = fixture();
        let result = f.resolver.has_permission("missing", "orders:read").await;
        assert!(matches!(result, Err(AuthError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_super_admin_bypasses_catalog() {
        let f = fixture();
        let root = add_user(&f.store, "root", Role::SuperAdmin).await;
        assert!(f.resolver.has_permission(&root, "totally:unknown").await.unwrap());
        assert!(f.resolver.has_permission(&root, PERMISSION_MANAGE).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_permission_denied_for_regular_user() {
        let f = fixture();
        let admin = add_user(&f.store, "admin", Role::Admin).await;
        assert!(
            !f.resolver
                .has_permission(&admin, "nonexistent:permission")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_role_grant() {
        let f = fixture();
        let courier = add_user(&f.store, "courier", Role::DeliveryPerson).await;
        assert!(f.resolver.has_permission(&courier, "deliveries:write").await.unwrap());
        assert!(!f.resolver.has_permission(&courier, "users:write").await.unwrap());
    }

    #[tokio::test]
    async fn test_override_precedence_and_removal() {
        let f = fixture();
        let root = add_user(&f.store, "root", Role::SuperAdmin).await;
        let staff = add_user(&f.store, "staff", Role::PharmacyStaff).await;
        assert!(f.resolver.has_permission(&staff, "orders:write").await.unwrap());

        f.resolver
            .set_user_permission(&root, &staff, "orders:write", false)
            .await
            .unwrap();
        assert!(!f.resolver.has_permission(&staff, "orders:write").await.unwrap());

        f.resolver
            .remove_user_permission(&root, &staff, "orders:write")
            .await
            .unwrap();
        assert!(f.resolver.has_permission(&staff, "orders:write").await.unwrap());
    }

    #[tokio::test]
    async fn test_override_can_grant_beyond_role() {
        let f = fixture();
        let root = add_user(&f.store, "root", Role::SuperAdmin).await;
        let viewer = add_user(&f.store, "viewer", Role::Viewer).await;

        f.resolver
            .set_user_permission(&root, &viewer, "orders:read", true)
            .await
            .unwrap();
        assert!(f.resolver.has_permission(&viewer, "orders:read").await.unwrap());
    }

    #[tokio::test]
    async fn test_mutations_require_manage_permission() {
        let f = fixture();
        let admin = add_user(&f.store, "admin", Role::Admin).await;
        let staff = add_user(&f.store, "staff", Role::PharmacyStaff).await;

        let result = f
            .resolver
            .set_user_permission(&admin, &staff, "orders:read", false)
            .await;
        assert!(matches!(result, Err(AuthError::Forbidden(_))));

        let result = f
            .resolver
            .update_role_permissions("ghost", Role::Viewer, &[])
            .await;
        assert!(matches!(result, Err(AuthError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_manage_permission_via_override() {
        let f = fixture();
        let root = add_user(&f.store, "root", Role::SuperAdmin).await;
        let admin = add_user(&f.store, "admin", Role::Admin).await;
        f.resolver
            .set_user_permission(&root, &admin, PERMISSION_MANAGE, true)
            .await
            .unwrap();

        let rows = f
            .resolver
            .update_role_permissions(&admin, Role::Viewer, &["orders:read".to_string()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_update_role_permissions_replaces_set() {
        let f = fixture();
        let root = add_user(&f.store, "root", Role::SuperAdmin).await;
        let names = vec![
            "orders:read".to_string(),
            "users:read".to_string(),
            "orders:read".to_string(),
        ];

        let rows = f
            .resolver
            .update_role_permissions(&root, Role::Viewer, &names)
            .await
            .unwrap();
        let mut granted: Vec<&str> = rows.iter().map(|p| p.name.as_str()).collect();
        granted.sort();
        assert_eq!(granted, vec!["orders:read", "users:read"]);

        // dashboard:read was the previous grant and is gone now
        let viewer = add_user(&f.store, "viewer", Role::Viewer).await;
        assert!(!f.resolver.has_permission(&viewer, "dashboard:read").await.unwrap());
    }

    #[tokio::test]
    async fn test_mutation_unknown_names() {
        let f = fixture();
        let root = add_user(&f.store, "root", Role::SuperAdmin).await;
        let staff = add_user(&f.store, "staff", Role::PharmacyStaff).await;

        let result = f
            .resolver
            .update_role_permissions(&root, Role::Viewer, &["nope:nope".to_string()])
            .await;
        assert!(matches!(result, Err(AuthError::NotFound(_))));

        let result = f
            .resolver
            .set_user_permission(&root, "missing", "orders:read", true)
            .await;
        assert!(matches!(result, Err(AuthError::NotFound(_))));

        let result = f
            .resolver
            .remove_user_permission(&root, &staff, "orders:read")
            .await;
        assert!(matches!(result, Err(AuthError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_effective_permissions_apply_overrides() {
        let f = fixture();
        let root = add_user(&f.store, "root", Role::SuperAdmin).await;
        let courier = add_user(&f.store, "courier", Role::DeliveryPerson).await;
        f.resolver
            .set_user_permission(&root, &courier, "deliveries:write", false)
            .await
            .unwrap();
        f.resolver
            .set_user_permission(&root, &courier, "orders:read", true)
            .await
            .unwrap();

        let effective = f.resolver.get_user_permissions(&courier).await.unwrap();
        let find = |name: &str| effective.iter().find(|p| p.name == name).unwrap().clone();

        assert_eq!(find("deliveries:read").source, PermissionSource::Role);
        let denied = find("deliveries:write");
        assert_eq!(denied.source, PermissionSource::User);
        assert!(!denied.granted);
        assert!(find("orders:read").granted);
        assert_eq!(
            effective.iter().filter(|p| p.name == "deliveries:write").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_super_admin_effective_permissions_is_catalog() {
        let f = fixture();
        let root = add_user(&f.store, "root", Role::SuperAdmin).await;
        let effective = f.resolver.get_user_permissions(&root).await.unwrap();
        let catalog = f.resolver.list_permissions().await.unwrap();
        assert_eq!(effective.len(), catalog.len());
        assert!(effective.iter().all(|p| p.granted));
    }

    #[tokio::test]
    async fn test_has_any_permission_is_or() {
        let f = fixture();
        let courier = add_user(&f.store, "courier", Role::DeliveryPerson).await;
        assert!(
            f.resolver
                .has_any_permission(&courier, &["users:write", "deliveries:read"])
                .await
                .unwrap()
        );
        assert!(
            !f.resolver
                .has_any_permission(&courier, &["users:write", "orders:write"])
                .await
                .unwrap()
        );
        assert!(f.resolver.has_any_permission(&courier, &[]).await.unwrap());
    }
}
