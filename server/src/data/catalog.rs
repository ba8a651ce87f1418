//! Built-in permission catalog and default role grants
//!
//! Seeded into every backend at startup. Catalog rows are inserted when
//! missing; role grants only on a fresh store so edits made through the
//! permission API survive restarts.

use super::types::Role;

/// Built-in permission definition: (name, description, category)
pub type PermissionDef = (&'static str, &'static str, &'static str);

pub const DEFAULT_PERMISSIONS: &[PermissionDef] = &[
    (
        "system:permissions",
        "Manage role grants and user permission overrides",
        "system",
    ),
    ("system:settings", "Change platform settings", "system"),
    ("system:logs", "Read system logs", "system"),
    ("users:read", "View user accounts", "users"),
    ("users:write", "Create, update and deactivate users", "users"),
    ("pharmacies:read", "View pharmacies", "pharmacies"),
    (
        "pharmacies:validate",
        "Approve or reject pharmacy registrations",
        "pharmacies",
    ),
    ("orders:read", "View orders", "orders"),
    ("orders:write", "Create and update orders", "orders"),
    ("deliveries:read", "View deliveries", "deliveries"),
    (
        "deliveries:write",
        "Assign and update deliveries",
        "deliveries",
    ),
    ("dashboard:read", "View dashboard statistics", "dashboard"),
];

/// Default role grants by permission name. SUPER_ADMIN is absent: it bypasses checks.
pub const DEFAULT_ROLE_GRANTS: &[(Role, &[&str])] = &[
    (
        Role::Admin,
        &[
            "system:settings",
            "system:logs",
            "users:read",
            "users:write",
            "pharmacies:read",
            "pharmacies:validate",
            "orders:read",
            "deliveries:read",
            "dashboard:read",
        ],
    ),
    (
        Role::Manager,
        &[
            "users:read",
            "pharmacies:read",
            "orders:read",
            "deliveries:read",
            "dashboard:read",
        ],
    ),
    (
        Role::Pharmacist,
        &["pharmacies:read", "orders:read", "orders:write"],
    ),
    (
        Role::PharmacyStaff,
        &["orders:read", "orders:write", "deliveries:read"],
    ),
    (Role::DeliveryPerson, &["deliveries:read", "deliveries:write"]),
    (Role::Support, &["users:read", "orders:read", "deliveries:read"]),
    (Role::Viewer, &["dashboard:read"]),
    (Role::Customer, &["orders:read"]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_names_unique() {
        let names: HashSet<_> = DEFAULT_PERMISSIONS.iter().map(|(n, _, _)| *n).collect();
        assert_eq!(names.len(), DEFAULT_PERMISSIONS.len());
    }

    #[test]
    fn test_role_grants_reference_catalog() {
        let names: HashSet<_> = DEFAULT_PERMISSIONS.iter().map(|(n, _, _)| *n).collect();
        for (role, grants) in DEFAULT_ROLE_GRANTS {
            assert!(!role.is_super_admin());
            for grant in *grants {
                assert!(names.contains(grant), "{} grants unknown {}", role, grant);
            }
        }
    }
}
