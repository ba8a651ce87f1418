//! User and role types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Role
// ============================================================================

/// Closed set of platform roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    Admin,
    PharmacyStaff,
    Pharmacist,
    DeliveryPerson,
    /// Bypasses every permission check
    SuperAdmin,
    Manager,
    Support,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 9] = [
        Role::Customer,
        Role::Admin,
        Role::PharmacyStaff,
        Role::Pharmacist,
        Role::DeliveryPerson,
        Role::SuperAdmin,
        Role::Manager,
        Role::Support,
        Role::Viewer,
    ];

    /// Convert to the stored string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Admin => "ADMIN",
            Self::PharmacyStaff => "PHARMACY_STAFF",
            Self::Pharmacist => "PHARMACIST",
            Self::DeliveryPerson => "DELIVERY_PERSON",
            Self::SuperAdmin => "SUPER_ADMIN",
            Self::Manager => "MANAGER",
            Self::Support => "SUPPORT",
            Self::Viewer => "VIEWER",
        }
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, Self::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown role '{}'", s))
    }
}

// ============================================================================
// User
// ============================================================================

/// User row from database
#[derive(Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    /// bcrypt hash; NULL for accounts that never set a password
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub last_login_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl fmt::Debug for UserRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRow")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("role", &self.role)
            .field("has_password", &self.password_hash.is_some())
            .field("is_active", &self.is_active)
            .field("last_login_at", &self.last_login_at)
            .finish()
    }
}

/// Fields required to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub password_hash: Option<String>,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip_strings() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!("pharmacy_staff".parse::<Role>().unwrap(), Role::PharmacyStaff);
        assert!("OWNER".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_matches_stored_form() {
        let json = serde_json::to_string(&Role::DeliveryPerson).unwrap();
        assert_eq!(json, "\"DELIVERY_PERSON\"");
        let role: Role = serde_json::from_str("\"SUPER_ADMIN\"").unwrap();
        assert!(role.is_super_admin());
    }

    #[test]
    fn test_user_debug_hides_hash() {
        let user = UserRow {
            id: "u1".into(),
            username: "jdoe".into(),
            email: None,
            phone: None,
            role: Role::Admin,
            password_hash: Some("$2b$04$secretsecret".into()),
            is_active: true,
            last_login_at: None,
            created_at: 0,
            updated_at: 0,
        };
        let debug = format!("{:?}", user);
        assert!(!debug.contains("secretsecret"));
        assert!(debug.contains("has_password: true"));
    }
}
