//! Role allow-lists for the login and reset entry points

use crate::data::types::Role;

/// Roles allowed to sign in to the back-office (OTP-only and password+OTP)
pub const LOGIN_ROLES: &[Role] = &[
    Role::Admin,
    Role::Pharmacist,
    Role::PharmacyStaff,
    Role::SuperAdmin,
];

/// Roles allowed to reset their password through the back-office flow
pub const RESET_ROLES: &[Role] = &[Role::Admin, Role::PharmacyStaff, Role::SuperAdmin];

pub fn can_login(role: Role) -> bool {
    LOGIN_ROLES.contains(&role)
}

pub fn can_reset_password(role: Role) -> bool {
    RESET_ROLES.contains(&role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_roles() {
        assert!(can_login(Role::Admin));
        assert!(can_login(Role::Pharmacist));
        assert!(can_login(Role::SuperAdmin));
        assert!(!can_login(Role::Customer));
        assert!(!can_login(Role::DeliveryPerson));
        assert!(!can_login(Role::Manager));
    }

    #[test]
    fn test_pharmacist_cannot_use_reset_flow() {
        assert!(can_reset_password(Role::PharmacyStaff));
        assert!(!can_reset_password(Role::Pharmacist));
        assert!(!can_reset_password(Role::Viewer));
    }
}
