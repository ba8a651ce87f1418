//! Authentication module

mod context;
pub mod guards;
pub mod middleware;

pub use context::AuthContext;
pub use guards::{
    Administrators, AuthRejection, Authenticated, BackOffice, InspectUsers, ManagePermissions,
    PermissionGuard, PermissionSet, RoleGuard, RoleSet,
};
pub use middleware::{AuthState, bearer_token, require_auth};
