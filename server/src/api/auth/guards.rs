//! Authorization extractors for Axum handlers
//!
//! Each extractor reads the `AuthContext` left by `require_auth` and applies
//! one check before the handler runs.
//!
//! ```no_run
//! # use rxgate_server::api::auth::{PermissionGuard, ManagePermissions};
//! # use rxgate_server::api::types::ApiError;
//! pub async fn edit_grants(guard: PermissionGuard<ManagePermissions>) -> Result<(), ApiError> {
//!     let actor = &guard.auth.user_id;
//!     Ok(())
//! }
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

use super::context::AuthContext;
use crate::api::types::ApiError;
use crate::core::constants::PERMISSION_MANAGE;
use crate::data::types::Role;
use crate::domain::auth::policy::LOGIN_ROLES;
use crate::domain::auth::{AuthError, PermissionResolver};

// ============================================================================
// Requirement Markers
// ============================================================================

/// Marker trait for role requirements. An empty list admits any role.
pub trait RoleSet: Send + Sync + 'static {
    const ROLES: &'static [Role];
}

/// Marker trait for permission requirements. Any one of the list suffices;
/// an empty list admits everyone.
pub trait PermissionSet: Send + Sync + 'static {
    const PERMISSIONS: &'static [&'static str];
}

/// Roles that may use the back-office
pub struct BackOffice;
impl RoleSet for BackOffice {
    const ROLES: &'static [Role] = LOGIN_ROLES;
}

pub struct Administrators;
impl RoleSet for Administrators {
    const ROLES: &'static [Role] = &[Role::Admin, Role::SuperAdmin];
}

/// Edit role grants and user overrides
pub struct ManagePermissions;
impl PermissionSet for ManagePermissions {
    const PERMISSIONS: &'static [&'static str] = &[PERMISSION_MANAGE];
}

/// Inspect another user's effective permissions
pub struct InspectUsers;
impl PermissionSet for InspectUsers {
    const PERMISSIONS: &'static [&'static str] = &["users:read", PERMISSION_MANAGE];
}

// ============================================================================
// Checks
// ============================================================================

pub fn role_permits(role: Role, allowed: &[Role]) -> bool {
    allowed.is_empty() || allowed.contains(&role)
}

/// SUPER_ADMIN passes on the token's role without a lookup
pub async fn permission_permits(
    resolver: &PermissionResolver,
    auth: &AuthContext,
    required: &[&str],
) -> Result<bool, AuthError> {
    if auth.is_super_admin() {
        return Ok(true);
    }
    resolver.has_any_permission(&auth.user_id, required).await
}

// ============================================================================
// Auth Rejection
// ============================================================================

/// Rejection type for guard extractors
#[derive(Debug)]
pub enum AuthRejection {
    /// `require_auth` did not run for this route
    MissingContext,
    /// Role not in the allowed set
    RoleDenied,
    /// None of the required permissions held
    PermissionDenied,
    /// Resolver failure
    Auth(ApiError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::MissingContext => {
                ApiError::unauthorized("AUTH_REQUIRED", "Authentication required").into_response()
            }
            Self::RoleDenied => {
                ApiError::forbidden("ROLE_DENIED", "Your role cannot access this resource")
                    .into_response()
            }
            Self::PermissionDenied => {
                ApiError::forbidden("PERMISSION_DENIED", "Insufficient permissions")
                    .into_response()
            }
            Self::Auth(e) => e.into_response(),
        }
    }
}

/// A user deleted after sign-in no longer authenticates
impl From<AuthError> for AuthRejection {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::NotFound(_) => Self::Auth(ApiError::unauthorized(
                "USER_NOT_FOUND",
                "Authentication required",
            )),
            other => Self::Auth(ApiError::from(other)),
        }
    }
}

fn extract_auth(parts: &Parts) -> Result<AuthContext, AuthRejection> {
    parts
        .extensions
        .get::<AuthContext>()
        .cloned()
        .ok_or(AuthRejection::MissingContext)
}

fn extract_resolver(parts: &Parts) -> Result<Arc<PermissionResolver>, AuthRejection> {
    parts
        .extensions
        .get::<Arc<PermissionResolver>>()
        .cloned()
        .ok_or(AuthRejection::MissingContext)
}

// ============================================================================
// Extractors
// ============================================================================

/// Any signed-in user
pub struct Authenticated(pub AuthContext);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_auth(parts).map(Self)
    }
}

/// Signed-in user whose role is in `R::ROLES`
pub struct RoleGuard<R: RoleSet> {
    pub auth: AuthContext,
    _roles: PhantomData<R>,
}

impl<S, R> FromRequestParts<S> for RoleGuard<R>
where
    S: Send + Sync,
    R: RoleSet,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth = extract_auth(parts)?;
        if !role_permits(auth.role, R::ROLES) {
            tracing::debug!(user_id = %auth.user_id, role = %auth.role, "Role guard denied");
            return Err(AuthRejection::RoleDenied);
        }
        Ok(Self {
            auth,
            _roles: PhantomData,
        })
    }
}

/// Signed-in user holding at least one of `P::PERMISSIONS`
pub struct PermissionGuard<P: PermissionSet> {
    pub auth: AuthContext,
    _permissions: PhantomData<P>,
}

impl<S, P> FromRequestParts<S> for PermissionGuard<P>
where
    S: Send + Sync,
    P: PermissionSet,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth = extract_auth(parts)?;
        let resolver = extract_resolver(parts)?;
        if !permission_permits(&resolver, &auth, P::PERMISSIONS).await? {
            tracing::debug!(
                user_id = %auth.user_id,
                required = ?P::PERMISSIONS,
                "Permission guard denied"
            );
            return Err(AuthRejection::PermissionDenied);
        }
        Ok(Self {
            auth,
            _permissions: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::NewUser;
    use crate::data::{MemoryStore, TransactionalService, UserRepository};
    use axum::http::{Request, StatusCode};

    fn context(user_id: &str, role: Role) -> AuthContext {
        AuthContext {
            user_id: user_id.to_string(),
            username: user_id.to_string(),
            email: None,
            role,
            expires_at: i64::MAX,
        }
    }

    fn parts_with(auth: Option<AuthContext>, resolver: Option<Arc<PermissionResolver>>) -> Parts {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        if let Some(auth) = auth {
            parts.extensions.insert(auth);
        }
        if let Some(resolver) = resolver {
            parts.extensions.insert(resolver);
        }
        parts
    }

    async fn setup() -> (Arc<MemoryStore>, Arc<PermissionResolver>) {
        let store = Arc::new(MemoryStore::new());
        let database = TransactionalService::Memory(store.clone());
        let resolver = Arc::new(PermissionResolver::new(
            database.users(),
            database.permissions(),
        ));
        (store, resolver)
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

    struct NoPermissions;
    impl PermissionSet for NoPermissions {
        const PERMISSIONS: &'static [&'static str] = &[];
    }

    struct AnyRole;
    impl RoleSet for AnyRole {
        const ROLES: &'static [Role] = &[];
    }

    #[test]
    fn test_role_permits() {
        assert!(role_permits(Role::Customer, &[]));
        assert!(role_permits(Role::Admin, Administrators::ROLES));
        assert!(!role_permits(Role::Pharmacist, Administrators::ROLES));
        assert!(role_permits(Role::Pharmacist, BackOffice::ROLES));
    }

    #[tokio::test]
    async fn test_missing_context_is_unauthorized() {
        let mut parts = parts_with(None, None);
        let rejection = Authenticated::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_role_guard() {
        let mut parts = parts_with(Some(context("u1", Role::Customer)), None);
        let rejection = RoleGuard::<Administrators>::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert!(matches!(rejection, AuthRejection::RoleDenied));

        let mut parts = parts_with(Some(context("u1", Role::Customer)), None);
        assert!(RoleGuard::<AnyRole>::from_request_parts(&mut parts, &()).await.is_ok());
    }

    #[tokio::test]
    async fn test_permission_guard_uses_grants() {
        let (store, resolver) = setup().await;
        let viewer = add_user(&store, "viewer", Role::Viewer).await;
        let admin = add_user(&store, "admin", Role::Admin).await;

        let mut parts = parts_with(Some(context(&viewer, Role::Viewer)), Some(resolver.clone()));
        let rejection = PermissionGuard::<ManagePermissions>::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection.into_response().status(), StatusCode::FORBIDDEN);

        let mut parts = parts_with(Some(context(&admin, Role::Admin)), Some(resolver.clone()));
        let guard = PermissionGuard::<InspectUsers>::from_request_parts(&mut parts, &())
            .await
            .ok()
            .unwrap();
        assert_eq!(guard.auth.user_id, admin);
    }

    #[tokio::test]
    async fn test_permission_guard_super_admin_bypass() {
        let (_, resolver) = setup().await;
        // No such user in the store: the token role alone decides
        let mut parts = parts_with(Some(context("ghost", Role::SuperAdmin)), Some(resolver));
        assert!(
            PermissionGuard::<ManagePermissions>::from_request_parts(&mut parts, &())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_permission_guard_empty_list_allows() {
        let (_, resolver) = setup().await;
        let mut parts = parts_with(Some(context("ghost", Role::Viewer)), Some(resolver));
        assert!(
            PermissionGuard::<NoPermissions>::from_request_parts(&mut parts, &())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_permission_guard_deleted_user_is_unauthorized() {
        let (_, resolver) = setup().await;
        let mut parts = parts_with(Some(context("ghost", Role::Admin)), Some(resolver));
        let rejection = PermissionGuard::<ManagePermissions>::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
