//! Permission catalog, role grant and user override endpoints

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::auth::{
    Administrators, AuthState, Authenticated, BackOffice, InspectUsers, ManagePermissions,
    PermissionGuard, RoleGuard, require_auth,
};
use crate::api::extractors::{IdPath, ValidatedJson, is_valid_id};
use crate::api::types::ApiError;
use crate::data::types::{PermissionRow, Role};
use crate::domain::auth::{AuthCore, AuthError, EffectivePermission, PermissionResolver};

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionCheckResponse {
    pub permission: String,
    pub allowed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RolePermissionsResponse {
    pub role: Role,
    pub permissions: Vec<PermissionRow>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateRolePermissionsRequest {
    /// Full replacement set of permission names
    #[validate(length(max = 512, message = "too many permissions"))]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetUserPermissionRequest {
    pub granted: bool,
}

/// Create permission routes (all protected)
pub fn routes(core: &AuthCore) -> Router {
    Router::new()
        .route("/", get(list_permissions))
        .route("/me", get(my_permissions))
        .route("/check/{name}", get(check_permission))
        .route(
            "/roles/{role}",
            get(get_role_permissions).put(update_role_permissions),
        )
        .route("/users/{user_id}", get(get_user_permissions))
        .route(
            "/users/{user_id}/{name}",
            put(set_user_permission).delete(remove_user_permission),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            AuthState::from(core),
            require_auth,
        ))
        .with_state(core.permissions.clone())
}

fn parse_role(raw: &str) -> Result<Role, ApiError> {
    raw.parse::<Role>()
        .map_err(|e| ApiError::bad_request("INVALID_ROLE", e))
}

fn check_ids(user_id: &str, name: &str) -> Result<(), ApiError> {
    if is_valid_id(user_id) && is_valid_id(name) {
        Ok(())
    } else {
        Err(ApiError::bad_request("INVALID_ID", "Invalid identifier"))
    }
}

/// Permission catalog
#[utoipa::path(
    get,
    path = "/permissions",
    tag = "permissions",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Every known permission", body = Vec<PermissionRow>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Role not allowed")
    )
)]
pub async fn list_permissions(
    State(resolver): State<Arc<PermissionResolver>>,
    _guard: RoleGuard<BackOffice>,
) -> Result<Json<Vec<PermissionRow>>, ApiError> {
    Ok(Json(resolver.list_permissions().await?))
}

/// Caller's effective permissions
#[utoipa::path(
    get,
    path = "/permissions/me",
    tag = "permissions",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Effective permissions", body = Vec<EffectivePermission>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn my_permissions(
    State(resolver): State<Arc<PermissionResolver>>,
    Authenticated(auth): Authenticated,
) -> Result<Json<Vec<EffectivePermission>>, ApiError> {
    match resolver.get_user_permissions(&auth.user_id).await {
        Ok(permissions) => Ok(Json(permissions)),
        Err(AuthError::NotFound(_)) => Err(ApiError::unauthorized(
            "USER_NOT_FOUND",
            "Authentication required",
        )),
        Err(e) => Err(e.into()),
    }
}

/// Whether the caller holds one permission
#[utoipa::path(
    get,
    path = "/permissions/check/{name}",
    tag = "permissions",
    security(("bearer" = [])),
    params(("name" = String, Path, description = "Permission name, e.g. orders:read")),
    responses(
        (status = 200, description = "Check result", body = PermissionCheckResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn check_permission(
    State(resolver): State<Arc<PermissionResolver>>,
    Authenticated(auth): Authenticated,
    IdPath(name): IdPath,
) -> Result<Json<PermissionCheckResponse>, ApiError> {
    let allowed = resolver.has_permission(&auth.user_id, &name).await?;
    Ok(Json(PermissionCheckResponse {
        permission: name,
        allowed,
    }))
}

/// Permissions granted to a role
#[utoipa::path(
    get,
    path = "/permissions/roles/{role}",
    tag = "permissions",
    security(("bearer" = [])),
    params(("role" = String, Path, description = "Role, e.g. PHARMACIST")),
    responses(
        (status = 200, description = "Role grants", body = RolePermissionsResponse),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Role not allowed")
    )
)]
pub async fn get_role_permissions(
    State(resolver): State<Arc<PermissionResolver>>,
    _guard: RoleGuard<Administrators>,
    Path(role): Path<String>,
) -> Result<Json<RolePermissionsResponse>, ApiError> {
    let role = parse_role(&role)?;
    let permissions = resolver.get_role_permissions(role).await?;
    Ok(Json(RolePermissionsResponse { role, permissions }))
}

/// Replace a role's grants
#[utoipa::path(
    put,
    path = "/permissions/roles/{role}",
    tag = "permissions",
    security(("bearer" = [])),
    params(("role" = String, Path, description = "Role, e.g. PHARMACIST")),
    request_body = UpdateRolePermissionsRequest,
    responses(
        (status = 200, description = "New role grants", body = RolePermissionsResponse),
        (status = 403, description = "Missing system:permissions"),
        (status = 404, description = "Unknown permission name")
    )
)]
pub async fn update_role_permissions(
    State(resolver): State<Arc<PermissionResolver>>,
    guard: PermissionGuard<ManagePermissions>,
    Path(role): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateRolePermissionsRequest>,
) -> Result<Json<RolePermissionsResponse>, ApiError> {
    let role = parse_role(&role)?;
    let permissions = resolver
        .update_role_permissions(&guard.auth.user_id, role, &req.permissions)
        .await?;
    Ok(Json(RolePermissionsResponse { role, permissions }))
}

/// Effective permissions of another user
#[utoipa::path(
    get,
    path = "/permissions/users/{user_id}",
    tag = "permissions",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Effective permissions", body = Vec<EffectivePermission>),
        (status = 403, description = "Missing users:read"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_permissions(
    State(resolver): State<Arc<PermissionResolver>>,
    _guard: PermissionGuard<InspectUsers>,
    IdPath(user_id): IdPath,
) -> Result<Json<Vec<EffectivePermission>>, ApiError> {
    Ok(Json(resolver.get_user_permissions(&user_id).await?))
}

/// Grant or deny one permission to one user
#[utoipa::path(
    put,
    path = "/permissions/users/{user_id}/{name}",
    tag = "permissions",
    security(("bearer" = [])),
    params(
        ("user_id" = String, Path, description = "User ID"),
        ("name" = String, Path, description = "Permission name")
    ),
    request_body = SetUserPermissionRequest,
    responses(
        (status = 204, description = "Override set"),
        (status = 403, description = "Missing system:permissions"),
        (status = 404, description = "Unknown user or permission")
    )
)]
pub async fn set_user_permission(
    State(resolver): State<Arc<PermissionResolver>>,
    guard: PermissionGuard<ManagePermissions>,
    Path((user_id, name)): Path<(String, String)>,
    ValidatedJson(req): ValidatedJson<SetUserPermissionRequest>,
) -> Result<StatusCode, ApiError> {
    check_ids(&user_id, &name)?;
    resolver
        .set_user_permission(&guard.auth.user_id, &user_id, &name, req.granted)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Drop a user override so the role grant applies again
#[utoipa::path(
    delete,
    path = "/permissions/users/{user_id}/{name}",
    tag = "permissions",
    security(("bearer" = [])),
    params(
        ("user_id" = String, Path, description = "User ID"),
        ("name" = String, Path, description = "Permission name")
    ),
    responses(
        (status = 204, description = "Override removed"),
        (status = 403, description = "Missing system:permissions"),
        (status = 404, description = "No such override")
    )
)]
pub async fn remove_user_permission(
    State(resolver): State<Arc<PermissionResolver>>,
    guard: PermissionGuard<ManagePermissions>,
    Path((user_id, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    check_ids(&user_id, &name)?;
    resolver
        .remove_user_permission(&guard.auth.user_id, &user_id, &name)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
