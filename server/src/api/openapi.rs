//! OpenAPI specification and Swagger UI

use axum::http::header;
use axum::response::{Html, IntoResponse, Json};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::routes::{auth, health, permissions};
use crate::data::types::{PermissionRow, PermissionSource, Role};
use crate::domain::auth::EffectivePermission;
use crate::domain::auth::session::{
    AuthTokens, ChallengeIssued, MessageResponse, RefreshedToken, SessionUser,
};

/// Registers the `bearer` scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "RxGate API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Pharmacy platform authentication and permissions"
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "auth", description = "Login, OTP, password reset and session tokens"),
        (name = "permissions", description = "Permission catalog, role grants and user overrides")
    ),
    paths(
        // Health
        health::health,
        // Auth
        auth::login,
        auth::request_otp,
        auth::verify_otp,
        auth::request_password_reset,
        auth::verify_reset_code,
        auth::verify_password_reset,
        auth::logout,
        auth::refresh_token,
        auth::me,
        // Permissions
        permissions::list_permissions,
        permissions::my_permissions,
        permissions::check_permission,
        permissions::get_role_permissions,
        permissions::update_role_permissions,
        permissions::get_user_permissions,
        permissions::set_user_permission,
        permissions::remove_user_permission,
    ),
    components(schemas(
        // Health
        health::HealthResponse,
        // Auth
        auth::LoginRequest,
        auth::RequestOtpRequest,
        auth::VerifyOtpRequest,
        auth::PasswordResetRequest,
        auth::VerifyResetCodeRequest,
        auth::VerifyPasswordResetRequest,
        ChallengeIssued,
        AuthTokens,
        SessionUser,
        RefreshedToken,
        MessageResponse,
        // Permissions
        Role,
        PermissionRow,
        PermissionSource,
        EffectivePermission,
        permissions::PermissionCheckResponse,
        permissions::RolePermissionsResponse,
        permissions::UpdateRolePermissionsRequest,
        permissions::SetUserPermissionRequest,
    ))
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
pub async fn openapi_json() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(ApiDoc::openapi()),
    )
}

/// Serve Swagger UI from CDN
pub async fn swagger_ui_html() -> Html<&'static str> {
    Html(SWAGGER_UI_HTML)
}

const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>RxGate API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        html { box-sizing: border-box; overflow-y: scroll; }
        *, *:before, *:after { box-sizing: inherit; }
        body { margin: 0; background: #fafafa; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = () => {
            window.ui = SwaggerUIBundle({
                url: "/openapi.json",
                dom_id: '#swagger-ui',
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout",
                deepLinking: true
            });
        };
    </script>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_auth_and_permission_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/login",
            "/auth/refresh-token",
            "/auth/me",
            "/permissions/check/{name}",
            "/permissions/users/{user_id}/{name}",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_openapi_declares_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
