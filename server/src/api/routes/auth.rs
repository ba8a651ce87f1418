//! Authentication API endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::api::auth::{AuthState, Authenticated, bearer_token, require_auth};
use crate::api::extractors::ValidatedJson;
use crate::api::types::ApiError;
use crate::domain::auth::AuthCore;
use crate::domain::auth::session::{
    AuthSessionManager, AuthTokens, ChallengeIssued, MessageResponse, RefreshedToken, SessionUser,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// Username, email or phone
    #[validate(length(min = 1, max = 256, message = "identifier is required"))]
    pub identifier: String,
    #[validate(length(min = 1, max = 256, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RequestOtpRequest {
    #[validate(length(min = 1, max = 256, message = "username is required"))]
    pub username: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 1, max = 256, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, max = 16, message = "code is required"))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordResetRequest {
    /// Email or username
    #[validate(length(min = 1, max = 256, message = "identifier is required"))]
    pub identifier: String,
    /// Passed through to the reset notification
    #[validate(length(max = 2048, message = "redirect_url is too long"))]
    pub redirect_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyResetCodeRequest {
    #[validate(length(min = 1, max = 256, message = "identifier is required"))]
    pub identifier: String,
    #[validate(length(min = 1, max = 16, message = "code is required"))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyPasswordResetRequest {
    #[validate(length(min = 1, max = 256, message = "identifier is required"))]
    pub identifier: String,
    #[validate(length(min = 1, max = 16, message = "code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 256, message = "new_password is required"))]
    pub new_password: String,
    #[validate(length(min = 1, max = 256, message = "confirm_password is required"))]
    pub confirm_password: String,
}

/// Create auth routes
pub fn routes(core: &AuthCore) -> Router {
    let sessions = core.sessions.clone();

    let protected = Router::new()
        .route("/me", get(me))
        .route_layer(axum::middleware::from_fn_with_state(
            AuthState::from(core),
            require_auth,
        ))
        .with_state(sessions.clone());

    Router::new()
        .route("/login", post(login))
        .route("/request-otp", post(request_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/request-password-reset", post(request_password_reset))
        .route("/verify-reset-code", post(verify_reset_code))
        .route("/verify-password-reset", post(verify_password_reset))
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh_token))
        .with_state(sessions)
        .merge(protected)
}

/// Check a password and send a login code
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Code sent to the user's email and phone", body = ChallengeIssued),
        (status = 400, description = "Invalid request body"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(sessions): State<Arc<AuthSessionManager>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<ChallengeIssued>, ApiError> {
    Ok(Json(sessions.login(&req.identifier, &req.password).await?))
}

/// Send a login code without a password
#[utoipa::path(
    post,
    path = "/auth/request-otp",
    tag = "auth",
    request_body = RequestOtpRequest,
    responses(
        (status = 200, description = "Code sent", body = ChallengeIssued),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn request_otp(
    State(sessions): State<Arc<AuthSessionManager>>,
    ValidatedJson(req): ValidatedJson<RequestOtpRequest>,
) -> Result<Json<ChallengeIssued>, ApiError> {
    Ok(Json(sessions.request_otp(&req.username).await?))
}

/// Exchange a login code for a session token
#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    tag = "auth",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Session issued", body = AuthTokens),
        (status = 401, description = "Invalid or expired code")
    )
)]
pub async fn verify_otp(
    State(sessions): State<Arc<AuthSessionManager>>,
    ValidatedJson(req): ValidatedJson<VerifyOtpRequest>,
) -> Result<Json<AuthTokens>, ApiError> {
    Ok(Json(sessions.verify_otp(&req.username, &req.code).await?))
}

/// Start a password reset. The response never reveals whether the account exists.
#[utoipa::path(
    post,
    path = "/auth/request-password-reset",
    tag = "auth",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset requested", body = MessageResponse)
    )
)]
pub async fn request_password_reset(
    State(sessions): State<Arc<AuthSessionManager>>,
    ValidatedJson(req): ValidatedJson<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    Ok(Json(
        sessions
            .request_password_reset(&req.identifier, req.redirect_url.as_deref())
            .await?,
    ))
}

/// Check a reset code without using it up
#[utoipa::path(
    post,
    path = "/auth/verify-reset-code",
    tag = "auth",
    request_body = VerifyResetCodeRequest,
    responses(
        (status = 200, description = "Code is valid", body = MessageResponse),
        (status = 401, description = "Invalid or expired code")
    )
)]
pub async fn verify_reset_code(
    State(sessions): State<Arc<AuthSessionManager>>,
    ValidatedJson(req): ValidatedJson<VerifyResetCodeRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    Ok(Json(
        sessions
            .verify_reset_code_only(&req.identifier, &req.code)
            .await?,
    ))
}

/// Consume a reset code and set a new password
#[utoipa::path(
    post,
    path = "/auth/verify-password-reset",
    tag = "auth",
    request_body = VerifyPasswordResetRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Passwords differ or are too short"),
        (status = 401, description = "Invalid or expired code")
    )
)]
pub async fn verify_password_reset(
    State(sessions): State<Arc<AuthSessionManager>>,
    ValidatedJson(req): ValidatedJson<VerifyPasswordResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    Ok(Json(
        sessions
            .verify_password_reset(
                &req.identifier,
                &req.code,
                &req.new_password,
                &req.confirm_password,
            )
            .await?,
    ))
}

/// Revoke the bearer token. Always succeeds.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse)
    )
)]
pub async fn logout(
    State(sessions): State<Arc<AuthSessionManager>>,
    headers: HeaderMap,
) -> Json<MessageResponse> {
    Json(sessions.logout(bearer_token(&headers).unwrap_or_default()).await)
}

/// Swap a valid bearer token for a fresh one; the old token is revoked
#[utoipa::path(
    post,
    path = "/auth/refresh-token",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token refreshed", body = RefreshedToken),
        (status = 401, description = "Missing, expired or revoked token")
    )
)]
pub async fn refresh_token(
    State(sessions): State<Arc<AuthSessionManager>>,
    headers: HeaderMap,
) -> Result<Json<RefreshedToken>, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("AUTH_REQUIRED", "Authentication required"))?;
    Ok(Json(sessions.refresh_token(token).await?))
}

/// Current user
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Signed-in user", body = SessionUser),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    State(sessions): State<Arc<AuthSessionManager>>,
    Authenticated(auth): Authenticated,
) -> Result<Json<SessionUser>, ApiError> {
    Ok(Json(sessions.current_user(&auth.user_id).await?))
}
