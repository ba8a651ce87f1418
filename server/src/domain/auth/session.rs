//! Login, logout, refresh and password reset
//!
//! Two login protocols end in the same signed token:
//! - OTP only: `request_otp(username)` then `verify_otp(username, code)`
//! - password then OTP: `login(identifier, password)` then `verify_otp`
//!
//! Password reset is three calls: request, verify-only, then verify-and-set.
//! The verify-only step leaves the code in place for the final step.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use super::blacklist::TokenBlacklist;
use super::error::AuthError;
use super::notify::{Notifier, send_all_channels};
use super::password::PasswordHasher;
use super::policy::{can_login, can_reset_password};
use super::secrets::SecretStore;
use super::token::{SignedToken, TokenSigner};
use crate::core::config::BootstrapAdmin;
use crate::core::constants::{RESET_REQUESTED_MESSAGE, TEMPLATE_OTP_LOGIN, TEMPLATE_PASSWORD_RESET};
use crate::data::cache::CacheKey;
use crate::data::types::{NewUser, Role, UserRow};
use crate::data::{DataError, UserRepository};

const TOKEN_TYPE: &str = "Bearer";

// ============================================================================
// Responses
// ============================================================================

/// Identity embedded in issued tokens
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
}

impl From<&UserRow> for SessionUser {
    fn from(user: &UserRow) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthTokens {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until expiry
    pub expires_in: i64,
    /// Expiry as epoch seconds
    pub expires_at: i64,
    pub user: SessionUser,
}

/// A code was issued; the client continues with `verify-otp`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChallengeIssued {
    pub success: bool,
    pub username: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

// ============================================================================
// Session manager
// ============================================================================

pub struct AuthSessionManager {
    users: Arc<dyn UserRepository>,
    secrets: SecretStore,
    blacklist: Arc<TokenBlacklist>,
    signer: Arc<TokenSigner>,
    hasher: Arc<dyn PasswordHasher>,
    notifier: Arc<dyn Notifier>,
    min_password_length: usize,
}

impl AuthSessionManager {
    pub fn new(
        users: Arc<dyn UserRepository>,
        secrets: SecretStore,
        blacklist: Arc<TokenBlacklist>,
        signer: Arc<TokenSigner>,
        hasher: Arc<dyn PasswordHasher>,
        notifier: Arc<dyn Notifier>,
        min_password_length: usize,
    ) -> Self {
        Self {
            users,
            secrets,
            blacklist,
            signer,
            hasher,
            notifier,
            min_password_length,
        }
    }

    // ------------------------------------------------------------------------
    // Login
    // ------------------------------------------------------------------------

    /// Issue a login code to an active back-office user
    pub async fn request_otp(&self, username: &str) -> Result<ChallengeIssued, AuthError> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(AuthError::unauthorized)?;
        if !can_login(user.role) {
            tracing::debug!(user_id = %user.id, role = %user.role, "OTP requested by disallowed role");
            return Err(AuthError::unauthorized());
        }
        self.issue_login_code(&user).await
    }

    /// Check a password, then issue a login code
    ///
    /// `identifier` may be a username, email or phone number.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<ChallengeIssued, AuthError> {
        let user = self
            .users
            .find_by_login_identifier(identifier)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(AuthError::unauthorized)?;
        if !can_login(user.role) {
            tracing::debug!(user_id = %user.id, role = %user.role, "Login by disallowed role");
            return Err(AuthError::unauthorized());
        }
        let Some(hash) = user.password_hash.as_deref() else {
            tracing::debug!(user_id = %user.id, "Login to account without password");
            return Err(AuthError::unauthorized());
        };

        match self.hasher.verify(password, hash).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(user_id = %user.id, "Wrong password");
                return Err(AuthError::unauthorized());
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Stored password hash is unusable");
                return Err(AuthError::unauthorized());
            }
        }

        self.issue_login_code(&user).await
    }

    /// Exchange a login code for a session token
    pub async fn verify_otp(&self, username: &str, code: &str) -> Result<AuthTokens, AuthError> {
        let verified = self.secrets.verify(&CacheKey::otp(username), code).await?;

        let user = match verified.user_id {
            Some(id) => self.users.find_by_id(&id).await?,
            None => self.users.find_by_username(username).await?,
        }
        .filter(|u| u.is_active)
        .ok_or_else(AuthError::unauthorized)?;

        let now = chrono::Utc::now().timestamp();
        self.users.update_last_login(&user.id, now).await?;

        let signed = self.signer.sign(&user)?;
        tracing::debug!(user_id = %user.id, "Session started");
        Ok(self.tokens(signed, &user))
    }

    async fn issue_login_code(&self, user: &UserRow) -> Result<ChallengeIssued, AuthError> {
        let code = self
            .secrets
            .issue(&CacheKey::otp(&user.username), Some(&user.id))
            .await?;
        let data = serde_json::json!({
            "code": code,
            "username": user.username,
            "expires_in_minutes": self.secrets.ttl().as_secs() / 60,
        });
        self.dispatch(user, TEMPLATE_OTP_LOGIN, data).await;

        Ok(ChallengeIssued {
            success: true,
            username: user.username.clone(),
            message: "Verification code sent".to_string(),
        })
    }

    // ------------------------------------------------------------------------
    // Token lifecycle
    // ------------------------------------------------------------------------

    /// Revoke `token`. Always succeeds from the caller's point of view.
    pub async fn logout(&self, token: &str) -> MessageResponse {
        match self.signer.decode(token) {
            Some(claims) => {
                if let Err(e) = self.blacklist.add(token, claims.exp).await {
                    tracing::warn!(user_id = %claims.sub, error = %e, "Failed to blacklist token on logout");
                } else {
                    tracing::debug!(user_id = %claims.sub, "Session ended");
                }
            }
            None => tracing::debug!("Logout with undecodable token"),
        }
        MessageResponse::ok("Logged out")
    }

    /// Swap a valid token for a new one; the old token is revoked
    pub async fn refresh_token(&self, token: &str) -> Result<RefreshedToken, AuthError> {
        if self.blacklist.is_blacklisted(token).await {
            return Err(AuthError::unauthorized());
        }
        let claims = self.signer.validate(token)?;
        let user = self
            .users
            .find_by_id(&claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(AuthError::unauthorized)?;

        self.blacklist.add(token, claims.exp).await?;
        let signed = self.signer.sign(&user)?;
        tracing::debug!(user_id = %user.id, "Token refreshed");
        Ok(RefreshedToken {
            access_token: signed.token,
            expires_at: signed.claims.exp,
        })
    }

    /// The caller's identity, for `/auth/me`
    pub async fn current_user(&self, user_id: &str) -> Result<SessionUser, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .filter(|u| u.is_active)
            .map(|u| SessionUser::from(&u))
            .ok_or_else(AuthError::unauthorized)
    }

    fn tokens(&self, signed: SignedToken, user: &UserRow) -> AuthTokens {
        AuthTokens {
            access_token: signed.token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: self.signer.ttl_secs(),
            expires_at: signed.claims.exp,
            user: SessionUser::from(user),
        }
    }

    // ------------------------------------------------------------------------
    // Password reset
    // ------------------------------------------------------------------------

    /// Start a reset. The response is identical whether or not the user exists.
    pub async fn request_password_reset(
        &self,
        identifier: &str,
        redirect_url: Option<&str>,
    ) -> Result<MessageResponse, AuthError> {
        let Some(user) = self.find_reset_user(identifier).await? else {
            tracing::debug!("Password reset requested for unknown identifier");
            return Ok(MessageResponse::ok(RESET_REQUESTED_MESSAGE));
        };

        match self.secrets.issue_reset(identifier, &user.id).await {
            Ok(code) => {
                let mut data = serde_json::json!({
                    "code": code,
                    "username": user.username,
                    "expires_in_minutes": self.secrets.ttl().as_secs() / 60,
                });
                if let Some(url) = redirect_url {
                    data["redirect_url"] = serde_json::Value::String(url.to_string());
                }
                self.dispatch(&user, TEMPLATE_PASSWORD_RESET, data).await;
                tracing::debug!(user_id = %user.id, "Reset code issued");
            }
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Failed to issue reset code");
            }
        }
        Ok(MessageResponse::ok(RESET_REQUESTED_MESSAGE))
    }

    /// Check a reset code without consuming it
    pub async fn verify_reset_code_only(
        &self,
        identifier: &str,
        code: &str,
    ) -> Result<MessageResponse, AuthError> {
        let user = self
            .find_reset_user(identifier)
            .await?
            .ok_or_else(AuthError::unauthorized)?;
        self.secrets
            .verify_reset(identifier, &user.id, code, false)
            .await?;
        Ok(MessageResponse::ok("Code verified"))
    }

    /// Check and consume a reset code, then set the new password
    pub async fn verify_password_reset(
        &self,
        identifier: &str,
        code: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<MessageResponse, AuthError> {
        if new_password != confirm_password {
            return Err(AuthError::BadRequest("Passwords do not match".to_string()));
        }
        self.verify_reset_code_only(identifier, code).await?;
        if new_password.chars().count() < self.min_password_length {
            return Err(AuthError::BadRequest(format!(
                "Password must be at least {} characters",
                self.min_password_length
            )));
        }

        let user = self
            .find_reset_user(identifier)
            .await?
            .ok_or_else(AuthError::unauthorized)?;
        self.secrets
            .verify_reset(identifier, &user.id, code, true)
            .await?;

        let hash = self.hasher.hash(new_password).await?;
        self.users.update_password_hash(&user.id, &hash).await?;
        tracing::info!(user_id = %user.id, "Password reset completed");
        Ok(MessageResponse::ok("Password updated"))
    }

    /// Active user eligible for the reset flow, matched by email then username
    async fn find_reset_user(&self, identifier: &str) -> Result<Option<UserRow>, AuthError> {
        let user = match self.users.find_by_email(identifier).await? {
            Some(user) => Some(user),
            None => self.users.find_by_username(identifier).await?,
        };
        Ok(user.filter(|u| u.is_active && can_reset_password(u.role)))
    }

    // ------------------------------------------------------------------------
    // Bootstrap
    // ------------------------------------------------------------------------

    /// Create the configured super admin if its username is free.
    /// Returns whether a user was created.
    pub async fn ensure_bootstrap_admin(&self, admin: &BootstrapAdmin) -> Result<bool, AuthError> {
        if self.users.find_by_username(&admin.username).await?.is_some() {
            tracing::debug!(username = %admin.username, "Bootstrap admin already exists");
            return Ok(false);
        }

        let hash = self.hasher.hash(&admin.password).await?;
        let result = self
            .users
            .insert_user(NewUser {
                username: admin.username.clone(),
                email: admin.email.clone(),
                phone: None,
                role: Role::SuperAdmin,
                password_hash: Some(hash),
                is_active: true,
            })
            .await;
        match result {
            Ok(user) => {
                tracing::info!(user_id = %user.id, username = %user.username, "Bootstrap admin created");
                Ok(true)
            }
            Err(DataError::Conflict(_)) => {
                tracing::warn!(username = %admin.username, "Bootstrap admin conflicts with an existing user");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn dispatch(&self, user: &UserRow, template: &'static str, data: serde_json::Value) {
        let sent = send_all_channels(
            self.notifier.as_ref(),
            user.email.as_deref(),
            user.phone.as_deref(),
            template,
            data,
        )
        .await;
        if sent == 0 {
            tracing::warn!(user_id = %user.id, template, "No notification channel accepted the code");
        }
    }
}
