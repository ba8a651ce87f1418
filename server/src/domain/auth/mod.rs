//! Authentication and authorization core
//!
//! - `secrets` - attempt-limited one-time codes (OTP, password reset)
//! - `blacklist` - revoked session tokens
//! - `permissions` - role grants layered under user overrides
//! - `session` - login, logout, refresh and reset state machines
//! - `token` - signed session tokens
//! - `password`, `notify` - hashing and code delivery collaborators

pub mod blacklist;
pub mod error;
pub mod notify;
pub mod password;
pub mod permissions;
pub mod policy;
pub mod secrets;
pub mod session;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

pub use blacklist::TokenBlacklist;
pub use error::AuthError;
pub use notify::Notifier;
pub use permissions::{EffectivePermission, PermissionResolver};
pub use secrets::SecretStore;
pub use session::AuthSessionManager;
pub use token::{Claims, TokenSigner};

use crate::core::config::AuthConfig;
use crate::data::TransactionalService;
use crate::data::cache::CacheService;
use password::BcryptHasher;

/// Auth services wired over one database, one cache and one signing secret
#[derive(Clone)]
pub struct AuthCore {
    pub sessions: Arc<AuthSessionManager>,
    pub permissions: Arc<PermissionResolver>,
    pub blacklist: Arc<TokenBlacklist>,
    pub signer: Arc<TokenSigner>,
}

impl AuthCore {
    pub fn new(
        config: &AuthConfig,
        signing_secret: &[u8],
        database: &TransactionalService,
        cache: Arc<CacheService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let signer = Arc::new(TokenSigner::new(signing_secret, config.token_ttl_secs));
        let blacklist = Arc::new(TokenBlacklist::new(cache.clone(), signing_secret));
        let secrets = SecretStore::new(
            cache,
            Duration::from_secs(config.otp_ttl_minutes * 60),
            config.max_code_attempts,
        );
        let sessions = Arc::new(AuthSessionManager::new(
            database.users(),
            secrets,
            blacklist.clone(),
            signer.clone(),
            Arc::new(BcryptHasher::new(config.bcrypt_cost)),
            notifier,
            config.min_password_length,
        ));
        let permissions = Arc::new(PermissionResolver::new(
            database.users(),
            database.permissions(),
        ));

        Self {
            sessions,
            permissions,
            blacklist,
            signer,
        }
    }
}
