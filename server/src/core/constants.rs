// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "RxGate";

/// Application name in lowercase (for paths, log targets and identifiers)
pub const APP_NAME_LOWER: &str = "rxgate";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".rxgate";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "rxgate.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "RXGATE_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "RXGATE_DEBUG";

/// Environment variable for server host
pub const ENV_HOST: &str = "RXGATE_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "RXGATE_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "RXGATE_LOG";

/// Environment variable for comma-separated CORS origins
pub const ENV_CORS_ORIGINS: &str = "RXGATE_CORS_ORIGINS";

// =============================================================================
// Environment Variables - Auth
// =============================================================================

/// Environment variable for the token signing secret
pub const ENV_JWT_SECRET: &str = "RXGATE_JWT_SECRET";

/// Environment variable for session token lifetime in seconds
pub const ENV_TOKEN_TTL_SECS: &str = "RXGATE_TOKEN_TTL_SECS";

/// Environment variable for OTP / reset code lifetime in minutes
pub const ENV_OTP_TTL_MINUTES: &str = "RXGATE_OTP_TTL_MINUTES";

/// Environment variable for bcrypt cost
pub const ENV_BCRYPT_COST: &str = "RXGATE_BCRYPT_COST";

/// Bootstrap super admin credentials (created at startup when absent)
pub const ENV_BOOTSTRAP_USERNAME: &str = "RXGATE_BOOTSTRAP_USERNAME";
pub const ENV_BOOTSTRAP_EMAIL: &str = "RXGATE_BOOTSTRAP_EMAIL";
pub const ENV_BOOTSTRAP_PASSWORD: &str = "RXGATE_BOOTSTRAP_PASSWORD";

// =============================================================================
// Environment Variables - Database & Cache
// =============================================================================

/// Environment variable for transactional backend (memory or postgres)
pub const ENV_TRANSACTIONAL_BACKEND: &str = "RXGATE_TRANSACTIONAL_BACKEND";

/// Environment variable for PostgreSQL connection URL
pub const ENV_POSTGRES_URL: &str = "RXGATE_POSTGRES_URL";

/// Environment variable for cache backend (memory or redis)
pub const ENV_CACHE_BACKEND: &str = "RXGATE_CACHE_BACKEND";

/// Environment variable for max cache entries (memory backend)
pub const ENV_CACHE_MAX_ENTRIES: &str = "RXGATE_CACHE_MAX_ENTRIES";

/// Environment variable for Redis-compatible cache URL
pub const ENV_CACHE_REDIS_URL: &str = "RXGATE_CACHE_REDIS_URL";

// =============================================================================
// Environment Variables - Notifications
// =============================================================================

/// Environment variable for the notification webhook URL
pub const ENV_NOTIFY_WEBHOOK_URL: &str = "RXGATE_NOTIFY_WEBHOOK_URL";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5390;

/// Default request body limit (64KB, auth payloads are small)
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

/// Graceful shutdown timeout for background tasks
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Auth Defaults
// =============================================================================

/// Session token lifetime (1 hour)
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// OTP and password-reset code lifetime
pub const DEFAULT_OTP_TTL_MINUTES: u64 = 10;

/// Verification attempts allowed per issued code
pub const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 3;

/// Minimum accepted password length on reset
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;

/// Default bcrypt cost
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Minimum length of a configured signing secret (bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Extra time a challenge stays in the cache after its logical expiry,
/// so a late verification reports `Expired` instead of `NotFound`.
pub const SECRET_EXPIRY_GRACE_SECS: u64 = 60;

/// Inclusive numeric range of issued codes (always 6 digits)
pub const CODE_MIN: u32 = 100_000;
pub const CODE_MAX: u32 = 999_999;

/// Outstanding reset codes kept per identifier; older ones are dropped on issue
pub const MAX_OUTSTANDING_RESETS: usize = 3;

/// Permission required to mutate role grants and user overrides
pub const PERMISSION_MANAGE: &str = "system:permissions";

/// Bearer prefix in the Authorization header
pub const BEARER_PREFIX: &str = "Bearer ";

/// Message returned for every password-reset request
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account matches that identifier, a reset code has been sent";

/// Notification templates
pub const TEMPLATE_OTP_LOGIN: &str = "otp_login";
pub const TEMPLATE_PASSWORD_RESET: &str = "password_reset";

// =============================================================================
// Notification Defaults
// =============================================================================

/// Webhook request timeout
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Cache Defaults
// =============================================================================

/// Default maximum cache entries for the in-memory backend
pub const DEFAULT_CACHE_MAX_ENTRIES: u64 = 100_000;

/// Cache key version prefix (bump to invalidate all stored entries)
pub const CACHE_KEY_VERSION: &str = "v1";

// =============================================================================
// PostgreSQL Defaults
// =============================================================================

/// Default maximum pool connections
pub const POSTGRES_DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Default minimum pool connections
pub const POSTGRES_DEFAULT_MIN_CONNECTIONS: u32 = 2;

/// Default connection acquire timeout
pub const POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Default idle connection timeout
pub const POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default max connection lifetime
pub const POSTGRES_DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;

/// Default statement timeout
pub const POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 60;

/// Interval between PostgreSQL health checks
pub const POSTGRES_HEALTH_CHECK_INTERVAL_SECS: u64 = 60;
