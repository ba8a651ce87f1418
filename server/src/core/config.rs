use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_BCRYPT_COST, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_HOST,
    DEFAULT_MAX_CODE_ATTEMPTS, DEFAULT_MIN_PASSWORD_LENGTH, DEFAULT_NOTIFY_TIMEOUT_SECS,
    DEFAULT_OTP_TTL_MINUTES, DEFAULT_PORT, DEFAULT_TOKEN_TTL_SECS, MIN_JWT_SECRET_LENGTH,
    POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS, POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS,
    POSTGRES_DEFAULT_MAX_CONNECTIONS, POSTGRES_DEFAULT_MAX_LIFETIME_SECS,
    POSTGRES_DEFAULT_MIN_CONNECTIONS, POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS,
};

// =============================================================================
// Transactional Backend Enum
// =============================================================================

/// Backend holding users, permissions, role grants and user overrides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionalBackend {
    /// In-process store (single instance, tests)
    #[default]
    Memory,
    Postgres,
}

impl fmt::Display for TransactionalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionalBackend::Memory => write!(f, "memory"),
            TransactionalBackend::Postgres => write!(f, "postgres"),
        }
    }
}

// =============================================================================
// Cache Backend Enum
// =============================================================================

/// Cache backend type (backs codes and the token blacklist)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendType {
    #[default]
    Memory,
    Redis,
}

impl fmt::Display for CacheBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackendType::Memory => write!(f, "memory"),
            CacheBackendType::Redis => write!(f, "redis"),
        }
    }
}

// =============================================================================
// File Config Structs (from JSON config file)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_origins: Option<Vec<String>>,
}

/// Bootstrap administrator section (nested under auth)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct BootstrapFileConfig {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Authentication configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AuthFileConfig {
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: Option<u64>,
    pub otp_ttl_minutes: Option<u64>,
    pub max_code_attempts: Option<u32>,
    pub min_password_length: Option<usize>,
    pub bcrypt_cost: Option<u32>,
    pub bootstrap: Option<BootstrapFileConfig>,
}

/// Redis cache configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RedisFileConfig {
    /// Connection URL for Redis-compatible backends
    pub url: Option<String>,
}

/// Memory cache configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MemoryCacheFileConfig {
    /// Maximum number of cache entries
    pub max_entries: Option<u64>,
}

/// PostgreSQL configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostgresFileConfig {
    /// PostgreSQL connection URL (or use RXGATE_POSTGRES_URL env var)
    pub url: Option<String>,
    /// Maximum number of connections in the pool (default: 20)
    pub max_connections: Option<u32>,
    /// Minimum number of connections to keep warm (default: 2)
    pub min_connections: Option<u32>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Idle connection timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Max connection lifetime in seconds (default: 1800)
    pub max_lifetime_secs: Option<u64>,
    /// Statement timeout in seconds, 0 to disable (default: 60)
    pub statement_timeout_secs: Option<u64>,
}

/// Database configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    pub transactional: Option<TransactionalBackend>,
    pub postgres: Option<PostgresFileConfig>,
    pub cache: Option<CacheBackendType>,
    pub redis: Option<RedisFileConfig>,
    pub memory_cache: Option<MemoryCacheFileConfig>,
}

/// Notification configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct NotifyFileConfig {
    pub webhook_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub auth: Option<AuthFileConfig>,
    pub database: Option<DatabaseFileConfig>,
    pub notify: Option<NotifyFileConfig>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        // Server
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                tracing::trace!(host = ?server.host, "Merging server.host");
                current.host = server.host;
            }
            if server.port.is_some() {
                tracing::trace!(port = ?server.port, "Merging server.port");
                current.port = server.port;
            }
            if server.cors_origins.is_some() {
                tracing::trace!(origins = ?server.cors_origins, "Merging server.cors_origins");
                current.cors_origins = server.cors_origins;
            }
        }

        // Auth (secrets are never traced)
        if let Some(auth) = other.auth {
            let current = self.auth.get_or_insert_with(AuthFileConfig::default);
            if auth.jwt_secret.is_some() {
                tracing::trace!("Merging auth.jwt_secret");
                current.jwt_secret = auth.jwt_secret;
            }
            if auth.token_ttl_secs.is_some() {
                tracing::trace!(ttl = ?auth.token_ttl_secs, "Merging auth.token_ttl_secs");
                current.token_ttl_secs = auth.token_ttl_secs;
            }
            if auth.otp_ttl_minutes.is_some() {
                tracing::trace!(ttl = ?auth.otp_ttl_minutes, "Merging auth.otp_ttl_minutes");
                current.otp_ttl_minutes = auth.otp_ttl_minutes;
            }
            if auth.max_code_attempts.is_some() {
                tracing::trace!(attempts = ?auth.max_code_attempts, "Merging auth.max_code_attempts");
                current.max_code_attempts = auth.max_code_attempts;
            }
            if auth.min_password_length.is_some() {
                tracing::trace!(
                    length = ?auth.min_password_length,
                    "Merging auth.min_password_length"
                );
                current.min_password_length = auth.min_password_length;
            }
            if auth.bcrypt_cost.is_some() {
                tracing::trace!(cost = ?auth.bcrypt_cost, "Merging auth.bcrypt_cost");
                current.bcrypt_cost = auth.bcrypt_cost;
            }
            if let Some(bootstrap) = auth.bootstrap {
                let current_bootstrap = current
                    .bootstrap
                    .get_or_insert_with(BootstrapFileConfig::default);
                if bootstrap.username.is_some() {
                    tracing::trace!(username = ?bootstrap.username, "Merging auth.bootstrap.username");
                    current_bootstrap.username = bootstrap.username;
                }
                if bootstrap.email.is_some() {
                    tracing::trace!(email = ?bootstrap.email, "Merging auth.bootstrap.email");
                    current_bootstrap.email = bootstrap.email;
                }
                if bootstrap.password.is_some() {
                    tracing::trace!("Merging auth.bootstrap.password");
                    current_bootstrap.password = bootstrap.password;
                }
            }
        }

        // Database (with nested postgres, redis, memory_cache)
        if let Some(database) = other.database {
            let current = self.database.get_or_insert_with(DatabaseFileConfig::default);
            if database.transactional.is_some() {
                tracing::trace!(backend = ?database.transactional, "Merging database.transactional");
                current.transactional = database.transactional;
            }
            if database.cache.is_some() {
                tracing::trace!(backend = ?database.cache, "Merging database.cache");
                current.cache = database.cache;
            }
            if let Some(pg) = database.postgres {
                let current_pg = current
                    .postgres
                    .get_or_insert_with(PostgresFileConfig::default);
                if pg.url.is_some() {
                    tracing::trace!("Merging database.postgres.url");
                    current_pg.url = pg.url;
                }
                if pg.max_connections.is_some() {
                    current_pg.max_connections = pg.max_connections;
                }
                if pg.min_connections.is_some() {
                    current_pg.min_connections = pg.min_connections;
                }
                if pg.acquire_timeout_secs.is_some() {
                    current_pg.acquire_timeout_secs = pg.acquire_timeout_secs;
                }
                if pg.idle_timeout_secs.is_some() {
                    current_pg.idle_timeout_secs = pg.idle_timeout_secs;
                }
                if pg.max_lifetime_secs.is_some() {
                    current_pg.max_lifetime_secs = pg.max_lifetime_secs;
                }
                if pg.statement_timeout_secs.is_some() {
                    current_pg.statement_timeout_secs = pg.statement_timeout_secs;
                }
            }
            if let Some(redis) = database.redis {
                let current_redis = current.redis.get_or_insert_with(RedisFileConfig::default);
                if redis.url.is_some() {
                    tracing::trace!("Merging database.redis.url");
                    current_redis.url = redis.url;
                }
            }
            if let Some(memory) = database.memory_cache {
                let current_memory = current
                    .memory_cache
                    .get_or_insert_with(MemoryCacheFileConfig::default);
                if memory.max_entries.is_some() {
                    tracing::trace!(
                        max_entries = ?memory.max_entries,
                        "Merging database.memory_cache.max_entries"
                    );
                    current_memory.max_entries = memory.max_entries;
                }
            }
        }

        // Notify
        if let Some(notify) = other.notify {
            let current = self.notify.get_or_insert_with(NotifyFileConfig::default);
            if notify.webhook_url.is_some() {
                tracing::trace!(url = ?notify.webhook_url, "Merging notify.webhook_url");
                current.webhook_url = notify.webhook_url;
            }
            if notify.timeout_secs.is_some() {
                tracing::trace!(timeout = ?notify.timeout_secs, "Merging notify.timeout_secs");
                current.timeout_secs = notify.timeout_secs;
            }
        }

        if other.debug.is_some() {
            tracing::trace!(debug = ?other.debug, "Merging debug");
            self.debug = other.debug;
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// Super admin created at startup when its username is absent
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Authentication configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// Signing secret; a random key is generated at startup when absent
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: u64,
    pub otp_ttl_minutes: u64,
    pub max_code_attempts: u32,
    pub min_password_length: usize,
    pub bcrypt_cost: u32,
    pub bootstrap: Option<BootstrapAdmin>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            otp_ttl_minutes: DEFAULT_OTP_TTL_MINUTES,
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            bootstrap: None,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "***"))
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("otp_ttl_minutes", &self.otp_ttl_minutes)
            .field("max_code_attempts", &self.max_code_attempts)
            .field("min_password_length", &self.min_password_length)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("bootstrap", &self.bootstrap)
            .finish()
    }
}

/// Cache configuration (used internally by CacheService)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache backend type
    pub backend: CacheBackendType,
    /// Maximum entries (memory backend)
    pub max_entries: u64,
    /// Redis URL (redis backend)
    pub redis_url: Option<String>,
}

/// PostgreSQL configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to keep warm
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,
    /// Max connection lifetime in seconds
    pub max_lifetime_secs: u64,
    /// Statement timeout in seconds (0 = disabled)
    pub statement_timeout_secs: u64,
}

/// Database configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub transactional: TransactionalBackend,
    pub postgres: Option<PostgresConfig>,
    pub cache: CacheBackendType,
    pub cache_max_entries: u64,
    pub redis_url: Option<String>,
}

impl DatabaseConfig {
    /// Build a CacheConfig for use by CacheService
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            backend: self.cache,
            max_entries: self.cache_max_entries,
            redis_url: self.redis_url.clone(),
        }
    }
}

/// Notification configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// When unset, notifications are only logged
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub notify: NotifyConfig,
    pub debug: bool,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.rxgate/rxgate.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::from_layers(cli, file_config);
        config.validate()?;
        tracing::trace!(config = ?config, "Final configuration");
        Ok(config)
    }

    /// Layer configs: defaults -> file config -> CLI/env overrides
    fn from_layers(cli: &CliConfig, file_config: FileConfig) -> Self {
        let file_server = file_config.server.unwrap_or_default();
        let file_auth = file_config.auth.unwrap_or_default();
        let file_bootstrap = file_auth.bootstrap.clone().unwrap_or_default();
        let file_database = file_config.database.unwrap_or_default();
        let file_postgres = file_database.postgres.clone().unwrap_or_default();
        let file_redis = file_database.redis.clone().unwrap_or_default();
        let file_memory = file_database.memory_cache.clone().unwrap_or_default();
        let file_notify = file_config.notify.unwrap_or_default();

        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT),
            cors_origins: cli
                .cors_origins
                .clone()
                .or(file_server.cors_origins)
                .unwrap_or_default()
                .into_iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        };

        // Bootstrap admin requires both username and password from the same layer set
        let bootstrap_username = cli.bootstrap_username.clone().or(file_bootstrap.username);
        let bootstrap_password = cli.bootstrap_password.clone().or(file_bootstrap.password);
        let bootstrap = match (bootstrap_username, bootstrap_password) {
            (Some(username), Some(password)) => Some(BootstrapAdmin {
                username,
                email: cli.bootstrap_email.clone().or(file_bootstrap.email),
                password,
            }),
            _ => None,
        };

        let auth = AuthConfig {
            jwt_secret: cli.jwt_secret.clone().or(file_auth.jwt_secret),
            token_ttl_secs: cli
                .token_ttl_secs
                .or(file_auth.token_ttl_secs)
                .unwrap_or(DEFAULT_TOKEN_TTL_SECS),
            otp_ttl_minutes: cli
                .otp_ttl_minutes
                .or(file_auth.otp_ttl_minutes)
                .unwrap_or(DEFAULT_OTP_TTL_MINUTES),
            max_code_attempts: file_auth
                .max_code_attempts
                .unwrap_or(DEFAULT_MAX_CODE_ATTEMPTS),
            min_password_length: file_auth
                .min_password_length
                .unwrap_or(DEFAULT_MIN_PASSWORD_LENGTH),
            bcrypt_cost: cli
                .bcrypt_cost
                .or(file_auth.bcrypt_cost)
                .unwrap_or(DEFAULT_BCRYPT_COST),
            bootstrap,
        };

        let transactional = cli
            .transactional_backend
            .or(file_database.transactional)
            .unwrap_or_default();

        let postgres_url = cli.postgres_url.clone().or(file_postgres.url.clone());
        let postgres = postgres_url.map(|url| PostgresConfig {
            url,
            max_connections: file_postgres
                .max_connections
                .unwrap_or(POSTGRES_DEFAULT_MAX_CONNECTIONS),
            min_connections: file_postgres
                .min_connections
                .unwrap_or(POSTGRES_DEFAULT_MIN_CONNECTIONS),
            acquire_timeout_secs: file_postgres
                .acquire_timeout_secs
                .unwrap_or(POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS),
            idle_timeout_secs: file_postgres
                .idle_timeout_secs
                .unwrap_or(POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS),
            max_lifetime_secs: file_postgres
                .max_lifetime_secs
                .unwrap_or(POSTGRES_DEFAULT_MAX_LIFETIME_SECS),
            statement_timeout_secs: file_postgres
                .statement_timeout_secs
                .unwrap_or(POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS),
        });

        let database = DatabaseConfig {
            transactional,
            postgres,
            cache: cli.cache_backend.or(file_database.cache).unwrap_or_default(),
            cache_max_entries: cli
                .cache_max_entries
                .or(file_memory.max_entries)
                .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES),
            redis_url: cli.cache_redis_url.clone().or(file_redis.url),
        };

        let notify = NotifyConfig {
            webhook_url: cli
                .notify_webhook_url
                .clone()
                .or(file_notify.webhook_url)
                .filter(|u| !u.trim().is_empty()),
            timeout_secs: file_notify
                .timeout_secs
                .unwrap_or(DEFAULT_NOTIFY_TIMEOUT_SECS),
        };

        Self {
            server,
            auth,
            database,
            notify,
            debug: cli.debug || file_config.debug.unwrap_or(false),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }

        // Port 0 would cause bind failure
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        if let Some(secret) = &self.auth.jwt_secret
            && secret.len() < MIN_JWT_SECRET_LENGTH
        {
            anyhow::bail!(
                "Configuration error: auth.jwt_secret must be at least {} bytes",
                MIN_JWT_SECRET_LENGTH
            );
        }

        if self.auth.token_ttl_secs == 0 {
            anyhow::bail!("Configuration error: auth.token_ttl_secs must be greater than 0");
        }

        if self.auth.otp_ttl_minutes == 0 {
            anyhow::bail!("Configuration error: auth.otp_ttl_minutes must be greater than 0");
        }

        if self.auth.max_code_attempts == 0 {
            anyhow::bail!("Configuration error: auth.max_code_attempts must be at least 1");
        }

        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            anyhow::bail!(
                "Configuration error: auth.bcrypt_cost must be between 4 and 31 (got {})",
                self.auth.bcrypt_cost
            );
        }

        if let Some(bootstrap) = &self.auth.bootstrap
            && bootstrap.password.len() < self.auth.min_password_length
        {
            anyhow::bail!(
                "Configuration error: auth.bootstrap.password must be at least {} characters",
                self.auth.min_password_length
            );
        }

        // Redis URL required when using Redis cache backend
        if self.database.cache == CacheBackendType::Redis
            && self.database.redis_url.as_ref().is_none_or(|u| u.is_empty())
        {
            anyhow::bail!(
                "Configuration error: database.redis.url is required when database.cache is 'redis'"
            );
        }

        // PostgreSQL URL required when using the postgres backend
        if self.database.transactional == TransactionalBackend::Postgres
            && self
                .database
                .postgres
                .as_ref()
                .is_none_or(|p| p.url.is_empty())
        {
            anyhow::bail!(
                "Configuration error: database.postgres.url is required when database.transactional is 'postgres'"
            );
        }

        if self.database.cache == CacheBackendType::Memory
            && self.database.transactional == TransactionalBackend::Postgres
        {
            tracing::warn!(
                "In-memory cache with PostgreSQL: codes and revoked tokens are not shared between instances"
            );
        }

        Ok(())
    }
}

/// Get the profile config path (~/.rxgate/rxgate.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build(cli: &CliConfig, file: FileConfig) -> AppConfig {
        AppConfig::from_layers(cli, file)
    }

    #[test]
    fn test_backend_serde() {
        let backend: TransactionalBackend = serde_json::from_str("\"postgres\"").unwrap();
        assert_eq!(backend, TransactionalBackend::Postgres);
        let cache: CacheBackendType = serde_json::from_str("\"redis\"").unwrap();
        assert_eq!(cache, CacheBackendType::Redis);
        assert_eq!(TransactionalBackend::Memory.to_string(), "memory");
        assert_eq!(CacheBackendType::Redis.to_string(), "redis");
    }

    #[test]
    fn test_file_config_parse_full() {
        let json = r#"{
            "server": {"host": "0.0.0.0", "port": 8080, "cors_origins": ["https://admin.test"]},
            "auth": {
                "token_ttl_secs": 1800,
                "otp_ttl_minutes": 5,
                "bcrypt_cost": 12,
                "bootstrap": {"username": "root", "password": "change-me-now"}
            },
            "database": {
                "transactional": "postgres",
                "postgres": {"url": "postgres://localhost/rx", "max_connections": 5},
                "cache": "redis",
                "redis": {"url": "redis://localhost:6379"}
            },
            "notify": {"webhook_url": "https://hooks.test/notify"},
            "debug": true
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        let server = config.server.unwrap();
        assert_eq!(server.port, Some(8080));
        assert_eq!(server.cors_origins.unwrap(), vec!["https://admin.test"]);
        let auth = config.auth.unwrap();
        assert_eq!(auth.token_ttl_secs, Some(1800));
        assert_eq!(auth.bootstrap.unwrap().username.as_deref(), Some("root"));
        let db = config.database.unwrap();
        assert_eq!(db.transactional, Some(TransactionalBackend::Postgres));
        assert_eq!(db.postgres.unwrap().max_connections, Some(5));
        assert_eq!(db.cache, Some(CacheBackendType::Redis));
        assert_eq!(config.debug, Some(true));
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let config: FileConfig =
            serde_json::from_str(r#"{"debug": false, "sever": {"port": 1}}"#).unwrap();
        match &config.extra {
            serde_json::Value::Object(map) => assert!(map.contains_key("sever")),
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_file_config_merge() {
        let mut base = FileConfig {
            server: Some(ServerFileConfig {
                host: Some("base.host".to_string()),
                port: Some(1000),
                cors_origins: None,
            }),
            auth: Some(AuthFileConfig {
                token_ttl_secs: Some(600),
                otp_ttl_minutes: Some(10),
                ..Default::default()
            }),
            database: Some(DatabaseFileConfig {
                cache: Some(CacheBackendType::Memory),
                ..Default::default()
            }),
            notify: None,
            debug: Some(false),
            extra: serde_json::Value::Null,
        };

        let overlay = FileConfig {
            server: Some(ServerFileConfig {
                host: None,
                port: Some(2000),
                cors_origins: Some(vec!["https://x.test".to_string()]),
            }),
            auth: Some(AuthFileConfig {
                otp_ttl_minutes: Some(3),
                ..Default::default()
            }),
            database: Some(DatabaseFileConfig {
                cache: Some(CacheBackendType::Redis),
                redis: Some(RedisFileConfig {
                    url: Some("redis://cache:6379".to_string()),
                }),
                ..Default::default()
            }),
            notify: Some(NotifyFileConfig {
                webhook_url: Some("https://hooks.test".to_string()),
                timeout_secs: None,
            }),
            debug: Some(true),
            extra: serde_json::Value::Null,
        };

        base.merge(overlay);

        let server = base.server.as_ref().unwrap();
        assert_eq!(server.host, Some("base.host".to_string()));
        assert_eq!(server.port, Some(2000));
        let auth = base.auth.as_ref().unwrap();
        assert_eq!(auth.token_ttl_secs, Some(600));
        assert_eq!(auth.otp_ttl_minutes, Some(3));
        let db = base.database.as_ref().unwrap();
        assert_eq!(db.cache, Some(CacheBackendType::Redis));
        assert_eq!(
            db.redis.as_ref().unwrap().url.as_deref(),
            Some("redis://cache:6379")
        );
        assert!(base.notify.is_some());
        assert_eq!(base.debug, Some(true));
    }

    #[test]
    fn test_app_config_defaults() {
        let config = build(&CliConfig::default(), FileConfig::default());
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.auth.token_ttl_secs, 3600);
        assert_eq!(config.auth.otp_ttl_minutes, 10);
        assert_eq!(config.auth.max_code_attempts, 3);
        assert_eq!(config.auth.min_password_length, 8);
        assert!(config.auth.jwt_secret.is_none());
        assert!(config.auth.bootstrap.is_none());
        assert_eq!(config.database.transactional, TransactionalBackend::Memory);
        assert_eq!(config.database.cache, CacheBackendType::Memory);
        assert!(config.notify.webhook_url.is_none());
        assert!(!config.debug);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_app_config_cli_override() {
        let cli = CliConfig {
            host: Some("cli.host".to_string()),
            port: Some(3000),
            token_ttl_secs: Some(120),
            cache_backend: Some(CacheBackendType::Redis),
            cache_redis_url: Some("redis://cli:6379".to_string()),
            ..Default::default()
        };
        let file = FileConfig {
            server: Some(ServerFileConfig {
                host: Some("file.host".to_string()),
                port: Some(4000),
                cors_origins: None,
            }),
            auth: Some(AuthFileConfig {
                token_ttl_secs: Some(900),
                ..Default::default()
            }),
            database: Some(DatabaseFileConfig {
                redis: Some(RedisFileConfig {
                    url: Some("redis://file:6379".to_string()),
                }),
                ..Default::default()
            }),
            notify: None,
            debug: None,
            extra: serde_json::Value::Null,
        };
        let config = build(&cli, file);
        assert_eq!(config.server.host, "cli.host");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.token_ttl_secs, 120);
        assert_eq!(config.database.redis_url.as_deref(), Some("redis://cli:6379"));
        assert_eq!(config.database.cache_config().backend, CacheBackendType::Redis);
    }

    #[test]
    fn test_app_config_bootstrap_requires_username_and_password() {
        let cli = CliConfig {
            bootstrap_username: Some("root".to_string()),
            ..Default::default()
        };
        assert!(build(&cli, FileConfig::default()).auth.bootstrap.is_none());

        let cli = CliConfig {
            bootstrap_username: Some("root".to_string()),
            bootstrap_password: Some("long-enough-pw".to_string()),
            bootstrap_email: Some("root@rx.test".to_string()),
            ..Default::default()
        };
        let bootstrap = build(&cli, FileConfig::default()).auth.bootstrap.unwrap();
        assert_eq!(bootstrap.username, "root");
        assert_eq!(bootstrap.email.as_deref(), Some("root@rx.test"));
        assert!(!format!("{:?}", bootstrap).contains("long-enough-pw"));
    }

    #[test]
    fn test_validation_short_jwt_secret() {
        let cli = CliConfig {
            jwt_secret: Some("too-short".to_string()),
            ..Default::default()
        };
        let err = build(&cli, FileConfig::default()).validate().unwrap_err();
        assert!(err.to_string().contains("jwt_secret"));
    }

    #[test]
    fn test_validation_redis_url_required() {
        let cli = CliConfig {
            cache_backend: Some(CacheBackendType::Redis),
            ..Default::default()
        };
        let err = build(&cli, FileConfig::default()).validate().unwrap_err();
        assert!(err.to_string().contains("redis.url"));
    }

    #[test]
    fn test_validation_postgres_url_required() {
        let cli = CliConfig {
            transactional_backend: Some(TransactionalBackend::Postgres),
            ..Default::default()
        };
        let err = build(&cli, FileConfig::default()).validate().unwrap_err();
        assert!(err.to_string().contains("postgres.url"));
    }

    #[test]
    fn test_validation_bcrypt_cost_range() {
        let cli = CliConfig {
            bcrypt_cost: Some(2),
            ..Default::default()
        };
        assert!(build(&cli, FileConfig::default()).validate().is_err());
    }

    #[test]
    fn test_validation_server_port_zero() {
        let cli = CliConfig {
            port: Some(0),
            ..Default::default()
        };
        assert!(build(&cli, FileConfig::default()).validate().is_err());
    }

    #[test]
    fn test_load_from_cli_config_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server": {{"port": 6123}}, "auth": {{"otp_ttl_minutes": 7}}}}"#
        )
        .unwrap();
        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.server.port, 6123);
        assert_eq!(config.auth.otp_ttl_minutes, 7);
    }

    #[test]
    fn test_load_missing_config_path_fails() {
        let cli = CliConfig {
            config: Some(PathBuf::from("/definitely/not/here/rxgate.json")),
            ..Default::default()
        };
        assert!(AppConfig::load(&cli).is_err());
    }
}
