use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::{CacheBackendType, TransactionalBackend};
use super::constants::{
    ENV_BCRYPT_COST, ENV_BOOTSTRAP_EMAIL, ENV_BOOTSTRAP_PASSWORD, ENV_BOOTSTRAP_USERNAME,
    ENV_CACHE_BACKEND, ENV_CACHE_MAX_ENTRIES, ENV_CACHE_REDIS_URL, ENV_CONFIG, ENV_CORS_ORIGINS,
    ENV_DEBUG, ENV_HOST, ENV_JWT_SECRET, ENV_NOTIFY_WEBHOOK_URL, ENV_OTP_TTL_MINUTES, ENV_PORT,
    ENV_POSTGRES_URL, ENV_TOKEN_TTL_SECS, ENV_TRANSACTIONAL_BACKEND,
};

#[derive(Parser)]
#[command(name = "rxgate")]
#[command(version, about = "Pharmacy platform authentication and permission service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Enable debug mode (verbose error detail in logs)
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Allowed CORS origins (comma-separated)
    #[arg(long, global = true, env = ENV_CORS_ORIGINS, value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // Auth options
    /// Secret used to sign session tokens (min 32 bytes)
    #[arg(long, global = true, env = ENV_JWT_SECRET, hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Session token lifetime in seconds
    #[arg(long, global = true, env = ENV_TOKEN_TTL_SECS)]
    pub token_ttl_secs: Option<u64>,

    /// OTP and reset code lifetime in minutes
    #[arg(long, global = true, env = ENV_OTP_TTL_MINUTES)]
    pub otp_ttl_minutes: Option<u64>,

    /// bcrypt cost for new password hashes
    #[arg(long, global = true, env = ENV_BCRYPT_COST)]
    pub bcrypt_cost: Option<u32>,

    /// Username of the bootstrap super admin
    #[arg(long, global = true, env = ENV_BOOTSTRAP_USERNAME)]
    pub bootstrap_username: Option<String>,

    /// Email of the bootstrap super admin
    #[arg(long, global = true, env = ENV_BOOTSTRAP_EMAIL)]
    pub bootstrap_email: Option<String>,

    /// Password of the bootstrap super admin
    #[arg(long, global = true, env = ENV_BOOTSTRAP_PASSWORD, hide_env_values = true)]
    pub bootstrap_password: Option<String>,

    // Database options
    /// Transactional database backend (memory or postgres)
    #[arg(long, global = true, env = ENV_TRANSACTIONAL_BACKEND, value_parser = parse_transactional_backend)]
    pub transactional_backend: Option<TransactionalBackend>,

    /// PostgreSQL connection URL (when using postgres backend)
    #[arg(long, global = true, env = ENV_POSTGRES_URL)]
    pub postgres_url: Option<String>,

    // Cache options
    /// Cache backend (memory or redis)
    #[arg(long, global = true, env = ENV_CACHE_BACKEND, value_parser = parse_cache_backend_type)]
    pub cache_backend: Option<CacheBackendType>,

    /// Maximum number of cache entries
    #[arg(long, global = true, env = ENV_CACHE_MAX_ENTRIES)]
    pub cache_max_entries: Option<u64>,

    /// Redis-compatible cache URL. Supports Redis, Sentinel, Valkey, Dragonfly.
    /// Formats: redis://host:port/db, redis+sentinel://s1:port,s2:port/master/db
    #[arg(long, global = true, env = ENV_CACHE_REDIS_URL)]
    pub cache_redis_url: Option<String>,

    // Notification options
    /// Webhook receiving OTP and reset-code notifications
    #[arg(long, global = true, env = ENV_NOTIFY_WEBHOOK_URL)]
    pub notify_webhook_url: Option<String>,
}

/// Parse cache backend type from CLI/env string
pub(crate) fn parse_cache_backend_type(s: &str) -> Result<CacheBackendType, String> {
    match s.to_lowercase().as_str() {
        "memory" => Ok(CacheBackendType::Memory),
        "redis" => Ok(CacheBackendType::Redis),
        _ => Err(format!(
            "Invalid cache backend '{}'. Valid options: memory, redis",
            s
        )),
    }
}

/// Parse transactional backend from CLI/env string
pub(crate) fn parse_transactional_backend(s: &str) -> Result<TransactionalBackend, String> {
    match s.to_lowercase().as_str() {
        "memory" => Ok(TransactionalBackend::Memory),
        "postgres" | "postgresql" => Ok(TransactionalBackend::Postgres),
        _ => Err(format!(
            "Invalid transactional backend '{}'. Valid options: memory, postgres",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// Read a password from stdin and print its bcrypt hash
    HashPassword {
        /// bcrypt cost (defaults to the configured cost)
        #[arg(long)]
        cost: Option<u32>,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub debug: bool,
    pub config: Option<PathBuf>,
    pub cors_origins: Option<Vec<String>>,
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: Option<u64>,
    pub otp_ttl_minutes: Option<u64>,
    pub bcrypt_cost: Option<u32>,
    pub bootstrap_username: Option<String>,
    pub bootstrap_email: Option<String>,
    pub bootstrap_password: Option<String>,
    pub transactional_backend: Option<TransactionalBackend>,
    pub postgres_url: Option<String>,
    pub cache_backend: Option<CacheBackendType>,
    pub cache_max_entries: Option<u64>,
    pub cache_redis_url: Option<String>,
    pub notify_webhook_url: Option<String>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        debug: cli.debug,
        config: cli.config,
        cors_origins: cli.cors_origins,
        jwt_secret: cli.jwt_secret,
        token_ttl_secs: cli.token_ttl_secs,
        otp_ttl_minutes: cli.otp_ttl_minutes,
        bcrypt_cost: cli.bcrypt_cost,
        bootstrap_username: cli.bootstrap_username,
        bootstrap_email: cli.bootstrap_email,
        bootstrap_password: cli.bootstrap_password,
        transactional_backend: cli.transactional_backend,
        postgres_url: cli.postgres_url,
        cache_backend: cli.cache_backend,
        cache_max_entries: cli.cache_max_entries,
        cache_redis_url: cli.cache_redis_url,
        notify_webhook_url: cli.notify_webhook_url,
    };
    (config, cli.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cache_backend_type() {
        assert_eq!(
            parse_cache_backend_type("Redis").unwrap(),
            CacheBackendType::Redis
        );
        assert_eq!(
            parse_cache_backend_type("memory").unwrap(),
            CacheBackendType::Memory
        );
        let err = parse_cache_backend_type("memcached").unwrap_err();
        assert!(err.contains("memory, redis"));
    }

    #[test]
    fn test_parse_transactional_backend() {
        assert_eq!(
            parse_transactional_backend("postgresql").unwrap(),
            TransactionalBackend::Postgres
        );
        assert_eq!(
            parse_transactional_backend("MEMORY").unwrap(),
            TransactionalBackend::Memory
        );
        assert!(parse_transactional_backend("sqlite").is_err());
    }

    #[test]
    fn test_cli_parses_hash_password_subcommand() {
        let cli = Cli::try_parse_from(["rxgate", "hash-password", "--cost", "4"]).unwrap();
        match cli.command {
            Some(Commands::HashPassword { cost }) => assert_eq!(cost, Some(4)),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_cors_origins_list() {
        let cli = Cli::try_parse_from([
            "rxgate",
            "--cors-origins",
            "http://a.test,http://b.test",
        ])
        .unwrap();
        assert_eq!(
            cli.cors_origins,
            Some(vec!["http://a.test".to_string(), "http://b.test".to_string()])
        );
    }
}
