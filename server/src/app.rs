//! Core application

use std::io::BufRead;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::ApiServer;
use crate::core::cli::{self, Commands};
use crate::core::config::AppConfig;
use crate::core::constants::{APP_NAME_LOWER, DEFAULT_BCRYPT_COST, ENV_LOG, MIN_JWT_SECRET_LENGTH};
use crate::core::shutdown::ShutdownService;
use crate::data::TransactionalService;
use crate::data::cache::CacheService;
use crate::domain::auth::AuthCore;
use crate::domain::auth::notify::build_notifier;
use crate::domain::auth::password::{BcryptHasher, PasswordHasher};
use crate::utils::crypto::generate_key;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub database: Arc<TransactionalService>,
    pub cache: Arc<CacheService>,
    pub auth: AuthCore,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Some(Commands::HashPassword { cost }) => {
                return Self::hash_password(cost.or(cli_config.bcrypt_cost)).await;
            }
            Some(Commands::Start) | None => {}
        }

        let config = AppConfig::load(&cli_config)?;
        let app = Self::init(config).await?;
        Self::start_server(app).await
    }

    async fn init(config: AppConfig) -> Result<Self> {
        let cache = Arc::new(
            CacheService::new(&config.database.cache_config())
                .await
                .map_err(|e| anyhow::anyhow!("Failed to initialize cache service: {}", e))?,
        );
        tracing::debug!(backend = cache.backend_name(), "Cache initialized");

        let database = Arc::new(
            TransactionalService::init(
                config.database.transactional,
                config.database.postgres.as_ref(),
            )
            .await
            .context("Failed to initialize database")?,
        );

        let notifier =
            build_notifier(&config.notify).context("Failed to initialize notifications")?;

        let signing_secret = match config.auth.jwt_secret.as_deref() {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                tracing::warn!(
                    "No JWT secret configured; generated a random one. Sessions will not survive a restart"
                );
                generate_key(MIN_JWT_SECRET_LENGTH)
            }
        };

        let auth = AuthCore::new(
            &config.auth,
            &signing_secret,
            &database,
            cache.clone(),
            notifier,
        );

        if let Some(admin) = &config.auth.bootstrap {
            let created = auth
                .sessions
                .ensure_bootstrap_admin(admin)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create bootstrap admin: {}", e))?;
            if created {
                tracing::info!(username = %admin.username, "Bootstrap admin created");
            }
        }

        let shutdown = ShutdownService::new(database.clone());

        Ok(Self {
            shutdown,
            config,
            database,
            cache,
            auth,
        })
    }

    /// Read one line from stdin and print its bcrypt hash
    async fn hash_password(cost: Option<u32>) -> Result<()> {
        let mut password = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut password)
            .context("Failed to read password from stdin")?;
        let password = password.trim_end_matches(['\r', '\n']);
        if password.is_empty() {
            anyhow::bail!("Password must not be empty");
        }

        let hash = BcryptHasher::new(cost.unwrap_or(DEFAULT_BCRYPT_COST))
            .hash(password)
            .await?;
        println!("{}", hash);
        Ok(())
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        app.start_background_tasks().await;

        tracing::info!(
            host = %app.config.server.host,
            port = app.config.server.port,
            database = ?app.database.backend(),
            cache = app.cache.backend_name(),
            "Starting RxGate"
        );

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }

    pub async fn start_background_tasks(&self) {
        if let Some(h) = self
            .database
            .start_health_check_task(self.shutdown.subscribe())
        {
            self.shutdown.register(h).await;
        }

        tracing::debug!("Background tasks started");
    }
}
