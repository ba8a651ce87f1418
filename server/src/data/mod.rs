//! Data storage layer
//!
//! Provides storage services for the auth core:
//! - `postgres` - Transactional database for users and permissions (multi-instance)
//! - `memory` - In-process transactional store (development, tests)
//! - `cache` - In-memory and Redis caching for codes and revoked tokens
//! - `catalog` - Built-in permission catalog and default role grants
//! - `types` - Shared row types across backends
//! - `traits` - Repository traits for multi-backend support
//! - `error` - Unified error type for all backends

pub mod cache;
pub mod catalog;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;
pub mod types;

pub use memory::MemoryStore;
pub use postgres::PostgresService;

pub use error::DataError;

pub use traits::{PermissionRepository, UserRepository};

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::config::{PostgresConfig, TransactionalBackend};

/// Transactional database service enum
///
/// Wraps the underlying backend-specific service. Services are stored as Arc
/// so repository trait objects can be handed out cheaply.
pub enum TransactionalService {
    /// In-memory backend (default, single instance)
    Memory(Arc<MemoryStore>),
    /// PostgreSQL backend (for distributed deployments)
    Postgres(Arc<PostgresService>),
}

impl TransactionalService {
    /// Initialize the transactional service based on configuration
    pub async fn init(
        backend: TransactionalBackend,
        postgres_config: Option<&PostgresConfig>,
    ) -> Result<Self, DataError> {
        match backend {
            TransactionalBackend::Memory => {
                tracing::warn!(
                    "Using in-memory user store: accounts and permission edits are lost on restart"
                );
                Ok(Self::Memory(Arc::new(MemoryStore::new())))
            }
            TransactionalBackend::Postgres => {
                let config = postgres_config.ok_or_else(|| {
                    DataError::Config("PostgreSQL configuration required".to_string())
                })?;
                let service = PostgresService::init(config).await?;
                Ok(Self::Postgres(Arc::new(service)))
            }
        }
    }

    /// Get the backend type
    pub fn backend(&self) -> TransactionalBackend {
        match self {
            Self::Memory(_) => TransactionalBackend::Memory,
            Self::Postgres(_) => TransactionalBackend::Postgres,
        }
    }

    /// User repository for the active backend
    pub fn users(&self) -> Arc<dyn UserRepository> {
        match self {
            Self::Memory(m) => Arc::new(Arc::clone(m)),
            Self::Postgres(p) => Arc::new(Arc::clone(p)),
        }
    }

    /// Permission repository for the active backend
    pub fn permissions(&self) -> Arc<dyn PermissionRepository> {
        match self {
            Self::Memory(m) => Arc::new(Arc::clone(m)),
            Self::Postgres(p) => Arc::new(Arc::clone(p)),
        }
    }

    /// Verify the backend is reachable
    pub async fn health_check(&self) -> Result<(), DataError> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::Postgres(p) => p.ping().await.map_err(Into::into),
        }
    }

    /// Close the database connection gracefully
    pub async fn close(&self) {
        match self {
            Self::Memory(_) => {}
            Self::Postgres(p) => p.close().await,
        }
    }

    /// Start the background health check task (PostgreSQL only)
    pub fn start_health_check_task(
        &self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        match self {
            Self::Memory(_) => None,
            Self::Postgres(p) => Some(p.start_health_check_task(shutdown_rx)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_init() {
        let service = TransactionalService::init(TransactionalBackend::Memory, None)
            .await
            .unwrap();
        assert_eq!(service.backend(), TransactionalBackend::Memory);
        assert!(service.health_check().await.is_ok());
        let (_tx, rx) = watch::channel(false);
        assert!(service.start_health_check_task(rx).is_none());
    }

    #[tokio::test]
    async fn test_postgres_backend_requires_config() {
        let result = TransactionalService::init(TransactionalBackend::Postgres, None).await;
        assert!(matches!(result, Err(DataError::Config(_))));
    }

    #[tokio::test]
    async fn test_repositories_share_state() {
        let service = TransactionalService::init(TransactionalBackend::Memory, None)
            .await
            .unwrap();
        let perms = service.permissions();
        let perm = perms
            .find_permission_by_name("orders:read")
            .await
            .unwrap()
            .unwrap();
        perms.set_user_override("u1", &perm.id, true).await.unwrap();

        // A second handle sees the same store
        assert_eq!(
            service
                .permissions()
                .user_override("u1", &perm.id)
                .await
                .unwrap(),
            Some(true)
        );
    }
}
