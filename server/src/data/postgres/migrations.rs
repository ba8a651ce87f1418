//! PostgreSQL migration management
//!
//! Handles schema initialization, versioned migrations and catalog seeding.

use sqlx::PgPool;

use super::error::PostgresError;
use super::schema::{MIGRATIONS, SCHEMA, SCHEMA_VERSION};
use crate::data::catalog::{DEFAULT_PERMISSIONS, DEFAULT_ROLE_GRANTS};

/// Run all pending migrations, then make sure the permission catalog is present
pub async fn run_migrations(pool: &PgPool) -> Result<(), PostgresError> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = 'schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    let current_version: Option<i32> = if table_exists {
        sqlx::query_scalar("SELECT version FROM schema_version WHERE id = 1")
            .fetch_optional(pool)
            .await?
    } else {
        None
    };

    match current_version {
        None => {
            tracing::debug!("Applying initial PostgreSQL schema v{}", SCHEMA_VERSION);
            apply_initial_schema(pool).await?;
            seed_catalog(pool).await?;
            seed_role_grants(pool).await?;
            return Ok(());
        }
        Some(v) if v < SCHEMA_VERSION => {
            tracing::debug!(
                "Migrating PostgreSQL schema from v{} to v{}",
                v,
                SCHEMA_VERSION
            );
            for version in (v + 1)..=SCHEMA_VERSION {
                apply_versioned_migration(pool, version).await?;
            }
        }
        Some(v) if v > SCHEMA_VERSION => {
            tracing::warn!(
                "PostgreSQL schema version {} is newer than application version {}. This may cause issues.",
                v,
                SCHEMA_VERSION
            );
        }
        _ => {
            tracing::debug!("PostgreSQL schema is up to date (v{})", SCHEMA_VERSION);
        }
    }

    // New catalog entries from upgrades; existing rows and grants are left alone
    seed_catalog(pool).await?;
    Ok(())
}

/// Apply the initial schema
async fn apply_initial_schema(pool: &PgPool) -> Result<(), PostgresError> {
    let now = chrono::Utc::now().timestamp();

    // Multi-statement script, so the simple query protocol is required
    sqlx::raw_sql(SCHEMA).execute(pool).await?;

    sqlx::query(
        "INSERT INTO schema_version (id, version, applied_at, description)
         VALUES (1, $1, $2, 'Initial schema')
         ON CONFLICT (id) DO UPDATE SET version = $1, applied_at = $2",
    )
    .bind(SCHEMA_VERSION)
    .bind(now)
    .execute(pool)
    .await?;

    tracing::debug!("PostgreSQL schema v{} applied successfully", SCHEMA_VERSION);
    Ok(())
}

/// Apply a specific versioned migration from `MIGRATIONS`
async fn apply_versioned_migration(pool: &PgPool, version: i32) -> Result<(), PostgresError> {
    let (_, name, sql) = MIGRATIONS
        .iter()
        .find(|(v, _, _)| *v == version)
        .ok_or_else(|| PostgresError::MigrationFailed {
            version,
            name: "unknown".to_string(),
            error: format!("No migration defined for version {}", version),
        })?;

    let start = std::time::Instant::now();
    let now = chrono::Utc::now().timestamp();

    let mut tx = pool.begin().await?;

    sqlx::raw_sql(sql)
        .execute(&mut *tx)
        .await
        .map_err(|e| PostgresError::MigrationFailed {
            version,
            name: name.to_string(),
            error: e.to_string(),
        })?;

    let elapsed = start.elapsed().as_millis() as i64;

    sqlx::query(
        "INSERT INTO schema_migrations (version, name, applied_at, checksum, execution_time_ms, success)
         VALUES ($1, $2, $3, $4, $5, TRUE)",
    )
    .bind(version)
    .bind(*name)
    .bind(now)
    .bind(compute_checksum(sql))
    .bind(elapsed)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE schema_version SET version = $1, applied_at = $2 WHERE id = 1")
        .bind(version)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::debug!(
        "PostgreSQL migration v{} ({}) applied in {}ms",
        version,
        name,
        elapsed
    );
    Ok(())
}

/// Insert missing built-in permissions
async fn seed_catalog(pool: &PgPool) -> Result<(), PostgresError> {
    let now = chrono::Utc::now().timestamp();
    let mut inserted = 0u64;

    for (name, description, category) in DEFAULT_PERMISSIONS {
        let result = sqlx::query(
            "INSERT INTO permissions (id, name, description, category, created_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(cuid2::create_id())
        .bind(*name)
        .bind(*description)
        .bind(*category)
        .bind(now)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    if inserted > 0 {
        tracing::debug!(count = inserted, "Seeded permission catalog");
    }
    Ok(())
}

/// Insert the default role grants (fresh databases only)
async fn seed_role_grants(pool: &PgPool) -> Result<(), PostgresError> {
    let now = chrono::Utc::now().timestamp();

    for (role, names) in DEFAULT_ROLE_GRANTS {
        for name in *names {
            sqlx::query(
                "INSERT INTO role_permissions (role, permission_id, created_at)
                 SELECT $1, id, $3 FROM permissions WHERE name = $2
                 ON CONFLICT DO NOTHING",
            )
            .bind(role.as_str())
            .bind(*name)
            .bind(now)
            .execute(pool)
            .await?;
        }
    }

    tracing::debug!("Seeded default role grants");
    Ok(())
}

fn compute_checksum(sql: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(sql.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_checksum_stable() {
        assert_eq!(compute_checksum("SELECT 1"), compute_checksum("SELECT 1"));
        assert_ne!(compute_checksum("SELECT 1"), compute_checksum("SELECT 2"));
        assert_eq!(compute_checksum("").len(), 64);
    }

    #[test]
    fn test_migrations_are_ordered_and_above_initial() {
        let mut last = 1;
        for (version, _, _) in MIGRATIONS {
            assert!(*version > last);
            last = *version;
        }
        assert!(last <= SCHEMA_VERSION);
    }

    #[test]
    fn test_schema_declares_auth_tables() {
        for table in ["users", "permissions", "role_permissions", "user_permissions"] {
            assert!(SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {} (", table)));
        }
    }
}
