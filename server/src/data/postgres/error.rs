//! PostgreSQL error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostgresError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid row data: {0}")]
    InvalidData(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl PostgresError {
    /// Map unique-constraint violations to `Conflict`, everything else to `Database`
    pub fn from_insert(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(db) = &e
            && db.is_unique_violation()
        {
            return Self::Conflict(format!("{} already exists", what));
        }
        Self::Database(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_failed_error_display() {
        let err = PostgresError::MigrationFailed {
            version: 2,
            name: "add_users_phone_index".to_string(),
            error: "syntax error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Migration 2 (add_users_phone_index) failed: syntax error"
        );
    }

    #[test]
    fn test_from_insert_passes_through_non_unique_errors() {
        let err = PostgresError::from_insert(sqlx::Error::RowNotFound, "user");
        assert!(matches!(err, PostgresError::Database(_)));
    }
}
