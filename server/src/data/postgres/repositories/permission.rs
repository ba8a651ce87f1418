//! Permission catalog, role grant and user override queries

use sqlx::PgPool;

use crate::data::postgres::PostgresError;
use crate::data::types::{PermissionRow, Role, UserOverrideRow};

type PermissionTuple = (String, String, String, String);

fn permission_from_tuple((id, name, description, category): PermissionTuple) -> PermissionRow {
    PermissionRow {
        id,
        name,
        description,
        category,
    }
}

pub async fn list_permissions(pool: &PgPool) -> Result<Vec<PermissionRow>, PostgresError> {
    let rows = sqlx::query_as::<_, PermissionTuple>(
        "SELECT id, name, description, category FROM permissions ORDER BY category, name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(permission_from_tuple).collect())
}

pub async fn find_permission_by_name(
    pool: &PgPool,
    name: &str,
) -> Result<Option<PermissionRow>, PostgresError> {
    let row = sqlx::query_as::<_, PermissionTuple>(
        "SELECT id, name, description, category FROM permissions WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(permission_from_tuple))
}

pub async fn role_has_permission(
    pool: &PgPool,
    role: Role,
    permission_id: &str,
) -> Result<bool, PostgresError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM role_permissions WHERE role = $1 AND permission_id = $2)",
    )
    .bind(role.as_str())
    .bind(permission_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

pub async fn user_override(
    pool: &PgPool,
    user_id: &str,
    permission_id: &str,
) -> Result<Option<bool>, PostgresError> {
    let granted: Option<bool> = sqlx::query_scalar(
        "SELECT granted FROM user_permissions WHERE user_id = $1 AND permission_id = $2",
    )
    .bind(user_id)
    .bind(permission_id)
    .fetch_optional(pool)
    .await?;
    Ok(granted)
}

pub async fn list_role_permissions(
    pool: &PgPool,
    role: Role,
) -> Result<Vec<PermissionRow>, PostgresError> {
    let rows = sqlx::query_as::<_, PermissionTuple>(
        "SELECT p.id, p.name, p.description, p.category
         FROM role_permissions rp
         JOIN permissions p ON p.id = rp.permission_id
         WHERE rp.role = $1
         ORDER BY p.category, p.name",
    )
    .bind(role.as_str())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(permission_from_tuple).collect())
}

pub async fn list_user_overrides(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<UserOverrideRow>, PostgresError> {
    let rows = sqlx::query_as::<_, (String, String, String, String, bool)>(
        "SELECT p.id, p.name, p.description, p.category, up.granted
         FROM user_permissions up
         JOIN permissions p ON p.id = up.permission_id
         WHERE up.user_id = $1
         ORDER BY p.category, p.name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, name, description, category, granted)| UserOverrideRow {
            permission: permission_from_tuple((id, name, description, category)),
            granted,
        })
        .collect())
}

/// Full replace inside one transaction
pub async fn replace_role_permissions(
    pool: &PgPool,
    role: Role,
    permission_ids: &[String],
) -> Result<(), PostgresError> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM role_permissions WHERE role = $1")
        .bind(role.as_str())
        .execute(&mut *tx)
        .await?;

    for permission_id in permission_ids {
        sqlx::query(
            "INSERT INTO role_permissions (role, permission_id, created_at) VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(role.as_str())
        .bind(permission_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn set_user_override(
    pool: &PgPool,
    user_id: &str,
    permission_id: &str,
    granted: bool,
) -> Result<(), PostgresError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO user_permissions (user_id, permission_id, granted, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $4)
         ON CONFLICT (user_id, permission_id) DO UPDATE SET granted = $3, updated_at = $4",
    )
    .bind(user_id)
    .bind(permission_id)
    .bind(granted)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_user_override(
    pool: &PgPool,
    user_id: &str,
    permission_id: &str,
) -> Result<bool, PostgresError> {
    let result =
        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1 AND permission_id = $2")
            .bind(user_id)
            .bind(permission_id)
            .execute(pool)
            .await?;
    Ok(result.rows_affected() > 0)
}
