//! User repository for PostgreSQL operations

use sqlx::PgPool;

use crate::data::postgres::PostgresError;
use crate::data::types::{NewUser, Role, UserRow};

const USER_COLUMNS: &str = "id, username, email, phone, role, password_hash, is_active, \
                            last_login_at, created_at, updated_at";

type UserTuple = (
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
    bool,
    Option<i64>,
    i64,
    i64,
);

fn user_from_tuple(row: UserTuple) -> Result<UserRow, PostgresError> {
    let (
        id,
        username,
        email,
        phone,
        role,
        password_hash,
        is_active,
        last_login_at,
        created_at,
        updated_at,
    ) = row;
    let role = role
        .parse::<Role>()
        .map_err(|e| PostgresError::InvalidData(format!("user {}: {}", id, e)))?;
    Ok(UserRow {
        id,
        username,
        email,
        phone,
        role,
        password_hash,
        is_active,
        last_login_at,
        created_at,
        updated_at,
    })
}

/// Fetch one user where `column = value`
async fn find_by_column(
    pool: &PgPool,
    column: &'static str,
    value: &str,
) -> Result<Option<UserRow>, PostgresError> {
    let sql = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, column);
    let row = sqlx::query_as::<_, UserTuple>(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await?;
    row.map(user_from_tuple).transpose()
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<UserRow>, PostgresError> {
    find_by_column(pool, "id", id).await
}

pub async fn find_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<UserRow>, PostgresError> {
    find_by_column(pool, "username", username).await
}

/// Emails compare case-insensitively
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, PostgresError> {
    let sql = format!(
        "SELECT {} FROM users WHERE lower(email) = lower($1)",
        USER_COLUMNS
    );
    let row = sqlx::query_as::<_, UserTuple>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?;
    row.map(user_from_tuple).transpose()
}

pub async fn find_by_phone(pool: &PgPool, phone: &str) -> Result<Option<UserRow>, PostgresError> {
    find_by_column(pool, "phone", phone).await
}

pub async fn update_last_login(pool: &PgPool, id: &str, at: i64) -> Result<(), PostgresError> {
    sqlx::query("UPDATE users SET last_login_at = $1 WHERE id = $2")
        .bind(at)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_password_hash(
    pool: &PgPool,
    id: &str,
    hash: &str,
) -> Result<(), PostgresError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
        .bind(hash)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Create a new user with a generated CUID2 ID
pub async fn insert_user(pool: &PgPool, user: NewUser) -> Result<UserRow, PostgresError> {
    let id = cuid2::create_id();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO users (id, username, email, phone, role, password_hash, is_active, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(&id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.phone)
    .bind(user.role.as_str())
    .bind(&user.password_hash)
    .bind(user.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| PostgresError::from_insert(e, "user"))?;

    Ok(UserRow {
        id,
        username: user.username,
        email: user.email,
        phone: user.phone,
        role: user.role,
        password_hash: user.password_hash,
        is_active: user.is_active,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    })
}
