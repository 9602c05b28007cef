//! Query helpers over the `users` relation.

use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub confirmed: bool,
}

/// Fetch a user by email, or `None` when the email is unknown.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn get_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let query = "SELECT id, email, password, confirmed FROM users WHERE email = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    Ok(row.map(|row| UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        password: row.get("password"),
        confirmed: row.get("confirmed"),
    }))
}

/// # Errors
/// Returns an error if the query fails.
pub async fn user_exists(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
    let query = "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1) AS exists";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_one(pool)
        .instrument(span)
        .await?;

    Ok(row.get("exists"))
}

/// Insert a new unconfirmed user with a pre-hashed password digest.
///
/// # Errors
/// Returns an error if the insert fails (including the unique-email
/// constraint).
pub async fn insert_user(
    pool: &PgPool,
    email: &str,
    password_digest: &str,
) -> Result<(), sqlx::Error> {
    let query = "INSERT INTO users (email, password) VALUES ($1, $2)";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(password_digest)
        .execute(pool)
        .instrument(span)
        .await?;

    Ok(())
}

/// Flip `confirmed` for the given email. A no-op for unknown emails, which
/// keeps confirmation idempotent in effect.
///
/// # Errors
/// Returns an error if the update fails.
pub async fn confirm_user(pool: &PgPool, email: &str) -> Result<(), sqlx::Error> {
    let query = "UPDATE users SET confirmed = TRUE WHERE email = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .execute(pool)
        .instrument(span)
        .await?;

    Ok(())
}
