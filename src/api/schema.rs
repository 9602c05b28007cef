//! Idempotent schema bootstrap executed at startup.

use sqlx::PgPool;
use tracing::{info_span, Instrument};

// Like uniqueness per (post, user) is intentionally not enforced; see DESIGN.md.
const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        confirmed BOOLEAN NOT NULL DEFAULT FALSE
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS posts (
        id BIGSERIAL PRIMARY KEY,
        body TEXT NOT NULL,
        user_id BIGINT NOT NULL REFERENCES users (id),
        image_url TEXT
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS comments (
        id BIGSERIAL PRIMARY KEY,
        body TEXT NOT NULL,
        post_id BIGINT NOT NULL REFERENCES posts (id),
        user_id BIGINT NOT NULL REFERENCES users (id)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS likes (
        id BIGSERIAL PRIMARY KEY,
        post_id BIGINT NOT NULL REFERENCES posts (id),
        user_id BIGINT NOT NULL REFERENCES users (id)
    )
    ",
];

/// Create the tables if they do not exist yet.
///
/// # Errors
/// Returns an error if any of the DDL statements fails.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "CREATE",
            db.statement = statement
        );
        sqlx::query(statement)
            .execute(pool)
            .instrument(span)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_covers_all_tables() {
        let ddl = SCHEMA.join("\n");
        for table in ["users", "posts", "comments", "likes"] {
            assert!(
                ddl.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")),
                "missing DDL for {table}"
            );
        }
    }
}
