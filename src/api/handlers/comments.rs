use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{info_span, instrument, Instrument};
use utoipa::ToSchema;

use crate::api::{
    error::ApiError,
    handlers::{
        auth::{principal::require_auth, state::AuthState},
        posts::find_post,
    },
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CommentCreate {
    body: String,
    post_id: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub post_id: i64,
    pub user_id: i64,
}

#[utoipa::path(
    post,
    path = "/comment",
    request_body = CommentCreate,
    responses(
        (status = 201, description = "Comment created", body = Comment),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Post not found"),
    ),
    security(("bearer" = [])),
    tag = "comments"
)]
#[instrument(skip(headers, pool, auth, payload))]
pub async fn create_comment(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    Json(payload): Json<CommentCreate>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &auth, &pool).await?;

    if find_post(&pool, payload.post_id).await?.is_none() {
        return Err(ApiError::NotFound("Post not found".to_string()));
    }

    let comment =
        insert_comment(&pool, &payload.body, payload.post_id, principal.user_id).await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    get,
    path = "/post/{post_id}/comment",
    params(
        ("post_id" = i64, Path, description = "Post id")
    ),
    responses(
        (status = 200, description = "Comments on the post; empty for unknown posts", body = [Comment]),
    ),
    tag = "comments"
)]
#[instrument(skip(pool))]
pub async fn get_comments_on_post(
    pool: Extension<PgPool>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    // A missing post yields an empty list here, not a 404.
    let comments = comments_on_post(&pool, post_id).await?;

    Ok(Json(comments))
}

/// # Errors
/// Returns an error if the query fails.
pub async fn comments_on_post(pool: &PgPool, post_id: i64) -> Result<Vec<Comment>, sqlx::Error> {
    let query = "SELECT id, body, post_id, user_id FROM comments WHERE post_id = $1 ORDER BY id";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(post_id)
        .fetch_all(pool)
        .instrument(span)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| Comment {
            id: row.get("id"),
            body: row.get("body"),
            post_id: row.get("post_id"),
            user_id: row.get("user_id"),
        })
        .collect())
}

async fn insert_comment(
    pool: &PgPool,
    body: &str,
    post_id: i64,
    user_id: i64,
) -> Result<Comment, sqlx::Error> {
    let query = "INSERT INTO comments (body, post_id, user_id) VALUES ($1, $2, $3) RETURNING id";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(body)
        .bind(post_id)
        .bind(user_id)
        .fetch_one(pool)
        .instrument(span)
        .await?;

    Ok(Comment {
        id: row.get("id"),
        body: body.to_string(),
        post_id,
        user_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn test_create_comment_requires_bearer() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .expect("lazy pool");
        let auth = Arc::new(AuthState::new(
            &SecretString::from("test-secret"),
            "http://localhost:8080".to_string(),
        ));

        let response = create_comment(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth),
            Json(CommentCreate {
                body: "Test Comment".to_string(),
                post_id: 1,
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
