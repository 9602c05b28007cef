use axum::{
    extract::Extension,
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
pub struct LikeCreate {
    post_id: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Like {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
}

#[utoipa::path(
    post,
    path = "/like",
    request_body = LikeCreate,
    responses(
        (status = 201, description = "Like created", body = Like),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "Post not found"),
    ),
    security(("bearer" = [])),
    tag = "likes"
)]
#[instrument(skip(headers, pool, auth, payload))]
pub async fn create_like(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    Json(payload): Json<LikeCreate>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &auth, &pool).await?;

    if find_post(&pool, payload.post_id).await?.is_none() {
        return Err(ApiError::NotFound("Post not found".to_string()));
    }

    let like = insert_like(&pool, payload.post_id, principal.user_id).await?;

    Ok((StatusCode::CREATED, Json(like)))
}

async fn insert_like(pool: &PgPool, post_id: i64, user_id: i64) -> Result<Like, sqlx::Error> {
    let query = "INSERT INTO likes (post_id, user_id) VALUES ($1, $2) RETURNING id";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(post_id)
        .bind(user_id)
        .fetch_one(pool)
        .instrument(span)
        .await?;

    Ok(Like {
        id: row.get("id"),
        post_id,
        user_id,
    })
}
