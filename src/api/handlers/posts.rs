use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{debug, info_span, instrument, Instrument};
use utoipa::ToSchema;

use crate::api::{
    error::ApiError,
    handlers::{
        auth::{principal::require_auth, state::AuthState},
        comments::{comments_on_post, Comment},
    },
    tasks::{BackgroundTask, TaskQueue},
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PostCreate {
    body: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Post {
    pub id: i64,
    pub body: String,
    pub user_id: i64,
    pub image_url: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct PostWithLikes {
    pub id: i64,
    pub body: String,
    pub user_id: i64,
    pub image_url: Option<String>,
    pub likes: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PostDetail {
    pub post: PostWithLikes,
    pub comments: Vec<Comment>,
}

/// The three supported total orderings for `GET /post`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSorting {
    New,
    Old,
    MostLikes,
}

impl PostSorting {
    /// Parse the `sorting` query value; `None` defaults to newest-first.
    ///
    /// # Errors
    /// Returns `ApiError::Validation` for unknown values so bad input is a
    /// 422 rather than silently falling back to a default order.
    pub fn parse(value: Option<&str>) -> Result<Self, ApiError> {
        match value {
            None | Some("new") => Ok(Self::New),
            Some("old") => Ok(Self::Old),
            Some("most_likes") => Ok(Self::MostLikes),
            Some(other) => Err(ApiError::Validation(format!(
                "Invalid sorting option: {other}"
            ))),
        }
    }

    const fn order_clause(self) -> &'static str {
        match self {
            Self::New => "ORDER BY p.id DESC",
            Self::Old => "ORDER BY p.id ASC",
            // Tie-break is whatever stable order the join produces.
            Self::MostLikes => "ORDER BY likes DESC",
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct ListParams {
    sorting: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CreateParams {
    prompt: Option<String>,
}

#[utoipa::path(
    post,
    path = "/post",
    request_body = PostCreate,
    params(
        ("prompt" = Option<String>, Query, description = "Schedule image generation for the new post")
    ),
    responses(
        (status = 201, description = "Post created", body = Post),
        (status = 401, description = "Missing or invalid bearer token"),
    ),
    security(("bearer" = [])),
    tag = "posts"
)]
#[instrument(skip(headers, pool, auth, tasks, payload))]
pub async fn create_post(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    tasks: Extension<TaskQueue>,
    Query(params): Query<CreateParams>,
    Json(payload): Json<PostCreate>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &auth, &pool).await?;

    let post = insert_post(&pool, &payload.body, principal.user_id).await?;

    if let Some(prompt) = params.prompt {
        debug!(post_id = post.id, "scheduling image generation");
        tasks.schedule(BackgroundTask::GenerateImage {
            email: principal.email,
            post_id: post.id,
            post_url: auth.post_url(post.id),
            prompt,
        });
    }

    Ok((StatusCode::CREATED, Json(post)))
}

#[utoipa::path(
    get,
    path = "/post",
    params(
        ("sorting" = Option<String>, Query, description = "new (default), old or most_likes")
    ),
    responses(
        (status = 200, description = "All posts with their like counts", body = [PostWithLikes]),
        (status = 422, description = "Unknown sorting option"),
    ),
    tag = "posts"
)]
#[instrument(skip(pool))]
pub async fn list_posts(
    pool: Extension<PgPool>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let sorting = PostSorting::parse(params.sorting.as_deref())?;
    let posts = list_posts_with_likes(&pool, sorting).await?;

    Ok(Json(posts))
}

#[utoipa::path(
    get,
    path = "/post/{post_id}",
    params(
        ("post_id" = i64, Path, description = "Post id")
    ),
    responses(
        (status = 200, description = "Post with like count and comments", body = PostDetail),
        (status = 404, description = "Post not found"),
    ),
    tag = "posts"
)]
#[instrument(skip(pool))]
pub async fn get_post(
    pool: Extension<PgPool>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let post = find_post_with_likes(&pool, post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    let comments = comments_on_post(&pool, post_id).await?;

    Ok(Json(PostDetail { post, comments }))
}

/// Fetch a bare post row, used as the existence guard for comments and likes.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn find_post(pool: &PgPool, post_id: i64) -> Result<Option<Post>, sqlx::Error> {
    let query = "SELECT id, body, user_id, image_url FROM posts WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(post_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    Ok(row.map(|row| Post {
        id: row.get("id"),
        body: row.get("body"),
        user_id: row.get("user_id"),
        image_url: row.get("image_url"),
    }))
}

async fn insert_post(pool: &PgPool, body: &str, user_id: i64) -> Result<Post, sqlx::Error> {
    let query = "INSERT INTO posts (body, user_id) VALUES ($1, $2) RETURNING id";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(body)
        .bind(user_id)
        .fetch_one(pool)
        .instrument(span)
        .await?;

    Ok(Post {
        id: row.get("id"),
        body: body.to_string(),
        user_id,
        image_url: None,
    })
}

// Like counts are computed from the likes table at read time, not maintained
// incrementally.
const LIST_QUERY: &str = r"
    SELECT p.id, p.body, p.user_id, p.image_url, COUNT(l.id) AS likes
    FROM posts p
    LEFT OUTER JOIN likes l ON p.id = l.post_id
    GROUP BY p.id
";

async fn list_posts_with_likes(
    pool: &PgPool,
    sorting: PostSorting,
) -> Result<Vec<PostWithLikes>, sqlx::Error> {
    let query = format!("{LIST_QUERY} {}", sorting.order_clause());
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .instrument(span)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| PostWithLikes {
            id: row.get("id"),
            body: row.get("body"),
            user_id: row.get("user_id"),
            image_url: row.get("image_url"),
            likes: row.get("likes"),
        })
        .collect())
}

async fn find_post_with_likes(
    pool: &PgPool,
    post_id: i64,
) -> Result<Option<PostWithLikes>, sqlx::Error> {
    let query = r"
        SELECT p.id, p.body, p.user_id, p.image_url, COUNT(l.id) AS likes
        FROM posts p
        LEFT OUTER JOIN likes l ON p.id = l.post_id
        WHERE p.id = $1
        GROUP BY p.id
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(post_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    Ok(row.map(|row| PostWithLikes {
        id: row.get("id"),
        body: row.get("body"),
        user_id: row.get("user_id"),
        image_url: row.get("image_url"),
        likes: row.get("likes"),
    }))
}

/// Write the generated image URL onto a post (background task path).
///
/// # Errors
/// Returns an error if the update fails.
pub async fn set_post_image_url(
    pool: &PgPool,
    post_id: i64,
    image_url: &str,
) -> Result<(), sqlx::Error> {
    let query = "UPDATE posts SET image_url = $2 WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(post_id)
        .bind(image_url)
        .execute(pool)
        .instrument(span)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tokio::sync::mpsc;

    #[test]
    fn test_sorting_parse() {
        assert_eq!(PostSorting::parse(None).unwrap(), PostSorting::New);
        assert_eq!(PostSorting::parse(Some("new")).unwrap(), PostSorting::New);
        assert_eq!(PostSorting::parse(Some("old")).unwrap(), PostSorting::Old);
        assert_eq!(
            PostSorting::parse(Some("most_likes")).unwrap(),
            PostSorting::MostLikes
        );
        assert!(PostSorting::parse(Some("wrong")).is_err());
    }

    #[test]
    fn test_order_clauses() {
        assert_eq!(PostSorting::New.order_clause(), "ORDER BY p.id DESC");
        assert_eq!(PostSorting::Old.order_clause(), "ORDER BY p.id ASC");
        assert_eq!(PostSorting::MostLikes.order_clause(), "ORDER BY likes DESC");
    }

    #[tokio::test]
    async fn test_create_post_requires_bearer() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .expect("lazy pool");
        let auth = Arc::new(AuthState::new(
            &SecretString::from("test-secret"),
            "http://localhost:8080".to_string(),
        ));
        let (tx, _rx) = mpsc::unbounded_channel();

        let response = create_post(
            HeaderMap::new(),
            Extension(pool),
            Extension(auth),
            Extension(TaskQueue::new(tx)),
            Query(CreateParams { prompt: None }),
            Json(PostCreate {
                body: "Test Post".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_posts_wrong_sorting() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .expect("lazy pool");

        let response = list_posts(
            Extension(pool),
            Query(ListParams {
                sorting: Some("wrong".to_string()),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
