use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

use crate::api::{
    error::ApiError,
    handlers::{
        auth::{
            password::hash_password,
            state::AuthState,
            storage::{confirm_user, insert_user, user_exists},
            token::TokenPurpose,
        },
        normalize_email, valid_email,
    },
    tasks::{BackgroundTask, TaskQueue},
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserRegister {
    email: String,
    password: String,
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = UserRegister,
    responses(
        (status = 201, description = "Unconfirmed user created; confirmation email scheduled"),
        (status = 409, description = "A user with that email already exists"),
        (status = 422, description = "Invalid email or request body"),
    ),
    tag = "users"
)]
#[instrument(skip(pool, auth, tasks, payload))]
pub async fn register(
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    tasks: Extension<TaskQueue>,
    Json(payload): Json<UserRegister>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&payload.email);

    if !valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".to_string()));
    }

    if user_exists(&pool, &email).await? {
        return Err(ApiError::Conflict(
            "A user with that email already exists".to_string(),
        ));
    }

    let digest = hash_password(&payload.password).map_err(|err| {
        error!("Error hashing password: {err}");
        ApiError::Internal("Internal server error".to_string())
    })?;

    insert_user(&pool, &email, &digest).await?;

    // Scheduled after the insert commits; delivery happens after the response.
    let token = auth.codec().issue(&email, TokenPurpose::Confirmation)?;
    let confirmation_url = auth.confirmation_url(&token);
    debug!(email = %email, "scheduling confirmation email");
    tasks.schedule(BackgroundTask::RegistrationEmail {
        email,
        confirmation_url,
    });

    Ok((StatusCode::CREATED, Json(json!({ "detail": "User created" }))))
}

#[utoipa::path(
    get,
    path = "/confirm/{token}",
    params(
        ("token" = String, Path, description = "Confirmation token from the signup email")
    ),
    responses(
        (status = 200, description = "User confirmed"),
        (status = 401, description = "Invalid or expired confirmation token"),
    ),
    tag = "users"
)]
#[instrument(skip(pool, auth, token))]
pub async fn confirm(
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let email = auth.codec().redeem(&token, TokenPurpose::Confirmation)?;

    // Re-confirming an already-confirmed user is harmless.
    confirm_user(&pool, &email).await?;

    Ok((StatusCode::OK, Json(json!({ "detail": "User confirmed" }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tokio::sync::mpsc;

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(
            &SecretString::from("test-secret"),
            "http://localhost:8080".to_string(),
        ))
    }

    fn task_queue() -> TaskQueue {
        let (tx, _rx) = mpsc::unbounded_channel();
        TaskQueue::new(tx)
    }

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/postgres")
            .expect("lazy pool")
    }

    #[tokio::test]
    async fn test_register_invalid_email() {
        let response = register(
            Extension(lazy_pool()),
            Extension(auth_state()),
            Extension(task_queue()),
            Json(UserRegister {
                email: "not-an-email".to_string(),
                password: "1234".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_confirm_invalid_token() {
        let response = confirm(
            Extension(lazy_pool()),
            Extension(auth_state()),
            Path("invalid_token".to_string()),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_confirm_access_token_rejected() {
        let auth = auth_state();
        let token = auth
            .codec()
            .issue("test@example.net", TokenPurpose::Access)
            .unwrap();
        let response = confirm(Extension(lazy_pool()), Extension(auth), Path(token))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
