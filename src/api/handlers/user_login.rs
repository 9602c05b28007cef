use axum::{extract::Extension, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use crate::api::{
    error::ApiError,
    handlers::{
        auth::{
            password::verify_password,
            state::AuthState,
            storage::{get_user_by_email, UserRecord},
            token::TokenPurpose,
        },
        normalize_email,
    },
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserCredentials {
    email: String,
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenResponse {
    access_token: String,
    token_type: String,
}

/// Authenticate a user by email and password.
///
/// Unknown emails and wrong passwords share one message so the response does
/// not reveal which check failed; the unconfirmed case is distinguished.
///
/// # Errors
/// Returns `ApiError::Unauthorized` on any failed check.
pub async fn authenticate_user(
    pool: &PgPool,
    email: &str,
    password: &str,
) -> Result<UserRecord, ApiError> {
    let user = get_user_by_email(pool, email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    if !verify_password(password, &user.password) {
        return Err(ApiError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    if !user.confirmed {
        return Err(ApiError::Unauthorized(
            "User has not confirmed email".to_string(),
        ));
    }

    Ok(user)
}

#[utoipa::path(
    post,
    path = "/token",
    request_body = UserCredentials,
    responses(
        (status = 200, description = "Access token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials or unconfirmed user"),
    ),
    tag = "users"
)]
#[instrument(skip(pool, auth, credentials))]
pub async fn login(
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    Json(credentials): Json<UserCredentials>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&credentials.email);
    let user = authenticate_user(&pool, &email, &credentials.password).await?;

    let access_token = auth.codec().issue(&user.email, TokenPurpose::Access)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}
