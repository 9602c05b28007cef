//! Bearer-token authorization for protected routes.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use sqlx::PgPool;

use crate::api::error::ApiError;

use super::state::AuthState;
use super::storage::get_user_by_email;
use super::token::TokenPurpose;

/// Authenticated user context derived from the bearer token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: i64,
    pub email: String,
}

/// Resolve the `Authorization: Bearer` header into a principal.
///
/// The token must redeem with the access purpose and its subject must still
/// resolve to a confirmed user; `user_id` on created rows always comes from
/// here, never from client input.
///
/// # Errors
/// Returns `ApiError::Unauthorized` when the header is missing or malformed,
/// the token fails any redeem check, the user no longer exists, or the user
/// is not confirmed.
pub async fn require_auth(
    headers: &HeaderMap,
    auth: &AuthState,
    pool: &PgPool,
) -> Result<Principal, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    let email = auth.codec().redeem(token, TokenPurpose::Access)?;

    let user = get_user_by_email(pool, &email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Could not validate credentials".to_string()))?;

    if !user.confirmed {
        return Err(ApiError::Unauthorized(
            "User has not confirmed email".to_string(),
        ));
    }

    Ok(Principal {
        user_id: user.id,
        email: user.email,
    })
}
