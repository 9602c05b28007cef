//! Error taxonomy for the API surface.
//!
//! Handlers return `ApiError`, which maps each failure class to an HTTP
//! status and a `{"detail": "..."}` JSON body. Database and other internal
//! failures are logged here before they collapse into a generic 500.

use axum::{
    http::{header::WWW_AUTHENTICATE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use super::handlers::auth::token::TokenError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Internal(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding => Self::Internal("Internal server error".to_string()),
            other => Self::Unauthorized(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Conflict(detail) => (StatusCode::CONFLICT, detail),
            Self::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            Self::Unauthorized(detail) => {
                let body = Json(json!({ "detail": detail }));
                return (
                    StatusCode::UNAUTHORIZED,
                    [(WWW_AUTHENTICATE, "Bearer")],
                    body,
                )
                    .into_response();
            }
            Self::Validation(detail) => (StatusCode::UNPROCESSABLE_ENTITY, detail),
            Self::Internal(detail) => {
                error!("internal error: {detail}");
                (StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
            Self::Database(err) => {
                error!("database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Failures talking to third-party HTTP APIs (mail, image generation).
///
/// These never surface as HTTP responses directly; the background runner
/// logs them or converts them into a notification email.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("API request failed with status code {0}")]
    Status(u16),

    #[error("API response parsing failed")]
    Parse,

    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API client is not configured")]
    Unconfigured,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Conflict("dup".into()),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::NotFound("gone".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Unauthorized("no".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::Validation("bad".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_unauthorized_carries_bearer_challenge() {
        let response = ApiError::Unauthorized("Invalid token".into()).into_response();
        assert_eq!(
            response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|value| value.to_str().ok()),
            Some("Bearer")
        );
    }

    #[test]
    fn test_upstream_error_messages() {
        assert_eq!(
            UpstreamError::Status(503).to_string(),
            "API request failed with status code 503"
        );
        assert_eq!(
            UpstreamError::Parse.to_string(),
            "API response parsing failed"
        );
    }
}
