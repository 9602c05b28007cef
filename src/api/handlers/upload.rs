use axum::{
    extract::{Extension, Multipart},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument};

use crate::api::{
    error::ApiError,
    handlers::auth::{principal::require_auth, state::AuthState},
    objectstore::ObjectStore,
};

const UPLOAD_FAILED: &str = "There was an error uploading the file";

#[utoipa::path(
    post,
    path = "/upload",
    responses(
        (status = 201, description = "File uploaded; body carries the download URL"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 422, description = "No file in the multipart body"),
        (status = 500, description = "There was an error uploading the file"),
    ),
    security(("bearer" = [])),
    tag = "upload"
)]
#[instrument(skip(headers, pool, auth, store, multipart))]
pub async fn upload_file(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth: Extension<Arc<AuthState>>,
    store: Extension<Arc<ObjectStore>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &auth, &pool).await?;

    let mut field = multipart
        .next_field()
        .await
        .map_err(|err| {
            error!("Error reading multipart body: {err}");
            ApiError::Internal(UPLOAD_FAILED.to_string())
        })?
        .ok_or_else(|| ApiError::Validation("Missing file".to_string()))?;

    let file_name = field.file_name().unwrap_or("upload").to_string();

    // Stream the body to a temp path; TempPath removes the file on every
    // exit path once this function returns.
    let temp_path = tempfile::NamedTempFile::new()
        .map_err(|err| {
            error!("Error creating temporary file: {err}");
            ApiError::Internal(UPLOAD_FAILED.to_string())
        })?
        .into_temp_path();

    info!("Saving uploaded file temporarily to {}", temp_path.display());

    let mut file = tokio::fs::File::create(&temp_path).await.map_err(|err| {
        error!("Error opening temporary file: {err}");
        ApiError::Internal(UPLOAD_FAILED.to_string())
    })?;

    while let Some(chunk) = field.chunk().await.map_err(|err| {
        error!("Error receiving upload chunk: {err}");
        ApiError::Internal(UPLOAD_FAILED.to_string())
    })? {
        file.write_all(&chunk).await.map_err(|err| {
            error!("Error writing upload chunk: {err}");
            ApiError::Internal(UPLOAD_FAILED.to_string())
        })?;
    }

    file.flush().await.map_err(|err| {
        error!("Error flushing temporary file: {err}");
        ApiError::Internal(UPLOAD_FAILED.to_string())
    })?;
    drop(file);

    let file_url = store.upload(&temp_path, &file_name).await.map_err(|err| {
        error!("Error uploading {file_name}: {err}");
        ApiError::Internal(UPLOAD_FAILED.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "detail": format!("Successfully uploaded {file_name}"),
            "file_url": file_url,
        })),
    ))
}
