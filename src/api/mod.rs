//! Server bootstrap: pool, schema, dependency-injected services, router
//! layers and graceful shutdown.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Extension, MatchedPath},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

use crate::cli::globals::Config;

pub(crate) mod email;
pub(crate) mod error;
pub(crate) mod handlers;
pub(crate) mod imagegen;
pub(crate) mod objectstore;
mod openapi;
pub(crate) mod schema;
pub(crate) mod tasks;

pub use openapi::openapi;

use handlers::auth::state::AuthState;

// Uploads stream through a temp file; cap the request body well above the
// axum default.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, config: Config) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    schema::ensure_schema(&pool)
        .await
        .context("Failed to create database schema")?;

    let auth_state = Arc::new(AuthState::new(&config.jwt_secret, config.base_url.clone()));
    let store = Arc::new(
        objectstore::ObjectStore::from_config(&config)
            .context("Failed to build object storage client")?,
    );
    let mailer = email::Mailer::from_config(&config).context("Failed to build mail client")?;
    let generator = imagegen::ImageGenerator::from_config(&config)
        .context("Failed to build image generation client")?;

    // Single worker drains the fire-and-forget task channel after responses
    // are sent; its handle lives as long as the server.
    let (task_queue, _worker) = tasks::spawn_worker(pool.clone(), mailer, generator);

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    let (router, api_doc) = openapi::api_router().split_for_parts();
    let app = router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_doc))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
                .layer(Extension(auth_state))
                .layer(Extension(task_queue))
                .layer(Extension(store))
                .layer(Extension(pool.clone())),
        )
        .layer(Extension(pool));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!(
        "Listening on [::]:{} ({} environment)",
        port,
        config.environment.as_str()
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
