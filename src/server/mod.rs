//! HTTP surface of the normalizer
//!
//! `POST /crop` and `POST /process` accept multipart uploads (repeated
//! `images` field) and answer with a JSON array of `{ filename, data }`.
//! Batches run on the blocking pool so image work never stalls the reactor.

pub mod error;
pub mod routes;

pub use error::ApiError;

use crate::{config::ServerConfig, error::Result, processor::ImageNormalizer};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Shared, read-only state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub normalizer: Arc<ImageNormalizer>,
}

/// Build the application router
pub fn router(normalizer: Arc<ImageNormalizer>, config: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/crop", post(routes::crop))
        .route("/process", post(routes::process))
        .route("/health", get(routes::health))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { normalizer })
}

/// Bind `config.bind_addr` and serve until Ctrl-C
pub async fn serve(config: ServerConfig) -> Result<()> {
    config.validate()?;
    let listener = TcpListener::bind(config.bind_addr).await?;
    serve_on(listener, config).await
}

/// Serve on an already bound listener
pub async fn serve_on(listener: TcpListener, config: ServerConfig) -> Result<()> {
    let normalizer = Arc::new(ImageNormalizer::new(config.normalizer.clone())?);
    let app = router(normalizer, &config);

    info!(
        addr = %listener.local_addr()?,
        max_upload_bytes = config.max_upload_bytes,
        target_width = config.normalizer.target_width,
        canvas_height = config.normalizer.canvas_height,
        overflow = %config.normalizer.overflow_policy,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}
