//! Request handlers

use super::{error::ApiError, AppState};
use crate::types::{NamedImage, PipelineMode, ProcessedResult};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Multipart field carrying the uploaded images
pub const IMAGES_FIELD: &str = "images";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn crop(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<ProcessedResult>>, ApiError> {
    run_batch(state, PipelineMode::Crop, multipart?).await
}

pub async fn process(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<ProcessedResult>>, ApiError> {
    run_batch(state, PipelineMode::Normalize, multipart?).await
}

async fn run_batch(
    state: AppState,
    mode: PipelineMode,
    multipart: Multipart,
) -> Result<Json<Vec<ProcessedResult>>, ApiError> {
    let items = collect_images(multipart).await?;
    let normalizer = Arc::clone(&state.normalizer);

    let report =
        tokio::task::spawn_blocking(move || normalizer.process_batch(mode, &items)).await?;

    Ok(Json(report.into_results()))
}

/// Read every `images` part in arrival order, ignoring other fields
async fn collect_images(mut multipart: Multipart) -> Result<Vec<NamedImage>, ApiError> {
    let mut items = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGES_FIELD) {
            debug!(field = ?field.name(), "ignoring multipart field");
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_owned();
        let bytes = field.bytes().await?;
        debug!(filename = %filename, size = bytes.len(), "received image part");
        items.push(NamedImage::new(filename, bytes.to_vec()));
    }

    Ok(items)
}
