#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Shoe Normalizer
//!
//! Normalizes product photos shot on a near-white background: locate the
//! subject, crop to it, scale it to a fixed width and center it on a white
//! canvas (2048x2048 with the default settings).
//!
//! ## Features
//!
//! - **Subject detection**: tolerance-based bounding box over non-background pixels
//! - **Two pipelines**: crop-only debug output and full normalization
//! - **Batch processing**: per-item failures are reported and skipped, order is kept
//! - **HTTP service**: multipart `POST /crop` and `POST /process` endpoints (axum)
//! - **CLI Integration**: `serve` and offline `normalize` subcommands (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shoe_normalizer::{normalize_image_bytes, NormalizerConfig};
//!
//! # fn example() -> anyhow::Result<()> {
//! let photo = std::fs::read("boot.jpg")?;
//! let png = normalize_image_bytes(&photo, &NormalizerConfig::default())?;
//! std::fs::write("boot.png", png)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Running the service
//!
//! ```rust,no_run
//! use shoe_normalizer::{server, ServerConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! server::serve(ServerConfig::default()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface and subscriber setup
//! - `webp-support` (default): WebP input decoding
//! - `tracing-json`: JSON log output for the CLI

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod locator;
pub mod processor;
pub mod server;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

pub use config::{NormalizerConfig, NormalizerConfigBuilder, OverflowPolicy, ServerConfig};
pub use error::{NormalizeError, Result};
pub use locator::{crop_shoe, SubjectLocator};
pub use processor::ImageNormalizer;
pub use services::{DecodeMode, EncodedImage, ImageIOService, OutputFormatHandler};
pub use types::{
    BatchReport, BoundingBox, ItemFailure, ItemOutcome, NamedImage, PipelineMode, PixelGrid,
    ProcessedResult, ProcessingStage, ProcessingTimings,
};
pub use utils::{FitPlan, ImagePreprocessor, MAX_SCALED_DIMENSION};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Crop an encoded image to its subject and return PNG bytes
///
/// # Examples
///
/// ```rust,no_run
/// use shoe_normalizer::{crop_image_bytes, NormalizerConfig};
///
/// # fn example(upload: &[u8]) -> shoe_normalizer::Result<()> {
/// let png = crop_image_bytes(upload, &NormalizerConfig::default())?;
/// # Ok(())
/// # }
/// ```
pub fn crop_image_bytes(image_bytes: &[u8], config: &NormalizerConfig) -> Result<Vec<u8>> {
    let normalizer = ImageNormalizer::new(config.clone())?;
    Ok(normalizer.process_bytes(PipelineMode::Crop, image_bytes)?.png)
}

/// Run the full normalization pipeline on an encoded image and return PNG bytes
pub fn normalize_image_bytes(image_bytes: &[u8], config: &NormalizerConfig) -> Result<Vec<u8>> {
    let normalizer = ImageNormalizer::new(config.clone())?;
    Ok(normalizer.process_bytes(PipelineMode::Normalize, image_bytes)?.png)
}
