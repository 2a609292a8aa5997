//! Core types for the normalization pipeline

use crate::error::{NormalizeError, Result};
use image::RgbImage;
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of color channels in a [`PixelGrid`]
pub const CHANNELS: usize = 3;

/// Pure white RGB pixel
pub const WHITE: [u8; CHANNELS] = [255, 255, 255];

/// RGB raster stored as a `(height, width, 3)` array of `u8`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    data: Array3<u8>,
}

impl PixelGrid {
    /// Wrap an existing array, which must have exactly three channels
    pub fn from_array(data: Array3<u8>) -> Result<Self> {
        let (_, _, channels) = data.dim();
        if channels != CHANNELS {
            return Err(NormalizeError::processing(format!(
                "Pixel grid must have {} channels, got {}",
                CHANNELS, channels
            )));
        }
        Ok(Self { data })
    }

    /// Grid of the given size with every pixel set to `pixel`
    #[must_use]
    pub fn filled(width: usize, height: usize, pixel: [u8; CHANNELS]) -> Self {
        let data = Array3::from_shape_fn((height, width, CHANNELS), |(_, _, c)| {
            pixel.get(c).copied().unwrap_or(255)
        });
        Self { data }
    }

    /// All-white grid of the given size
    #[must_use]
    pub fn white(width: usize, height: usize) -> Self {
        Self::filled(width, height, WHITE)
    }

    /// Convert an 8-bit RGB image buffer into a grid
    pub fn from_rgb_image(image: RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        let data = Array3::from_shape_vec(
            (height as usize, width as usize, CHANNELS),
            image.into_raw(),
        )
        .map_err(|e| NormalizeError::internal(format!("RGB buffer has unexpected shape: {}", e)))?;
        Ok(Self { data })
    }

    /// Convert the grid back into an 8-bit RGB image buffer
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        let (width, height) = self.dimensions_u32()?;
        // Logical iteration order is row-major regardless of memory layout.
        let raw: Vec<u8> = self.data.iter().copied().collect();
        RgbImage::from_raw(width, height, raw)
            .ok_or_else(|| NormalizeError::internal("Pixel buffer length does not match dimensions"))
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    /// `(width, height)` in pixels
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    /// `(width, height)` as the `u32` pair the image crate expects
    pub fn dimensions_u32(&self) -> Result<(u32, u32)> {
        let width = u32::try_from(self.width())
            .map_err(|_| NormalizeError::processing("Grid width exceeds u32 range"))?;
        let height = u32::try_from(self.height())
            .map_err(|_| NormalizeError::processing("Grid height exceeds u32 range"))?;
        Ok((width, height))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// RGB value at column `x`, row `y`
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; CHANNELS]> {
        Some([
            *self.data.get((y, x, 0))?,
            *self.data.get((y, x, 1))?,
            *self.data.get((y, x, 2))?,
        ])
    }

    /// Overwrite the pixel at column `x`, row `y`; out-of-range writes are ignored
    pub fn set_pixel(&mut self, x: usize, y: usize, pixel: [u8; CHANNELS]) {
        for (c, value) in pixel.into_iter().enumerate() {
            if let Some(slot) = self.data.get_mut((y, x, c)) {
                *slot = value;
            }
        }
    }

    #[must_use]
    pub fn as_array(&self) -> &Array3<u8> {
        &self.data
    }

    pub(crate) fn as_array_mut(&mut self) -> &mut Array3<u8> {
        &mut self.data
    }
}

/// Axis-aligned box with exclusive high ends: columns `x0..x1`, rows `y0..y1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl BoundingBox {
    /// Create a box, requiring `x0 < x1` and `y0 < y1`
    pub fn new(x0: usize, y0: usize, x1: usize, y1: usize) -> Result<Self> {
        if x0 >= x1 || y0 >= y1 {
            return Err(NormalizeError::processing(format!(
                "Degenerate bounding box ({}, {}, {}, {})",
                x0, y0, x1, y1
            )));
        }
        Ok(Self { x0, y0, x1, y1 })
    }

    /// Box covering an entire `width` x `height` frame
    #[must_use]
    pub fn full_frame(width: usize, height: usize) -> Self {
        Self {
            x0: 0,
            y0: 0,
            x1: width,
            y1: height,
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }

    #[must_use]
    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    /// Intersect with a `width` x `height` frame
    #[must_use]
    pub fn clamp_to(&self, width: usize, height: usize) -> Self {
        let x1 = self.x1.min(width);
        let y1 = self.y1.min(height);
        Self {
            x0: self.x0.min(x1),
            y0: self.y0.min(y1),
            x1,
            y1,
        }
    }

    /// `(x0, y0, x1, y1)`
    #[must_use]
    pub fn as_tuple(&self) -> (usize, usize, usize, usize) {
        (self.x0, self.y0, self.x1, self.y1)
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x0, self.y0, self.x1, self.y1)
    }
}

/// Which pipeline a batch runs through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// Decode, locate, crop, encode
    Crop,
    /// Decode with alpha on white, locate, crop, scale, pad, encode
    Normalize,
}

impl std::fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Crop => write!(f, "crop"),
            Self::Normalize => write!(f, "normalize"),
        }
    }
}

/// Pipeline stage an item failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStage {
    Decode,
    Crop,
    Scale,
    Pad,
    Encode,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Decode => "decode",
            Self::Crop => "crop",
            Self::Scale => "scale",
            Self::Pad => "pad",
            Self::Encode => "encode",
        };
        f.write_str(name)
    }
}

/// One uploaded image with its client-supplied filename
#[derive(Debug, Clone)]
pub struct NamedImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl NamedImage {
    pub fn new<S: Into<String>>(filename: S, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Wall-clock breakdown of a single item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingTimings {
    pub decode_ms: u64,
    pub transform_ms: u64,
    pub encode_ms: u64,
    pub total_ms: u64,
}

/// A successfully processed image, serialized as `{ "filename", "data" }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedResult {
    /// Client-supplied filename, passed through unchanged
    pub filename: String,

    /// Base64 (standard alphabet, padded) PNG payload
    pub data: String,

    /// Raw PNG bytes behind `data`
    #[serde(skip)]
    pub png: Vec<u8>,

    /// Output `(width, height)`
    #[serde(skip)]
    pub dimensions: (u32, u32),

    /// Subject box found in the decoded input
    #[serde(skip)]
    pub subject_box: Option<BoundingBox>,

    #[serde(skip)]
    pub timings: ProcessingTimings,
}

/// Why an item was dropped from a batch
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("item {index} ('{filename}') failed at {stage}: {reason}")]
pub struct ItemFailure {
    /// Position of the item in the request
    pub index: usize,
    pub filename: String,
    pub stage: ProcessingStage,
    pub reason: String,
}

/// Per-item result: a payload or the reason it was skipped
pub type ItemOutcome = std::result::Result<ProcessedResult, ItemFailure>;

/// Ordered outcomes of one batch
#[derive(Debug)]
pub struct BatchReport {
    pub mode: PipelineMode,
    pub outcomes: Vec<ItemOutcome>,
    pub elapsed_ms: u64,
}

impl BatchReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Failures in input order
    pub fn failures(&self) -> impl Iterator<Item = &ItemFailure> {
        self.outcomes.iter().filter_map(|o| o.as_ref().err())
    }

    /// Successful results in input order
    pub fn results(&self) -> impl Iterator<Item = &ProcessedResult> {
        self.outcomes.iter().filter_map(|o| o.as_ref().ok())
    }

    /// Consume the report, keeping only successful results in input order
    #[must_use]
    pub fn into_results(self) -> Vec<ProcessedResult> {
        self.outcomes.into_iter().filter_map(std::result::Result::ok).collect()
    }
}
