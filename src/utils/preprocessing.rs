//! Geometry transforms shared by both pipelines
//!
//! Crop, scale and pad operate on [`PixelGrid`]s and never touch encoded
//! bytes. Every function returns a fresh grid; inputs are left untouched.

use crate::{
    config::OverflowPolicy,
    error::{NormalizeError, Result},
    types::{BoundingBox, PixelGrid},
};
use image::imageops::FilterType;
use ndarray::s;
use tracing::debug;

/// Largest width or height a resampled grid may have
pub const MAX_SCALED_DIMENSION: u32 = 16384;

/// Resampling decided from dimensions alone, before any pixels are touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitPlan {
    /// Source rows `y0..y1` that get resampled
    pub rows: (u32, u32),
    /// Height of those rows once scaled to the target width
    pub scaled_height: u32,
}

impl FitPlan {
    /// Whether every row of a crop `height` rows tall is resampled
    #[must_use]
    pub fn keeps_all_rows(&self, height: u32) -> bool {
        self.rows == (0, height)
    }
}

/// Stateless crop/scale/pad operations
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Slice `grid` to `bbox`
    ///
    /// Boxes reaching past the grid are clamped to its bounds. A box that is
    /// empty after clamping is rejected unless the grid itself is empty.
    pub fn crop(grid: &PixelGrid, bbox: &BoundingBox) -> Result<PixelGrid> {
        let (width, height) = grid.dimensions();
        let clamped = bbox.clamp_to(width, height);

        if clamped.area() == 0 && !grid.is_empty() {
            return Err(NormalizeError::processing_stage_error(
                "crop",
                &format!("bounding box {} lies outside the image", bbox),
                Some(&format!("{}x{}", width, height)),
            ));
        }

        if clamped != *bbox {
            debug!(requested = %bbox, clamped = %clamped, "clamped crop box to image bounds");
        }

        let view = grid
            .as_array()
            .slice(s![clamped.y0..clamped.y1, clamped.x0..clamped.x1, ..]);
        PixelGrid::from_array(view.to_owned())
    }

    /// Output height for scaling `width` x `height` to `target_width`
    ///
    /// `round(height * target_width / width)` with halves rounded up, never below 1.
    pub fn scaled_height(width: u32, height: u32, target_width: u32) -> Result<u32> {
        if width == 0 {
            return Err(NormalizeError::processing_stage_error(
                "scale",
                "cannot scale an image of zero width",
                None,
            ));
        }
        let numerator = u64::from(height) * u64::from(target_width) * 2 + u64::from(width);
        let rounded = numerator / (u64::from(width) * 2);
        u32::try_from(rounded.max(1)).map_err(|_| {
            NormalizeError::processing(format!(
                "Scaled height {} exceeds u32 range",
                rounded
            ))
        })
    }

    /// Resize `grid` to exactly `target_width`, preserving aspect ratio
    ///
    /// A grid already at `target_width` is returned unchanged. Resampling
    /// uses a Lanczos3 kernel.
    pub fn scale_to_width(grid: &PixelGrid, target_width: u32) -> Result<PixelGrid> {
        if target_width == 0 {
            return Err(NormalizeError::processing_stage_error(
                "scale",
                "target width must be positive",
                None,
            ));
        }

        let (width, height) = grid.dimensions_u32()?;
        if width == target_width {
            return Ok(grid.clone());
        }

        if height == 0 {
            return Err(NormalizeError::processing_stage_error(
                "scale",
                "cannot scale an image of zero height",
                Some(&format!("{}x{}", width, height)),
            ));
        }
        let new_height = Self::scaled_height(width, height, target_width)?;
        Self::check_scaled_dimensions(width, height, target_width, new_height)?;

        debug!(
            from = %format!("{}x{}", width, height),
            to = %format!("{}x{}", target_width, new_height),
            "resampling"
        );

        let rgb = grid.to_rgb_image()?;
        let resized = image::imageops::resize(&rgb, target_width, new_height, FilterType::Lanczos3);
        PixelGrid::from_rgb_image(resized)
    }

    /// Decide which rows of a `width` x `height` crop to resample
    ///
    /// Overflow is resolved here, before any buffer is allocated. `Reject`
    /// fails, `Crop` keeps only the centered band of source rows that covers
    /// the canvas, and `Extend` keeps every row. The resampled size must stay
    /// within [`MAX_SCALED_DIMENSION`] on both axes.
    pub fn plan_fit(
        width: u32,
        height: u32,
        target_width: u32,
        canvas_height: u32,
        policy: OverflowPolicy,
    ) -> Result<FitPlan> {
        if target_width == 0 {
            return Err(NormalizeError::processing_stage_error(
                "scale",
                "target width must be positive",
                None,
            ));
        }

        let full_height = Self::scaled_height(width, height, target_width)?;
        let mut plan = FitPlan {
            rows: (0, height),
            scaled_height: full_height,
        };

        if full_height > canvas_height {
            match policy {
                OverflowPolicy::Extend => {},
                OverflowPolicy::Crop => {
                    // ceil(canvas_height * width / target_width) rows scale to at least canvas_height
                    let band = (u64::from(canvas_height) * u64::from(width))
                        .div_ceil(u64::from(target_width));
                    let band = u32::try_from(band).unwrap_or(height).clamp(1, height);
                    let top = (height - band) / 2;
                    plan = FitPlan {
                        rows: (top, top + band),
                        scaled_height: Self::scaled_height(width, band, target_width)?,
                    };
                },
                OverflowPolicy::Reject => {
                    return Err(NormalizeError::processing_stage_error(
                        "scale",
                        &format!(
                            "scaled height {} exceeds canvas height {}",
                            full_height, canvas_height
                        ),
                        Some(&format!("{}x{}", width, height)),
                    ));
                },
            }
        }

        Self::check_scaled_dimensions(width, height, target_width, plan.scaled_height)?;
        Ok(plan)
    }

    fn check_scaled_dimensions(
        width: u32,
        height: u32,
        scaled_width: u32,
        scaled_height: u32,
    ) -> Result<()> {
        if scaled_width > MAX_SCALED_DIMENSION || scaled_height > MAX_SCALED_DIMENSION {
            return Err(NormalizeError::processing_stage_error(
                "scale",
                &format!(
                    "scaled size {}x{} exceeds the {} pixel limit",
                    scaled_width, scaled_height, MAX_SCALED_DIMENSION
                ),
                Some(&format!("{}x{}", width, height)),
            ));
        }
        Ok(())
    }

    /// Embed `grid` in a white canvas with `pad_lr` columns left and right and
    /// `pad_tb` rows above and below
    pub fn pad(grid: &PixelGrid, pad_lr: u32, pad_tb: u32) -> Result<PixelGrid> {
        let (width, height) = grid.dimensions();
        let pad_lr = pad_lr as usize;
        let pad_tb = pad_tb as usize;

        let canvas_width = pad_lr
            .checked_mul(2)
            .and_then(|p| p.checked_add(width))
            .ok_or_else(|| NormalizeError::processing("Padded width overflows"))?;
        let canvas_height = pad_tb
            .checked_mul(2)
            .and_then(|p| p.checked_add(height))
            .ok_or_else(|| NormalizeError::processing("Padded height overflows"))?;

        let mut canvas = PixelGrid::white(canvas_width, canvas_height);
        canvas
            .as_array_mut()
            .slice_mut(s![pad_tb..pad_tb + height, pad_lr..pad_lr + width, ..])
            .assign(grid.as_array());
        Ok(canvas)
    }

    /// Rows of padding above and below a subject of `content_height` in a
    /// canvas of `canvas_height`
    ///
    /// Truncates toward zero, so an odd remainder leaves the result one row
    /// short of the canvas. Negative when the subject is taller than the canvas.
    #[must_use]
    pub fn vertical_padding(content_height: u32, canvas_height: u32) -> i64 {
        (i64::from(canvas_height) - i64::from(content_height)) / 2
    }

    /// Resolve vertical padding for `grid`, applying `policy` on overflow
    ///
    /// Returns the (possibly cropped) grid and the non-negative row padding.
    pub fn fit_height(
        grid: PixelGrid,
        canvas_height: u32,
        policy: OverflowPolicy,
    ) -> Result<(PixelGrid, u32)> {
        let (width, height) = grid.dimensions_u32()?;
        if height <= canvas_height {
            let pad_tb = u32::try_from(Self::vertical_padding(height, canvas_height))
                .map_err(|_| NormalizeError::processing("Vertical padding exceeds u32 range"))?;
            return Ok((grid, pad_tb));
        }

        match policy {
            OverflowPolicy::Extend => {
                debug!(height, canvas_height, "subject taller than canvas; extending canvas");
                Ok((grid, 0))
            },
            OverflowPolicy::Crop => {
                let excess = (height - canvas_height) as usize;
                let top = excess / 2;
                let bbox = BoundingBox {
                    x0: 0,
                    y0: top,
                    x1: width as usize,
                    y1: top + canvas_height as usize,
                };
                debug!(height, canvas_height, %bbox, "subject taller than canvas; center-cropping");
                Ok((Self::crop(&grid, &bbox)?, 0))
            },
            OverflowPolicy::Reject => Err(NormalizeError::processing_stage_error(
                "pad",
                &format!(
                    "scaled height {} exceeds canvas height {}",
                    height, canvas_height
                ),
                Some(&format!("{}x{}", width, height)),
            )),
        }
    }
}
