//! Normalization processor
//!
//! `ImageNormalizer` is the single service object behind both HTTP endpoints
//! and the CLI. It is built once from a validated [`NormalizerConfig`] and is
//! immutable afterwards, so one instance can be shared across requests.

use crate::{
    config::NormalizerConfig,
    error::{NormalizeError, Result},
    locator::SubjectLocator,
    services::{DecodeMode, EncodedImage, ImageIOService, OutputFormatHandler},
    types::{
        BatchReport, BoundingBox, ItemFailure, ItemOutcome, NamedImage, PipelineMode, PixelGrid,
        ProcessedResult, ProcessingStage, ProcessingTimings,
    },
    utils::ImagePreprocessor,
};
use instant::Instant;
use tracing::{debug, info, instrument, warn};

/// A pipeline error tagged with the stage it came from
#[derive(Debug)]
struct StageError {
    stage: ProcessingStage,
    source: NormalizeError,
}

trait AtStage<T> {
    fn at(self, stage: ProcessingStage) -> std::result::Result<T, StageError>;
}

impl<T> AtStage<T> for Result<T> {
    fn at(self, stage: ProcessingStage) -> std::result::Result<T, StageError> {
        self.map_err(|source| StageError { stage, source })
    }
}

/// Output of one pipeline run before it is attached to a filename
struct PipelineOutput {
    encoded: EncodedImage,
    subject_box: BoundingBox,
    timings: ProcessingTimings,
}

/// Crop/scale/pad service shared by every request
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    config: NormalizerConfig,
    locator: SubjectLocator,
}

impl ImageNormalizer {
    /// Create a normalizer, validating `config`
    pub fn new(config: NormalizerConfig) -> Result<Self> {
        config.validate()?;
        let locator = SubjectLocator::new(config.tolerance);
        Ok(Self { config, locator })
    }

    #[must_use]
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Locate the subject and slice the grid to it
    pub fn crop_grid(&self, grid: &PixelGrid) -> Result<(PixelGrid, BoundingBox)> {
        let subject_box = self.locator.locate(grid);
        let cropped = ImagePreprocessor::crop(grid, &subject_box)?;
        Ok((cropped, subject_box))
    }

    /// Crop, scale to the target width, then center on the canvas
    pub fn normalize_grid(&self, grid: &PixelGrid) -> Result<PixelGrid> {
        let (cropped, _) = self.crop_grid(grid)?;
        self.fit_to_canvas(&cropped).map_err(|e| e.source)
    }

    /// Run `mode` on raw image bytes and return the encoded result
    ///
    /// # Examples
    /// ```rust,no_run
    /// use shoe_normalizer::{ImageNormalizer, NormalizerConfig, PipelineMode};
    ///
    /// let normalizer = ImageNormalizer::new(NormalizerConfig::default())?;
    /// let upload = std::fs::read("boot.jpg")?;
    /// let encoded = normalizer.process_bytes(PipelineMode::Normalize, &upload)?;
    /// std::fs::write("boot.png", &encoded.png)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn process_bytes(&self, mode: PipelineMode, bytes: &[u8]) -> Result<EncodedImage> {
        self.run(mode, bytes)
            .map(|output| output.encoded)
            .map_err(|e| e.source)
    }

    /// Debug pipeline over a batch: decode, locate, crop, encode
    pub fn crop_batch(&self, items: &[NamedImage]) -> BatchReport {
        self.process_batch(PipelineMode::Crop, items)
    }

    /// Full pipeline over a batch: decode on white, locate, crop, scale, pad, encode
    pub fn normalize_batch(&self, items: &[NamedImage]) -> BatchReport {
        self.process_batch(PipelineMode::Normalize, items)
    }

    /// Process every item in order; failures are recorded, never propagated
    #[instrument(skip(self, mode, items), fields(mode = %mode, items = items.len()))]
    pub fn process_batch(&self, mode: PipelineMode, items: &[NamedImage]) -> BatchReport {
        let start = Instant::now();

        let outcomes: Vec<ItemOutcome> = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let outcome = self.process_item(mode, index, item);
                if let Err(failure) = &outcome {
                    warn!(
                        index = failure.index,
                        filename = %failure.filename,
                        stage = %failure.stage,
                        reason = %failure.reason,
                        "skipping image"
                    );
                }
                outcome
            })
            .collect();

        let report = BatchReport {
            mode,
            outcomes,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            elapsed_ms = report.elapsed_ms,
            "batch complete"
        );
        report
    }

    /// Process one item, converting any stage error into an [`ItemFailure`]
    pub fn process_item(&self, mode: PipelineMode, index: usize, item: &NamedImage) -> ItemOutcome {
        match self.run(mode, &item.bytes) {
            Ok(output) => {
                debug!(
                    index,
                    filename = %item.filename,
                    subject_box = %output.subject_box,
                    width = output.encoded.width,
                    height = output.encoded.height,
                    total_ms = output.timings.total_ms,
                    "processed image"
                );
                Ok(ProcessedResult {
                    filename: item.filename.clone(),
                    data: output.encoded.base64,
                    png: output.encoded.png,
                    dimensions: (output.encoded.width, output.encoded.height),
                    subject_box: Some(output.subject_box),
                    timings: output.timings,
                })
            },
            Err(e) => Err(ItemFailure {
                index,
                filename: item.filename.clone(),
                stage: e.stage,
                reason: e.source.to_string(),
            }),
        }
    }

    fn run(&self, mode: PipelineMode, bytes: &[u8]) -> std::result::Result<PipelineOutput, StageError> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();

        let decode_mode = match mode {
            PipelineMode::Crop => DecodeMode::Rgb,
            PipelineMode::Normalize => DecodeMode::CompositeOnWhite,
        };

        let decode_start = Instant::now();
        let grid = ImageIOService::decode(bytes, decode_mode).at(ProcessingStage::Decode)?;
        timings.decode_ms = decode_start.elapsed().as_millis() as u64;

        let transform_start = Instant::now();
        let subject_box = self.locator.locate(&grid);
        let cropped = ImagePreprocessor::crop(&grid, &subject_box).at(ProcessingStage::Crop)?;
        let output = match mode {
            PipelineMode::Crop => cropped,
            PipelineMode::Normalize => self.fit_to_canvas(&cropped)?,
        };
        timings.transform_ms = transform_start.elapsed().as_millis() as u64;

        let encode_start = Instant::now();
        let encoded = OutputFormatHandler::encode(&output).at(ProcessingStage::Encode)?;
        timings.encode_ms = encode_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        Ok(PipelineOutput {
            encoded,
            subject_box,
            timings,
        })
    }

    fn fit_to_canvas(&self, cropped: &PixelGrid) -> std::result::Result<PixelGrid, StageError> {
        let target_width = self.config.target_width;
        let (width, height) = cropped.dimensions_u32().at(ProcessingStage::Scale)?;
        let plan = ImagePreprocessor::plan_fit(
            width,
            height,
            target_width,
            self.config.canvas_height,
            self.config.overflow_policy,
        )
        .at(ProcessingStage::Scale)?;

        let scaled = if plan.keeps_all_rows(height) {
            ImagePreprocessor::scale_to_width(cropped, target_width)
        } else {
            let (y0, y1) = plan.rows;
            let band = BoundingBox {
                x0: 0,
                y0: y0 as usize,
                x1: width as usize,
                y1: y1 as usize,
            };
            debug!(%band, scaled_height = plan.scaled_height, "resampling only rows kept on the canvas");
            ImagePreprocessor::crop(cropped, &band)
                .and_then(|rows| ImagePreprocessor::scale_to_width(&rows, target_width))
        }
        .at(ProcessingStage::Scale)?;
        let (fitted, pad_tb) = ImagePreprocessor::fit_height(
            scaled,
            self.config.canvas_height,
            self.config.overflow_policy,
        )
        .at(ProcessingStage::Pad)?;
        ImagePreprocessor::pad(&fitted, self.config.pad_lr, pad_tb).at(ProcessingStage::Pad)
    }
}
