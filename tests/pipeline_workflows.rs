//! Integration tests for complete pipeline workflows
//!
//! These drive [`ImageNormalizer`] the way the HTTP layer and CLI do: encoded
//! bytes in, batch reports with encoded PNGs out.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use shoe_normalizer::{
    DecodeMode, ImageIOService, ImageNormalizer, NamedImage, NormalizerConfig, OverflowPolicy,
    PipelineMode, PixelGrid, ProcessingStage,
};
use std::io::Cursor;

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

fn photo_with_block(width: u32, height: u32, block: (u32, u32, u32, u32)) -> RgbImage {
    let (x0, y0, x1, y1) = block;
    let mut img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    for y in y0..y1 {
        for x in x0..x1 {
            img.put_pixel(x, y, Rgb([15, 15, 15]));
        }
    }
    img
}

fn small_canvas(policy: OverflowPolicy) -> NormalizerConfig {
    NormalizerConfig::builder()
        .target_width(100)
        .pad_lr(10)
        .canvas_height(200)
        .overflow_policy(policy)
        .build()
        .unwrap()
}

fn output_grid(png: &[u8]) -> PixelGrid {
    ImageIOService::decode(png, DecodeMode::Rgb).unwrap()
}

#[test]
fn test_reference_scenario_geometry() {
    let photo = photo_with_block(2000, 1000, (800, 400, 1200, 600));
    let bytes = encode(DynamicImage::ImageRgb8(photo), ImageFormat::Png);
    let normalizer = ImageNormalizer::new(NormalizerConfig::default()).unwrap();

    let report = normalizer.normalize_batch(&[NamedImage::new("shoe.png", bytes)]);
    assert_eq!(report.succeeded(), 1);

    let result = report.results().next().unwrap();
    assert_eq!(result.dimensions, (2048, 2047));
    assert_eq!(
        result.subject_box.map(|b| b.as_tuple()),
        Some((800, 400, 1200, 600))
    );
    assert_eq!(output_grid(&result.png).dimensions(), (2048, 2047));
}

#[test]
fn test_crop_and_normalize_modes_on_same_input() {
    let photo = photo_with_block(60, 40, (10, 5, 30, 25));
    let bytes = encode(DynamicImage::ImageRgb8(photo), ImageFormat::Png);
    let normalizer = ImageNormalizer::new(small_canvas(OverflowPolicy::Extend)).unwrap();
    let items = [NamedImage::new("p.png", bytes)];

    let cropped = normalizer.crop_batch(&items).into_results();
    assert_eq!(cropped[0].dimensions, (20, 20));

    // 20x20 -> 100x100, pad_tb = 50
    let normalized = normalizer.normalize_batch(&items).into_results();
    assert_eq!(normalized[0].dimensions, (120, 200));
}

#[test]
fn test_transparent_background_is_white_only_when_normalizing() {
    let mut img = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 0]));
    for y in 8..12 {
        for x in 8..12 {
            img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
        }
    }
    let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);
    let normalizer = ImageNormalizer::new(small_canvas(OverflowPolicy::Extend)).unwrap();
    let items = [NamedImage::new("alpha.png", bytes)];

    // Alpha is discarded in crop mode, so the hidden black background counts as subject
    let cropped = normalizer.crop_batch(&items).into_results();
    assert_eq!(cropped[0].dimensions, (20, 20));

    // Composited on white, only the opaque block remains: 4x4 -> 100x100
    let normalized = normalizer.normalize_batch(&items).into_results();
    assert_eq!(normalized[0].subject_box.map(|b| b.as_tuple()), Some((8, 8, 12, 12)));
    assert_eq!(normalized[0].dimensions, (120, 200));
}

#[test]
fn test_overflow_policies() {
    // 10x40 subject -> 100x400, taller than the 200 canvas
    let photo = photo_with_block(30, 60, (10, 10, 20, 50));
    let items = [NamedImage::new(
        "tall.png",
        encode(DynamicImage::ImageRgb8(photo), ImageFormat::Png),
    )];

    let extend = ImageNormalizer::new(small_canvas(OverflowPolicy::Extend))
        .unwrap()
        .normalize_batch(&items);
    assert_eq!(extend.results().next().unwrap().dimensions, (120, 400));

    let crop = ImageNormalizer::new(small_canvas(OverflowPolicy::Crop))
        .unwrap()
        .normalize_batch(&items);
    let result = crop.results().next().unwrap();
    assert_eq!(result.dimensions, (120, 200));
    let grid = output_grid(&result.png);
    assert_eq!(grid.pixel(60, 0).map(|p| p[0] < 50), Some(true));
    assert_eq!(grid.pixel(5, 100), Some([255, 255, 255]));

    let reject = ImageNormalizer::new(small_canvas(OverflowPolicy::Reject))
        .unwrap()
        .normalize_batch(&items);
    assert_eq!(reject.succeeded(), 0);
    let failure = reject.failures().next().unwrap();
    assert_eq!(failure.stage, ProcessingStage::Scale);
    assert_eq!(failure.filename, "tall.png");
}

/// 3x3000 white photo with a 1-px black column: a few KB on the wire, but
/// 5_094_000 rows once scaled to the default width
fn thin_line_photo() -> Vec<u8> {
    let mut img = RgbImage::from_pixel(3, 3000, Rgb([255, 255, 255]));
    for y in 0..3000 {
        img.put_pixel(1, y, Rgb([0, 0, 0]));
    }
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

fn default_canvas(policy: OverflowPolicy) -> ImageNormalizer {
    let config = NormalizerConfig::builder()
        .overflow_policy(policy)
        .build()
        .unwrap();
    ImageNormalizer::new(config).unwrap()
}

#[test]
fn test_thin_line_is_bounded_per_policy() {
    let item = NamedImage::new("line.png", thin_line_photo());

    let failure = default_canvas(OverflowPolicy::Reject)
        .process_item(PipelineMode::Normalize, 0, &item)
        .unwrap_err();
    assert_eq!(failure.stage, ProcessingStage::Scale);
    assert!(failure.reason.contains("canvas height"), "{}", failure.reason);

    let failure = default_canvas(OverflowPolicy::Extend)
        .process_item(PipelineMode::Normalize, 0, &item)
        .unwrap_err();
    assert_eq!(failure.stage, ProcessingStage::Scale);
    assert!(failure.reason.contains("pixel limit"), "{}", failure.reason);

    let result = default_canvas(OverflowPolicy::Crop)
        .process_item(PipelineMode::Normalize, 0, &item)
        .unwrap();
    assert_eq!(result.dimensions, (2048, 2048));
    let grid = output_grid(&result.png);
    assert_eq!(grid.pixel(1024, 1024).map(|p| p[0] < 50), Some(true));
    assert_eq!(grid.pixel(100, 1024), Some([255, 255, 255]));
    assert_eq!(grid.pixel(2000, 1024), Some([255, 255, 255]));
}

#[test]
fn test_thin_line_does_not_break_the_batch() {
    let good = encode(
        DynamicImage::ImageRgb8(photo_with_block(10, 10, (2, 2, 5, 5))),
        ImageFormat::Png,
    );
    let items = [
        NamedImage::new("line.png", thin_line_photo()),
        NamedImage::new("block.png", good),
    ];

    let report = default_canvas(OverflowPolicy::Extend).normalize_batch(&items);
    assert_eq!((report.succeeded(), report.failed()), (1, 1));
    assert_eq!(report.results().next().unwrap().filename, "block.png");
}

#[test]
fn test_jpeg_input() {
    let photo = photo_with_block(100, 60, (30, 20, 70, 40));
    let bytes = encode(DynamicImage::ImageRgb8(photo), ImageFormat::Jpeg);
    let normalizer = ImageNormalizer::new(NormalizerConfig::default()).unwrap();

    let report = normalizer.crop_batch(&[NamedImage::new("shoe.jpg", bytes)]);
    let (width, height) = report.results().next().unwrap().dimensions;
    assert!((38..=42).contains(&width), "width {}", width);
    assert!((18..=22).contains(&height), "height {}", height);
}

#[test]
fn test_batch_report_accounting() {
    let good = encode(
        DynamicImage::ImageRgb8(photo_with_block(10, 10, (2, 2, 5, 5))),
        ImageFormat::Png,
    );
    let items = vec![
        NamedImage::new("0.png", good.clone()),
        NamedImage::new("1.png", b"broken".to_vec()),
        NamedImage::new("2.png", good),
    ];
    let normalizer = ImageNormalizer::new(NormalizerConfig::default()).unwrap();

    let report = normalizer.process_batch(PipelineMode::Crop, &items);
    assert_eq!(report.mode, PipelineMode::Crop);
    assert_eq!((report.succeeded(), report.failed()), (2, 1));

    let failure = report.failures().next().unwrap();
    assert_eq!(failure.index, 1);
    assert_eq!(failure.stage, ProcessingStage::Decode);

    let names: Vec<String> = report.into_results().into_iter().map(|r| r.filename).collect();
    assert_eq!(names, ["0.png", "2.png"]);
}

#[test]
fn test_outputs_are_deterministic() {
    let bytes = encode(
        DynamicImage::ImageRgb8(photo_with_block(50, 30, (5, 5, 45, 25))),
        ImageFormat::Png,
    );
    let normalizer = ImageNormalizer::new(small_canvas(OverflowPolicy::Extend)).unwrap();
    let items = [NamedImage::new("a.png", bytes)];

    let first = normalizer.normalize_batch(&items).into_results();
    let second = normalizer.normalize_batch(&items).into_results();
    assert_eq!(first[0].data, second[0].data);
}
