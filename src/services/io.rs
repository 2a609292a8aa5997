//! Image I/O operations service
//!
//! Decoding of uploaded blobs into pixel grids, plus the file helpers used by
//! the offline CLI.

use crate::{
    error::{NormalizeError, Result},
    types::PixelGrid,
};
use image::{DynamicImage, ImageReader, RgbImage};
use std::io::Cursor;
use std::path::Path;

/// How transparency in the source is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Drop any alpha channel, keeping the stored color values
    Rgb,
    /// Composite every pixel over an opaque white backdrop
    CompositeOnWhite,
}

/// Service for decoding images and moving encoded bytes to and from disk
pub struct ImageIOService;

impl ImageIOService {
    /// Decode raw image bytes into an RGB pixel grid
    ///
    /// The container format is detected from the content, never from a
    /// filename.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use shoe_normalizer::services::{DecodeMode, ImageIOService};
    ///
    /// let bytes = std::fs::read("sneaker.png")?;
    /// let grid = ImageIOService::decode(&bytes, DecodeMode::CompositeOnWhite)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn decode(bytes: &[u8], mode: DecodeMode) -> Result<PixelGrid> {
        let image = Self::load_from_bytes(bytes)?;
        let rgb = match mode {
            DecodeMode::Rgb => image.to_rgb8(),
            DecodeMode::CompositeOnWhite => Self::composite_on_white(&image),
        };
        PixelGrid::from_rgb_image(rgb)
    }

    /// Decode bytes into a `DynamicImage` using content-based format detection
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(NormalizeError::decode("Empty image data"));
        }

        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| NormalizeError::decode(format!("Failed to read image header: {}", e)))?;

        let format = reader.format();
        reader.decode().map_err(|e| {
            log::debug!("Decoding {} bytes (format {:?}) failed: {}", bytes.len(), format, e);
            NormalizeError::decode(format!("Failed to decode image from bytes: {}", e))
        })
    }

    /// Flatten `image` onto white: `out = src * a + 255 * (1 - a)` per channel
    ///
    /// Images without an alpha channel pass through unchanged.
    #[must_use]
    pub fn composite_on_white(image: &DynamicImage) -> RgbImage {
        if !image.color().has_alpha() {
            return image.to_rgb8();
        }

        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut rgb = RgbImage::new(width, height);

        for (x, y, pixel) in rgba.enumerate_pixels() {
            let alpha = u32::from(pixel[3]);
            let blend = |channel: u8| -> u8 {
                let value = (u32::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255;
                value.min(255) as u8
            };
            rgb.put_pixel(x, y, image::Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
        }

        rgb
    }

    /// Read an input file into memory
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        let path_ref = path.as_ref();
        std::fs::read(path_ref).map_err(|e| NormalizeError::file_io_error("read image file", path_ref, &e))
    }

    /// Write encoded bytes, creating the parent directory if needed
    pub fn write_file<P: AsRef<Path>>(bytes: &[u8], path: P) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    NormalizeError::file_io_error("create output directory", parent, &e)
                })?;
            }
        }

        std::fs::write(path_ref, bytes)
            .map_err(|e| NormalizeError::file_io_error("write output file", path_ref, &e))?;
        log::debug!("Wrote {} bytes to {}", bytes.len(), path_ref.display());
        Ok(())
    }

    /// Check if a file path has a supported image extension
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .is_some_and(|ext| {
                matches!(
                    ext.as_str(),
                    "jpg" | "jpeg" | "png" | "webp" | "tiff" | "tif"
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_decode_rgb_png() {
        let mut rgb = RgbImage::from_pixel(6, 4, image::Rgb([255, 255, 255]));
        rgb.put_pixel(2, 1, image::Rgb([10, 20, 30]));
        let bytes = encode(&DynamicImage::ImageRgb8(rgb), ImageFormat::Png);

        let grid = ImageIOService::decode(&bytes, DecodeMode::Rgb).unwrap();
        assert_eq!(grid.dimensions(), (6, 4));
        assert_eq!(grid.pixel(2, 1), Some([10, 20, 30]));
    }

    #[test]
    fn test_composite_on_white() {
        let mut rgba = RgbaImage::from_pixel(3, 1, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        rgba.put_pixel(2, 0, Rgba([0, 100, 200, 128]));
        let bytes = encode(&DynamicImage::ImageRgba8(rgba), ImageFormat::Png);

        let grid = ImageIOService::decode(&bytes, DecodeMode::CompositeOnWhite).unwrap();
        // fully transparent black becomes white
        assert_eq!(grid.pixel(0, 0), Some([255, 255, 255]));
        // opaque black stays black
        assert_eq!(grid.pixel(1, 0), Some([0, 0, 0]));
        // half alpha blends toward white: (c*128 + 255*127 + 127) / 255
        assert_eq!(grid.pixel(2, 0), Some([127, 177, 227]));
    }

    #[test]
    fn test_rgb_mode_drops_alpha_without_blending() {
        let rgba = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0]));
        let bytes = encode(&DynamicImage::ImageRgba8(rgba), ImageFormat::Png);

        let grid = ImageIOService::decode(&bytes, DecodeMode::Rgb).unwrap();
        assert_eq!(grid.pixel(1, 1), Some([0, 0, 0]));
    }

    #[test]
    fn test_decode_jpeg_by_content() {
        let rgb = RgbImage::from_pixel(16, 8, image::Rgb([200, 200, 200]));
        let bytes = encode(&DynamicImage::ImageRgb8(rgb), ImageFormat::Jpeg);

        let grid = ImageIOService::decode(&bytes, DecodeMode::CompositeOnWhite).unwrap();
        assert_eq!(grid.dimensions(), (16, 8));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = ImageIOService::decode(b"definitely not an image", DecodeMode::Rgb).unwrap_err();
        assert!(matches!(err, NormalizeError::Decode(_)));

        let err = ImageIOService::decode(&[], DecodeMode::Rgb).unwrap_err();
        assert!(matches!(err, NormalizeError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_truncated_png() {
        let rgb = RgbImage::from_pixel(32, 32, image::Rgb([0, 0, 0]));
        let bytes = encode(&DynamicImage::ImageRgb8(rgb), ImageFormat::Png);
        let truncated = &bytes[..bytes.len() / 2];

        assert!(ImageIOService::decode(truncated, DecodeMode::Rgb).is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.png");

        ImageIOService::write_file(b"payload", &path).unwrap();
        assert_eq!(ImageIOService::read_file(&path).unwrap(), b"payload");

        let missing = ImageIOService::read_file(dir.path().join("missing.png")).unwrap_err();
        assert!(matches!(missing, NormalizeError::Io(_)));
    }

    #[test]
    fn test_is_supported_format() {
        assert!(ImageIOService::is_supported_format("a/b/shoe.PNG"));
        assert!(ImageIOService::is_supported_format("boot.jpeg"));
        assert!(!ImageIOService::is_supported_format("notes.txt"));
        assert!(!ImageIOService::is_supported_format("no_extension"));
    }
}
