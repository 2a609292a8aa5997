//! Output encoding service
//!
//! Final grids leave the pipeline as lossless PNG plus a base64 rendition of
//! the same bytes for JSON transport.

use crate::{
    error::{NormalizeError, Result},
    types::PixelGrid,
};
use base64::{engine::general_purpose, Engine as _};
use image::{
    codecs::png::{CompressionType, FilterType, PngEncoder},
    ExtendedColorType, ImageEncoder,
};

/// PNG bytes together with their base64 text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub png: Vec<u8>,
    pub base64: String,
    pub width: u32,
    pub height: u32,
}

/// Service for serializing pixel grids
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode `grid` as an RGB8 PNG
    ///
    /// No ancillary chunks (time, text) are written, so identical pixels
    /// always produce identical bytes.
    pub fn encode_png(grid: &PixelGrid) -> Result<Vec<u8>> {
        let (width, height) = grid.dimensions_u32()?;
        if width == 0 || height == 0 {
            return Err(NormalizeError::encoding(format!(
                "Cannot encode an empty {}x{} image as PNG",
                width, height
            )));
        }

        let rgb = grid.to_rgb_image()?;
        let mut buffer = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut buffer, CompressionType::Default, FilterType::Adaptive);
        encoder
            .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
            .map_err(|e| NormalizeError::encoding(format!("Failed to encode PNG: {}", e)))?;

        Ok(buffer)
    }

    /// Standard-alphabet, padded base64
    #[must_use]
    pub fn to_base64(bytes: &[u8]) -> String {
        general_purpose::STANDARD.encode(bytes)
    }

    /// Inverse of [`Self::to_base64`]
    pub fn from_base64(text: &str) -> Result<Vec<u8>> {
        general_purpose::STANDARD
            .decode(text.trim())
            .map_err(|e| NormalizeError::decode(format!("Invalid base64 payload: {}", e)))
    }

    /// Encode `grid` to PNG and base64 in one step
    pub fn encode(grid: &PixelGrid) -> Result<EncodedImage> {
        let (width, height) = grid.dimensions_u32()?;
        let png = Self::encode_png(grid)?;
        let base64 = Self::to_base64(&png);
        Ok(EncodedImage {
            png,
            base64,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{DecodeMode, ImageIOService};

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn sample_grid() -> PixelGrid {
        let mut grid = PixelGrid::white(9, 5);
        grid.set_pixel(4, 2, [12, 34, 56]);
        grid
    }

    #[test]
    fn test_encode_png_is_lossless() {
        let grid = sample_grid();
        let png = OutputFormatHandler::encode_png(&grid).unwrap();

        assert!(png.starts_with(&PNG_SIGNATURE));
        let decoded = ImageIOService::decode(&png, DecodeMode::Rgb).unwrap();
        assert_eq!(decoded, grid);
    }

    #[test]
    fn test_encode_png_is_deterministic() {
        let first = OutputFormatHandler::encode_png(&sample_grid()).unwrap();
        let second = OutputFormatHandler::encode_png(&sample_grid()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_encode_bundles_base64() {
        let encoded = OutputFormatHandler::encode(&sample_grid()).unwrap();
        assert_eq!((encoded.width, encoded.height), (9, 5));
        assert_eq!(
            OutputFormatHandler::from_base64(&encoded.base64).unwrap(),
            encoded.png
        );
    }

    #[test]
    fn test_base64_alphabet() {
        assert_eq!(OutputFormatHandler::to_base64(b"shoe"), "c2hvZQ==");
        assert!(OutputFormatHandler::from_base64("***").is_err());
    }

    #[test]
    fn test_encode_rejects_empty_grid() {
        let empty = PixelGrid::white(0, 3);
        assert!(matches!(
            OutputFormatHandler::encode_png(&empty),
            Err(NormalizeError::Encoding(_))
        ));
    }
}
