//! Subject detection on near-white product photos
//!
//! A pixel belongs to the subject when any of its channels is strictly below
//! `255 - tolerance`. The subject box is the tightest rectangle covering every
//! such pixel; an image without subject pixels maps to its full frame.

use crate::{
    config::DEFAULT_TOLERANCE,
    types::{BoundingBox, PixelGrid},
};
use tracing::trace;

/// Finds the bounding box of non-background content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubjectLocator {
    tolerance: u8,
}

impl Default for SubjectLocator {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl SubjectLocator {
    #[must_use]
    pub fn new(tolerance: u8) -> Self {
        Self { tolerance }
    }

    #[must_use]
    pub fn tolerance(&self) -> u8 {
        self.tolerance
    }

    /// Channel values strictly below this mark a pixel as subject
    #[must_use]
    pub fn threshold(&self) -> u8 {
        255 - self.tolerance
    }

    /// Whether a single pixel is classified as subject
    #[must_use]
    pub fn is_subject<'a>(&self, pixel: impl IntoIterator<Item = &'a u8>) -> bool {
        let threshold = self.threshold();
        pixel.into_iter().any(|&value| value < threshold)
    }

    /// Scan the whole grid and return the subject box
    ///
    /// Returns [`BoundingBox::full_frame`] when no pixel qualifies.
    #[must_use]
    pub fn locate(&self, grid: &PixelGrid) -> BoundingBox {
        let (width, height) = grid.dimensions();

        let mut min_x = usize::MAX;
        let mut min_y = usize::MAX;
        let mut max_x = 0usize;
        let mut max_y = 0usize;
        let mut found = false;

        for (y, row) in grid.as_array().outer_iter().enumerate() {
            for (x, pixel) in row.outer_iter().enumerate() {
                if self.is_subject(&pixel) {
                    found = true;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        if !found {
            trace!(width, height, "no subject pixels; keeping full frame");
            return BoundingBox::full_frame(width, height);
        }

        BoundingBox {
            x0: min_x,
            y0: min_y,
            x1: max_x + 1,
            y1: max_y + 1,
        }
    }
}

/// Subject box of `grid` using the given tolerance
#[must_use]
pub fn crop_shoe(grid: &PixelGrid, tolerance: u8) -> BoundingBox {
    SubjectLocator::new(tolerance).locate(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WHITE;

    #[test]
    fn test_all_white_returns_full_frame() {
        let grid = PixelGrid::white(37, 21);
        let bbox = crop_shoe(&grid, 50);
        assert_eq!(bbox, BoundingBox::full_frame(37, 21));
    }

    #[test]
    fn test_near_white_noise_is_background() {
        let mut grid = PixelGrid::white(10, 10);
        grid.set_pixel(3, 3, [210, 230, 250]);
        assert_eq!(crop_shoe(&grid, 50), BoundingBox::full_frame(10, 10));
    }

    #[test]
    fn test_single_pixel_subject() {
        let (row, col) = (7, 12);
        let mut grid = PixelGrid::white(20, 15);
        grid.set_pixel(col, row, [0, 0, 0]);

        let bbox = crop_shoe(&grid, 50);
        assert_eq!(bbox.as_tuple(), (col, row, col + 1, row + 1));
        assert_eq!(bbox.area(), 1);
    }

    #[test]
    fn test_box_spans_scattered_pixels() {
        let mut grid = PixelGrid::white(30, 30);
        grid.set_pixel(5, 20, [0, 0, 0]);
        grid.set_pixel(25, 2, [255, 10, 255]);
        grid.set_pixel(14, 14, [100, 100, 100]);

        assert_eq!(crop_shoe(&grid, 50).as_tuple(), (5, 2, 26, 21));
    }

    #[test]
    fn test_tolerance_boundary() {
        let t: u8 = 40;
        let mut grid = PixelGrid::white(3, 3);
        grid.set_pixel(1, 1, [255 - t, 255, 255]);

        // tolerance < t: threshold is above the value, so the pixel is subject
        for tolerance in [0, 10, t - 1] {
            let bbox = crop_shoe(&grid, tolerance);
            assert_eq!(bbox.as_tuple(), (1, 1, 2, 2), "tolerance {}", tolerance);
        }

        // tolerance >= t: value is not strictly below the threshold
        for tolerance in [t, t + 1, 200] {
            let bbox = crop_shoe(&grid, tolerance);
            assert_eq!(bbox, BoundingBox::full_frame(3, 3), "tolerance {}", tolerance);
        }
    }

    #[test]
    fn test_is_subject_and_threshold() {
        let locator = SubjectLocator::default();
        assert_eq!(locator.tolerance(), 50);
        assert_eq!(locator.threshold(), 205);
        assert!(locator.is_subject(&[204, 255, 255]));
        assert!(!locator.is_subject(&[205, 205, 205]));
        assert!(!locator.is_subject(&WHITE));
    }

    #[test]
    fn test_locate_agrees_with_is_subject() {
        let locator = SubjectLocator::new(50);
        for value in [0u8, 100, 204, 205, 230, 255] {
            let pixel = [255, value, 255];
            let mut grid = PixelGrid::white(3, 3);
            grid.set_pixel(2, 1, pixel);

            let found = locator.locate(&grid) != BoundingBox::full_frame(3, 3);
            assert_eq!(found, locator.is_subject(&pixel), "value {}", value);
        }
    }

    #[test]
    fn test_max_tolerance_never_finds_subject() {
        let grid = PixelGrid::filled(4, 4, [0, 0, 0]);
        assert_eq!(crop_shoe(&grid, 255), BoundingBox::full_frame(4, 4));
        assert_eq!(crop_shoe(&grid, 0).as_tuple(), (0, 0, 4, 4));
    }
}
