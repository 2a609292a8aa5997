//! Pixel-level helpers shared by the pipelines

pub mod preprocessing;

pub use preprocessing::{FitPlan, ImagePreprocessor, MAX_SCALED_DIMENSION};
