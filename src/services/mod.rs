//! Decoding and encoding services around the pixel pipeline

pub mod format;
pub mod io;

pub use format::{EncodedImage, OutputFormatHandler};
pub use io::{DecodeMode, ImageIOService};
