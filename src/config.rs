//! Configuration types for normalization and the HTTP service

use crate::error::{NormalizeError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Default tolerance for classifying near-white pixels as background
pub const DEFAULT_TOLERANCE: u8 = 50;
/// Width every normalized subject is scaled to
pub const DEFAULT_TARGET_WIDTH: u32 = 1698;
/// Horizontal padding added on each side after scaling
pub const DEFAULT_PAD_LR: u32 = 175;
/// Height of the canvas the scaled subject is centered in
pub const DEFAULT_CANVAS_HEIGHT: u32 = 2048;
/// Default request body limit (64 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// What to do when the scaled subject is taller than the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Clamp vertical padding to zero and keep the whole subject (output is taller than the canvas)
    #[default]
    Extend,
    /// Clamp vertical padding to zero and center-crop the subject to the canvas height
    Crop,
    /// Fail the item
    Reject,
}

impl std::fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extend => write!(f, "extend"),
            Self::Crop => write!(f, "crop"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// Immutable settings for the normalization pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Channel values below `255 - tolerance` mark a pixel as subject
    pub tolerance: u8,

    /// Width the cropped subject is resampled to
    pub target_width: u32,

    /// Padding added left and right of the scaled subject
    pub pad_lr: u32,

    /// Canvas height the scaled subject is vertically centered in
    pub canvas_height: u32,

    /// Behavior when the scaled subject exceeds `canvas_height`
    pub overflow_policy: OverflowPolicy,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            target_width: DEFAULT_TARGET_WIDTH,
            pad_lr: DEFAULT_PAD_LR,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

impl NormalizerConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use shoe_normalizer::{NormalizerConfig, OverflowPolicy};
    ///
    /// let config = NormalizerConfig::builder()
    ///     .tolerance(30)
    ///     .overflow_policy(OverflowPolicy::Crop)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.canvas_width(), 2048);
    /// ```
    #[must_use]
    pub fn builder() -> NormalizerConfigBuilder {
        NormalizerConfigBuilder::default()
    }

    /// Width of the final canvas: scaled width plus padding on both sides
    #[must_use]
    pub fn canvas_width(&self) -> u32 {
        self.target_width.saturating_add(self.pad_lr.saturating_mul(2))
    }

    /// Validate all configuration parameters
    ///
    /// # Validation Rules
    ///
    /// - `target_width`: at least 1
    /// - `canvas_height`: at least 1
    /// - `canvas_width()`: must not overflow `u32`
    pub fn validate(&self) -> Result<()> {
        if self.target_width == 0 {
            return Err(NormalizeError::config_value_error(
                "target_width",
                self.target_width,
                ">= 1",
                Some(DEFAULT_TARGET_WIDTH),
            ));
        }

        if self.canvas_height == 0 {
            return Err(NormalizeError::config_value_error(
                "canvas_height",
                self.canvas_height,
                ">= 1",
                Some(DEFAULT_CANVAS_HEIGHT),
            ));
        }

        let total = u64::from(self.target_width) + 2 * u64::from(self.pad_lr);
        if total > u64::from(u32::MAX) {
            return Err(NormalizeError::invalid_config(format!(
                "Canvas width {} (target_width + 2 * pad_lr) exceeds u32 range",
                total
            )));
        }

        Ok(())
    }
}

/// Builder for `NormalizerConfig`
#[derive(Debug, Default)]
pub struct NormalizerConfigBuilder {
    config: NormalizerConfig,
}

impl NormalizerConfigBuilder {
    #[must_use]
    pub fn tolerance(mut self, tolerance: u8) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn target_width(mut self, width: u32) -> Self {
        self.config.target_width = width;
        self
    }

    #[must_use]
    pub fn pad_lr(mut self, pad: u32) -> Self {
        self.config.pad_lr = pad;
        self
    }

    #[must_use]
    pub fn canvas_height(mut self, height: u32) -> Self {
        self.config.canvas_height = height;
        self
    }

    #[must_use]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.config.overflow_policy = policy;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<NormalizerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Settings for the HTTP front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the service listens on
    pub bind_addr: SocketAddr,

    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: usize,

    /// Pipeline settings shared by all requests
    pub normalizer: NormalizerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            normalizer: NormalizerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load a server configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults. The result is validated.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| NormalizeError::file_io_error("read config file", path, &e))?;
        Self::from_json_str(&content)
    }

    /// Parse a server configuration from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| NormalizeError::invalid_config(format!("Malformed config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(NormalizeError::config_value_error(
                "max_upload_bytes",
                self.max_upload_bytes,
                ">= 1",
                Some(DEFAULT_MAX_UPLOAD_BYTES),
            ));
        }
        self.normalizer.validate()
    }
}
