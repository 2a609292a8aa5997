//! Configuration conversion utilities for CLI arguments

use super::main_impl::{PipelineArgs, ServeArgs};
use crate::config::{NormalizerConfig, ServerConfig};
use anyhow::{Context, Result};
use std::path::Path;

const MIB: usize = 1024 * 1024;

/// Merge config files and CLI flags into validated configurations
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the server configuration: file (if any), then flag overrides
    pub(crate) fn server_config(args: &ServeArgs) -> Result<ServerConfig> {
        let mut config = match &args.config {
            Some(path) => Self::load_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(bind) = args.bind {
            config.bind_addr = bind;
        }
        if let Some(megabytes) = args.max_upload_mb {
            config.max_upload_bytes = megabytes
                .checked_mul(MIB)
                .context("--max-upload-mb is too large")?;
        }
        config.normalizer = Self::apply_pipeline_args(config.normalizer, &args.pipeline);

        config.validate().context("Invalid server configuration")?;
        Ok(config)
    }

    /// Build the pipeline configuration for offline runs
    pub(crate) fn normalizer_config(
        config_file: Option<&Path>,
        pipeline: &PipelineArgs,
    ) -> Result<NormalizerConfig> {
        let base = match config_file {
            Some(path) => Self::load_file(path)?.normalizer,
            None => NormalizerConfig::default(),
        };

        let config = Self::apply_pipeline_args(base, pipeline);
        config.validate().context("Invalid pipeline configuration")?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<ServerConfig> {
        ServerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))
    }

    fn apply_pipeline_args(mut config: NormalizerConfig, args: &PipelineArgs) -> NormalizerConfig {
        if let Some(tolerance) = args.tolerance {
            config.tolerance = tolerance;
        }
        if let Some(width) = args.target_width {
            config.target_width = width;
        }
        if let Some(pad) = args.pad_lr {
            config.pad_lr = pad;
        }
        if let Some(height) = args.canvas_height {
            config.canvas_height = height;
        }
        if let Some(policy) = args.overflow {
            config.overflow_policy = policy.into();
        }
        config
    }
}
