//! Shoe normalizer CLI
//!
//! `serve` runs the HTTP service; `normalize` pushes files through the same
//! pipeline and writes PNGs to disk.

use super::config::CliConfigBuilder;
use crate::{
    config::OverflowPolicy,
    processor::ImageNormalizer,
    services::ImageIOService,
    tracing_config::{self, spans, TracingFormat},
    types::{NamedImage, PipelineMode},
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Product photo normalization service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "shoe-normalizer")]
pub struct Cli {
    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console, global = true)]
    pub log_format: CliLogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP service
    Serve(ServeArgs),
    /// Normalize image files and write PNGs
    Normalize(NormalizeArgs),
}

/// Pipeline overrides shared by both subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Background tolerance; channels below 255 minus this count as subject [default: 50]
    #[arg(long)]
    pub tolerance: Option<u8>,

    /// Width the cropped subject is scaled to [default: 1698]
    #[arg(long)]
    pub target_width: Option<u32>,

    /// White border added left and right [default: 175]
    #[arg(long)]
    pub pad_lr: Option<u32>,

    /// Height of the output canvas [default: 2048]
    #[arg(long)]
    pub canvas_height: Option<u32>,

    /// What to do when the scaled subject is taller than the canvas [default: extend]
    #[arg(long, value_enum)]
    pub overflow: Option<CliOverflowPolicy>,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on [default: 0.0.0.0:5000]
    #[arg(short, long)]
    pub bind: Option<SocketAddr>,

    /// JSON configuration file; flags override its values
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Maximum request body size in MiB [default: 64]
    #[arg(long)]
    pub max_upload_mb: Option<usize>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Args, Debug, Clone)]
pub struct NormalizeArgs {
    /// Input image files or directories
    #[arg(value_name = "INPUT", required = true)]
    pub input: Vec<PathBuf>,

    /// Output directory for `<stem>.png` files
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// Only crop to the subject; skip scaling and padding
    #[arg(long)]
    pub crop_only: bool,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Filename pattern for directory inputs (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// JSON configuration file (its `normalizer` section is used)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOverflowPolicy {
    Extend,
    Crop,
    Reject,
}

impl From<CliOverflowPolicy> for OverflowPolicy {
    fn from(policy: CliOverflowPolicy) -> Self {
        match policy {
            CliOverflowPolicy::Extend => Self::Extend,
            CliOverflowPolicy::Crop => Self::Crop,
            CliOverflowPolicy::Reject => Self::Reject,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => Self::Console,
            CliLogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => Self::Json,
        }
    }
}

/// Outcome counts of an offline run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct RunSummary {
    processed: usize,
    failed: usize,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_config::init_cli_tracing(cli.verbose, cli.log_format.into())
        .context("Failed to initialize tracing")?;

    match cli.command {
        Command::Serve(args) => serve(&args).await,
        Command::Normalize(args) => normalize(args, cli.verbose).await,
    }
}

async fn serve(args: &ServeArgs) -> Result<()> {
    let config =
        CliConfigBuilder::server_config(args).context("Failed to build server configuration")?;
    crate::server::serve(config).await.context("Server failed")
}

async fn normalize(args: NormalizeArgs, verbose: u8) -> Result<()> {
    let config = CliConfigBuilder::normalizer_config(args.config.as_deref(), &args.pipeline)
        .context("Failed to build pipeline configuration")?;
    let normalizer = ImageNormalizer::new(config).context("Failed to create normalizer")?;

    let files = collect_input_files(&args.input, args.recursive, args.pattern.as_deref())?;
    if files.is_empty() {
        anyhow::bail!("No supported image files found in the provided inputs");
    }
    info!("Found {} image file(s) to process", files.len());

    prepare_output_dir(&args.output)?;

    let mode = if args.crop_only {
        PipelineMode::Crop
    } else {
        PipelineMode::Normalize
    };
    let output_dir = args.output;
    let show_progress = verbose == 0 && files.len() > 1;

    let start_time = Instant::now();
    let summary = tokio::task::spawn_blocking(move || {
        process_files(&normalizer, mode, &files, &output_dir, show_progress)
    })
    .await
    .context("Normalize worker failed")?;

    println!(
        "Processed {} image(s), {} failed, in {:.2}s",
        summary.processed,
        summary.failed,
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}

fn process_files(
    normalizer: &ImageNormalizer,
    mode: PipelineMode,
    files: &[PathBuf],
    output_dir: &Path,
    show_progress: bool,
) -> RunSummary {
    let _batch = spans::batch_processing(files.len(), &mode.to_string()).entered();
    let progress = show_progress.then(|| new_progress_bar(files.len()));
    let mut summary = RunSummary::default();

    for (index, input_file) in files.iter().enumerate() {
        let _file = spans::file_processing(input_file).entered();
        if let Some(pb) = &progress {
            pb.set_message(format!("{}", input_file.display()));
        }

        match process_file(normalizer, mode, index, input_file, output_dir) {
            Ok(output_path) => {
                summary.processed += 1;
                info!("{} -> {}", input_file.display(), output_path.display());
            },
            Err(e) => {
                summary.failed += 1;
                error!("Skipping {}: {:#}", input_file.display(), e);
            },
        }

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }

    summary
}

fn process_file(
    normalizer: &ImageNormalizer,
    mode: PipelineMode,
    index: usize,
    input_file: &Path,
    output_dir: &Path,
) -> Result<PathBuf> {
    let bytes = ImageIOService::read_file(input_file)?;
    let filename = input_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let result = normalizer.process_item(mode, index, &NamedImage::new(filename, bytes))?;

    let output_path = output_path_for(input_file, output_dir);
    ImageIOService::write_file(&result.png, &output_path)?;
    Ok(output_path)
}

fn new_progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Expand files and directories into a sorted, de-duplicated file list
fn collect_input_files(
    inputs: &[PathBuf],
    recursive: bool,
    pattern: Option<&str>,
) -> Result<Vec<PathBuf>> {
    let mut all_files = Vec::new();

    for path in inputs {
        if path.is_file() {
            if ImageIOService::is_supported_format(path) {
                all_files.push(path.clone());
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            all_files.extend(find_image_files(path, recursive, pattern)?);
        } else {
            warn!("Input path does not exist or is not accessible: {}", path.display());
        }
    }

    all_files.sort();
    all_files.dedup();
    Ok(all_files)
}

/// Find all supported images in a directory
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if recursive {
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file()
                && ImageIOService::is_supported_format(path)
                && matches_pattern(path, pattern)
            {
                files.push(path.to_path_buf());
            }
        }
    } else {
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_file()
                && ImageIOService::is_supported_format(&path)
                && matches_pattern(&path, pattern)
            {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// Check if the file name matches the given glob pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|filename| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            }),
        None => true,
    }
}

fn prepare_output_dir(output_dir: &Path) -> Result<()> {
    if output_dir.is_file() {
        anyhow::bail!(
            "Output path exists and is a file, not a directory: {}",
            output_dir.display()
        );
    }
    std::fs::create_dir_all(output_dir).with_context(|| {
        format!("Failed to create output directory: {}", output_dir.display())
    })
}

/// `<output_dir>/<stem>.png`
fn output_path_for(input_path: &Path, output_dir: &Path) -> PathBuf {
    let stem = input_path.file_stem().unwrap_or_default();
    output_dir.join(format!("{}.png", stem.to_string_lossy()))
}
