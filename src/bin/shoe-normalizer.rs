//! Shoe Normalizer CLI Tool
//!
//! Runs the HTTP normalization service or normalizes image files offline.

#[cfg(feature = "cli")]
use shoe_normalizer::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
