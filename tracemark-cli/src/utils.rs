//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracemark_core::EncodedImage;
use tracing::info;

/// Read an image file as submitted, without re-encoding it.
pub async fn read_image(path: &Path) -> Result<EncodedImage> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "Read image");
    Ok(EncodedImage::from_bytes(bytes))
}

/// Default output path for a watermarked copy.
///
/// Transforms `dir/photo.jpg` into `dir/photo.tracemark.png`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    input.with_file_name(format!("{stem}.tracemark.png"))
}

/// Sibling path the output is written to before it is registered.
///
/// Transforms `dir/photo.png` into `dir/.photo.png.partial`.
pub fn staging_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("image.png");
    output.with_file_name(format!(".{name}.partial"))
}

/// First 16 hex digits of a fingerprint, for display.
pub fn short_hash(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}

/// Format a ledger timestamp as a human-readable UTC string.
pub fn format_created_at(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
