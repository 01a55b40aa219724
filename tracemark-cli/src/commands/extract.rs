//! Extract command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use tracing::info;

use super::CommandContext;
use crate::exit_codes::{NOT_VERIFIED, SUCCESS};
use crate::utils::read_image;

/// Execute the extract command.
pub async fn execute(ctx: &CommandContext, image: PathBuf, as_json: bool) -> Result<i32> {
    let encoded = read_image(&image).await?;
    let codec = ctx.config.codec()?;
    let cancel = ctx.cancel.clone();

    let found = tokio::task::spawn_blocking(move || {
        let decoded = encoded.decode()?;
        codec.extract_image(&decoded, &cancel)
    })
    .await
    .context("Extraction task failed")?
    .context("Extraction failed")?;

    info!(found = found.is_some(), "Extraction finished");

    if as_json {
        println!("{}", serde_json::to_string_pretty(&json!({ "payload": found }))?);
    } else if !ctx.quiet {
        match &found {
            Some(payload) => {
                println!();
                println!("{}", "Watermark found".green().bold());
                println!();
                println!("   {} {}", "Creator:".dimmed(), payload.creator_id);
                println!("   {} {}", "Timestamp:".dimmed(), payload.timestamp);
                println!("   {} {:?}", "Layout:".dimmed(), payload.layout);
            }
            None => {
                println!("{}", "No watermark found".yellow().bold());
            }
        }
    }

    Ok(if found.is_some() { SUCCESS } else { NOT_VERIFIED })
}
