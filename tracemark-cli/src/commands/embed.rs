//! Embed command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use tracemark_core::{EmbedRequest, Payload, PayloadLayout, Watermarker};
use tracing::{debug, info, warn};

use super::CommandContext;
use crate::exit_codes::SUCCESS;
use crate::utils::{default_output_path, read_image, short_hash, staging_path};

/// Arguments of `tracemark embed`.
#[derive(Debug)]
pub struct EmbedArgs {
    pub image: PathBuf,
    pub creator: String,
    pub timestamp: Option<String>,
    pub prompt: Option<String>,
    pub output: Option<PathBuf>,
    pub legacy: bool,
    pub json: bool,
}

/// Execute the embed command.
pub async fn execute(ctx: &CommandContext, args: EmbedArgs) -> Result<i32> {
    let payload = match args.timestamp {
        Some(ts) => Payload::new(args.creator, ts),
        None => Payload::now(args.creator),
    }
    .context("Invalid payload")?;

    let source = read_image(&args.image).await?;

    let layout = if args.legacy {
        PayloadLayout::Legacy
    } else {
        PayloadLayout::Framed
    };
    let mut request = EmbedRequest::new(payload).with_layout(layout);
    if let Some(prompt) = args.prompt {
        request = request.with_prompt(prompt);
    }
    debug!(layout = ?layout, "Prepared embed request");

    let config = &ctx.config;
    let watermarker = Watermarker::new(config.registry()?)
        .with_cache(config.cache())
        .with_codec(config.codec()?)
        .with_timeout(config.timeout());

    let marked = watermarker
        .mark(&source, request, &ctx.cancel)
        .await
        .context("Embedding failed")?;

    // The image must be on disk before the append-only ledger points at it.
    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.image));
    let staging = staging_path(&output);
    tokio::fs::write(&staging, &marked.image.bytes)
        .await
        .with_context(|| format!("Failed to write output: {}", output.display()))?;

    let result = match watermarker.register(marked).await {
        Ok(result) => result,
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                warn!(path = %staging.display(), error = %cleanup, "Failed to remove staged output");
            }
            return Err(e).context("Embedding failed");
        }
    };

    tokio::fs::rename(&staging, &output)
        .await
        .with_context(|| format!("Failed to write output: {}", output.display()))?;

    info!(path = %output.display(), record_id = %result.ledger_entry.id, "Watermarked image saved");

    if args.json {
        let report = json!({
            "output": output.display().to_string(),
            "contentHash": result.content_hash,
            "storedIn": result.stored_in,
            "tiles": result.report.tiles,
            "layout": result.report.layout,
            "record": result.ledger_entry,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !ctx.quiet {
        let record = &result.ledger_entry;
        println!();
        println!("{}", "Image watermarked and registered".green().bold());
        println!();
        println!("   {} {}", "Output:".dimmed(), output.display());
        println!("   {} {}", "Creator:".dimmed(), record.creator_id);
        println!("   {} {}", "Timestamp:".dimmed(), record.timestamp);
        println!("   {} {}", "Content hash:".dimmed(), short_hash(&result.content_hash));
        println!("   {} {}", "Record:".dimmed(), record.id);
        println!("   {} {}", "Registry:".dimmed(), result.stored_in);
        println!("   {} {}", "Tiles:".dimmed(), result.report.tiles);
    }

    Ok(SUCCESS)
}
