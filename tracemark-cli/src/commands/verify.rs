//! Verify command implementation.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;
use tracemark_core::{Confidence, Verifier};
use tracing::info;

use super::CommandContext;
use crate::exit_codes::{NOT_VERIFIED, SUCCESS};
use crate::utils::{format_created_at, read_image, short_hash};

/// Execute the verify command.
pub async fn execute(ctx: &CommandContext, image: PathBuf, as_json: bool) -> Result<i32> {
    let encoded = read_image(&image).await?;

    let config = &ctx.config;
    let verifier = Verifier::new(config.registry()?)
        .with_cache(config.cache())
        .with_codec(config.codec()?)
        .with_timeout(config.timeout());

    let verdict = verifier.verify(&encoded, &ctx.cancel).await;
    info!(status = ?verdict.status, confidence = ?verdict.confidence, "Verified");

    if as_json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else if !ctx.quiet {
        println!();
        if verdict.is_registered() {
            println!("{}", "╔════════════════════════════════════════╗".green());
            println!("{}", "║              REGISTERED                ║".green().bold());
            println!("{}", "╚════════════════════════════════════════╝".green());
        } else {
            println!("{}", "╔════════════════════════════════════════╗".yellow());
            println!("{}", "║             UNREGISTERED               ║".yellow().bold());
            println!("{}", "╚════════════════════════════════════════╝".yellow());
        }
        println!();

        let confidence = match verdict.confidence {
            Confidence::ExactHash => "exact hash".green(),
            Confidence::MetadataMatch => "metadata match".yellow(),
            Confidence::None => "none".red(),
        };
        println!("   {} {}", "Confidence:".dimmed(), confidence);
        println!("   {} {}", "Content hash:".dimmed(), short_hash(&verdict.content_hash));

        match &verdict.extracted {
            Some(found) => println!(
                "   {} {} at {}",
                "Watermark:".dimmed(),
                found.creator_id,
                found.timestamp
            ),
            None => println!("   {} {}", "Watermark:".dimmed(), "not found".dimmed()),
        }

        if let Some(record) = &verdict.matched_record {
            println!("   {} {}", "Record:".dimmed(), record.id);
            println!("   {} {}", "Creator:".dimmed(), record.creator_id);
            println!(
                "   {} {}",
                "Registered at:".dimmed(),
                format_created_at(&record.created_at)
            );
            if let Some(prompt) = &record.prompt {
                println!("   {} {}", "Prompt:".dimmed(), prompt);
            }
        }
    }

    Ok(if verdict.is_registered() {
        SUCCESS
    } else {
        NOT_VERIFIED
    })
}
