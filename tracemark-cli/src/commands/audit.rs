//! Audit command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use tracemark_core::{audit_chain, FileRegistry, Registry};
use tracing::{error, info};

use super::CommandContext;
use crate::exit_codes::{NOT_VERIFIED, SUCCESS};

/// Execute the audit command.
pub async fn execute(ctx: &CommandContext, ledger: Option<PathBuf>, as_json: bool) -> Result<i32> {
    let registry: Arc<dyn Registry> = match ledger {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Failed to read ledger: {} does not exist", path.display());
            }
            Arc::new(FileRegistry::new(path))
        }
        None => ctx.config.registry()?,
    };

    let records = registry
        .records()
        .await
        .with_context(|| format!("Failed to load records from {} registry", registry.name()))?;
    let broken = audit_chain(&records);

    match &broken {
        Some(b) => error!(index = b.index, record_id = %b.record_id, reason = %b.reason, "Ledger chain broken"),
        None => info!(records = records.len(), "Ledger chain intact"),
    }

    if as_json {
        let report = json!({
            "records": records.len(),
            "intact": broken.is_none(),
            "break": broken,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !ctx.quiet {
        println!();
        match &broken {
            None => {
                println!("{}", "Ledger chain intact".green().bold());
                println!();
                println!("   {} {}", "Records:".dimmed(), records.len());
            }
            Some(b) => {
                println!("{}", "Ledger chain BROKEN".red().bold());
                println!();
                println!("   {} {}", "Records:".dimmed(), records.len());
                println!("   {} {}", "First bad record:".dimmed(), b.index);
                println!("   {} {}", "Record id:".dimmed(), b.record_id);
                println!("   {} {}", "Reason:".dimmed(), b.reason.to_string().red());
            }
        }
    }

    Ok(if broken.is_none() { SUCCESS } else { NOT_VERIFIED })
}
