//! Tracemark CLI - invisible attribution watermarks for images.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod exit_codes;
mod utils;

use commands::CommandContext;
use config::Config;
use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Invalid creator id or timestamp
  65  No watermark found, image not registered, or ledger chain broken
  66  Input image missing or undecodable
  69  Registry unavailable
  74  Cannot write output";

#[derive(Parser)]
#[command(name = "tracemark")]
#[command(author, version, about = "Invisible attribution watermarks for images", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    config: Config,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress human-readable output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// When to colorize output
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed a creator watermark and register the result
    Embed {
        /// Image to watermark
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Creator identifier to embed
        #[arg(short, long)]
        creator: String,

        /// Creation time as YYYY-MM-DDTHH:MM:SS.mmmZ (default: now)
        #[arg(short, long)]
        timestamp: Option<String>,

        /// Generation prompt, stored in the ledger only
        #[arg(short, long)]
        prompt: Option<String>,

        /// Output PNG path (default: <IMAGE stem>.tracemark.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the unframed layout read by older extractors
        #[arg(long)]
        legacy: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recover the embedded creator and timestamp
    Extract {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether an image is registered
    Verify {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the integrity of the ledger's hash chain
    Audit {
        /// Audit this ledger file instead of the configured registry
        #[arg(value_name = "LEDGER")]
        ledger: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "tracemark=debug,tracemark_core=debug,info",
        _ => "tracemark=trace,tracemark_core=trace,debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {}
    }
    init_tracing(cli.verbose);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let ctx = CommandContext {
        config: cli.config,
        cancel,
        quiet: cli.quiet,
    };

    let result = match cli.command {
        Commands::Embed {
            image,
            creator,
            timestamp,
            prompt,
            output,
            legacy,
            json,
        } => {
            let args = commands::embed::EmbedArgs {
                image,
                creator,
                timestamp,
                prompt,
                output,
                legacy,
                json,
            };
            commands::embed::execute(&ctx, args).await
        }
        Commands::Extract { image, json } => commands::extract::execute(&ctx, image, json).await,
        Commands::Verify { image, json } => commands::verify::execute(&ctx, image, json).await,
        Commands::Audit { ledger, json } => commands::audit::execute(&ctx, ledger, json).await,
    };

    let code = match result {
        Ok(code) => code,
        Err(err) => {
            let exit = ExitCode::from_anyhow(&err);
            if let Some(message) = &exit.message {
                eprintln!("{} {}", "error:".red().bold(), message);
            }
            exit.code
        }
    };
    std::process::exit(code);
}
