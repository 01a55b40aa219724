//! Registry and codec configuration, from flags or environment.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracemark_core::{FileRegistry, Registry, WatermarkCodec};
use tracing::debug;

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Remote registry base URL; the local ledger file is used when unset
    #[arg(long, global = true, env = "TRACEMARK_REGISTRY_URL")]
    pub registry_url: Option<String>,

    /// Local ledger file, the primary registry when no URL is configured
    #[arg(
        long,
        global = true,
        env = "TRACEMARK_LEDGER",
        default_value = "tracemark-ledger.json"
    )]
    pub ledger: PathBuf,

    /// Local cache file, used when the registry is unavailable
    #[arg(
        long,
        global = true,
        env = "TRACEMARK_CACHE",
        default_value = "tracemark-cache.json"
    )]
    pub cache: PathBuf,

    /// Timeout for each registry call, in seconds
    #[arg(long, global = true, env = "TRACEMARK_TIMEOUT_SECS", default_value_t = 5)]
    pub timeout_secs: u64,

    /// Worker threads for tile processing (default: one per core)
    #[arg(long, global = true, env = "TRACEMARK_THREADS")]
    pub threads: Option<usize>,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The primary registry: remote when a URL is set, else the ledger file.
    pub fn registry(&self) -> Result<Arc<dyn Registry>> {
        match &self.registry_url {
            Some(url) => remote_registry(url, self.timeout()),
            None => {
                debug!(path = %self.ledger.display(), "Using file ledger");
                Ok(Arc::new(FileRegistry::new(&self.ledger)))
            }
        }
    }

    pub fn cache(&self) -> Arc<dyn Registry> {
        Arc::new(FileRegistry::new(&self.cache))
    }

    pub fn codec(&self) -> Result<WatermarkCodec> {
        match self.threads {
            Some(n) => WatermarkCodec::with_threads(n).context("Failed to start worker threads"),
            None => Ok(WatermarkCodec::new()),
        }
    }
}

#[cfg(feature = "network")]
fn remote_registry(url: &str, timeout: Duration) -> Result<Arc<dyn Registry>> {
    use tracemark_core::{HttpRegistry, HttpRegistryConfig};

    debug!(url, "Using remote registry");
    let mut config = HttpRegistryConfig::new(url);
    config.timeout = timeout;
    let registry = HttpRegistry::new(config).context("Failed to configure remote registry")?;
    Ok(Arc::new(registry))
}

#[cfg(not(feature = "network"))]
fn remote_registry(_url: &str, _timeout: Duration) -> Result<Arc<dyn Registry>> {
    anyhow::bail!("This build has no network support; unset TRACEMARK_REGISTRY_URL to use the local registry")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn test_flags_override_defaults() {
        let harness = Harness::parse_from([
            "tracemark",
            "--ledger",
            "/tmp/l.json",
            "--timeout-secs",
            "2",
            "--threads",
            "3",
        ]);
        assert_eq!(harness.config.ledger, PathBuf::from("/tmp/l.json"));
        assert_eq!(harness.config.timeout(), Duration::from_secs(2));
        assert_eq!(harness.config.threads, Some(3));
    }

    #[test]
    fn test_file_registry_without_url() {
        let harness = Harness::parse_from(["tracemark", "--ledger", "x.json"]);
        if harness.config.registry_url.is_none() {
            assert_eq!(harness.config.registry().unwrap().name(), "file");
        }
        assert_eq!(harness.config.cache().name(), "file");
    }
}
