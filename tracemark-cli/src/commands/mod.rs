//! Command implementations.
//!
//! Each command returns the process exit code for outcomes it reports itself
//! (nothing found, not registered, broken chain) and an error otherwise.

pub mod audit;
pub mod embed;
pub mod extract;
pub mod verify;

use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// State shared by every command.
pub struct CommandContext {
    pub config: Config,
    pub cancel: CancellationToken,
    pub quiet: bool,
}
