//! cli::commands
//!
//! Command handlers. Each command gets the parsed CLI plus the merged
//! connection configuration and reports through stdout; errors bubble up
//! as `anyhow::Result` for main to render.

mod log_cmd;
mod pick_cmd;

use anyhow::Result;

use super::args::{Cli, Command};
use crate::core::config::ForgeConfig;

/// Dispatch to the appropriate command handler.
pub async fn dispatch(cli: Cli, config: ForgeConfig) -> Result<()> {
    match cli.command {
        Command::Pick {
            base,
            target,
            onto,
            message,
            no_update_ref,
            dry_run,
        } => {
            pick_cmd::run(
                config,
                cli.quiet,
                &base,
                &target,
                &onto,
                message,
                no_update_ref,
                dry_run,
            )
            .await
        }
        Command::Log { from, to } => log_cmd::run(config, &from, &to).await,
    }
}
