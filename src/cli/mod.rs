//! cli
//!
//! Command-line interface layer.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global connection flags
//! - Merge connection settings (flag > environment > config file)
//! - Delegate to command handlers
//!
//! The CLI layer is thin: it builds a validated [`ForgeConfig`] and
//! dispatches to [`commands`]; all delivery logic lives in
//! [`crate::pick`].

pub mod args;
pub mod commands;

pub use args::{Cli, Command};

use std::io::IsTerminal;

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use crate::core::config::{FileConfig, ForgeConfig};

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub async fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let config = resolve_config(&cli)?;
    commands::dispatch(cli, config).await
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "graftwork=debug"
    } else {
        "graftwork=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Merge flags, environment, and the config file into a validated
/// [`ForgeConfig`]. Flags and environment are already merged by clap.
fn resolve_config(cli: &Cli) -> Result<ForgeConfig> {
    let file = FileConfig::load()
        .context("failed to load config file")?
        .unwrap_or_default();

    let organization = cli
        .org
        .clone()
        .or(file.organization)
        .context("repository owner not set; use --org, $GRAFT_ORG, or the config file")?;
    let repository = cli
        .repo
        .clone()
        .or(file.repository)
        .context("repository not set; use --repo, $GRAFT_REPO, or the config file")?;
    let username = cli.user.clone().or(file.username);
    let api_base = cli.api_base.clone().or(file.api_base);

    let token = match cli.token.clone() {
        Some(token) => token,
        None => prompt_token(&organization, &repository)?,
    };

    ForgeConfig::new(username, token, organization, repository, api_base)
        .context("invalid connection configuration")
}

/// Ask for the token interactively when none was supplied.
fn prompt_token(organization: &str, repository: &str) -> Result<String> {
    if !std::io::stdin().is_terminal() {
        bail!("no token supplied; use --token or $GRAFT_TOKEN");
    }
    let token = rpassword::prompt_password(format!(
        "API token for {organization}/{repository}: "
    ))
    .context("failed to read token")?;
    if token.is_empty() {
        bail!("no token supplied; use --token or $GRAFT_TOKEN");
    }
    Ok(token)
}
