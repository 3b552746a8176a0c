//! cli::commands::log_cmd
//!
//! The `log` command: commit metadata for a range, for composing richer
//! delivery messages.

use anyhow::{Context, Result};

use crate::core::config::ForgeConfig;
use crate::forge::{Forge, GitHubForge};

pub async fn run(config: ForgeConfig, from: &str, to: &str) -> Result<()> {
    let forge = GitHubForge::new(&config);

    let from_sha = forge
        .resolve_ref(from)
        .await
        .with_context(|| format!("resolving '{from}'"))?;
    let to_sha = forge
        .resolve_ref(to)
        .await
        .with_context(|| format!("resolving '{to}'"))?;

    let commits = forge
        .commits_between(&from_sha, &to_sha)
        .await
        .with_context(|| format!("listing commits {from}..{to}"))?;

    for commit in commits {
        println!("{} {}", commit.sha.short(7), commit.summary());
    }
    Ok(())
}
