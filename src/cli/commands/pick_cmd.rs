//! cli::commands::pick_cmd
//!
//! The `pick` command: one full cherry-pick delivery.

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::core::config::ForgeConfig;
use crate::forge::GitHubForge;
use crate::pick::{CherryPick, CommitOptions, PickError};

/// Run the delivery. On conflict the reject output and snapshot location
/// are printed and the command fails without creating remote objects.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: ForgeConfig,
    quiet: bool,
    base: &str,
    target: &str,
    onto: &str,
    message: Option<String>,
    no_update_ref: bool,
    dry_run: bool,
) -> Result<()> {
    let forge = Arc::new(GitHubForge::new(&config));
    let mut cherry = CherryPick::new(forge);

    match cherry.patch(base, target, onto).await {
        Ok(()) => {}
        Err(PickError::MergeConflict { output }) => {
            eprintln!("{output}");
            if let Some(dir) = cherry.workspace_dir() {
                eprintln!("rejected hunks left in {}", dir.display());
            }
            bail!("patch does not apply cleanly to '{onto}'");
        }
        Err(err) => {
            return Err(err).with_context(|| format!("delivering {base}..{target} onto '{onto}'"));
        }
    }

    if dry_run {
        if !quiet {
            println!("patch applies cleanly to '{onto}'");
        }
        return Ok(());
    }

    let result = cherry
        .commit(CommitOptions {
            message,
            author: None,
            update_ref: !no_update_ref,
        })
        .await
        .with_context(|| format!("committing onto '{onto}'"))?;

    if quiet {
        println!("{}", result.sha);
    } else {
        println!("committed {}", result.sha);
        println!("  parent  {}", result.parent);
        println!("  tree    {}", result.tree);
        if result.branch_updated {
            println!("  branch  '{onto}' now points at {}", result.sha.short(7));
        } else {
            println!("  branch  '{onto}' left untouched");
        }
    }
    Ok(())
}
