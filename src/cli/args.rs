//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! Connection flags are global so they sit before or after the
//! subcommand; each falls back to environment variables and then the
//! config file:
//! - `--org` / `$GRAFT_ORG`
//! - `--repo` / `$GRAFT_REPO`
//! - `--user` / `$GRAFT_USERNAME`
//! - `--token` / `$GRAFT_TOKEN` (prompted when interactive and absent)
//! - `--api-base` / `$GRAFT_API_BASE`

use clap::{Parser, Subcommand};

/// Graftwork - cherry-pick patch delivery through the GitHub API
#[derive(Parser, Debug)]
#[command(name = "graft")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Repository owner (user or organization)
    #[arg(long, global = true, env = "GRAFT_ORG")]
    pub org: Option<String>,

    /// Repository name
    #[arg(long, global = true, env = "GRAFT_REPO")]
    pub repo: Option<String>,

    /// Account name; enables basic auth with the token as password
    #[arg(long, global = true, env = "GRAFT_USERNAME")]
    pub user: Option<String>,

    /// Password or personal access token
    #[arg(long, global = true, env = "GRAFT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// API base URL (override for GitHub Enterprise)
    #[arg(long, global = true, env = "GRAFT_API_BASE")]
    pub api_base: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply the diff between two commits to a branch and commit it
    #[command(
        name = "pick",
        long_about = "Apply the diff between two commits to a branch and commit it.\n\n\
            Resolves BASE and TARGET, fetches the diff between them, applies it \
            against the tip of the branch given with --onto in a scratch \
            directory, and, if the patch applies cleanly, writes the result back \
            as a new commit. The branch is moved to the new commit unless \
            --no-update-ref is given; the update is refused if the branch moved \
            while the delivery was in flight.\n\n\
            On a conflict the rejected hunks are printed and nothing is created \
            remotely.",
        after_help = "\
EXAMPLES:
    # Deliver the changes between two tags to a release branch
    graft pick v1.2.0 v1.2.1 --onto rel_1.2_hotfix

    # Same, but keep the branch untouched (commit is created and printed)
    graft pick 7bee4691 b23e9fd3 --onto rel_1.0_dev --no-update-ref

    # Check whether the patch would apply, creating nothing
    graft pick v1.2.0 v1.2.1 --onto rel_1.2_hotfix --dry-run"
    )]
    Pick {
        /// Base commit: SHA, branch, or tag
        base: String,

        /// Target commit: SHA, branch, or tag
        target: String,

        /// Branch to deliver onto
        #[arg(long)]
        onto: String,

        /// Commit message (default summarizes the two commits)
        #[arg(short, long)]
        message: Option<String>,

        /// Create the commit but leave the branch reference untouched
        #[arg(long)]
        no_update_ref: bool,

        /// Stop after applying the patch locally; create nothing remotely
        #[arg(long, conflicts_with_all = ["message", "no_update_ref"])]
        dry_run: bool,
    },

    /// List the commits between two refs, newest first
    #[command(
        name = "log",
        long_about = "List the commits between two refs, newest first.\n\n\
            Covers the range (FROM, TO]: everything reachable from TO that was \
            committed after FROM, as reported by the host. Useful for composing \
            a richer delivery message than the generated default."
    )]
    Log {
        /// Older end of the range (exclusive): SHA, branch, or tag
        from: String,

        /// Newer end of the range (inclusive): SHA, branch, or tag
        to: String,
    },
}
