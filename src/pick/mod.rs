//! pick
//!
//! Cherry-pick delivery: apply the differences between two commits to a
//! target branch, entirely through the hosted API plus one local patch
//! invocation.
//!
//! # Architecture
//!
//! [`CherryPick`] orchestrates one delivery at a time over a [`Forge`]:
//!
//! 1. `patch(base, target, branch)` resolves all three refs, fetches the
//!    base→target diff, materializes the files it touches from the branch
//!    tip into a scratch [`Workspace`], and applies the diff locally with
//!    the injected [`PatchApplier`]. A rejected apply is a merge conflict;
//!    the snapshot is kept for inspection.
//! 2. `commit(options)` uploads the patched files as blobs, builds a tree
//!    over the branch's pre-patch tree, creates a commit whose parent is
//!    the branch head recorded at `patch()` time, and optionally moves the
//!    branch with a compare-and-swap.
//!
//! Every forge call happens strictly in sequence; the only concurrency
//! defense is the conditional ref update.
//!
//! # Example
//!
//! ```ignore
//! use graftwork::pick::{CherryPick, CommitOptions};
//!
//! let mut cherry = CherryPick::new(forge);
//! cherry.patch("7bee4691", "b23e9fd3", "rel_1.0_dev").await?;
//! let result = cherry
//!     .commit(CommitOptions {
//!         update_ref: true,
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("delivered {}", result.sha.short(7));
//! ```

mod patch;
mod workspace;

pub use patch::{summarize, ApplyOutcome, FileChange, GitApplier, PatchApplier};
pub use workspace::Workspace;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::core::types::{BranchName, Oid};
use crate::forge::{
    CommitAuthor, EntryKind, Forge, ForgeError, TreeListing, TreeWrite, DEFAULT_FILE_MODE,
};

/// Errors from a cherry-pick delivery.
#[derive(Debug, Error)]
pub enum PickError {
    /// A supplied base/target/branch reference does not resolve.
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// Local patch application rejected at least one hunk. The output is
    /// the patch tool's stdout+stderr verbatim; partially applied files
    /// stay in the snapshot for inspection.
    #[error("merge conflict applying patch:\n{output}")]
    MergeConflict {
        /// The patch tool's combined output
        output: String,
    },

    /// The branch moved between `patch()` and the ref update. The created
    /// commit is left orphaned remotely; the branch is untouched.
    #[error("stale ref: {branch} expected {expected}, found {actual}")]
    StaleRef {
        /// The branch being updated
        branch: String,
        /// The head recorded at `patch()` time
        expected: String,
        /// The head the host reported
        actual: String,
    },

    /// An operation was invoked from the wrong state (e.g. `commit()`
    /// before a clean `patch()`). A programming-contract violation, not a
    /// runtime condition.
    #[error("invalid state: {operation} is not allowed while {state}")]
    InvalidState {
        /// The operation that was attempted
        operation: &'static str,
        /// The state the controller was in
        state: &'static str,
    },

    /// The diff touches a tree entry the delivery cannot patch as text
    /// (submodule or symlink).
    #[error("unsupported tree entry at {path}: {detail}")]
    UnsupportedTreeEntry {
        /// The path the diff touches
        path: String,
        /// What the entry is
        detail: String,
    },

    /// Transport, authentication, or API failure, propagated as-is.
    #[error(transparent)]
    Forge(#[from] ForgeError),

    /// Workspace filesystem failure.
    #[error("workspace error: {0}")]
    Io(#[from] std::io::Error),
}

/// Options for [`CherryPick::commit`].
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Commit message; a default summarizing the delivery is generated
    /// when omitted.
    pub message: Option<String>,
    /// Author metadata; the host attributes the authenticated user when
    /// omitted.
    pub author: Option<CommitAuthor>,
    /// Move the branch to the new commit (compare-and-swap against the
    /// head recorded at `patch()` time). Off by default so library callers
    /// never move a branch implicitly.
    pub update_ref: bool,
}

/// Result of a successful [`CherryPick::commit`].
#[derive(Debug, Clone)]
pub struct CommitResult {
    /// SHA of the created commit
    pub sha: Oid,
    /// SHA of the commit's tree
    pub tree: Oid,
    /// Parent of the created commit (the pre-patch branch head)
    pub parent: Oid,
    /// The message used
    pub message: String,
    /// Whether the branch reference was updated
    pub branch_updated: bool,
}

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickStatus {
    /// No delivery in flight.
    Idle,
    /// Patch applied cleanly; `commit()` is allowed.
    Patched,
    /// Patch application rejected hunks; only a new `patch()` is allowed.
    Conflicted,
    /// Delivery committed.
    Committed,
}

impl PickStatus {
    fn name(self) -> &'static str {
        match self {
            PickStatus::Idle => "idle",
            PickStatus::Patched => "patched",
            PickStatus::Conflicted => "conflicted",
            PickStatus::Committed => "committed",
        }
    }
}

/// Everything recorded about the in-flight delivery at `patch()` time.
#[derive(Debug)]
struct Delivery {
    base: Oid,
    target: Oid,
    branch: BranchName,
    /// Branch head observed at `patch()` time; parent of the commit and
    /// expected-old value of the ref update.
    branch_head: Oid,
    branch_tree: TreeListing,
    changes: Vec<FileChange>,
    workspace: Workspace,
}

#[derive(Debug)]
enum PickState {
    Idle,
    Patched(Box<Delivery>),
    Conflicted {
        delivery: Box<Delivery>,
        output: String,
    },
    Committed {
        sha: Oid,
    },
}

impl PickState {
    fn status(&self) -> PickStatus {
        match self {
            PickState::Idle => PickStatus::Idle,
            PickState::Patched(_) => PickStatus::Patched,
            PickState::Conflicted { .. } => PickStatus::Conflicted,
            PickState::Committed { .. } => PickStatus::Committed,
        }
    }
}

/// One cherry-pick delivery at a time against a forge.
pub struct CherryPick {
    forge: Arc<dyn Forge>,
    applier: Box<dyn PatchApplier>,
    state: PickState,
}

impl std::fmt::Debug for CherryPick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CherryPick")
            .field("forge", &self.forge.name())
            .field("status", &self.status())
            .finish()
    }
}

impl CherryPick {
    /// Create a controller using `git apply` for patch application.
    pub fn new(forge: Arc<dyn Forge>) -> Self {
        Self::with_applier(forge, Box::new(GitApplier))
    }

    /// Create a controller with an injected patch applier (tests, or an
    /// alternative tool).
    pub fn with_applier(forge: Arc<dyn Forge>, applier: Box<dyn PatchApplier>) -> Self {
        Self {
            forge,
            applier,
            state: PickState::Idle,
        }
    }

    /// The underlying forge, for auxiliary queries such as
    /// [`Forge::commits_between`].
    pub fn forge(&self) -> &dyn Forge {
        &*self.forge
    }

    /// Current lifecycle status.
    pub fn status(&self) -> PickStatus {
        self.state.status()
    }

    /// Scratch snapshot location while a delivery is in flight (Patched or
    /// Conflicted), for caller inspection.
    pub fn workspace_dir(&self) -> Option<&Path> {
        match &self.state {
            PickState::Patched(delivery) => Some(delivery.workspace.files_dir()),
            PickState::Conflicted { delivery, .. } => Some(delivery.workspace.files_dir()),
            _ => None,
        }
    }

    /// The patch tool's reject output after a conflict.
    pub fn conflict_output(&self) -> Option<&str> {
        match &self.state {
            PickState::Conflicted { output, .. } => Some(output),
            _ => None,
        }
    }

    /// SHA of the delivered commit once **Committed**.
    pub fn committed_sha(&self) -> Option<&Oid> {
        match &self.state {
            PickState::Committed { sha } => Some(sha),
            _ => None,
        }
    }

    /// Resolve a ref, translating "not found" into the delivery-level
    /// error that names the offending reference.
    async fn resolve(&self, reference: &str) -> Result<Oid, PickError> {
        match self.forge.resolve_ref(reference).await {
            Ok(sha) => Ok(sha),
            Err(ForgeError::NotFound(_)) => Err(PickError::RefNotFound(reference.to_string())),
            Err(other) => Err(other.into()),
        }
    }

    /// Fetch the base→target diff and stage it against `branch`'s current
    /// tip in a fresh scratch snapshot, then apply it locally.
    ///
    /// On success the controller is **Patched** and [`commit`] may be
    /// called. On a rejected apply the controller is **Conflicted**, the
    /// snapshot (including `.rej` files) is retained for inspection, and
    /// the returned [`PickError::MergeConflict`] carries the tool output.
    ///
    /// Calling `patch()` again at any point abandons the previous
    /// delivery and reclaims its snapshot.
    ///
    /// [`commit`]: CherryPick::commit
    pub async fn patch(
        &mut self,
        base: &str,
        target: &str,
        branch: &str,
    ) -> Result<(), PickError> {
        // Abandon any prior delivery before resolving the new one
        self.state = PickState::Idle;

        let base_sha = self.resolve(base).await?;
        let target_sha = self.resolve(target).await?;
        let branch_head = self.resolve(branch).await?;
        let branch_name =
            BranchName::new(branch).map_err(|_| PickError::RefNotFound(branch.to_string()))?;
        debug!(%base_sha, %target_sha, %branch_head, "refs resolved");

        let diff = self.forge.diff(&base_sha, &target_sha).await?;
        let changes = summarize(&diff);

        let branch_tree = self.forge.tree(branch_head.as_str()).await?;
        if branch_tree.truncated {
            return Err(ForgeError::ApiError {
                status: 0,
                message: format!(
                    "tree listing for {} was truncated by the host",
                    branch_head.short(7)
                ),
            }
            .into());
        }

        let workspace = Workspace::create()?;
        workspace.write_patch(&diff)?;

        // Materialize only what the patch touches. Paths absent from the
        // branch tree are either created by the patch or already deleted
        // upstream; both apply against nothing.
        for change in &changes {
            let Some(entry) = branch_tree.entry(&change.path) else {
                continue;
            };
            match entry.kind {
                EntryKind::Blob if entry.mode == "120000" => {
                    return Err(PickError::UnsupportedTreeEntry {
                        path: change.path.clone(),
                        detail: "symlink".to_string(),
                    });
                }
                EntryKind::Blob => {
                    let content = self.forge.blob(&entry.sha).await?;
                    workspace.materialize(&change.path, &content)?;
                }
                EntryKind::Tree | EntryKind::Commit => {
                    return Err(PickError::UnsupportedTreeEntry {
                        path: change.path.clone(),
                        detail: entry.kind.to_string(),
                    });
                }
            }
        }

        let delivery = Box::new(Delivery {
            base: base_sha,
            target: target_sha,
            branch: branch_name,
            branch_head,
            branch_tree,
            changes,
            workspace,
        });

        // An empty diff is a valid no-op delivery; there is nothing to apply
        if diff.is_empty() {
            info!("empty diff; nothing to apply");
            self.state = PickState::Patched(delivery);
            return Ok(());
        }

        let outcome = self
            .applier
            .apply(delivery.workspace.patch_file(), delivery.workspace.files_dir())?;
        match outcome {
            ApplyOutcome::Clean => {
                delivery.workspace.ensure_files_dir()?;
                info!(files = delivery.changes.len(), "patch applied cleanly");
                self.state = PickState::Patched(delivery);
                Ok(())
            }
            ApplyOutcome::Rejected { output } => {
                info!("patch application rejected hunks");
                self.state = PickState::Conflicted {
                    delivery,
                    output: output.clone(),
                };
                Err(PickError::MergeConflict { output })
            }
        }
    }

    /// Turn the patched snapshot into remote objects: changed files become
    /// blobs, the branch's pre-patch tree gains the changed entries (and
    /// loses deleted ones), and a commit is created with the recorded
    /// branch head as parent.
    ///
    /// With `update_ref` set, the branch is then moved with a
    /// compare-and-swap against that same recorded head; if the branch has
    /// advanced in the meantime the result is [`PickError::StaleRef`], the
    /// created objects stay orphaned remotely, and the controller resets
    /// so the caller can retry from [`patch`].
    ///
    /// Only valid from **Patched**; anywhere else this is
    /// [`PickError::InvalidState`].
    ///
    /// [`patch`]: CherryPick::patch
    pub async fn commit(&mut self, options: CommitOptions) -> Result<CommitResult, PickError> {
        let PickState::Patched(delivery) = &self.state else {
            return Err(PickError::InvalidState {
                operation: "commit",
                state: self.state.status().name(),
            });
        };

        let message = options.message.clone().unwrap_or_else(|| {
            format!(
                "This is a cherry-pick between {} and {}",
                delivery.base, delivery.target
            )
        });

        // Upload changed content, reusing everything else via base_tree
        let mut writes = Vec::with_capacity(delivery.changes.len());
        for change in &delivery.changes {
            if change.is_deleted {
                writes.push(TreeWrite::delete(&change.path));
                continue;
            }
            let content = delivery.workspace.read_file(&change.path)?;
            let blob = self.forge.create_blob(&content).await?;
            let mode = change
                .mode
                .clone()
                .or_else(|| {
                    delivery
                        .branch_tree
                        .entry(&change.path)
                        .map(|e| e.mode.clone())
                })
                .unwrap_or_else(|| DEFAULT_FILE_MODE.to_string());
            writes.push(TreeWrite::blob(&change.path, mode, blob));
        }

        let tree = if writes.is_empty() {
            // No-op delivery: the new commit reuses the pre-patch tree
            delivery.branch_tree.sha.clone()
        } else {
            self.forge
                .create_tree(Some(&delivery.branch_tree.sha), &writes)
                .await?
        };

        let parent = delivery.branch_head.clone();
        let sha = self
            .forge
            .create_commit(&tree, &parent, &message, options.author.as_ref())
            .await?;
        info!(%sha, %tree, "commit created");

        let mut branch_updated = false;
        if options.update_ref {
            match self
                .forge
                .update_ref(&delivery.branch, &sha, &delivery.branch_head)
                .await
            {
                Ok(()) => branch_updated = true,
                Err(ForgeError::StaleRef {
                    branch,
                    expected,
                    actual,
                }) => {
                    // The commit exists remotely but is unreferenced; the
                    // snapshot is stale, so the delivery starts over
                    self.state = PickState::Idle;
                    return Err(PickError::StaleRef {
                        branch,
                        expected,
                        actual,
                    });
                }
                Err(other) => return Err(other.into()),
            }
        }

        self.state = PickState::Committed { sha: sha.clone() };
        Ok(CommitResult {
            sha,
            tree,
            parent,
            message,
            branch_updated,
        })
    }
}
