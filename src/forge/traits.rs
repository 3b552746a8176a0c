//! forge::traits
//!
//! Forge trait definition for interacting with remote hosting services.
//!
//! # Design
//!
//! The `Forge` trait is async because forge operations involve network I/O.
//! All methods return `Result` to handle API errors gracefully.
//!
//! The trait covers exactly the object-level surface a cherry-pick delivery
//! needs: ref resolution, diffing, tree/blob reads, object creation, and a
//! compare-and-swap ref update. Operations are stateless with respect to
//! each other beyond the shared connection configuration.
//!
//! # Example
//!
//! ```ignore
//! use graftwork::forge::Forge;
//!
//! async fn tip_of(forge: &dyn Forge, branch: &str) -> Result<(), ForgeError> {
//!     let sha = forge.resolve_ref(branch).await?;
//!     println!("{branch} is at {}", sha.short(7));
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::core::types::{BranchName, Oid};

/// Default mode for regular-file tree entries.
pub const DEFAULT_FILE_MODE: &str = "100644";

/// Errors from forge operations.
///
/// These error types map to common failure modes when interacting with
/// remote hosting services. Transport and authentication failures are not
/// reinterpreted by higher layers; they propagate as-is.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Authentication is required but not available.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// Conditional ref update failed: the branch no longer points at the
    /// expected commit. This is the only defense against concurrent writers,
    /// so callers must treat it as "somebody else moved the branch" and
    /// restart from resolution.
    #[error("stale ref: {branch} expected {expected}, found {actual}")]
    StaleRef {
        /// The branch being updated
        branch: String,
        /// The head the caller observed
        expected: String,
        /// The head the host reported
        actual: String,
    },
}

/// Commit metadata, as returned by commit listing and lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Commit SHA
    pub sha: Oid,
    /// Full commit message
    pub message: String,
    /// Author name
    pub author: String,
    /// Committer date, RFC3339 as reported by the host
    pub date: String,
}

impl CommitInfo {
    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

/// Author metadata attached to a created commit.
///
/// Serializes to the wire shape the host expects (`name`, `email`, RFC3339
/// `date`). When omitted from [`Forge::create_commit`], the host attributes
/// the authenticated user.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommitAuthor {
    /// Author name
    pub name: String,
    /// Author email
    pub email: String,
    /// Author date
    pub date: DateTime<Utc>,
}

impl CommitAuthor {
    /// Author stamped with the current time.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            date: Utc::now(),
        }
    }
}

/// Kind of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// File content
    Blob,
    /// Subdirectory
    Tree,
    /// Submodule (commit object in a tree)
    Commit,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Blob => write!(f, "blob"),
            EntryKind::Tree => write!(f, "tree"),
            EntryKind::Commit => write!(f, "commit"),
        }
    }
}

impl EntryKind {
    /// Parse the host's `type` field.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blob" => Some(EntryKind::Blob),
            "tree" => Some(EntryKind::Tree),
            "commit" => Some(EntryKind::Commit),
            _ => None,
        }
    }
}

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Path relative to the repository root
    pub path: String,
    /// File mode (e.g. `100644`, `100755`, `040000`, `120000`, `160000`)
    pub mode: String,
    /// Entry kind
    pub kind: EntryKind,
    /// Object SHA
    pub sha: Oid,
}

/// A full recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeListing {
    /// SHA of the tree object itself
    pub sha: Oid,
    /// Entries, as returned by the host
    pub entries: Vec<TreeEntry>,
    /// Whether the host truncated the listing
    pub truncated: bool,
}

impl TreeListing {
    /// Look up an entry by exact path.
    pub fn entry(&self, path: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.path == path)
    }
}

/// One write in a tree creation request.
///
/// A `sha` of `None` deletes the path from the base tree; `Some` inserts or
/// replaces it with the given blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeWrite {
    /// Path relative to the repository root
    pub path: String,
    /// File mode
    pub mode: String,
    /// Blob SHA, or `None` to delete the path
    pub sha: Option<Oid>,
}

impl TreeWrite {
    /// Insert or replace `path` with a blob.
    pub fn blob(path: impl Into<String>, mode: impl Into<String>, sha: Oid) -> Self {
        Self {
            path: path.into(),
            mode: mode.into(),
            sha: Some(sha),
        }
    }

    /// Delete `path` from the base tree.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: DEFAULT_FILE_MODE.to_string(),
            sha: None,
        }
    }
}

/// The Forge trait for interacting with remote hosting services.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, ForgeError>`. Callers should handle:
/// - `AuthRequired` / `AuthFailed`: credentials missing or rejected
/// - `NotFound`: ref or object doesn't exist
/// - `RateLimited`: back off and retry (never retried internally)
/// - `StaleRef`: the branch moved; restart from resolution
/// - `NetworkError`: check connectivity
#[async_trait]
pub trait Forge: Send + Sync {
    /// Get the forge name (e.g., "github").
    fn name(&self) -> &'static str;

    /// Resolve a branch name, tag name, or full SHA to a commit SHA.
    ///
    /// A full 40-hex SHA resolves to itself without a network call.
    /// Branch and tag resolution reflect the tip at resolution time.
    ///
    /// # Errors
    ///
    /// `NotFound` if the reference resolves to neither a branch nor a tag.
    async fn resolve_ref(&self, reference: &str) -> Result<Oid, ForgeError>;

    /// Fetch the unified diff between two commits.
    ///
    /// Returns an empty string when the commits are identical (a no-op
    /// patch).
    ///
    /// # Errors
    ///
    /// `NotFound` if either SHA is unreachable in the repository.
    async fn diff(&self, base: &Oid, target: &Oid) -> Result<String, ForgeError>;

    /// List commit metadata covering the ancestry range `(from, to]`,
    /// newest first as returned by the host.
    async fn commits_between(&self, from: &Oid, to: &Oid) -> Result<Vec<CommitInfo>, ForgeError>;

    /// Metadata for a single commit.
    async fn commit_info(&self, sha: &Oid) -> Result<CommitInfo, ForgeError>;

    /// Full recursive tree listing for a treeish.
    ///
    /// The host accepts a commit SHA, a tree SHA, or a ref name here, so a
    /// branch name can be listed without resolving it first.
    async fn tree(&self, treeish: &str) -> Result<TreeListing, ForgeError>;

    /// Fetch raw blob content by SHA.
    async fn blob(&self, sha: &Oid) -> Result<Vec<u8>, ForgeError>;

    /// Upload content as a new blob, returning its SHA.
    async fn create_blob(&self, content: &[u8]) -> Result<Oid, ForgeError>;

    /// Create a tree from `writes` layered over `base_tree`.
    ///
    /// With a base tree, unchanged entries are reused by the host and only
    /// the written paths change; a `None` SHA in a write deletes that path.
    async fn create_tree(
        &self,
        base_tree: Option<&Oid>,
        writes: &[TreeWrite],
    ) -> Result<Oid, ForgeError>;

    /// Create a commit object pointing at `tree` with a single `parent`.
    ///
    /// When `author` is `None` the host attributes the authenticated user.
    async fn create_commit(
        &self,
        tree: &Oid,
        parent: &Oid,
        message: &str,
        author: Option<&CommitAuthor>,
    ) -> Result<Oid, ForgeError>;

    /// Conditionally update a branch to point at `new_sha`.
    ///
    /// This is a compare-and-swap: the update happens only if the branch
    /// still points at `expected_old`, and is never forced (fast-forward
    /// only).
    ///
    /// # Errors
    ///
    /// `StaleRef` if the branch head no longer equals `expected_old`.
    async fn update_ref(
        &self,
        branch: &BranchName,
        new_sha: &Oid,
        expected_old: &Oid,
    ) -> Result<(), ForgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(fill: &str) -> Oid {
        Oid::new(fill.repeat(40 / fill.len())).unwrap()
    }

    #[test]
    fn forge_error_display() {
        assert_eq!(
            format!("{}", ForgeError::AuthRequired),
            "authentication required"
        );
        assert_eq!(
            format!("{}", ForgeError::NotFound("refs/heads/gone".into())),
            "not found: refs/heads/gone"
        );
        assert_eq!(format!("{}", ForgeError::RateLimited), "rate limited");
        assert_eq!(
            format!(
                "{}",
                ForgeError::StaleRef {
                    branch: "main".into(),
                    expected: "aaaa".into(),
                    actual: "bbbb".into(),
                }
            ),
            "stale ref: main expected aaaa, found bbbb"
        );
    }

    #[test]
    fn entry_kind_parse_and_display() {
        for kind in [EntryKind::Blob, EntryKind::Tree, EntryKind::Commit] {
            assert_eq!(EntryKind::parse(&kind.to_string()), Some(kind));
        }
        assert_eq!(EntryKind::parse("tag"), None);
    }

    #[test]
    fn commit_info_summary_is_first_line() {
        let info = CommitInfo {
            sha: oid("a"),
            message: "Fix the frobnicator\n\nLonger body.".to_string(),
            author: "whiskeyriver".to_string(),
            date: "2015-06-01T00:00:00Z".to_string(),
        };
        assert_eq!(info.summary(), "Fix the frobnicator");
    }

    #[test]
    fn tree_listing_entry_lookup() {
        let listing = TreeListing {
            sha: oid("1"),
            entries: vec![TreeEntry {
                path: "README.md".to_string(),
                mode: DEFAULT_FILE_MODE.to_string(),
                kind: EntryKind::Blob,
                sha: oid("2"),
            }],
            truncated: false,
        };
        assert!(listing.entry("README.md").is_some());
        assert!(listing.entry("README").is_none());
    }

    #[test]
    fn tree_write_constructors() {
        let write = TreeWrite::blob("a/b.txt", "100755", oid("3"));
        assert_eq!(write.sha, Some(oid("3")));

        let delete = TreeWrite::delete("a/b.txt");
        assert_eq!(delete.sha, None);
        assert_eq!(delete.mode, DEFAULT_FILE_MODE);
    }

    #[test]
    fn commit_author_serializes_rfc3339() {
        let author = CommitAuthor::new("whiskeyriver", "wr@example.com");
        let json = serde_json::to_value(&author).unwrap();
        assert_eq!(json["name"], "whiskeyriver");
        assert!(json["date"].as_str().unwrap().contains('T'));
    }
}
