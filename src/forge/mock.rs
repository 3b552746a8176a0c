//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! The mock forge keeps a miniature object database in memory: blobs,
//! trees (stored as their recursive listing), commits, and refs, plus
//! scripted compare diffs. Object SHAs are synthetic but well-formed, so
//! everything downstream treats them exactly like real ones.
//!
//! # Example
//!
//! ```
//! use graftwork::forge::mock::MockForge;
//! use graftwork::forge::Forge;
//!
//! # tokio_test::block_on(async {
//! let forge = MockForge::new();
//! let tree = forge.stage_tree(&[("README.md", "hello\n")]);
//! let commit = forge.stage_commit(tree, vec![], "initial");
//! forge.set_branch("main", commit.clone());
//!
//! let resolved = forge.resolve_ref("main").await.unwrap();
//! assert_eq!(resolved, commit);
//! # });
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::traits::{
    CommitAuthor, CommitInfo, EntryKind, Forge, ForgeError, TreeEntry, TreeListing, TreeWrite,
    DEFAULT_FILE_MODE,
};
use crate::core::types::{BranchName, Oid};

/// Mode for directory entries in synthesized listings.
const DIR_MODE: &str = "040000";

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockForge {
    inner: Arc<Mutex<MockForgeInner>>,
}

/// Internal mutable state.
#[derive(Debug)]
struct MockForgeInner {
    blobs: HashMap<Oid, Vec<u8>>,
    /// Recursive listing per tree SHA.
    trees: HashMap<Oid, Vec<TreeEntry>>,
    commits: HashMap<Oid, MockCommit>,
    /// Refs keyed as `heads/<name>` or `tags/<name>`.
    refs: BTreeMap<String, Oid>,
    /// Scripted compare results keyed by (base, target).
    diffs: HashMap<(Oid, Oid), String>,
    next_object: u64,
    fail_on: Option<FailOn>,
    operations: Vec<MockOperation>,
}

/// A commit stored in the mock object database.
#[derive(Debug, Clone)]
struct MockCommit {
    message: String,
    tree: Oid,
    parents: Vec<Oid>,
    author: String,
    date: String,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail resolve_ref with the given error.
    ResolveRef(ForgeError),
    /// Fail diff with the given error.
    Diff(ForgeError),
    /// Fail tree with the given error.
    Tree(ForgeError),
    /// Fail blob with the given error.
    Blob(ForgeError),
    /// Fail create_blob with the given error.
    CreateBlob(ForgeError),
    /// Fail create_tree with the given error.
    CreateTree(ForgeError),
    /// Fail create_commit with the given error.
    CreateCommit(ForgeError),
    /// Fail update_ref with the given error.
    UpdateRef(ForgeError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone)]
pub enum MockOperation {
    ResolveRef { reference: String },
    Diff { base: Oid, target: Oid },
    Tree { treeish: String },
    Blob { sha: Oid },
    CreateBlob { bytes: usize },
    CreateTree { base_tree: Option<Oid>, writes: Vec<TreeWrite> },
    CreateCommit { tree: Oid, parent: Oid, message: String },
    UpdateRef { branch: String, new_sha: Oid, expected_old: Oid },
}

impl Default for MockForge {
    fn default() -> Self {
        Self::new()
    }
}

impl MockForge {
    /// Create a new empty mock forge.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockForgeInner {
                blobs: HashMap::new(),
                trees: HashMap::new(),
                commits: HashMap::new(),
                refs: BTreeMap::new(),
                diffs: HashMap::new(),
                next_object: 1,
                fail_on: None,
                operations: Vec::new(),
            })),
        }
    }

    /// Configure the mock to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fail_on = Some(fail_on);
        }
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    // ----------------------------------------------------------------------
    // Staging helpers (test setup)
    // ----------------------------------------------------------------------

    /// Stage a tree from `(path, content)` pairs, creating blobs and
    /// intermediate directory entries the way a recursive listing shows
    /// them. Returns the tree SHA.
    pub fn stage_tree(&self, files: &[(&str, &str)]) -> Oid {
        let mut inner = self.inner.lock().unwrap();

        let mut by_path: BTreeMap<String, TreeEntry> = BTreeMap::new();
        for (path, content) in files {
            let blob = inner.mint();
            inner.blobs.insert(blob.clone(), content.as_bytes().to_vec());
            by_path.insert(
                path.to_string(),
                TreeEntry {
                    path: path.to_string(),
                    mode: DEFAULT_FILE_MODE.to_string(),
                    kind: EntryKind::Blob,
                    sha: blob,
                },
            );
        }
        synthesize_dirs(&mut by_path, &mut inner);

        let sha = inner.mint();
        inner
            .trees
            .insert(sha.clone(), by_path.into_values().collect());
        sha
    }

    /// Stage a single non-blob entry into an existing staged tree
    /// (submodules and symlinks for unsupported-entry tests).
    pub fn stage_special_entry(&self, tree: &Oid, path: &str, mode: &str, kind: EntryKind) {
        let mut inner = self.inner.lock().unwrap();
        let sha = inner.mint();
        let entries = inner.trees.get_mut(tree).expect("unknown staged tree");
        entries.push(TreeEntry {
            path: path.to_string(),
            mode: mode.to_string(),
            kind,
            sha,
        });
    }

    /// Stage a commit pointing at `tree` and return its SHA.
    pub fn stage_commit(&self, tree: Oid, parents: Vec<Oid>, message: &str) -> Oid {
        let mut inner = self.inner.lock().unwrap();
        let sha = inner.mint();
        let date = format!("2015-06-01T00:00:{:02}Z", inner.next_object % 60);
        inner.commits.insert(
            sha.clone(),
            MockCommit {
                message: message.to_string(),
                tree,
                parents,
                author: "mock".to_string(),
                date,
            },
        );
        sha
    }

    /// Point a branch at a commit.
    pub fn set_branch(&self, name: &str, sha: Oid) {
        let mut inner = self.inner.lock().unwrap();
        inner.refs.insert(format!("heads/{name}"), sha);
    }

    /// Point a tag at a commit.
    pub fn set_tag(&self, name: &str, sha: Oid) {
        let mut inner = self.inner.lock().unwrap();
        inner.refs.insert(format!("tags/{name}"), sha);
    }

    /// Script the diff returned for a `(base, target)` compare.
    pub fn script_diff(&self, base: &Oid, target: &Oid, diff: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .diffs
            .insert((base.clone(), target.clone()), diff.to_string());
    }

    // ----------------------------------------------------------------------
    // Inspection helpers (test assertions)
    // ----------------------------------------------------------------------

    /// Current head of a branch, if any.
    pub fn branch_head(&self, name: &str) -> Option<Oid> {
        self.inner
            .lock()
            .unwrap()
            .refs
            .get(&format!("heads/{name}"))
            .cloned()
    }

    /// Stored blob content, if any.
    pub fn blob_content(&self, sha: &Oid) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().blobs.get(sha).cloned()
    }

    /// Stored recursive listing for a tree, if any.
    pub fn tree_entries(&self, sha: &Oid) -> Option<Vec<TreeEntry>> {
        self.inner.lock().unwrap().trees.get(sha).cloned()
    }

    /// Tree SHA a commit points at, if the commit exists.
    pub fn commit_tree(&self, sha: &Oid) -> Option<Oid> {
        self.inner
            .lock()
            .unwrap()
            .commits
            .get(sha)
            .map(|c| c.tree.clone())
    }

    /// Parent SHAs of a commit, if the commit exists.
    pub fn commit_parents(&self, sha: &Oid) -> Option<Vec<Oid>> {
        self.inner
            .lock()
            .unwrap()
            .commits
            .get(sha)
            .map(|c| c.parents.clone())
    }

    /// Message of a commit, if the commit exists.
    pub fn commit_message(&self, sha: &Oid) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .commits
            .get(sha)
            .map(|c| c.message.clone())
    }

    fn check_fail(&self, pick: impl Fn(&FailOn) -> Option<&ForgeError>) -> Result<(), ForgeError> {
        let inner = self.inner.lock().unwrap();
        if let Some(fail_on) = &inner.fail_on {
            if let Some(err) = pick(fail_on) {
                return Err(err.clone());
            }
        }
        Ok(())
    }
}

impl MockForgeInner {
    /// Mint a fresh synthetic SHA.
    fn mint(&mut self) -> Oid {
        let sha = format!("{:040x}", self.next_object);
        self.next_object += 1;
        Oid::new(sha).expect("synthetic sha is well-formed")
    }

    fn record(&mut self, op: MockOperation) {
        self.operations.push(op);
    }
}

/// Insert directory rows for every intermediate path component, the way a
/// real recursive listing includes them.
fn synthesize_dirs(by_path: &mut BTreeMap<String, TreeEntry>, inner: &mut MockForgeInner) {
    let mut dirs: Vec<String> = Vec::new();
    for path in by_path.keys() {
        for (idx, _) in path.match_indices('/') {
            dirs.push(path[..idx].to_string());
        }
    }

    for dir in dirs {
        if !by_path.contains_key(&dir) {
            let sha = inner.mint();
            by_path.insert(
                dir.clone(),
                TreeEntry {
                    path: dir,
                    mode: DIR_MODE.to_string(),
                    kind: EntryKind::Tree,
                    sha,
                },
            );
        }
    }
}

#[async_trait]
impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn resolve_ref(&self, reference: &str) -> Result<Oid, ForgeError> {
        self.check_fail(|f| match f {
            FailOn::ResolveRef(e) => Some(e),
            _ => None,
        })?;

        let mut inner = self.inner.lock().unwrap();
        inner.record(MockOperation::ResolveRef {
            reference: reference.to_string(),
        });

        if Oid::looks_like_sha(reference) {
            return Oid::new(reference).map_err(|_| ForgeError::NotFound(reference.to_string()));
        }
        for namespace in ["heads", "tags"] {
            if let Some(sha) = inner.refs.get(&format!("{namespace}/{reference}")) {
                return Ok(sha.clone());
            }
        }
        Err(ForgeError::NotFound(format!(
            "{} is not a branch, tag, or full sha",
            reference
        )))
    }

    async fn diff(&self, base: &Oid, target: &Oid) -> Result<String, ForgeError> {
        self.check_fail(|f| match f {
            FailOn::Diff(e) => Some(e),
            _ => None,
        })?;

        let mut inner = self.inner.lock().unwrap();
        inner.record(MockOperation::Diff {
            base: base.clone(),
            target: target.clone(),
        });

        if base == target {
            return Ok(String::new());
        }
        inner
            .diffs
            .get(&(base.clone(), target.clone()))
            .cloned()
            .ok_or_else(|| ForgeError::ApiError {
                status: 0,
                message: format!("no scripted diff for {}...{}", base.short(7), target.short(7)),
            })
    }

    async fn commits_between(&self, from: &Oid, to: &Oid) -> Result<Vec<CommitInfo>, ForgeError> {
        let inner = self.inner.lock().unwrap();

        // Walk first parents from `to`, newest first, stopping at `from`.
        let mut commits = Vec::new();
        let mut cursor = Some(to.clone());
        while let Some(sha) = cursor {
            if sha == *from {
                break;
            }
            let commit = inner
                .commits
                .get(&sha)
                .ok_or_else(|| ForgeError::NotFound(sha.to_string()))?;
            commits.push(CommitInfo {
                sha: sha.clone(),
                message: commit.message.clone(),
                author: commit.author.clone(),
                date: commit.date.clone(),
            });
            cursor = commit.parents.first().cloned();
        }
        Ok(commits)
    }

    async fn commit_info(&self, sha: &Oid) -> Result<CommitInfo, ForgeError> {
        let inner = self.inner.lock().unwrap();
        let commit = inner
            .commits
            .get(sha)
            .ok_or_else(|| ForgeError::NotFound(sha.to_string()))?;
        Ok(CommitInfo {
            sha: sha.clone(),
            message: commit.message.clone(),
            author: commit.author.clone(),
            date: commit.date.clone(),
        })
    }

    async fn tree(&self, treeish: &str) -> Result<TreeListing, ForgeError> {
        self.check_fail(|f| match f {
            FailOn::Tree(e) => Some(e),
            _ => None,
        })?;

        let mut inner = self.inner.lock().unwrap();
        inner.record(MockOperation::Tree {
            treeish: treeish.to_string(),
        });

        // Accept a ref name, commit SHA, or tree SHA, like the host does.
        let mut sha = if Oid::looks_like_sha(treeish) {
            Oid::new(treeish).expect("validated by looks_like_sha")
        } else {
            ["heads", "tags"]
                .iter()
                .find_map(|ns| inner.refs.get(&format!("{ns}/{treeish}")).cloned())
                .ok_or_else(|| ForgeError::NotFound(treeish.to_string()))?
        };
        if let Some(commit) = inner.commits.get(&sha) {
            sha = commit.tree.clone();
        }

        let entries = inner
            .trees
            .get(&sha)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(treeish.to_string()))?;
        Ok(TreeListing {
            sha,
            entries,
            truncated: false,
        })
    }

    async fn blob(&self, sha: &Oid) -> Result<Vec<u8>, ForgeError> {
        self.check_fail(|f| match f {
            FailOn::Blob(e) => Some(e),
            _ => None,
        })?;

        let mut inner = self.inner.lock().unwrap();
        inner.record(MockOperation::Blob { sha: sha.clone() });
        inner
            .blobs
            .get(sha)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(sha.to_string()))
    }

    async fn create_blob(&self, content: &[u8]) -> Result<Oid, ForgeError> {
        self.check_fail(|f| match f {
            FailOn::CreateBlob(e) => Some(e),
            _ => None,
        })?;

        let mut inner = self.inner.lock().unwrap();
        inner.record(MockOperation::CreateBlob {
            bytes: content.len(),
        });
        let sha = inner.mint();
        inner.blobs.insert(sha.clone(), content.to_vec());
        Ok(sha)
    }

    async fn create_tree(
        &self,
        base_tree: Option<&Oid>,
        writes: &[TreeWrite],
    ) -> Result<Oid, ForgeError> {
        self.check_fail(|f| match f {
            FailOn::CreateTree(e) => Some(e),
            _ => None,
        })?;

        let mut inner = self.inner.lock().unwrap();
        inner.record(MockOperation::CreateTree {
            base_tree: base_tree.cloned(),
            writes: writes.to_vec(),
        });

        let mut by_path: BTreeMap<String, TreeEntry> = match base_tree {
            Some(base) => inner
                .trees
                .get(base)
                .ok_or_else(|| ForgeError::NotFound(base.to_string()))?
                .iter()
                .cloned()
                .map(|e| (e.path.clone(), e))
                .collect(),
            None => BTreeMap::new(),
        };

        for write in writes {
            match &write.sha {
                Some(sha) => {
                    if !inner.blobs.contains_key(sha) {
                        return Err(ForgeError::ApiError {
                            status: 422,
                            message: format!("tree references unknown blob {}", sha),
                        });
                    }
                    by_path.insert(
                        write.path.clone(),
                        TreeEntry {
                            path: write.path.clone(),
                            mode: write.mode.clone(),
                            kind: EntryKind::Blob,
                            sha: sha.clone(),
                        },
                    );
                }
                None => {
                    by_path.remove(&write.path);
                }
            }
        }
        synthesize_dirs(&mut by_path, &mut inner);

        let sha = inner.mint();
        inner
            .trees
            .insert(sha.clone(), by_path.into_values().collect());
        Ok(sha)
    }

    async fn create_commit(
        &self,
        tree: &Oid,
        parent: &Oid,
        message: &str,
        author: Option<&CommitAuthor>,
    ) -> Result<Oid, ForgeError> {
        self.check_fail(|f| match f {
            FailOn::CreateCommit(e) => Some(e),
            _ => None,
        })?;

        let mut inner = self.inner.lock().unwrap();
        inner.record(MockOperation::CreateCommit {
            tree: tree.clone(),
            parent: parent.clone(),
            message: message.to_string(),
        });

        if !inner.trees.contains_key(tree) {
            return Err(ForgeError::ApiError {
                status: 422,
                message: format!("commit references unknown tree {}", tree),
            });
        }
        if !inner.commits.contains_key(parent) {
            return Err(ForgeError::ApiError {
                status: 422,
                message: format!("commit references unknown parent {}", parent),
            });
        }

        let sha = inner.mint();
        let date = format!("2015-06-01T00:00:{:02}Z", inner.next_object % 60);
        inner.commits.insert(
            sha.clone(),
            MockCommit {
                message: message.to_string(),
                tree: tree.clone(),
                parents: vec![parent.clone()],
                author: author.map(|a| a.name.clone()).unwrap_or_else(|| "mock".to_string()),
                date,
            },
        );
        Ok(sha)
    }

    async fn update_ref(
        &self,
        branch: &BranchName,
        new_sha: &Oid,
        expected_old: &Oid,
    ) -> Result<(), ForgeError> {
        self.check_fail(|f| match f {
            FailOn::UpdateRef(e) => Some(e),
            _ => None,
        })?;

        let mut inner = self.inner.lock().unwrap();
        inner.record(MockOperation::UpdateRef {
            branch: branch.to_string(),
            new_sha: new_sha.clone(),
            expected_old: expected_old.clone(),
        });

        let key = format!("heads/{branch}");
        let current = inner
            .refs
            .get(&key)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(key.clone()))?;
        if current != *expected_old {
            return Err(ForgeError::StaleRef {
                branch: branch.to_string(),
                expected: expected_old.to_string(),
                actual: current.to_string(),
            });
        }
        inner.refs.insert(key, new_sha.clone());
        Ok(())
    }
}
