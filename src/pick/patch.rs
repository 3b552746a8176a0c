//! pick::patch
//!
//! Unified-diff inspection and local patch application.
//!
//! # Design
//!
//! The compare endpoint already enumerates exactly the files a delivery
//! touches, so [`summarize`] reads the per-file headers out of the diff
//! text instead of hashing anything locally: path, an explicit mode when
//! the diff introduces one, and whether the file is deleted.
//!
//! Patch application is an injected capability ([`PatchApplier`]) so the
//! controller can be tested without an external tool. The production
//! implementation, [`GitApplier`], shells out to `git apply --reject` and
//! reports the tool's output verbatim; it never interprets hunks itself.

use std::path::Path;
use std::process::Command;

use tracing::debug;

/// One file touched by a diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Path relative to the repository root
    pub path: String,
    /// Mode introduced by the diff (`new file mode` / `new mode`), if any
    pub mode: Option<String>,
    /// Whether the diff deletes the file
    pub is_deleted: bool,
}

/// Read the per-file summary out of unified-diff text.
///
/// Recognizes `diff --git a/<path> b/<path>` headers and, within a header
/// block, `new file mode`/`new mode` and `deleted file mode` lines. The
/// block ends at the first `index`, `---`, or `+++` line; hunk content is
/// never scanned, so `---`-shaped lines inside hunks cannot confuse the
/// parser.
pub fn summarize(diff: &str) -> Vec<FileChange> {
    let mut changes = Vec::new();
    let mut current: Option<FileChange> = None;

    for line in diff.lines() {
        let Some(change) = current.as_mut() else {
            if let Some(rest) = line.strip_prefix("diff --git a/") {
                if let Some(idx) = rest.find(" b/") {
                    current = Some(FileChange {
                        path: rest[..idx].to_string(),
                        mode: None,
                        is_deleted: false,
                    });
                }
            }
            continue;
        };

        if let Some(mode) = line
            .strip_prefix("new file mode ")
            .or_else(|| line.strip_prefix("new mode "))
        {
            change.mode = Some(mode.to_string());
        } else if line.starts_with("deleted file mode ") {
            change.is_deleted = true;
        } else if line.starts_with("index ")
            || line.starts_with("--- ")
            || line.starts_with("+++ ")
        {
            changes.extend(current.take());
        }
    }
    // A diff can end inside a header block (e.g. a pure mode change)
    changes.extend(current.take());

    changes
}

/// Result of one local patch application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Every hunk applied.
    Clean,
    /// The tool rejected at least one hunk; `output` is its stdout+stderr
    /// verbatim.
    Rejected {
        /// The tool's combined output
        output: String,
    },
}

/// Capability for applying a unified diff to a directory.
///
/// Implementations must be `Send + Sync`; the controller owns one for the
/// life of a delivery.
pub trait PatchApplier: Send + Sync {
    /// Apply the patch at `patch_file` to the files under `dir`.
    ///
    /// Returns `Ok(ApplyOutcome)` whenever the tool ran, including when it
    /// rejected hunks; `Err` only when the tool could not be invoked.
    fn apply(&self, patch_file: &Path, dir: &Path) -> std::io::Result<ApplyOutcome>;
}

/// Applies patches with `git apply --reject`.
///
/// Runs inside the target directory, so `a/`/`b/` prefixes in the diff are
/// stripped normally and rejected hunks land next to their files as
/// `.rej` entries for inspection.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitApplier;

impl PatchApplier for GitApplier {
    fn apply(&self, patch_file: &Path, dir: &Path) -> std::io::Result<ApplyOutcome> {
        debug!(patch = %patch_file.display(), dir = %dir.display(), "running git apply");
        let output = Command::new("git")
            .args(["apply", "--verbose", "--reject"])
            .arg(patch_file)
            .current_dir(dir)
            .output()?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(ApplyOutcome::Clean)
        } else {
            debug!(status = ?output.status.code(), "git apply rejected hunks");
            Ok(ApplyOutcome::Rejected { output: combined })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod summarize {
        use super::*;

        const MIXED_DIFF: &str = "\
diff --git a/README.md b/README.md
index 11130ef..27a2225 100644
--- a/README.md
+++ b/README.md
@@ -1,2 +1,2 @@
 # ghpick_test
-old line
+new line
diff --git a/NewFile.txt b/NewFile.txt
new file mode 100644
index 0000000..e69de29
--- /dev/null
+++ b/NewFile.txt
@@ -0,0 +1 @@
+contents
diff --git a/gone.txt b/gone.txt
deleted file mode 100644
index 257cc56..0000000
--- a/gone.txt
+++ /dev/null
@@ -1 +0,0 @@
-bye
";

        #[test]
        fn parses_modified_new_and_deleted() {
            let changes = summarize(MIXED_DIFF);
            assert_eq!(
                changes,
                vec![
                    FileChange {
                        path: "README.md".to_string(),
                        mode: None,
                        is_deleted: false,
                    },
                    FileChange {
                        path: "NewFile.txt".to_string(),
                        mode: Some("100644".to_string()),
                        is_deleted: false,
                    },
                    FileChange {
                        path: "gone.txt".to_string(),
                        mode: Some("100644".to_string()),
                        is_deleted: true,
                    },
                ]
            );
        }

        #[test]
        fn empty_diff_has_no_changes() {
            assert!(summarize("").is_empty());
        }

        #[test]
        fn nested_paths_survive() {
            let diff = "\
diff --git a/test/nested/mods/and/deletions/mod_me.txt b/test/nested/mods/and/deletions/mod_me.txt
index aaa..bbb 100644
--- a/test/nested/mods/and/deletions/mod_me.txt
+++ b/test/nested/mods/and/deletions/mod_me.txt
@@ -1 +1 @@
-x
+y
";
            let changes = summarize(diff);
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].path, "test/nested/mods/and/deletions/mod_me.txt");
        }

        #[test]
        fn hunk_content_does_not_start_new_blocks() {
            // A deleted line shaped like a diff header must not be parsed
            let diff = "\
diff --git a/a.txt b/a.txt
index aaa..bbb 100644
--- a/a.txt
+++ b/a.txt
@@ -1,2 +1,1 @@
-diff --git a/fake b/fake
 keep
";
            let changes = summarize(diff);
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].path, "a.txt");
        }

        #[test]
        fn mode_change_block_without_terminator() {
            let diff = "\
diff --git a/tool.sh b/tool.sh
old mode 100644
new mode 100755
";
            let changes = summarize(diff);
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].mode.as_deref(), Some("100755"));
        }
    }

    mod git_applier {
        use super::*;
        use std::fs;

        fn write_patch(dir: &Path, patch: &str) -> std::path::PathBuf {
            let path = dir.join("patch");
            fs::write(&path, patch).unwrap();
            path
        }

        #[test]
        fn clean_apply_mutates_the_file() {
            let scratch = tempfile::tempdir().unwrap();
            let files = scratch.path().join("files");
            fs::create_dir(&files).unwrap();
            fs::write(files.join("a.txt"), "one\ntwo\nthree\n").unwrap();

            let patch = write_patch(
                scratch.path(),
                "\
diff --git a/a.txt b/a.txt
index aaa..bbb 100644
--- a/a.txt
+++ b/a.txt
@@ -1,3 +1,3 @@
 one
-two
+2
 three
",
            );

            let outcome = GitApplier.apply(&patch, &files).unwrap();
            assert_eq!(outcome, ApplyOutcome::Clean);
            assert_eq!(
                fs::read_to_string(files.join("a.txt")).unwrap(),
                "one\n2\nthree\n"
            );
        }

        #[test]
        fn mismatched_context_is_rejected_with_output() {
            let scratch = tempfile::tempdir().unwrap();
            let files = scratch.path().join("files");
            fs::create_dir(&files).unwrap();
            fs::write(files.join("a.txt"), "entirely different content\n").unwrap();

            let patch = write_patch(
                scratch.path(),
                "\
diff --git a/a.txt b/a.txt
index aaa..bbb 100644
--- a/a.txt
+++ b/a.txt
@@ -1,3 +1,3 @@
 one
-two
+2
 three
",
            );

            let outcome = GitApplier.apply(&patch, &files).unwrap();
            match outcome {
                ApplyOutcome::Rejected { output } => {
                    assert!(!output.is_empty(), "reject output must be preserved");
                }
                other => panic!("expected rejection, got {other:?}"),
            }
        }
    }
}
