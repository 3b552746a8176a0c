//! End-to-end delivery tests over the in-memory forge.
//!
//! These run the real `git apply` against scratch snapshots; only the
//! hosted API is mocked.

use std::sync::Arc;

use graftwork::core::types::Oid;
use graftwork::forge::mock::MockForge;
use graftwork::forge::{EntryKind, Forge};
use graftwork::pick::{CherryPick, CommitOptions, PickError, PickStatus};

const README_BEFORE: &str = "one\ntwo\nthree\n";

/// Modifies one line of README.md.
const ONE_LINE_DIFF: &str = "\
diff --git a/README.md b/README.md
index 1111111..2222222 100644
--- a/README.md
+++ b/README.md
@@ -1,3 +1,3 @@
 one
-two
+2
 three
";

/// Modifies README.md, adds NewFile.txt, deletes gone.txt.
const MIXED_DIFF: &str = "\
diff --git a/README.md b/README.md
index 1111111..2222222 100644
--- a/README.md
+++ b/README.md
@@ -1,3 +1,3 @@
 one
-two
+2
 three
diff --git a/NewFile.txt b/NewFile.txt
new file mode 100644
index 0000000..3333333
--- /dev/null
+++ b/NewFile.txt
@@ -0,0 +1 @@
+fresh contents
diff --git a/gone.txt b/gone.txt
deleted file mode 100644
index 4444444..0000000
--- a/gone.txt
+++ /dev/null
@@ -1 +0,0 @@
-bye
";

struct Scenario {
    forge: MockForge,
    base: Oid,
    target: Oid,
    head: Oid,
}

/// Branch `rel_1.0_dev` with a README the diffs apply to, plus files the
/// delivery must leave alone.
fn scenario(diff: &str) -> Scenario {
    let forge = MockForge::new();

    let base_tree = forge.stage_tree(&[("README.md", README_BEFORE)]);
    let base = forge.stage_commit(base_tree, vec![], "base commit");
    let target_tree = forge.stage_tree(&[("README.md", "one\n2\nthree\n")]);
    let target = forge.stage_commit(target_tree, vec![base.clone()], "target commit");

    let branch_tree = forge.stage_tree(&[
        ("README.md", README_BEFORE),
        ("gone.txt", "bye\n"),
        ("unrelated.txt", "keep\n"),
        ("docs/guide.md", "guide\n"),
    ]);
    let head = forge.stage_commit(branch_tree, vec![], "branch head");
    forge.set_branch("rel_1.0_dev", head.clone());

    forge.script_diff(&base, &target, diff);

    Scenario {
        forge,
        base,
        target,
        head,
    }
}

fn controller(forge: &MockForge) -> CherryPick {
    CherryPick::new(Arc::new(forge.clone()))
}

#[tokio::test]
async fn one_file_delivery_end_to_end() {
    let s = scenario(ONE_LINE_DIFF);
    let mut cherry = controller(&s.forge);

    cherry
        .patch(s.base.as_str(), s.target.as_str(), "rel_1.0_dev")
        .await
        .unwrap();
    assert_eq!(cherry.status(), PickStatus::Patched);

    let result = cherry
        .commit(CommitOptions {
            update_ref: true,
            ..Default::default()
        })
        .await
        .unwrap();

    // Parent is the pre-patch branch head
    assert_eq!(result.parent, s.head);
    assert_eq!(s.forge.commit_parents(&result.sha).unwrap(), vec![s.head.clone()]);

    // Default message is generated and non-empty
    assert_eq!(
        result.message,
        format!("This is a cherry-pick between {} and {}", s.base, s.target)
    );
    assert_eq!(s.forge.commit_message(&result.sha).unwrap(), result.message);

    // Branch moved to the new commit
    assert!(result.branch_updated);
    assert_eq!(s.forge.branch_head("rel_1.0_dev").unwrap(), result.sha);
    assert_eq!(
        s.forge.resolve_ref("rel_1.0_dev").await.unwrap(),
        result.sha
    );

    // The tree differs from the pre-patch tree only in the changed file
    let before = s.forge.tree(s.head.as_str()).await.unwrap();
    let after = s.forge.tree(result.sha.as_str()).await.unwrap();
    for entry in &before.entries {
        let counterpart = after.entry(&entry.path).expect("no path disappeared");
        if entry.path == "README.md" {
            assert_ne!(counterpart.sha, entry.sha, "changed file got a new blob");
        } else {
            assert_eq!(counterpart.sha, entry.sha, "unchanged entry reused: {}", entry.path);
        }
    }
    assert_eq!(after.entries.len(), before.entries.len());

    // The uploaded blob carries the patched content
    let readme = after.entry("README.md").unwrap();
    assert_eq!(
        s.forge.blob(&readme.sha).await.unwrap(),
        b"one\n2\nthree\n".to_vec()
    );
}

#[tokio::test]
async fn additions_and_deletions_reshape_the_tree() {
    let s = scenario(MIXED_DIFF);
    let mut cherry = controller(&s.forge);

    cherry
        .patch(s.base.as_str(), s.target.as_str(), "rel_1.0_dev")
        .await
        .unwrap();
    let result = cherry
        .commit(CommitOptions {
            update_ref: true,
            ..Default::default()
        })
        .await
        .unwrap();

    let after = s.forge.tree(result.sha.as_str()).await.unwrap();
    assert!(after.entry("NewFile.txt").is_some(), "added file present");
    assert!(after.entry("gone.txt").is_none(), "deleted file removed");
    assert!(after.entry("unrelated.txt").is_some());
    assert!(after.entry("docs/guide.md").is_some());

    let new_file = after.entry("NewFile.txt").unwrap();
    assert_eq!(new_file.kind, EntryKind::Blob);
    assert_eq!(new_file.mode, "100644");
    assert_eq!(
        s.forge.blob(&new_file.sha).await.unwrap(),
        b"fresh contents\n".to_vec()
    );
}

#[tokio::test]
async fn blob_to_tree_round_trip_preserves_mapping() {
    let s = scenario(ONE_LINE_DIFF);
    let mut cherry = controller(&s.forge);

    cherry
        .patch(s.base.as_str(), s.target.as_str(), "rel_1.0_dev")
        .await
        .unwrap();
    let result = cherry.commit(CommitOptions::default()).await.unwrap();

    // Fetching the created tree yields the submitted path→SHA mapping
    let fetched = s.forge.tree(result.tree.as_str()).await.unwrap();
    let readme_blob = fetched.entry("README.md").unwrap().sha.clone();
    assert_eq!(
        s.forge.blob(&readme_blob).await.unwrap(),
        b"one\n2\nthree\n".to_vec()
    );
}

#[tokio::test]
async fn identical_commits_deliver_an_identical_tree() {
    let s = scenario(ONE_LINE_DIFF);
    let mut cherry = controller(&s.forge);

    // base == target: the diff is empty and nothing is applied
    cherry
        .patch(s.base.as_str(), s.base.as_str(), "rel_1.0_dev")
        .await
        .unwrap();
    assert_eq!(cherry.status(), PickStatus::Patched);

    let result = cherry
        .commit(CommitOptions {
            update_ref: true,
            ..Default::default()
        })
        .await
        .unwrap();

    let before = s.forge.tree(s.head.as_str()).await.unwrap();
    assert_eq!(result.tree, before.sha, "no-op delivery reuses the tree");
    assert_eq!(s.forge.commit_parents(&result.sha).unwrap(), vec![s.head]);
}

#[tokio::test]
async fn conflicting_delivery_halts_with_reject_output() {
    let s = scenario(ONE_LINE_DIFF);
    // Rewrite the branch README so the hunk context cannot match
    let conflict_tree = s.forge.stage_tree(&[
        ("README.md", "entirely\ndifferent\ncontent\n"),
        ("gone.txt", "bye\n"),
    ]);
    let conflict_head = s.forge.stage_commit(conflict_tree, vec![], "diverged head");
    s.forge.set_branch("rel_1.0_dev", conflict_head.clone());

    let mut cherry = controller(&s.forge);
    let err = cherry
        .patch(s.base.as_str(), s.target.as_str(), "rel_1.0_dev")
        .await
        .unwrap_err();

    match err {
        PickError::MergeConflict { output } => {
            assert!(!output.is_empty(), "tool output carried verbatim");
        }
        other => panic!("expected MergeConflict, got {other:?}"),
    }
    assert_eq!(cherry.status(), PickStatus::Conflicted);

    // Nothing was created and the branch never moved
    assert_eq!(s.forge.branch_head("rel_1.0_dev").unwrap(), conflict_head);
    let created = s
        .forge
        .operations()
        .iter()
        .filter(|op| {
            matches!(
                op,
                graftwork::forge::mock::MockOperation::CreateBlob { .. }
                    | graftwork::forge::mock::MockOperation::CreateTree { .. }
                    | graftwork::forge::mock::MockOperation::CreateCommit { .. }
            )
        })
        .count();
    assert_eq!(created, 0);
}

#[tokio::test]
async fn branch_advanced_between_patch_and_commit_is_stale() {
    let s = scenario(ONE_LINE_DIFF);
    let mut cherry = controller(&s.forge);

    cherry
        .patch(s.base.as_str(), s.target.as_str(), "rel_1.0_dev")
        .await
        .unwrap();

    // Another actor advances the branch mid-delivery
    let moved_tree = s.forge.stage_tree(&[("README.md", README_BEFORE)]);
    let moved_head = s
        .forge
        .stage_commit(moved_tree, vec![s.head.clone()], "concurrent work");
    s.forge.set_branch("rel_1.0_dev", moved_head.clone());

    let err = cherry
        .commit(CommitOptions {
            update_ref: true,
            ..Default::default()
        })
        .await
        .unwrap_err();

    match err {
        PickError::StaleRef { expected, actual, .. } => {
            assert_eq!(expected, s.head.to_string());
            assert_eq!(actual, moved_head.to_string());
        }
        other => panic!("expected StaleRef, got {other:?}"),
    }

    // Branch untouched; the orphaned commit exists remotely but nothing
    // references it
    assert_eq!(s.forge.branch_head("rel_1.0_dev").unwrap(), moved_head);
    assert_eq!(cherry.status(), PickStatus::Idle);
}

#[tokio::test]
async fn commit_without_update_ref_leaves_the_branch_alone() {
    let s = scenario(ONE_LINE_DIFF);
    let mut cherry = controller(&s.forge);

    cherry
        .patch(s.base.as_str(), s.target.as_str(), "rel_1.0_dev")
        .await
        .unwrap();
    let result = cherry.commit(CommitOptions::default()).await.unwrap();

    assert!(!result.branch_updated);
    assert_eq!(s.forge.branch_head("rel_1.0_dev").unwrap(), s.head);
    // The commit exists and is well-formed even though no ref names it
    assert_eq!(s.forge.commit_parents(&result.sha).unwrap(), vec![s.head]);
    assert_eq!(cherry.committed_sha(), Some(&result.sha));
}

#[tokio::test]
async fn auxiliary_commit_listing_through_the_forge_accessor() {
    let s = scenario(ONE_LINE_DIFF);
    let cherry = controller(&s.forge);

    let commits = cherry
        .forge()
        .commits_between(&s.base, &s.target)
        .await
        .unwrap();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].message, "target commit");
}
