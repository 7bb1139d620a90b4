// ABOUTME: Behavioral tests for subbranches - user branches of a source subdirectory
//
// Covers creation from a subdirectory, scoped synchronize, descending and
// ascending switches, and promoting a subbranch back into its source directory.

use crate::fixtures::{user_branch, Sandbox, MAIN_C, TRUNK};
use branchwork::branch::{Alignment, ErrorKind, SyncOutcome};
use branchwork::models::{BranchType, RepoPath, MARKER_FILE};
use branchwork::vcs::{Backend, CommitOp, NodeKind};
use pretty_assertions::assert_eq;

/// Sandbox with subbranch `lib` created from `/wc/src` (r3)
fn with_subbranch() -> Sandbox {
    let sandbox = Sandbox::new();
    sandbox
        .manager_at("src")
        .create_branch("lib", true, false)
        .unwrap();
    sandbox
}

/// Test 1: Creating from a subdirectory roots the branch there and switches only it
#[test]
fn test_create_from_subdirectory_makes_subbranch() {
    // Arrange
    let sandbox = Sandbox::new();

    // Act
    let outcome = sandbox
        .manager_at("src")
        .create_branch("lib", true, false)
        .unwrap();

    // Assert: metadata
    assert!(outcome.metadata.is_subbranch());
    let source = outcome.metadata.source.as_ref().unwrap();
    assert_eq!(source.root, RepoPath::new(TRUNK));
    assert_eq!(source.subpath, "src");
    assert_eq!(source.path(), RepoPath::new("/proj/trunk/src"));

    // Assert: the branch holds only the subdirectory, plus its marker
    assert_eq!(outcome.local_dir, sandbox.local("src"));
    assert_eq!(
        sandbox.backend.file_at(&user_branch("lib").join("main.c"), None).as_deref(),
        Some(MAIN_C)
    );
    assert_eq!(
        sandbox.backend.check_path(&user_branch("lib").join(MARKER_FILE), None).unwrap(),
        NodeKind::File
    );

    // Assert: the subdirectory sees the subbranch, the root still sees trunk
    let sub = sandbox.manager_at("src").info().unwrap();
    assert_eq!(sub.branch.branch_path, user_branch("lib"));
    assert_eq!(sub.local_root, sandbox.local("src"));

    let root = sandbox.manager().info().unwrap();
    assert_eq!(root.branch.branch_type, BranchType::Trunk);
    assert_eq!(root.subbranches.len(), 1);
    assert_eq!(root.subbranches[0].local_dir, sandbox.local("src"));
    assert_eq!(root.subbranches[0].branch.branch_path, user_branch("lib"));
}

/// Test 2: Synchronize only considers changes inside the source subdirectory
#[test]
fn test_sync_of_subbranch_is_scoped_to_its_subdirectory() {
    // Arrange
    let sandbox = with_subbranch();
    sandbox.trunk_commit("src/main.c", "int main() { return 2; }\n");
    sandbox.trunk_commit("README", "outside the subbranch\n");

    // Act
    let outcome = sandbox.manager_at("src").synchronize().unwrap();

    // Assert
    match outcome {
        SyncOutcome::Merged { from, to, merged, .. } => {
            assert_eq!((from, to), (2, 5));
            assert_eq!(merged, vec![sandbox.local("src/main.c")]);
        }
        other => panic!("expected a merge, got {other:?}"),
    }
    assert_eq!(sandbox.read("README").as_deref(), Some(crate::fixtures::README));
}

/// Test 3: Trunk changes outside the subdirectory don't count as unmerged
#[test]
fn test_sync_ignores_changes_outside_subdirectory() {
    let sandbox = with_subbranch();
    sandbox.trunk_commit("README", "outside the subbranch\n");

    let outcome = sandbox.manager_at("src").synchronize().unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::UpToDate {
            last_merge_revision: 2
        }
    );
}

/// Test 4: Ascending realigns the subdirectory with trunk; descending switches it again
#[test]
fn test_ascend_to_trunk_then_descend_back() {
    // Arrange
    let sandbox = with_subbranch();

    // Act: ascend from inside the subbranch
    let up = sandbox
        .manager_at("src")
        .set_branch("trunk", false, false)
        .unwrap();

    // Assert
    assert_eq!(
        up.plan.alignment,
        Alignment::Ascend {
            relative: "src".to_string()
        }
    );
    assert_eq!(up.plan.local_dir, sandbox.local("src"));
    assert_eq!(up.plan.target, RepoPath::new("/proj/trunk/src"));
    assert!(sandbox.backend.status(&sandbox.wc).unwrap().is_empty());
    assert!(sandbox.manager().info().unwrap().subbranches.is_empty());

    // Act: descend from the root
    let down = sandbox.manager().set_branch("lib", false, false).unwrap();

    // Assert
    assert_eq!(
        down.plan.alignment,
        Alignment::Descend {
            relative: "src".to_string()
        }
    );
    assert_eq!(
        sandbox.backend.wc_info(&sandbox.local("src")).unwrap().unwrap().repo_path,
        user_branch("lib")
    );
}

/// Test 5: A subbranch can only be realigned onto trunk, not onto another top-level branch
#[test]
fn test_ascend_to_top_level_user_branch_is_illegal() {
    // Arrange
    let sandbox = Sandbox::new();
    sandbox.create_user_branch("ws");
    sandbox.manager().set_branch("trunk", false, false).unwrap();
    sandbox
        .manager_at("src")
        .create_branch("lib", true, false)
        .unwrap();

    // Act
    let err = sandbox
        .manager_at("src")
        .set_branch("ws", false, false)
        .unwrap_err();

    // Assert
    assert_eq!(err.kind(), ErrorKind::IllegalTarget);
    assert!(err.to_string().contains("other than trunk"));
}

/// Test 6: Descending needs the current directory on the path to the subbranch root
#[test]
fn test_descend_from_unrelated_directory_is_illegal() {
    // Arrange: trunk grows a docs directory next to src
    let sandbox = with_subbranch();
    sandbox
        .manager_at("src")
        .set_branch("trunk", false, false)
        .unwrap();
    sandbox
        .backend
        .commit_ops(&[CommitOp::MakeDir(RepoPath::new("/proj/trunk/docs"))], "trunk - docs")
        .unwrap();
    sandbox.update();

    // Act
    let err = sandbox
        .manager_at("docs")
        .set_branch("lib", false, false)
        .unwrap_err();

    // Assert
    assert_eq!(err.kind(), ErrorKind::IllegalTarget);
    assert!(err.to_string().contains("not a child or parent"));
}

/// Test 7: Whole-tree operations refuse to run over a switched subdirectory
#[test]
fn test_switched_subdirectory_blocks_whole_tree_operations() {
    let sandbox = with_subbranch();

    let err = sandbox.manager().create_branch("ws", true, false).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::LocalState);
    assert!(err.to_string().contains("use setbranch on them first"));
}

/// Test 8: Promoting a subbranch merges into the source subdirectory without its marker
#[test]
fn test_promote_subbranch_into_source_subdirectory() {
    // Arrange
    let sandbox = with_subbranch();
    sandbox
        .backend
        .write_file(&sandbox.local("src/main.c"), "int main() { return 3; }\n")
        .unwrap();
    sandbox.commit_all("lib - return 3").unwrap();
    sandbox.update();

    // Act
    let outcome = sandbox.manager_at("src").promote(None).unwrap();

    // Assert
    assert_eq!(outcome.message, "trunk - promote lib");
    assert_eq!(outcome.merged, vec![sandbox.local("src/main.c")]);
    assert_eq!(
        sandbox.backend.file_at(&RepoPath::new("/proj/trunk/src/main.c"), None).as_deref(),
        Some("int main() { return 3; }\n")
    );
    assert_eq!(
        sandbox
            .backend
            .check_path(&RepoPath::new("/proj/trunk/src").join(MARKER_FILE), None)
            .unwrap(),
        NodeKind::None
    );
    assert_eq!(
        sandbox.backend.check_path(&user_branch("lib"), None).unwrap(),
        NodeKind::None
    );
    assert!(sandbox.manager().info().unwrap().subbranches.is_empty());
}
