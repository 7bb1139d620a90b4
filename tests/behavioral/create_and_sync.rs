// ABOUTME: Behavioral tests for CreateBranch and Synchronize
//
// Verifies branch-point bookkeeping, working-copy switching on create, and that
// synchronize merges only new source changes and records the merge point locally.

use crate::fixtures::{release_branch, user_branch, Sandbox, MAIN_C, TRUNK};
use branchwork::branch::{ErrorKind, SyncOutcome};
use branchwork::models::metadata::{
    PROP_BRANCH_PATH, PROP_BRANCH_POINT, PROP_LAST_MERGE, PROP_POLICY,
};
use branchwork::models::{BranchType, RepoPath, MARKER_FILE};
use branchwork::vcs::{Backend, CommitOp, Conflict, ConflictKind, EntryState, NodeKind};
use pretty_assertions::assert_eq;

/// Test 1: A user branch copies the tree root at HEAD and the working copy follows it
#[test]
fn test_create_user_branch_records_branch_point() {
    // Arrange
    let sandbox = Sandbox::new();

    // Act
    let outcome = sandbox.create_user_branch("ws");

    // Assert: branch exists and was created by an admin commit
    assert_eq!(outcome.revision, 3);
    assert_eq!(
        sandbox.backend.check_path(&user_branch("ws"), None).unwrap(),
        NodeKind::Directory
    );
    assert!(sandbox
        .backend
        .log_message(3)
        .unwrap()
        .starts_with("branch admin - create user branch"));

    // Assert: branch point and last merge are the source HEAD before the copy
    let source = outcome.metadata.source.expect("user branch has a source");
    assert_eq!(source.root, RepoPath::new(TRUNK));
    assert_eq!(source.subpath, "");
    assert_eq!(source.branch_point_revision, 2);
    assert_eq!(source.last_merge_revision, 2);

    // Assert: the working copy now points at the branch
    assert_eq!(outcome.local_dir, sandbox.wc);
    let info = sandbox.manager().info().unwrap();
    assert_eq!(info.branch.branch_type, BranchType::UserBranch);
    assert_eq!(info.branch.branch_path, user_branch("ws"));
    assert_eq!(info.tree_root, RepoPath::new(TRUNK));
    assert_eq!(sandbox.read("src/main.c").as_deref(), Some(MAIN_C));
}

/// Test 2: Nothing new in the source means nothing to merge
#[test]
fn test_sync_with_unchanged_source_is_up_to_date() {
    // Arrange
    let sandbox = Sandbox::new();
    sandbox.create_user_branch("ws");

    // Act
    let outcome = sandbox.manager().synchronize().unwrap();

    // Assert
    assert_eq!(
        outcome,
        SyncOutcome::UpToDate {
            last_merge_revision: 2
        }
    );
    assert!(sandbox.backend.status(&sandbox.wc).unwrap().is_empty());
}

/// Test 3: Source changes are merged and the new merge point is recorded uncommitted
#[test]
fn test_sync_merges_source_changes_and_records_merge_point() {
    // Arrange: trunk moves on after the branch was cut
    let sandbox = Sandbox::new();
    sandbox.create_user_branch("ws");
    let trunk_rev = sandbox.trunk_commit("src/main.c", "int main() { return 1; }\n");
    assert_eq!(trunk_rev, 4);

    // Act
    let outcome = sandbox.manager().synchronize().unwrap();

    // Assert: the range (2, 4] was merged into the working copy
    match outcome {
        SyncOutcome::Merged {
            from,
            to,
            merged,
            skipped,
            conflicts,
        } => {
            assert_eq!((from, to), (2, 4));
            assert_eq!(merged, vec![sandbox.local("src/main.c")]);
            assert!(skipped.is_empty());
            assert!(conflicts.is_empty());
        }
        other => panic!("expected a merge, got {other:?}"),
    }
    assert_eq!(
        sandbox.read("src/main.c").as_deref(),
        Some("int main() { return 1; }\n")
    );

    // Assert: only the last merge revision changed on the marker
    let marker = sandbox
        .backend
        .wc_properties(&sandbox.local(MARKER_FILE))
        .unwrap()
        .unwrap();
    assert_eq!(marker[PROP_LAST_MERGE], "4");
    assert_eq!(marker[PROP_BRANCH_POINT], "2");

    // Assert: nothing was committed
    assert_eq!(sandbox.backend.latest_revision().unwrap(), 4);

    // Assert: the uncommitted merge point already counts
    assert_eq!(
        sandbox.manager().synchronize().unwrap(),
        SyncOutcome::UpToDate {
            last_merge_revision: 4
        }
    );
}

/// Test 4: A file deleted on the branch but changed at the source is skipped, not resurrected
#[test]
fn test_sync_skips_paths_deleted_on_branch() {
    // Arrange
    let sandbox = Sandbox::new();
    sandbox.create_user_branch("ws");
    sandbox.backend.remove(&sandbox.local("README")).unwrap();
    sandbox.commit_all("ws - drop readme").unwrap();
    sandbox.trunk_commit("README", "better readme\n");

    // Act
    let outcome = sandbox.manager().synchronize().unwrap();

    // Assert
    match outcome {
        SyncOutcome::Merged { skipped, merged, .. } => {
            assert_eq!(skipped, vec![sandbox.local("README")]);
            assert!(merged.is_empty());
        }
        other => panic!("expected a merge, got {other:?}"),
    }
    assert_eq!(sandbox.read("README"), None);
}

/// Test 5: Synchronize only applies to user branches
#[test]
fn test_sync_on_trunk_is_illegal() {
    let sandbox = Sandbox::new();

    let err = sandbox.manager().synchronize().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::IllegalTarget);
}

/// Test 6: Local changes block creation unless a user branch is forced
#[test]
fn test_create_with_local_changes_requires_force() {
    // Arrange
    let sandbox = Sandbox::new();
    sandbox
        .backend
        .write_file(&sandbox.local("src/main.c"), "work in progress\n")
        .unwrap();

    // Act / Assert: refused without force, for both branch kinds
    let err = sandbox.manager().create_branch("ws", true, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LocalState);
    let err = sandbox.manager().create_branch("1.0", false, true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LocalState);
    assert_eq!(sandbox.backend.latest_revision().unwrap(), 2);

    // Act / Assert: forced user branch carries the edit over
    let outcome = sandbox.manager().create_branch("ws", true, true).unwrap();
    assert_eq!(outcome.metadata.branch_path, user_branch("ws"));
    assert_eq!(sandbox.read("src/main.c").as_deref(), Some("work in progress\n"));
    assert_eq!(
        sandbox.backend.file_at(&user_branch("ws").join("src/main.c"), None).as_deref(),
        Some(MAIN_C)
    );
}

/// Test 7: A user branch may not shadow a release branch of the same name
#[test]
fn test_user_branch_name_clashing_with_release_branch_is_illegal() {
    // Arrange
    let sandbox = Sandbox::new();
    let release = sandbox.manager().create_branch("1.0", false, false).unwrap();
    assert_eq!(release.metadata.branch_type, BranchType::ReleaseBranch);
    assert_eq!(release.metadata.branch_path, release_branch("1.0"));

    // Act
    let err = sandbox.manager().create_branch("1.0", true, false).unwrap_err();

    // Assert
    assert_eq!(err.kind(), ErrorKind::IllegalTarget);
    assert!(err.to_string().contains("release branch named '1.0'"));
}

/// Test 8: Existing branches and reserved names are rejected before any commit
#[test]
fn test_create_existing_or_reserved_name_is_illegal() {
    // Arrange
    let sandbox = Sandbox::new();
    sandbox.create_user_branch("ws");
    sandbox.manager().set_branch("trunk", false, false).unwrap();
    let before = sandbox.backend.latest_revision().unwrap();

    // Act / Assert
    for name in ["ws", "trunk", "user", "", "a/b", ".hidden"] {
        let err = sandbox.manager().create_branch(name, true, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalTarget, "name {name:?}");
    }
    assert_eq!(sandbox.backend.latest_revision().unwrap(), before);
}

/// Test 9: Release branches are cut from the top of trunk only
#[test]
fn test_release_branch_from_user_branch_is_illegal() {
    let sandbox = Sandbox::new();
    sandbox.create_user_branch("ws");

    let err = sandbox.manager().create_branch("1.0", false, false).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::IllegalTarget);
}

/// Test 10: Marker conflicts confined to branch identity keep the branch's own values
#[test]
fn test_sync_resolves_identity_conflicts_in_favor_of_branch() {
    // Arrange: an admin rewrites trunk's own branch path after ws was cut
    let sandbox = Sandbox::new();
    sandbox.create_user_branch("ws");
    sandbox
        .backend
        .commit_ops(
            &[CommitOp::SetProperty {
                path: RepoPath::new(TRUNK).join(MARKER_FILE),
                name: PROP_BRANCH_PATH.to_string(),
                value: "/proj/trunk/".to_string(),
            }],
            "branch admin - repair trunk marker",
        )
        .unwrap();

    // Act
    let outcome = sandbox.manager().synchronize().unwrap();

    // Assert: nothing left to resolve, identity untouched, merge point advanced
    match outcome {
        SyncOutcome::Merged { to, conflicts, .. } => {
            assert_eq!(to, 4);
            assert!(conflicts.is_empty());
        }
        other => panic!("expected a merge, got {other:?}"),
    }
    let marker = sandbox
        .backend
        .wc_properties(&sandbox.local(MARKER_FILE))
        .unwrap()
        .unwrap();
    assert_eq!(marker[PROP_BRANCH_PATH], user_branch("ws").to_string());
    assert_eq!(marker[PROP_LAST_MERGE], "4");
    let status = sandbox.backend.status(&sandbox.wc).unwrap();
    assert!(status.iter().all(|e| e.state != EntryState::Conflicted));
}

/// Test 11: Any other marker conflict is reported and left for the user
#[test]
fn test_sync_reports_policy_conflict_on_marker() {
    // Arrange: ws and trunk both change their commit policy
    let sandbox = Sandbox::new();
    sandbox.create_user_branch("ws");
    sandbox
        .backend
        .set_wc_property(
            &sandbox.local(MARKER_FILE),
            PROP_POLICY,
            r#"{"kind":"version-gated","minimum_version":"3.0"}"#,
        )
        .unwrap();
    assert_eq!(sandbox.commit_all("ws - gate on 3.0"), Some(4));
    sandbox.update();
    sandbox
        .backend
        .commit_ops(
            &[CommitOp::SetProperty {
                path: RepoPath::new(TRUNK).join(MARKER_FILE),
                name: PROP_POLICY.to_string(),
                value: r#"{"kind":"version-gated","minimum_version":"2.1"}"#.to_string(),
            }],
            "branch admin - gate trunk",
        )
        .unwrap();

    // Act
    let outcome = sandbox.manager().synchronize().unwrap();

    // Assert
    match outcome {
        SyncOutcome::Merged { to, conflicts, .. } => {
            assert_eq!(to, 5);
            assert_eq!(
                conflicts,
                vec![Conflict {
                    path: sandbox.local(MARKER_FILE),
                    kind: ConflictKind::Property(vec![PROP_POLICY.to_string()]),
                }]
            );
        }
        other => panic!("expected a merge, got {other:?}"),
    }
    let status = sandbox.backend.status(&sandbox.wc).unwrap();
    assert!(status
        .iter()
        .any(|e| e.path == sandbox.local(MARKER_FILE) && e.state == EntryState::Conflicted));
}
