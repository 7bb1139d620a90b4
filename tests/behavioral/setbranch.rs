// ABOUTME: Behavioral tests for SetBranch between branches sharing one source subdirectory

use crate::fixtures::{release_branch, user_branch, Sandbox, TRUNK};
use branchwork::branch::{Alignment, ErrorKind};
use branchwork::models::metadata::PROP_BRANCH_TYPE;
use branchwork::models::{RepoPath, MARKER_FILE};
use branchwork::vcs::Backend;
use pretty_assertions::assert_eq;

/// Test 1: Switching between trunk and a user branch moves the whole working copy
#[test]
fn test_setbranch_round_trip_between_trunk_and_user_branch() {
    // Arrange
    let sandbox = Sandbox::new();
    sandbox.create_user_branch("ws");

    // Act
    let to_trunk = sandbox.manager().set_branch("trunk", false, false).unwrap();

    // Assert
    assert_eq!(to_trunk.plan.alignment, Alignment::Same);
    assert_eq!(to_trunk.plan.local_dir, sandbox.wc);
    assert_eq!(
        sandbox.backend.wc_info(&sandbox.wc).unwrap().unwrap().repo_path,
        RepoPath::new(TRUNK)
    );

    // Act
    let back = sandbox.manager().set_branch("ws", false, false).unwrap();

    // Assert
    assert_eq!(back.plan.target, user_branch("ws"));
    assert_eq!(
        sandbox.manager().info().unwrap().branch.branch_path,
        user_branch("ws")
    );
}

/// Test 2: Local edits block the switch; forcing carries them but never the marker
#[test]
fn test_setbranch_with_local_changes_requires_force() {
    // Arrange
    let sandbox = Sandbox::new();
    sandbox.create_user_branch("ws");
    sandbox
        .backend
        .write_file(&sandbox.local("README"), "half done\n")
        .unwrap();
    sandbox
        .backend
        .set_wc_property(&sandbox.local(MARKER_FILE), "bw:scratch", "1")
        .unwrap();

    // Act / Assert: refused
    let err = sandbox.manager().set_branch("trunk", false, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LocalState);

    // Act: forced
    sandbox.manager().set_branch("trunk", true, false).unwrap();

    // Assert: the edit came along, the marker is trunk's own
    assert_eq!(sandbox.read("README").as_deref(), Some("half done\n"));
    let marker = sandbox
        .backend
        .wc_properties(&sandbox.local(MARKER_FILE))
        .unwrap()
        .unwrap();
    assert_eq!(marker[PROP_BRANCH_TYPE], "trunk");
    assert!(!marker.contains_key("bw:scratch"));
}

/// Test 3: Unknown names are NotFound
#[test]
fn test_setbranch_to_unknown_branch_is_not_found() {
    let sandbox = Sandbox::new();

    let err = sandbox.manager().set_branch("nope", false, false).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// Test 4: Release branches have their own tree root; crossing needs --change-root
#[test]
fn test_setbranch_across_tree_roots_requires_change_root() {
    // Arrange: the working copy ends up on the new release branch
    let sandbox = Sandbox::new();
    sandbox.manager().create_branch("1.0", false, false).unwrap();
    assert_eq!(
        sandbox.backend.wc_info(&sandbox.wc).unwrap().unwrap().repo_path,
        release_branch("1.0")
    );

    // Act / Assert
    let err = sandbox.manager().set_branch("trunk", false, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalTarget);
    assert!(err.to_string().contains("--change-root"));

    let outcome = sandbox.manager().set_branch("trunk", false, true).unwrap();
    assert_eq!(outcome.plan.target, RepoPath::new(TRUNK));
}

/// Test 5: User branches of a release branch switch freely within that lineage
#[test]
fn test_user_branch_of_release_branch_shares_its_tree_root() {
    // Arrange
    let sandbox = Sandbox::new();
    sandbox.manager().create_branch("1.0", false, false).unwrap();
    let fix = sandbox.create_user_branch("fix");
    assert_eq!(
        fix.metadata.source.as_ref().map(|s| s.root.clone()),
        Some(release_branch("1.0"))
    );

    // Act
    let outcome = sandbox.manager().set_branch("1.0", false, false).unwrap();

    // Assert
    assert_eq!(outcome.plan.target, release_branch("1.0"));
    assert_eq!(
        sandbox.manager().info().unwrap().tree_root,
        release_branch("1.0")
    );
}
