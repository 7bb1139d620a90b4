// ABOUTME: Behavioral tests for the administrative operations - init, delete,
// listbranches, code freeze and commit-message validation

use crate::fixtures::{release_branch, user_branch, Sandbox, PROJECT, TRUNK};
use branchwork::branch::ErrorKind;
use branchwork::models::metadata::PROP_POLICY;
use branchwork::models::{BranchType, ProjectLayout, RepoPath, MARKER_FILE};
use branchwork::vcs::{Backend, CommitOp, NodeKind};
use pretty_assertions::assert_eq;

/// Test 1: init lays out trunk (with its marker) and both containers
#[test]
fn test_init_creates_project_layout() {
    let sandbox = Sandbox::new();
    let project = RepoPath::new(PROJECT);

    let props = sandbox.backend.get_properties(&project, None).unwrap();
    assert_eq!(
        ProjectLayout::from_properties(&props).unwrap(),
        Some(ProjectLayout::default())
    );
    for dir in ["/proj/trunk", "/proj/branches", "/proj/branches/user"] {
        assert_eq!(
            sandbox.backend.check_path(&RepoPath::new(dir), None).unwrap(),
            NodeKind::Directory,
            "{dir}"
        );
    }
    let trunk = sandbox
        .manager()
        .branch_metadata(&RepoPath::new(TRUNK))
        .unwrap()
        .expect("trunk has a marker");
    assert_eq!(trunk.branch_type, BranchType::Trunk);
    assert!(sandbox.backend.log_message(1).unwrap().starts_with("branch admin"));
}

/// Test 2: init refuses an existing project and overlapping layouts
#[test]
fn test_init_rejects_existing_project_and_nested_layout() {
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();

    let err = manager
        .init_project(&RepoPath::new(PROJECT), &ProjectLayout::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalTarget);

    let err = manager
        .init_project(
            &RepoPath::new("/other"),
            &ProjectLayout::new("main", "main/releases", "people"),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalTarget);
    assert_eq!(
        sandbox.backend.check_path(&RepoPath::new("/other"), None).unwrap(),
        NodeKind::None
    );
}

/// Test 3: A branch the working copy points at cannot be deleted
#[test]
fn test_delete_user_branch_in_use_is_rejected() {
    // Arrange
    let sandbox = Sandbox::new();
    sandbox.create_user_branch("ws");

    // Act / Assert: in use
    let err = sandbox.manager().delete_branch("ws", true, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LocalState);
    assert!(err.to_string().contains("use setbranch first"));

    // Act / Assert: after switching away
    sandbox.manager().set_branch("trunk", false, false).unwrap();
    let outcome = sandbox.manager().delete_branch("ws", true, false).unwrap();
    assert_eq!(outcome.branch, user_branch("ws"));
    assert_eq!(
        sandbox.backend.check_path(&user_branch("ws"), None).unwrap(),
        NodeKind::None
    );
}

/// Test 4: A subbranch checked out in a subdirectory also counts as in use
#[test]
fn test_delete_subbranch_switched_in_subdirectory_is_rejected() {
    let sandbox = Sandbox::new();
    sandbox
        .manager_at("src")
        .create_branch("lib", true, false)
        .unwrap();

    let err = sandbox.manager().delete_branch("lib", true, false).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::LocalState);
}

/// Test 5: Release branches need --admin; missing branches are NotFound
#[test]
fn test_delete_release_branch_requires_admin() {
    // Arrange
    let sandbox = Sandbox::new();
    sandbox.manager().create_branch("1.0", false, false).unwrap();
    sandbox.manager().set_branch("trunk", false, true).unwrap();

    // Act / Assert
    let err = sandbox.manager().delete_branch("1.0", false, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyViolation);

    let outcome = sandbox.manager().delete_branch("1.0", false, true).unwrap();
    assert_eq!(outcome.branch, release_branch("1.0"));
    assert!(sandbox
        .backend
        .log_message(outcome.revision)
        .unwrap()
        .starts_with("branch admin - delete"));

    let err = sandbox.manager().delete_branch("1.0", false, true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// Test 6: Only real branches can be deleted, never a container or a plain directory
#[test]
fn test_delete_refuses_containers_and_unmarked_directories() {
    // Arrange: a user branch, and a stray directory among the release branches
    let sandbox = Sandbox::new();
    sandbox.create_user_branch("ws");
    sandbox.manager().set_branch("trunk", false, false).unwrap();
    sandbox
        .backend
        .commit_ops(
            &[CommitOp::MakeDir(RepoPath::new("/proj/branches/scratch"))],
            "branch admin - scratch",
        )
        .unwrap();
    let before = sandbox.backend.latest_revision().unwrap();

    // Act / Assert: the user container is not a release branch
    let err = sandbox.manager().delete_branch("user", false, true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalTarget);

    // Act / Assert: a directory without a marker is not a branch
    let err = sandbox.manager().delete_branch("scratch", false, true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // Assert: nothing was committed and the user branch survived
    assert_eq!(sandbox.backend.latest_revision().unwrap(), before);
    assert_eq!(
        sandbox.backend.check_path(&user_branch("ws"), None).unwrap(),
        NodeKind::Directory
    );
}

/// Test 7: Listing separates release and user branches
#[test]
fn test_list_branches_by_kind() {
    // Arrange
    let sandbox = Sandbox::new();
    sandbox.manager().create_branch("1.0", false, false).unwrap();
    sandbox.manager().set_branch("trunk", false, true).unwrap();
    sandbox.create_user_branch("ws");
    sandbox.manager().set_branch("trunk", false, false).unwrap();
    sandbox.create_user_branch("alice");

    // Act
    let listing = sandbox.manager().list_branches().unwrap();

    // Assert: the user container is not listed as a release branch
    assert_eq!(listing.trunk, RepoPath::new(TRUNK));
    assert_eq!(listing.release_branches, vec!["1.0".to_string()]);
    assert_eq!(
        listing.user_branches,
        vec!["alice".to_string(), "ws".to_string()]
    );
}

/// Test 8: Freeze toggles once, is idempotent, and never applies to user branches
#[test]
fn test_code_freeze_toggle() {
    // Arrange
    let sandbox = Sandbox::new();
    let manager = sandbox.manager();
    let trunk = RepoPath::new(TRUNK);

    // Act / Assert
    assert_eq!(manager.set_code_freeze("trunk", true).unwrap(), Some(3));
    assert!(manager.branch_metadata(&trunk).unwrap().unwrap().code_frozen);
    assert_eq!(manager.set_code_freeze("trunk", true).unwrap(), None);
    assert_eq!(manager.set_code_freeze("trunk", false).unwrap(), Some(4));
    assert!(!manager.branch_metadata(&trunk).unwrap().unwrap().code_frozen);

    sandbox.update();
    sandbox.create_user_branch("ws");
    let err = sandbox.manager().set_code_freeze("ws", true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalTarget);
}

/// Test 9: Messages are validated against the current branch's default policy
#[test]
fn test_validate_message_default_policy() {
    let sandbox = Sandbox::new();

    assert!(sandbox.manager().validate_message("trunk - fix the build").is_ok());
    assert!(sandbox.manager().validate_message("branch admin - repair").is_ok());
    let err = sandbox.manager().validate_message("fix the build").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyViolation);

    sandbox.create_user_branch("ws");
    assert!(sandbox.manager().validate_message("ws - wip").is_ok());
    assert!(sandbox.manager().validate_message("private - wip").is_ok());
    let err = sandbox.manager().validate_message("trunk - wip").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyViolation);
}

/// Test 10: A version-gated branch rejects commits from older tools
#[test]
fn test_validate_message_version_gated_policy() {
    // Arrange: gate trunk on 2.1 and pick it up in the working copy
    let sandbox = Sandbox::new();
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
    sandbox.update();

    // Act / Assert
    let old = sandbox.manager().with_tool_version("2.0.9");
    let err = old.validate_message("trunk - fix").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyViolation);
    assert!(err.to_string().contains("2.1"));

    let new = sandbox.manager().with_tool_version("2.10.0");
    assert!(new.validate_message("trunk - fix").is_ok());
}
