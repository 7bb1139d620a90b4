// ABOUTME: Canonical repository paths of a project's branches and the tree root of a branch
//
// Pure functions; callers check existence against the backend.

use super::error::{BranchError, BranchResult};
use crate::models::{BranchMetadata, BranchType, Project, RepoPath};

pub fn trunk_path(project: &Project) -> RepoPath {
    project.root.join(&project.layout.trunk_path)
}

pub fn release_branches_container(project: &Project) -> RepoPath {
    project.root.join(&project.layout.release_branches_path)
}

pub fn user_branches_container(project: &Project) -> RepoPath {
    project.root.join(&project.layout.user_branches_path)
}

pub fn release_branch_path(project: &Project, name: &str) -> RepoPath {
    release_branches_container(project).join(name)
}

pub fn user_branch_path(project: &Project, name: &str) -> RepoPath {
    user_branches_container(project).join(name)
}

/// Path that decides whether two branches share ancestry: trunk and release
/// branches anchor themselves, user branches anchor at their source.
pub fn tree_root(metadata: &BranchMetadata) -> &RepoPath {
    match (metadata.branch_type, &metadata.source) {
        (BranchType::UserBranch, Some(source)) => &source.root,
        _ => &metadata.branch_path,
    }
}

/// Names become a single path component under a container
pub fn validate_branch_name(project: &Project, name: &str) -> BranchResult<()> {
    if name.is_empty() {
        return Err(BranchError::IllegalTarget("branch name is empty".to_string()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(BranchError::IllegalTarget(format!(
            "branch name '{name}' must not contain path separators"
        )));
    }
    if name.starts_with('.') {
        return Err(BranchError::IllegalTarget(format!(
            "branch name '{name}' must not start with '.'"
        )));
    }
    if name == project.trunk_name() {
        return Err(BranchError::IllegalTarget(format!(
            "'{name}' is the trunk name"
        )));
    }
    // A name must never land on the trunk or one of the containers
    let reserved = [
        trunk_path(project),
        release_branches_container(project),
        user_branches_container(project),
    ];
    let candidates = [
        release_branch_path(project, name),
        user_branch_path(project, name),
    ];
    if candidates.iter().any(|path| reserved.contains(path)) {
        return Err(BranchError::IllegalTarget(format!(
            "'{name}' is reserved by the project layout"
        )));
    }
    Ok(())
}
