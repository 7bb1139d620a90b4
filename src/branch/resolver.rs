// ABOUTME: Subbranch path resolver - which local directory moves, and to which repository
// path, when switching between branches rooted at different source subdirectories

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::error::{BranchError, BranchResult};
use crate::models::path::{local_join, longest_common_prefix, strip_subpath_prefix};
use crate::models::{BranchMetadata, BranchType, RepoPath};

/// How the target's root relates to the current one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Alignment {
    /// Same source subdirectory: the working-copy root switches in place
    Same,
    /// Target is rooted `relative` below the current root
    Descend { relative: String },
    /// Target (trunk) is rooted `relative` above the current root
    Ascend { relative: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchPlan {
    /// Local directory handed to the backend switch
    pub local_dir: PathBuf,
    /// Repository path it is switched to
    pub target: RepoPath,
    pub alignment: Alignment,
}

/// The working copy enclosing a subbranch root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentWorkingCopy {
    pub local_root: PathBuf,
    pub branch_path: RepoPath,
}

/// Decide whether switching from `current` (checked out at `current_root`) to
/// `target` is legal and which directory and path take part.
///
/// `parent_of` locates the working copy enclosing `current_root`; it is only
/// consulted when realigning a subbranch onto trunk.
pub fn plan_switch<F>(
    current_root: &Path,
    current: &BranchMetadata,
    target: &BranchMetadata,
    cwd: &Path,
    parent_of: F,
) -> BranchResult<SwitchPlan>
where
    F: FnOnce(&Path) -> BranchResult<Option<ParentWorkingCopy>>,
{
    let from = current.source_subpath();
    let to = target.source_subpath();

    if from == to {
        return Ok(SwitchPlan {
            local_dir: current_root.to_path_buf(),
            target: target.branch_path.clone(),
            alignment: Alignment::Same,
        });
    }

    if let Some(relative) = strip_subpath_prefix(to, from) {
        let local_dir = local_join(current_root, &relative);
        if !(cwd.starts_with(&local_dir) || local_dir.starts_with(cwd)) {
            return Err(BranchError::IllegalTarget(format!(
                "{} is rooted at {}, which is not a child or parent of the current directory {}",
                target.branch_path,
                local_dir.display(),
                cwd.display()
            )));
        }
        return Ok(SwitchPlan {
            local_dir,
            target: target.branch_path.clone(),
            alignment: Alignment::Descend { relative },
        });
    }

    if let Some(relative) = strip_subpath_prefix(from, to) {
        if target.branch_type != BranchType::Trunk {
            return Err(BranchError::IllegalTarget(format!(
                "Can't switch a subbranch to a top-level branch other than trunk ({} is a {})",
                target.branch_path, target.branch_type
            )));
        }
        let parent = parent_of(current_root)?.ok_or_else(|| {
            BranchError::IllegalTarget(format!(
                "{} is rooted above the working copy at {}, and no enclosing working copy exists",
                target.branch_path,
                current_root.display()
            ))
        })?;
        if parent.branch_path != target.branch_path
            || local_join(&parent.local_root, &relative) != current_root
        {
            return Err(BranchError::IllegalTarget(format!(
                "{} is rooted above the working copy: the enclosing working copy {} is on {}",
                target.branch_path,
                parent.local_root.display(),
                parent.branch_path
            )));
        }
        return Ok(SwitchPlan {
            local_dir: current_root.to_path_buf(),
            target: target.branch_path.join(&relative),
            alignment: Alignment::Ascend { relative },
        });
    }

    Err(BranchError::IllegalTarget(format!(
        "{} (rooted at '{}') is outside of the working copy rooted at '{}' (common root '{}')",
        target.branch_path,
        to,
        from,
        longest_common_prefix(from, to)
    )))
}
