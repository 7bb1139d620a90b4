// ABOUTME: Explicit command context for branch lifecycle operations
//
// A BranchManager pairs a backend with the directory the command runs in. Each
// operation loads fresh metadata from the working copy and the repository and
// keeps nothing between calls.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::{BranchError, BranchResult};
use super::resolver::ParentWorkingCopy;
use super::topology;
use crate::models::path::local_relative;
use crate::models::{
    BranchMetadata, Project, ProjectLayout, RepoPath, Revision, MARKER_FILE,
};
use crate::vcs::{Backend, CommitOp, EntryState, NodeKind, StatusEntry, VcsError};

/// A working copy (or nested subbranch) bound to one branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkingCopy {
    /// Directory holding the branch's marker file
    pub local_root: PathBuf,
    /// Revision the root directory is checked out at
    pub revision: Revision,
    pub metadata: BranchMetadata,
    pub project: Project,
}

impl WorkingCopy {
    pub fn marker(&self) -> PathBuf {
        self.local_root.join(MARKER_FILE)
    }
}

pub struct BranchManager<'a> {
    backend: &'a dyn Backend,
    cwd: PathBuf,
    tool_version: String,
}

impl<'a> BranchManager<'a> {
    pub fn new(backend: &'a dyn Backend, cwd: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            cwd: cwd.into(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Override the version compared against version-gated policies
    pub fn with_tool_version(mut self, version: impl Into<String>) -> Self {
        self.tool_version = version.into();
        self
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn tool_version(&self) -> &str {
        &self.tool_version
    }

    /// The working copy the command runs in
    pub fn current(&self) -> BranchResult<WorkingCopy> {
        self.locate(&self.cwd)
    }

    /// Nearest branch root at or above `dir`, with its project
    pub fn locate(&self, dir: &Path) -> BranchResult<WorkingCopy> {
        let (local_root, revision, metadata) = self.find_branch_root(dir)?.ok_or_else(|| {
            BranchError::LocalState(format!(
                "{} is not inside a branchwork working copy",
                dir.display()
            ))
        })?;
        let project = self.find_project(&metadata.branch_path)?;
        Ok(WorkingCopy {
            local_root,
            revision,
            metadata,
            project,
        })
    }

    /// Walk up from `dir` through versioned directories to the first one with a
    /// marker. The marker's branch path must match where the directory points.
    pub(crate) fn find_branch_root(
        &self,
        dir: &Path,
    ) -> BranchResult<Option<(PathBuf, Revision, BranchMetadata)>> {
        for candidate in dir.ancestors() {
            let Some(info) = self.backend.wc_info(candidate)? else {
                break;
            };
            let Some(props) = self.backend.wc_properties(&candidate.join(MARKER_FILE))? else {
                continue;
            };
            let metadata = BranchMetadata::from_properties(&props)?;
            if info.repo_path != metadata.branch_path {
                return Err(BranchError::LocalState(format!(
                    "{} points at {} but its marker describes {}; the working copy was left \
                     mid-operation, switch it back or revert {}",
                    candidate.display(),
                    info.repo_path,
                    metadata.branch_path,
                    candidate.join(MARKER_FILE).display()
                )));
            }
            debug!(
                "Located {} {} at {}",
                metadata.branch_type,
                metadata.branch_path,
                candidate.display()
            );
            return Ok(Some((candidate.to_path_buf(), info.revision, metadata)));
        }
        Ok(None)
    }

    /// Working copy enclosing `root`, for subbranch realignment
    pub(crate) fn parent_working_copy(&self, root: &Path) -> BranchResult<Option<ParentWorkingCopy>> {
        let Some(parent) = root.parent() else {
            return Ok(None);
        };
        Ok(self
            .find_branch_root(parent)?
            .map(|(local_root, _, metadata)| ParentWorkingCopy {
                local_root,
                branch_path: metadata.branch_path,
            }))
    }

    /// Outermost versioned directory at or above `dir`
    pub(crate) fn outermost_root(&self, dir: &Path) -> BranchResult<Option<PathBuf>> {
        let mut outermost = None;
        for candidate in dir.ancestors() {
            if self.backend.wc_info(candidate)?.is_none() {
                break;
            }
            outermost = Some(candidate.to_path_buf());
        }
        Ok(outermost)
    }

    /// First ancestor of `branch_path` carrying a project layout
    pub fn find_project(&self, branch_path: &RepoPath) -> BranchResult<Project> {
        for candidate in branch_path.ancestors() {
            let props = match self.backend.get_properties(&candidate, None) {
                Ok(props) => props,
                Err(VcsError::PathNotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            if let Some(layout) = ProjectLayout::from_properties(&props)? {
                return Ok(Project::new(candidate, layout));
            }
        }
        Err(BranchError::NotFound(format!(
            "no project root above {branch_path}; run `bw init` first"
        )))
    }

    /// Metadata stored on a branch's marker in the repository; `None` when the
    /// branch does not exist
    pub fn branch_metadata(&self, branch_path: &RepoPath) -> BranchResult<Option<BranchMetadata>> {
        match self.backend.get_properties(&branch_path.join(MARKER_FILE), None) {
            Ok(props) => Ok(Some(BranchMetadata::from_properties(&props)?)),
            Err(VcsError::PathNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve a command-line branch name: trunk, then user branch, then release branch
    pub fn resolve_name(&self, project: &Project, name: &str) -> BranchResult<BranchMetadata> {
        let mut candidates = Vec::with_capacity(3);
        if name == project.trunk_name() {
            candidates.push(topology::trunk_path(project));
        }
        candidates.push(topology::user_branch_path(project, name));
        candidates.push(topology::release_branch_path(project, name));

        for path in candidates {
            if self.backend.check_path(&path, None)? != NodeKind::Directory {
                continue;
            }
            if let Some(metadata) = self.branch_metadata(&path)? {
                return Ok(metadata);
            }
        }
        Err(BranchError::NotFound(format!(
            "no branch named '{}' in project {}",
            name, project.root
        )))
    }

    /// Fail on uncommitted changes, or on switched subdirectories below `local`
    pub(crate) fn ensure_clean(&self, local: &Path) -> BranchResult<()> {
        let status = self.backend.status(local)?;
        let changed: Vec<&StatusEntry> = status.iter().filter(|e| e.is_local_change()).collect();
        if !changed.is_empty() {
            return Err(BranchError::LocalState(format!(
                "uncommitted changes in {}: {}",
                local.display(),
                describe(&changed)
            )));
        }
        let switched: Vec<&StatusEntry> = status
            .iter()
            .filter(|e| e.switched && e.path != local)
            .collect();
        if !switched.is_empty() {
            return Err(BranchError::LocalState(format!(
                "switched subdirectories below {}: {}; use setbranch on them first",
                local.display(),
                describe(&switched)
            )));
        }
        Ok(())
    }

    /// A switch target must be a versioned directory in a sane local state
    pub(crate) fn ensure_switchable(&self, local: &Path) -> BranchResult<()> {
        match self.backend.wc_info(local)? {
            Some(info) if info.kind == NodeKind::Directory => {}
            Some(_) => {
                return Err(BranchError::IllegalTarget(format!(
                    "{} is not a directory",
                    local.display()
                )))
            }
            None => {
                return Err(BranchError::IllegalTarget(format!(
                    "{} does not exist or is not under version control",
                    local.display()
                )))
            }
        }
        let status = self.backend.status(local)?;
        if let Some(entry) = status.iter().find(|e| e.path == local) {
            if !matches!(entry.state, EntryState::Normal | EntryState::Modified) {
                return Err(BranchError::IllegalTarget(format!(
                    "{} is {:?}; it must be normal or modified to switch",
                    local.display(),
                    entry.state
                )));
            }
        }
        Ok(())
    }

    /// `MakeDir` ops for every missing directory from the root down to `path`,
    /// skipping those already planned in this commit
    pub(crate) fn missing_dirs(
        &self,
        path: &RepoPath,
        planned: &mut Vec<RepoPath>,
    ) -> BranchResult<Vec<CommitOp>> {
        let mut ops = Vec::new();
        for dir in path.ancestors().into_iter().rev() {
            if planned.contains(&dir) {
                continue;
            }
            if self.backend.check_path(&dir, None)? == NodeKind::None {
                planned.push(dir.clone());
                ops.push(CommitOp::MakeDir(dir));
            }
        }
        Ok(ops)
    }

    /// Subpath of the command's directory below a working-copy root
    pub(crate) fn cwd_relative_to(&self, root: &Path) -> String {
        local_relative(&self.cwd, root).unwrap_or_default()
    }
}

fn describe(entries: &[&StatusEntry]) -> String {
    const SHOWN: usize = 5;
    let mut names: Vec<String> = entries
        .iter()
        .take(SHOWN)
        .map(|e| e.path.display().to_string())
        .collect();
    if entries.len() > SHOWN {
        names.push(format!("and {} more", entries.len() - SHOWN));
    }
    names.join(", ")
}
