// ABOUTME: Version-control backend contract consumed by the branch lifecycle
//
// The lifecycle never touches repository or working-copy state except through
// this trait. Implementations:
// - svn: shells out to the `svn` and `svnmucc` command-line clients
// - memory: in-process revisioned tree with working copies (tests, dry runs)

pub mod memory;
pub mod parse;
pub mod svn;

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{Properties, RepoPath, Revision};

pub use memory::MemoryBackend;
pub use svn::SvnBackend;

#[derive(Error, Debug)]
pub enum VcsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("Required tool not found on PATH: {0}")]
    ToolMissing(String),
    #[error("Unexpected output from backend: {0}")]
    UnexpectedOutput(String),
    #[error("Path not found in repository: {0}")]
    PathNotFound(String),
    #[error("Not a working copy: {0}")]
    NotWorkingCopy(PathBuf),
    #[error("Out of date: {0} changed in the repository since it was checked out")]
    OutOfDate(String),
    #[error("Cannot commit {0}: it remains in conflict")]
    Conflicted(PathBuf),
    #[error("Invalid operation: {0}")]
    Invalid(String),
    #[error("Invalid repository URL: {0}")]
    Url(#[from] url::ParseError),
}

/// What a repository path refers to at a revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    None,
    File,
    Directory,
}

/// Local state of one working-copy entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Normal,
    Modified,
    Added,
    Deleted,
    Missing,
    Replaced,
    Conflicted,
    Unversioned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub path: PathBuf,
    pub state: EntryState,
    /// Property-only modification (content unchanged)
    pub props_modified: bool,
    /// Entry points at a repository path other than its parent's path + name
    pub switched: bool,
}

impl StatusEntry {
    /// Anything that would be committed or that blocks a clean switch
    pub fn is_local_change(&self) -> bool {
        !matches!(self.state, EntryState::Normal | EntryState::Unversioned) || self.props_modified
    }
}

/// Repository binding of a local working-copy directory or file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WcInfo {
    pub path: PathBuf,
    pub repo_path: RepoPath,
    pub revision: Revision,
    pub kind: NodeKind,
}

/// One step of an atomic server-side commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOp {
    MakeDir(RepoPath),
    Copy {
        from: RepoPath,
        revision: Revision,
        to: RepoPath,
    },
    PutFile {
        path: RepoPath,
        contents: String,
    },
    SetProperty {
        path: RepoPath,
        name: String,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConflictKind {
    Text,
    /// Names of the conflicting properties
    Property(Vec<String>),
    Tree,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub path: PathBuf,
    pub kind: ConflictKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub merged: Vec<PathBuf>,
    /// Changed at the source but deleted or missing locally
    pub skipped: Vec<PathBuf>,
    pub conflicts: Vec<Conflict>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Keep the local (working) version
    Working,
    /// Take the incoming version
    Incoming,
}

/// Backend collaborator. All calls are blocking and issued sequentially.
#[cfg_attr(test, mockall::automock)]
pub trait Backend {
    fn check_path(&self, path: &RepoPath, revision: Option<Revision>) -> Result<NodeKind, VcsError>;

    fn latest_revision(&self) -> Result<Revision, VcsError>;

    /// Last revision at or before `revision` that changed `path` or anything below it
    fn last_changed_revision(
        &self,
        path: &RepoPath,
        revision: Option<Revision>,
    ) -> Result<Revision, VcsError>;

    fn get_properties(
        &self,
        path: &RepoPath,
        revision: Option<Revision>,
    ) -> Result<Properties, VcsError>;

    /// Immediate children of a directory as (name, kind)
    fn list(&self, path: &RepoPath) -> Result<Vec<(String, NodeKind)>, VcsError>;

    /// Apply all operations in one atomic commit
    fn commit_ops(&self, ops: &[CommitOp], message: &str) -> Result<Revision, VcsError>;

    /// `None` when `local` is not under version control
    fn wc_info(&self, local: &Path) -> Result<Option<WcInfo>, VcsError>;

    /// Working (locally edited) properties; `None` when `local` is unversioned
    fn wc_properties(&self, local: &Path) -> Result<Option<Properties>, VcsError>;

    fn set_wc_property(&self, local: &Path, name: &str, value: &str) -> Result<(), VcsError>;

    fn switch(
        &self,
        local: &Path,
        target: &RepoPath,
        revision: Option<Revision>,
    ) -> Result<Revision, VcsError>;

    fn update(&self, local: &Path) -> Result<Revision, VcsError>;

    /// Apply the difference between `left@left_rev` and `right@right_rev` to the
    /// working copy at `local`. With `left == right` this merges the revision
    /// range `(left_rev, right_rev]` of one path.
    fn merge(
        &self,
        left: &RepoPath,
        left_rev: Revision,
        right: &RepoPath,
        right_rev: Revision,
        local: &Path,
    ) -> Result<MergeOutcome, VcsError>;

    /// Entries at or below `local` that are not plain unmodified, or are switched
    fn status(&self, local: &Path) -> Result<Vec<StatusEntry>, VcsError>;

    fn resolve(&self, local: &Path, resolution: Resolution) -> Result<(), VcsError>;

    /// `None` when there was nothing to commit
    fn commit(&self, paths: &[PathBuf], message: &str) -> Result<Option<Revision>, VcsError>;

    fn delete(&self, paths: &[RepoPath], message: &str) -> Result<Revision, VcsError>;

    /// Undo local edits to one path; with `remove_added` a scheduled addition is
    /// also removed from disk
    fn revert(&self, local: &Path, remove_added: bool) -> Result<(), VcsError>;
}
