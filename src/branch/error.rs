// ABOUTME: Error taxonomy for branch lifecycle operations and the exit codes they map to

use serde::Serialize;
use thiserror::Error;

use crate::models::MetadataError;
use crate::vcs::VcsError;

#[derive(Error, Debug)]
pub enum BranchError {
    /// Topology or path-legality violation: wrong root, outside the working copy,
    /// subdirectory misalignment
    #[error("Illegal target: {0}")]
    IllegalTarget(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Uncommitted changes, switched descendants, out-of-date or replaced files
    #[error("{0}")]
    LocalState(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("Backend error: {0}")]
    Backend(#[from] VcsError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Commit message rejected for {branch}: '{message}' must start with {expected}")]
    MessageRejected {
        branch: String,
        message: String,
        expected: String,
    },

    #[error("{branch} requires branchwork {minimum} or newer (running {current})")]
    VersionMismatch {
        branch: String,
        current: String,
        minimum: String,
    },

    #[error("{branch} is code-frozen; include \"[freeze override]\" in the message to promote anyway")]
    CodeFrozen { branch: String },

    #[error("{0} requires --admin")]
    AdminRequired(String),
}

/// Coarse classification used for exit codes and JSON error output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    IllegalTarget,
    NotFound,
    LocalState,
    PolicyViolation,
    Metadata,
    Backend,
}

impl ErrorKind {
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::IllegalTarget => 2,
            Self::NotFound => 3,
            Self::LocalState => 4,
            Self::PolicyViolation => 5,
            Self::Backend => 6,
            Self::Metadata => 7,
        }
    }
}

impl BranchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IllegalTarget(_) => ErrorKind::IllegalTarget,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::LocalState(_) => ErrorKind::LocalState,
            Self::Policy(_) => ErrorKind::PolicyViolation,
            Self::Metadata(_) => ErrorKind::Metadata,
            Self::Backend(_) => ErrorKind::Backend,
        }
    }
}

pub type BranchResult<T> = Result<T, BranchError>;
