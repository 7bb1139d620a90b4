// ABOUTME: Data models for branch metadata, project layout, commit policy and repository paths

pub mod metadata;
pub mod path;
pub mod policy;
pub mod project;

pub use metadata::{
    BranchMetadata, BranchType, MetadataError, Properties, Revision, SourceRef, MARKER_FILE,
};
pub use path::RepoPath;
pub use policy::{MessageRule, Policy};
pub use project::{Project, ProjectLayout};
