// ABOUTME: Typed branch metadata parsed from (and written to) the marker file's properties
//
// This is the only place where raw `bw:*` property maps are interpreted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use super::path::{normalize_subpath, RepoPath};
use super::policy::Policy;

/// Raw property map as returned by the backend
pub type Properties = BTreeMap<String, String>;

/// File at each branch root that carries the branch's metadata properties
pub const MARKER_FILE: &str = ".branchwork";

pub const PROP_BRANCH_TYPE: &str = "bw:branch-type";
pub const PROP_BRANCH_PATH: &str = "bw:branch-path";
pub const PROP_SOURCE_ROOT: &str = "bw:source-root";
pub const PROP_SOURCE_SUBPATH: &str = "bw:source-subpath";
pub const PROP_BRANCH_POINT: &str = "bw:branch-point-revision";
pub const PROP_LAST_MERGE: &str = "bw:last-merge-revision";
pub const PROP_CODE_FROZEN: &str = "bw:code-frozen";
pub const PROP_POLICY: &str = "bw:policy";

/// Properties that legitimately differ per branch; merge conflicts confined to
/// these are resolved in favor of the local copy.
pub const IDENTITY_PROPERTIES: &[&str] = &[
    PROP_BRANCH_TYPE,
    PROP_BRANCH_PATH,
    PROP_SOURCE_ROOT,
    PROP_SOURCE_SUBPATH,
    PROP_BRANCH_POINT,
    PROP_LAST_MERGE,
    PROP_CODE_FROZEN,
];

/// Backend revision number
pub type Revision = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Marker property {0} is missing")]
    Missing(&'static str),
    #[error("Marker property {name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
    #[error("Inconsistent branch metadata: {0}")]
    Inconsistent(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BranchType {
    Trunk,
    #[serde(rename = "release")]
    ReleaseBranch,
    #[serde(rename = "user")]
    UserBranch,
}

impl BranchType {
    pub const fn as_property(self) -> &'static str {
        match self {
            Self::Trunk => "trunk",
            Self::ReleaseBranch => "release",
            Self::UserBranch => "user",
        }
    }

    fn from_property(value: &str) -> Result<Self, MetadataError> {
        match value.trim() {
            "trunk" => Ok(Self::Trunk),
            "release" => Ok(Self::ReleaseBranch),
            "user" => Ok(Self::UserBranch),
            other => Err(MetadataError::Invalid {
                name: PROP_BRANCH_TYPE,
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for BranchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Trunk => "trunk",
            Self::ReleaseBranch => "release branch",
            Self::UserBranch => "user branch",
        };
        f.write_str(label)
    }
}

/// Where a non-trunk branch came from and how far it has been synchronized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Full repository path of the branch this one derives from
    pub root: RepoPath,
    /// Subdirectory of `root` this branch is rooted at; empty for a full-tree branch
    pub subpath: String,
    pub branch_point_revision: Revision,
    pub last_merge_revision: Revision,
}

impl SourceRef {
    /// Repository path that was actually copied (`root/subpath`)
    pub fn path(&self) -> RepoPath {
        self.root.join(&self.subpath)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchMetadata {
    pub branch_type: BranchType,
    pub branch_path: RepoPath,
    /// `None` exactly when `branch_type` is `Trunk`
    pub source: Option<SourceRef>,
    pub code_frozen: bool,
    pub policy: Policy,
}

impl BranchMetadata {
    pub fn trunk(branch_path: RepoPath) -> Self {
        Self {
            branch_type: BranchType::Trunk,
            branch_path,
            source: None,
            code_frozen: false,
            policy: Policy::Default,
        }
    }

    /// Branch name (last component of the branch path)
    pub fn name(&self) -> &str {
        self.branch_path.file_name().unwrap_or("")
    }

    /// Subdirectory of the source this branch is rooted at (empty for trunk)
    pub fn source_subpath(&self) -> &str {
        self.source.as_ref().map_or("", |s| s.subpath.as_str())
    }

    pub fn last_merge_revision(&self) -> Option<Revision> {
        self.source.as_ref().map(|s| s.last_merge_revision)
    }

    pub fn is_subbranch(&self) -> bool {
        !self.source_subpath().is_empty()
    }

    pub fn from_properties(props: &Properties) -> Result<Self, MetadataError> {
        let branch_type = BranchType::from_property(required(props, PROP_BRANCH_TYPE)?)?;
        let branch_path = RepoPath::new(required(props, PROP_BRANCH_PATH)?);

        let code_frozen = match props.get(PROP_CODE_FROZEN).map(|v| v.trim()) {
            None | Some("" | "false") => false,
            Some("true") => true,
            Some(other) => {
                return Err(MetadataError::Invalid {
                    name: PROP_CODE_FROZEN,
                    value: other.to_string(),
                })
            }
        };

        let policy = match props.get(PROP_POLICY) {
            None => Policy::Default,
            Some(raw) if raw.trim().is_empty() => Policy::Default,
            Some(raw) => serde_json::from_str(raw).map_err(|_| MetadataError::Invalid {
                name: PROP_POLICY,
                value: raw.clone(),
            })?,
        };

        let source = match branch_type {
            BranchType::Trunk => {
                if props.contains_key(PROP_SOURCE_ROOT) || props.contains_key(PROP_BRANCH_POINT) {
                    return Err(MetadataError::Inconsistent(format!(
                        "trunk {branch_path} records a source branch"
                    )));
                }
                None
            }
            BranchType::ReleaseBranch | BranchType::UserBranch => {
                let root = RepoPath::new(required(props, PROP_SOURCE_ROOT)?);
                let subpath =
                    normalize_subpath(props.get(PROP_SOURCE_SUBPATH).map_or("", String::as_str));
                let branch_point_revision = revision(props, PROP_BRANCH_POINT)?;
                let last_merge_revision = revision(props, PROP_LAST_MERGE)?;
                if last_merge_revision < branch_point_revision {
                    return Err(MetadataError::Inconsistent(format!(
                        "last merge revision {last_merge_revision} precedes branch point {branch_point_revision}"
                    )));
                }
                if branch_path.starts_with(&root) {
                    return Err(MetadataError::Inconsistent(format!(
                        "{branch_path} lies inside its own source {root}"
                    )));
                }
                Some(SourceRef {
                    root,
                    subpath,
                    branch_point_revision,
                    last_merge_revision,
                })
            }
        };

        Ok(Self {
            branch_type,
            branch_path,
            source,
            code_frozen,
            policy,
        })
    }

    /// Full property set for this branch; every key is always written so a copied
    /// marker never keeps stale values from its source.
    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert(
            PROP_BRANCH_TYPE.to_string(),
            self.branch_type.as_property().to_string(),
        );
        props.insert(PROP_BRANCH_PATH.to_string(), self.branch_path.to_string());
        if let Some(source) = &self.source {
            props.insert(PROP_SOURCE_ROOT.to_string(), source.root.to_string());
            props.insert(PROP_SOURCE_SUBPATH.to_string(), source.subpath.clone());
            props.insert(
                PROP_BRANCH_POINT.to_string(),
                source.branch_point_revision.to_string(),
            );
            props.insert(
                PROP_LAST_MERGE.to_string(),
                source.last_merge_revision.to_string(),
            );
        }
        props.insert(PROP_CODE_FROZEN.to_string(), self.code_frozen.to_string());
        // Policy serialization cannot fail: plain strings and enums only
        let policy = serde_json::to_string(&self.policy).unwrap_or_default();
        props.insert(PROP_POLICY.to_string(), policy);
        props
    }
}

fn required<'a>(props: &'a Properties, name: &'static str) -> Result<&'a str, MetadataError> {
    props
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or(MetadataError::Missing(name))
}

fn revision(props: &Properties, name: &'static str) -> Result<Revision, MetadataError> {
    let raw = required(props, name)?;
    raw.trim().parse().map_err(|_| MetadataError::Invalid {
        name,
        value: raw.to_string(),
    })
}
