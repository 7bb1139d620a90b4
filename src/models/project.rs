// ABOUTME: Project layout - the four paths fixed at project bootstrap
//
// Stored as properties on the project root directory in the repository.

use serde::{Deserialize, Serialize};

use super::metadata::{MetadataError, Properties};
use super::path::{normalize_subpath, RepoPath};

pub const PROP_TRUNK_PATH: &str = "bw:trunk-path";
pub const PROP_RELEASE_PATH: &str = "bw:release-branches-path";
pub const PROP_USER_PATH: &str = "bw:user-branches-path";

pub const DEFAULT_TRUNK_PATH: &str = "trunk";
pub const DEFAULT_RELEASE_PATH: &str = "branches";
pub const DEFAULT_USER_PATH: &str = "branches/user";

/// Sub-paths relative to a project root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLayout {
    pub trunk_path: String,
    pub release_branches_path: String,
    pub user_branches_path: String,
}

impl Default for ProjectLayout {
    fn default() -> Self {
        Self {
            trunk_path: DEFAULT_TRUNK_PATH.to_string(),
            release_branches_path: DEFAULT_RELEASE_PATH.to_string(),
            user_branches_path: DEFAULT_USER_PATH.to_string(),
        }
    }
}

impl ProjectLayout {
    pub fn new(trunk: &str, release: &str, user: &str) -> Self {
        Self {
            trunk_path: normalize_subpath(trunk),
            release_branches_path: normalize_subpath(release),
            user_branches_path: normalize_subpath(user),
        }
    }

    /// `None` when the directory is not a project root
    pub fn from_properties(props: &Properties) -> Result<Option<Self>, MetadataError> {
        let Some(trunk) = props.get(PROP_TRUNK_PATH) else {
            return Ok(None);
        };
        let release = props
            .get(PROP_RELEASE_PATH)
            .ok_or(MetadataError::Missing(PROP_RELEASE_PATH))?;
        let user = props
            .get(PROP_USER_PATH)
            .ok_or(MetadataError::Missing(PROP_USER_PATH))?;
        let layout = Self::new(trunk, release, user);
        if layout.trunk_path.is_empty() {
            return Err(MetadataError::Invalid {
                name: PROP_TRUNK_PATH,
                value: trunk.clone(),
            });
        }
        Ok(Some(layout))
    }

    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert(PROP_TRUNK_PATH.to_string(), self.trunk_path.clone());
        props.insert(
            PROP_RELEASE_PATH.to_string(),
            self.release_branches_path.clone(),
        );
        props.insert(PROP_USER_PATH.to_string(), self.user_branches_path.clone());
        props
    }
}

/// A project root together with its layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub root: RepoPath,
    pub layout: ProjectLayout,
}

impl Project {
    pub fn new(root: RepoPath, layout: ProjectLayout) -> Self {
        Self { root, layout }
    }

    /// Name under which trunk is addressed on the command line
    pub fn trunk_name(&self) -> &str {
        self.layout
            .trunk_path
            .rsplit('/')
            .next()
            .unwrap_or(DEFAULT_TRUNK_PATH)
    }
}
