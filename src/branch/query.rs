// ABOUTME: Project bootstrap, branch listing, working-copy info, code freeze and
// message validation

use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use super::error::{BranchError, BranchResult};
use super::manager::BranchManager;
use super::topology;
use crate::commit_policy::{admin_message, validate_commit};
use crate::models::metadata::PROP_CODE_FROZEN;
use crate::models::{
    BranchMetadata, BranchType, Project, ProjectLayout, RepoPath, Revision, MARKER_FILE,
};
use crate::vcs::{CommitOp, NodeKind, VcsError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitOutcome {
    pub project: Project,
    pub trunk: RepoPath,
    pub revision: Revision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubbranchInfo {
    pub local_dir: PathBuf,
    pub branch: BranchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchInfo {
    pub local_root: PathBuf,
    pub revision: Revision,
    pub branch: BranchMetadata,
    pub tree_root: RepoPath,
    pub project: Project,
    /// Switched directories below the root that carry their own marker
    pub subbranches: Vec<SubbranchInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchListing {
    pub project: Project,
    pub trunk: RepoPath,
    pub release_branches: Vec<String>,
    pub user_branches: Vec<String>,
}

impl BranchManager<'_> {
    /// Lay out a new project under `root` in one commit
    pub fn init_project(&self, root: &RepoPath, layout: &ProjectLayout) -> BranchResult<InitOutcome> {
        match self.backend().get_properties(root, None) {
            Ok(props) => {
                if ProjectLayout::from_properties(&props)?.is_some() {
                    return Err(BranchError::IllegalTarget(format!(
                        "{root} is already a project root"
                    )));
                }
            }
            Err(VcsError::PathNotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let project = Project::new(root.clone(), layout.clone());
        let trunk = topology::trunk_path(&project);
        let release = topology::release_branches_container(&project);
        let user = topology::user_branches_container(&project);
        if layout.trunk_path.is_empty()
            || release.starts_with(&trunk)
            || user.starts_with(&trunk)
            || trunk.starts_with(&release)
            || trunk.starts_with(&user)
        {
            return Err(BranchError::IllegalTarget(format!(
                "trunk {trunk} must be separate from the branch containers {release} and {user}"
            )));
        }
        if self.backend().check_path(&trunk, None)? != NodeKind::None {
            return Err(BranchError::IllegalTarget(format!("{trunk} already exists")));
        }

        let mut planned = Vec::new();
        let mut ops = self.missing_dirs(root, &mut planned)?;
        for (name, value) in layout.to_properties() {
            ops.push(CommitOp::SetProperty {
                path: root.clone(),
                name,
                value,
            });
        }
        ops.extend(self.missing_dirs(&trunk, &mut planned)?);
        let marker = trunk.join(MARKER_FILE);
        ops.push(CommitOp::PutFile {
            path: marker.clone(),
            contents: String::new(),
        });
        for (name, value) in BranchMetadata::trunk(trunk.clone()).to_properties() {
            ops.push(CommitOp::SetProperty {
                path: marker.clone(),
                name,
                value,
            });
        }
        ops.extend(self.missing_dirs(&release, &mut planned)?);
        ops.extend(self.missing_dirs(&user, &mut planned)?);

        let revision = self
            .backend()
            .commit_ops(&ops, &admin_message(&format!("initialize project {root}")))?;
        info!("Initialized project {} (trunk {}) in r{}", root, trunk, revision);
        Ok(InitOutcome {
            project,
            trunk,
            revision,
        })
    }

    pub fn info(&self) -> BranchResult<BranchInfo> {
        let wc = self.current()?;
        let mut subbranches = Vec::new();
        for entry in self.backend().status(&wc.local_root)? {
            if !entry.switched {
                continue;
            }
            let Some(props) = self.backend().wc_properties(&entry.path.join(MARKER_FILE))? else {
                continue;
            };
            subbranches.push(SubbranchInfo {
                local_dir: entry.path,
                branch: BranchMetadata::from_properties(&props)?,
            });
        }
        Ok(BranchInfo {
            tree_root: topology::tree_root(&wc.metadata).clone(),
            local_root: wc.local_root,
            revision: wc.revision,
            branch: wc.metadata,
            project: wc.project,
            subbranches,
        })
    }

    pub fn list_branches(&self) -> BranchResult<BranchListing> {
        let wc = self.current()?;
        let project = wc.project;
        let user_container = topology::user_branches_container(&project);
        let release_branches = self.list_dirs(
            &topology::release_branches_container(&project),
            Some(&user_container),
        )?;
        let user_branches = self.list_dirs(&user_container, None)?;
        Ok(BranchListing {
            trunk: topology::trunk_path(&project),
            project,
            release_branches,
            user_branches,
        })
    }

    /// Directory names in `container`, leaving out the one holding `exclude`
    fn list_dirs(&self, container: &RepoPath, exclude: Option<&RepoPath>) -> BranchResult<Vec<String>> {
        let entries = match self.backend().list(container) {
            Ok(entries) => entries,
            Err(VcsError::PathNotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|(_, kind)| *kind == NodeKind::Directory)
            .map(|(name, _)| name)
            .filter(|name| exclude.map_or(true, |ex| !ex.starts_with(&container.join(name))))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Toggle the code freeze on trunk or a release branch; `None` when it was
    /// already in the requested state
    pub fn set_code_freeze(&self, name: &str, frozen: bool) -> BranchResult<Option<Revision>> {
        let wc = self.current()?;
        let branch = self.resolve_name(&wc.project, name)?;
        if branch.branch_type == BranchType::UserBranch {
            return Err(BranchError::IllegalTarget(format!(
                "code freeze applies to trunk and release branches; {} is a {}",
                branch.branch_path, branch.branch_type
            )));
        }
        if branch.code_frozen == frozen {
            return Ok(None);
        }
        let action = if frozen { "freeze" } else { "unfreeze" };
        let revision = self.backend().commit_ops(
            &[CommitOp::SetProperty {
                path: branch.branch_path.join(MARKER_FILE),
                name: PROP_CODE_FROZEN.to_string(),
                value: frozen.to_string(),
            }],
            &admin_message(&format!("{action} {}", branch.branch_path)),
        )?;
        info!("{} {} in r{}", action, branch.branch_path, revision);
        Ok(Some(revision))
    }

    /// Run the current branch's commit policy against `message`
    pub fn validate_message(&self, message: &str) -> BranchResult<BranchMetadata> {
        let wc = self.current()?;
        validate_commit(&wc.metadata, message, self.tool_version())?;
        Ok(wc.metadata)
    }
}
