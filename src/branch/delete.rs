// ABOUTME: DeleteBranch - remove a branch nobody's working copy points at

use serde::Serialize;
use tracing::info;

use super::error::{BranchError, BranchResult, PolicyError};
use super::manager::BranchManager;
use super::topology;
use crate::commit_policy::admin_message;
use crate::models::{BranchType, RepoPath, Revision};
use crate::vcs::NodeKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub branch: RepoPath,
    pub revision: Revision,
}

impl BranchManager<'_> {
    /// Delete user branch `name`, or release branch `name` (which needs `admin`)
    pub fn delete_branch(
        &self,
        name: &str,
        user_branch: bool,
        admin: bool,
    ) -> BranchResult<DeleteOutcome> {
        let wc = self.current()?;
        let project = &wc.project;
        topology::validate_branch_name(project, name)?;

        let path = if user_branch {
            topology::user_branch_path(project, name)
        } else {
            topology::release_branch_path(project, name)
        };
        if self.backend().check_path(&path, None)? == NodeKind::None {
            return Err(BranchError::NotFound(format!("{path} does not exist")));
        }
        let expected = if user_branch {
            BranchType::UserBranch
        } else {
            BranchType::ReleaseBranch
        };
        match self.branch_metadata(&path)? {
            Some(meta) if meta.branch_type == expected => {}
            _ => {
                return Err(BranchError::NotFound(format!(
                    "{path} is not a {expected}"
                )))
            }
        }
        if !user_branch && !admin {
            return Err(PolicyError::AdminRequired(format!("deleting release branch {path}")).into());
        }

        self.ensure_not_in_use(&path)?;

        let revision = self
            .backend()
            .delete(&[path.clone()], &admin_message(&format!("delete {path}")))?;
        info!("Deleted {} in r{}", path, revision);
        Ok(DeleteOutcome {
            branch: path,
            revision,
        })
    }

    /// Reject when the working copy, or any switched directory inside it, points
    /// into `path`
    fn ensure_not_in_use(&self, path: &RepoPath) -> BranchResult<()> {
        let Some(outermost) = self.outermost_root(self.cwd())? else {
            return Ok(());
        };
        let mut bound = Vec::new();
        if let Some(info) = self.backend().wc_info(&outermost)? {
            bound.push((outermost.clone(), info.repo_path));
        }
        for entry in self.backend().status(&outermost)? {
            if !entry.switched {
                continue;
            }
            if let Some(info) = self.backend().wc_info(&entry.path)? {
                bound.push((entry.path, info.repo_path));
            }
        }
        if let Some((local, _)) = bound.iter().find(|(_, repo)| repo.starts_with(path)) {
            return Err(BranchError::LocalState(format!(
                "{} is switched to {}; use setbranch first",
                local.display(),
                path
            )));
        }
        Ok(())
    }
}
