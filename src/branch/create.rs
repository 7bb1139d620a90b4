// ABOUTME: CreateBranch - one atomic copy-and-describe commit, then switch onto the new branch

use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use super::error::{BranchError, BranchResult};
use super::manager::BranchManager;
use super::topology;
use crate::commit_policy::admin_message;
use crate::models::path::{join_subpath, local_join};
use crate::models::{
    BranchMetadata, BranchType, Policy, Revision, SourceRef, MARKER_FILE,
};
use crate::vcs::{CommitOp, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOutcome {
    pub metadata: BranchMetadata,
    /// Local directory now switched to the new branch
    pub local_dir: PathBuf,
    /// Revision of the creating commit
    pub revision: Revision,
}

impl BranchManager<'_> {
    /// Create a release branch (`user_branch == false`) or user branch named `name`
    /// from the current tree root. A user branch created from a subdirectory of the
    /// working copy becomes a subbranch rooted there.
    pub fn create_branch(
        &self,
        name: &str,
        user_branch: bool,
        force: bool,
    ) -> BranchResult<CreateOutcome> {
        let wc = self.current()?;
        let project = &wc.project;
        topology::validate_branch_name(project, name)?;

        let (branch_type, target) = if user_branch {
            (BranchType::UserBranch, topology::user_branch_path(project, name))
        } else {
            (BranchType::ReleaseBranch, topology::release_branch_path(project, name))
        };

        let relative = self.cwd_relative_to(&wc.local_root);
        let subpath = join_subpath(wc.metadata.source_subpath(), &relative);
        let local_dir = local_join(&wc.local_root, &relative);

        if branch_type == BranchType::ReleaseBranch
            && (wc.metadata.branch_type != BranchType::Trunk || !subpath.is_empty())
        {
            return Err(BranchError::IllegalTarget(format!(
                "release branches are created from the top of trunk; {} is a {} at '{}'",
                wc.metadata.branch_path, wc.metadata.branch_type, subpath
            )));
        }

        if self.backend().check_path(&target, None)? != NodeKind::None {
            return Err(BranchError::IllegalTarget(format!("{target} already exists")));
        }
        if user_branch {
            let release = topology::release_branch_path(project, name);
            if self.backend().check_path(&release, None)? != NodeKind::None {
                return Err(BranchError::IllegalTarget(format!(
                    "a release branch named '{name}' already exists at {release}"
                )));
            }
        }

        if !(force && user_branch) {
            self.ensure_clean(&local_dir)?;
        }

        let tree_root = topology::tree_root(&wc.metadata).clone();
        let copy_from = tree_root.join(&subpath);
        let latest = self.backend().latest_revision()?;
        if self.backend().check_path(&copy_from, Some(latest))? != NodeKind::Directory {
            return Err(BranchError::NotFound(format!(
                "{copy_from}@{latest} is not a directory"
            )));
        }

        let policy = if user_branch {
            Policy::Default
        } else {
            wc.metadata.policy.clone()
        };
        let metadata = BranchMetadata {
            branch_type,
            branch_path: target.clone(),
            source: Some(SourceRef {
                root: tree_root,
                subpath,
                branch_point_revision: latest,
                last_merge_revision: latest,
            }),
            code_frozen: false,
            policy,
        };

        let mut planned = Vec::new();
        let mut ops = match target.parent() {
            Some(parent) => self.missing_dirs(&parent, &mut planned)?,
            None => Vec::new(),
        };
        ops.push(CommitOp::Copy {
            from: copy_from.clone(),
            revision: latest,
            to: target.clone(),
        });
        let marker = target.join(MARKER_FILE);
        let copied_marker = copy_from.join(MARKER_FILE);
        if self.backend().check_path(&copied_marker, Some(latest))? != NodeKind::File {
            ops.push(CommitOp::PutFile {
                path: marker.clone(),
                contents: String::new(),
            });
        }
        for (name, value) in metadata.to_properties() {
            ops.push(CommitOp::SetProperty {
                path: marker.clone(),
                name,
                value,
            });
        }

        let message = admin_message(&format!(
            "create {} {} from {}@{}",
            branch_type, target, copy_from, latest
        ));
        let revision = self.backend().commit_ops(&ops, &message)?;
        info!("Created {} {} at r{} from {}@{}", branch_type, target, revision, copy_from, latest);

        self.backend().switch(&local_dir, &target, None)?;
        self.backend().revert(&local_dir.join(MARKER_FILE), false)?;
        info!("Switched {} to {}", local_dir.display(), target);

        Ok(CreateOutcome {
            metadata,
            local_dir,
            revision,
        })
    }
}
