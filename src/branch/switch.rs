// ABOUTME: SetBranch - move a working copy (or one of its subdirectories) to another branch

use serde::Serialize;
use tracing::{info, warn};

use super::error::{BranchError, BranchResult};
use super::manager::BranchManager;
use super::resolver::{plan_switch, SwitchPlan};
use super::topology::tree_root;
use crate::models::{BranchMetadata, Revision, MARKER_FILE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchOutcome {
    pub plan: SwitchPlan,
    pub target: BranchMetadata,
    pub revision: Revision,
}

impl BranchManager<'_> {
    pub fn set_branch(
        &self,
        name: &str,
        force: bool,
        change_root: bool,
    ) -> BranchResult<SwitchOutcome> {
        let wc = self.current()?;
        let target = self.resolve_name(&wc.project, name)?;

        let current_root = tree_root(&wc.metadata);
        let target_root = tree_root(&target);
        if current_root != target_root {
            if !change_root {
                return Err(BranchError::IllegalTarget(format!(
                    "{} belongs to {} but the working copy belongs to {}; pass --change-root to cross lineages",
                    target.branch_path, target_root, current_root
                )));
            }
            warn!("Changing tree root from {} to {}", current_root, target_root);
        }

        let plan = plan_switch(
            &wc.local_root,
            &wc.metadata,
            &target,
            self.cwd(),
            |root| self.parent_working_copy(root),
        )?;
        self.ensure_switchable(&plan.local_dir)?;
        if !force {
            self.ensure_clean(&plan.local_dir)?;
        }

        let revision = self.backend().switch(&plan.local_dir, &plan.target, None)?;
        if force {
            // metadata never travels between branches
            self.backend()
                .revert(&plan.local_dir.join(MARKER_FILE), false)?;
        }
        info!(
            "Switched {} to {} at r{}",
            plan.local_dir.display(),
            plan.target,
            revision
        );

        Ok(SwitchOutcome {
            plan,
            target,
            revision,
        })
    }
}
