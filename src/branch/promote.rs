// ABOUTME: Promote - merge a synchronized user branch back into its source and retire it
//
// All checks run before the first mutation. Once the switch has happened a
// failure leaves the working copy on the source with uncommitted merge results;
// nothing is rolled back.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use super::error::{BranchError, BranchResult, PolicyError};
use super::manager::BranchManager;
use super::sync::require_user_branch;
use crate::commit_policy::{
    admin_message, has_freeze_override, promote_message, validate_commit,
};
use crate::models::{BranchMetadata, Revision};
use crate::vcs::{EntryState, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromoteOutcome {
    pub branch: BranchMetadata,
    pub destination: BranchMetadata,
    pub message: String,
    pub merged: Vec<PathBuf>,
    /// `None` when the branch carried no changes
    pub commit_revision: Option<Revision>,
    pub delete_revision: Revision,
}

impl BranchManager<'_> {
    pub fn promote(&self, message: Option<&str>) -> BranchResult<PromoteOutcome> {
        let wc = self.current()?;
        let source = require_user_branch(&wc, "promote")?.clone();
        let branch = wc.metadata.clone();
        let last_merge = source.last_merge_revision;

        if self.backend().check_path(&branch.branch_path, None)? == NodeKind::None {
            return Err(BranchError::NotFound(format!(
                "{} no longer exists; it may already have been promoted",
                branch.branch_path
            )));
        }

        // 1. local state
        self.ensure_clean(&wc.local_root)?;
        let branch_last = self
            .backend()
            .last_changed_revision(&branch.branch_path, None)?;
        if wc.revision < branch_last {
            return Err(BranchError::LocalState(format!(
                "{} is out of date (r{} but {} changed in r{}); run update first",
                wc.local_root.display(),
                wc.revision,
                branch.branch_path,
                branch_last
            )));
        }

        // 2. source must not have moved past the last merge
        let source_path = source.path();
        let source_last = self.backend().last_changed_revision(&source_path, None)?;
        if source_last > last_merge {
            return Err(BranchError::LocalState(format!(
                "unmerged changes in source {} (r{} after last merge r{}); synchronize first",
                source_path, source_last, last_merge
            )));
        }

        let destination = self.branch_metadata(&source.root)?.ok_or_else(|| {
            BranchError::NotFound(format!("destination {} has no branch marker", source.root))
        })?;
        let message = message.map_or_else(
            || promote_message(&destination, &branch),
            str::to_string,
        );

        // 3. code freeze
        if destination.code_frozen && !has_freeze_override(&message) {
            return Err(PolicyError::CodeFrozen {
                branch: destination.branch_path.to_string(),
            }
            .into());
        }

        // 4. destination policy
        validate_commit(&destination, &message, self.tool_version())?;

        info!(
            "Promoting {} into {} ({}:{}]",
            branch.branch_path, source_path, last_merge, branch_last
        );
        self.backend()
            .switch(&wc.local_root, &source_path, Some(last_merge))?;
        // source@last_merge -> branch@head: exactly what the branch adds on top of
        // the source it was last synchronized with
        let outcome = self.backend().merge(
            &source_path,
            last_merge,
            &branch.branch_path,
            branch_last,
            &wc.local_root,
        )?;

        // the destination owns its own marker; a subbranch's marker has no place there
        let marker = wc.marker();
        self.backend().revert(&marker, branch.is_subbranch())?;
        let merged: Vec<PathBuf> = outcome.merged.into_iter().filter(|p| *p != marker).collect();

        let status = self.backend().status(&wc.local_root)?;
        let replaced: Vec<String> = status
            .iter()
            .filter(|e| e.state == EntryState::Replaced)
            .map(|e| e.path.display().to_string())
            .collect();
        if !replaced.is_empty() {
            return Err(BranchError::LocalState(format!(
                "promote aborted before commit: replaced files cannot be promoted ({}); \
                 {} is left switched to {} with the merge uncommitted",
                replaced.join(", "),
                wc.local_root.display(),
                source_path
            )));
        }
        let conflicted: Vec<String> = status
            .iter()
            .filter(|e| e.state == EntryState::Conflicted)
            .map(|e| e.path.display().to_string())
            .collect();
        if !conflicted.is_empty() {
            return Err(BranchError::LocalState(format!(
                "promote aborted before commit: conflicts in {}; {} is left switched to {}",
                conflicted.join(", "),
                wc.local_root.display(),
                source_path
            )));
        }

        let commit_revision = self
            .backend()
            .commit(&[wc.local_root.clone()], &message)?;
        match commit_revision {
            Some(rev) => info!("Committed promotion of {} as r{}", branch.branch_path, rev),
            None => warn!("{} carried no changes to promote", branch.branch_path),
        }

        let delete_revision = self.backend().delete(
            &[branch.branch_path.clone()],
            &admin_message(&format!("delete {} after promote", branch.branch_path)),
        )?;
        info!("Deleted {} in r{}", branch.branch_path, delete_revision);

        Ok(PromoteOutcome {
            branch,
            destination,
            message,
            merged,
            commit_revision,
            delete_revision,
        })
    }
}
