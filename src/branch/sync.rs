// ABOUTME: Synchronize - pull source changes into a user branch without retiring it
//
// Merges (last merge revision, HEAD] from the source into the working copy and
// records the new last merge revision locally. Nothing is committed.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use super::error::{BranchError, BranchResult};
use super::manager::{BranchManager, WorkingCopy};
use crate::models::metadata::{IDENTITY_PROPERTIES, PROP_LAST_MERGE};
use crate::models::{BranchType, Revision, SourceRef};
use crate::vcs::{Conflict, ConflictKind, Resolution, VcsError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SyncOutcome {
    UpToDate {
        last_merge_revision: Revision,
    },
    Merged {
        from: Revision,
        to: Revision,
        merged: Vec<PathBuf>,
        /// Changed at the source but deleted locally; their changes were not applied
        skipped: Vec<PathBuf>,
        /// Left for the user to resolve
        conflicts: Vec<Conflict>,
    },
}

impl BranchManager<'_> {
    pub fn synchronize(&self) -> BranchResult<SyncOutcome> {
        let wc = self.current()?;
        let source = require_user_branch(&wc, "synchronize")?;
        let last_merge = source.last_merge_revision;
        let source_path = source.path();

        let latest = self.backend().latest_revision()?;
        let last_changed = self
            .backend()
            .last_changed_revision(&source_path, Some(latest))
            .map_err(|e| match e {
                VcsError::PathNotFound(_) => {
                    BranchError::NotFound(format!("source {source_path} no longer exists"))
                }
                other => other.into(),
            })?;
        if last_changed <= last_merge {
            info!("{} is up to date with {} (r{})", wc.metadata.branch_path, source_path, last_merge);
            return Ok(SyncOutcome::UpToDate {
                last_merge_revision: last_merge,
            });
        }

        let outcome = self
            .backend()
            .merge(&source_path, last_merge, &source_path, latest, &wc.local_root)?;

        let marker = wc.marker();
        let mut conflicts = Vec::new();
        let mut marker_conflicted = false;
        for conflict in outcome.conflicts {
            let identity_only = matches!(
                &conflict.kind,
                ConflictKind::Property(names)
                    if !names.is_empty()
                        && names.iter().all(|n| IDENTITY_PROPERTIES.contains(&n.as_str()))
            );
            if conflict.path == marker && identity_only {
                self.backend().resolve(&marker, Resolution::Working)?;
                info!("Kept local branch identity on {}", marker.display());
                continue;
            }
            if conflict.path == marker {
                marker_conflicted = true;
            }
            conflicts.push(conflict);
        }

        // Undo marker churn from the merge; only the new merge point is kept
        if !marker_conflicted {
            self.backend().revert(&marker, false)?;
        }
        self.backend()
            .set_wc_property(&marker, PROP_LAST_MERGE, &latest.to_string())?;

        for path in &outcome.skipped {
            warn!("Skipped {}: deleted locally but changed in {}", path.display(), source_path);
        }
        info!(
            "Synchronized {} with {} ({}:{}]; {} conflicts remain",
            wc.metadata.branch_path,
            source_path,
            last_merge,
            latest,
            conflicts.len()
        );

        Ok(SyncOutcome::Merged {
            from: last_merge,
            to: latest,
            merged: outcome.merged,
            skipped: outcome.skipped,
            conflicts,
        })
    }
}

pub(crate) fn require_user_branch<'w>(wc: &'w WorkingCopy, operation: &str) -> BranchResult<&'w SourceRef> {
    match (&wc.metadata.branch_type, &wc.metadata.source) {
        (BranchType::UserBranch, Some(source)) => Ok(source),
        _ => Err(BranchError::IllegalTarget(format!(
            "{operation} applies to user branches; {} is a {}",
            wc.metadata.branch_path, wc.metadata.branch_type
        ))),
    }
}
