// ABOUTME: Synchronize and promote commands for user branches

use anyhow::Result;
use std::path::Path;

use super::output::{display_path, emit};
use super::{CliContext, PromoteArgs};
use crate::branch::{BranchManager, PromoteOutcome, SyncOutcome};
use crate::vcs::ConflictKind;

/// Execute the synchronize command
pub fn synchronize(ctx: &CliContext) -> Result<()> {
    let backend = ctx.backend()?;
    let manager = BranchManager::new(&backend, &ctx.cwd);

    let outcome = manager.synchronize()?;

    emit(ctx.format, &outcome, |o| sync_text(o, ctx))
}

fn sync_text(outcome: &SyncOutcome, ctx: &CliContext) {
    for line in sync_lines(outcome, &ctx.cwd) {
        println!("{line}");
    }
}

fn sync_lines(outcome: &SyncOutcome, cwd: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    match outcome {
        SyncOutcome::UpToDate {
            last_merge_revision,
        } => lines.push(format!("Branch is up to date (last merge r{last_merge_revision})")),
        SyncOutcome::Merged {
            from,
            to,
            merged,
            skipped,
            conflicts,
        } => {
            lines.push(format!("Merged source changes r{}:{}", from + 1, to));
            for path in merged {
                lines.push(format!("  U {}", display_path(path, cwd)));
            }
            if !skipped.is_empty() {
                lines.push("Skipped (deleted here, changed in source):".to_string());
                for path in skipped {
                    lines.push(format!("  - {}", display_path(path, cwd)));
                }
            }
            if !conflicts.is_empty() {
                lines.push("Conflicts to resolve before committing:".to_string());
                for conflict in conflicts {
                    let kind = match &conflict.kind {
                        ConflictKind::Text => "text".to_string(),
                        ConflictKind::Property(names) => format!("property {}", names.join(", ")),
                        ConflictKind::Tree => "tree".to_string(),
                    };
                    lines.push(format!("  C {} ({})", display_path(&conflict.path, cwd), kind));
                }
            }
            lines.push("Review and commit the merge to record it on the branch.".to_string());
        }
    }
    lines
}

/// Execute the promote command
pub fn promote(args: PromoteArgs, ctx: &CliContext) -> Result<()> {
    let backend = ctx.backend()?;
    let manager = BranchManager::new(&backend, &ctx.cwd);

    let outcome = manager.promote(args.message.as_deref())?;

    emit(ctx.format, &outcome, |o| promote_text(o, ctx))
}

fn promote_text(outcome: &PromoteOutcome, ctx: &CliContext) {
    match outcome.commit_revision {
        Some(rev) => {
            println!(
                "Promoted {} into {} in r{}",
                outcome.branch.branch_path, outcome.destination.branch_path, rev
            );
            for path in &outcome.merged {
                println!("  U {}", display_path(path, &ctx.cwd));
            }
        }
        None => println!(
            "{} carried no changes for {}",
            outcome.branch.branch_path, outcome.destination.branch_path
        ),
    }
    println!(
        "Deleted {} in r{}; working copy is on {}",
        outcome.branch.branch_path, outcome.delete_revision, outcome.destination.branch_path
    );
}
