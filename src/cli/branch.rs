// ABOUTME: Branch lifecycle commands - createbranch, createuserbranch, setbranch,
// deletebranch, deleteuserbranch, freeze and unfreeze

use anyhow::Result;
use serde::Serialize;

use super::output::{display_path, emit};
use super::{CliContext, SetBranchArgs};
use crate::branch::{Alignment, BranchManager, CreateOutcome, SwitchOutcome};
use crate::models::{BranchType, Revision};

/// Result of a freeze/unfreeze command
#[derive(Serialize)]
struct FreezeReport {
    branch: String,
    frozen: bool,
    /// `None` when nothing had to change
    revision: Option<Revision>,
}

/// createbranch / createuserbranch
pub fn create(name: &str, user_branch: bool, force: bool, ctx: &CliContext) -> Result<()> {
    let backend = ctx.backend()?;
    let manager = BranchManager::new(&backend, &ctx.cwd);

    let outcome = manager.create_branch(name, user_branch, force)?;

    emit(ctx.format, &outcome, |o| create_text(o, ctx))
}

fn create_text(outcome: &CreateOutcome, ctx: &CliContext) {
    let meta = &outcome.metadata;
    match meta.branch_type {
        BranchType::UserBranch if meta.is_subbranch() => println!(
            "Created subbranch {} of {} in r{}",
            meta.branch_path,
            meta.source.as_ref().map_or_else(String::new, |s| s.path().to_string()),
            outcome.revision
        ),
        _ => println!(
            "Created {} {} in r{}",
            meta.branch_type, meta.branch_path, outcome.revision
        ),
    }
    println!(
        "Switched {} to {}",
        display_path(&outcome.local_dir, &ctx.cwd),
        meta.branch_path
    );
}

/// setbranch
pub fn set(args: SetBranchArgs, ctx: &CliContext) -> Result<()> {
    let backend = ctx.backend()?;
    let manager = BranchManager::new(&backend, &ctx.cwd);

    let outcome = manager.set_branch(&args.name, args.force, args.change_root)?;

    emit(ctx.format, &outcome, |o| set_text(o, ctx))
}

fn set_text(outcome: &SwitchOutcome, ctx: &CliContext) {
    let local = display_path(&outcome.plan.local_dir, &ctx.cwd);
    match &outcome.plan.alignment {
        Alignment::Same => {}
        Alignment::Descend { relative } => {
            println!("Target is rooted at {relative}; switching that subdirectory only");
        }
        Alignment::Ascend { relative } => {
            println!("Target is rooted {relative} above this subbranch; realigning the parent");
        }
    }
    println!(
        "Switched {} to {} {} at r{}",
        local, outcome.target.branch_type, outcome.plan.target, outcome.revision
    );
}

/// deletebranch / deleteuserbranch
pub fn delete(name: &str, user_branch: bool, admin: bool, ctx: &CliContext) -> Result<()> {
    let backend = ctx.backend()?;
    let manager = BranchManager::new(&backend, &ctx.cwd);

    let outcome = manager.delete_branch(name, user_branch, admin)?;

    emit(ctx.format, &outcome, |r| {
        println!("Deleted {} in r{}", r.branch, r.revision);
    })
}

/// freeze / unfreeze
pub fn freeze(name: &str, frozen: bool, ctx: &CliContext) -> Result<()> {
    let backend = ctx.backend()?;
    let manager = BranchManager::new(&backend, &ctx.cwd);

    let revision = manager.set_code_freeze(name, frozen)?;

    let report = FreezeReport {
        branch: name.to_string(),
        frozen,
        revision,
    };
    emit(ctx.format, &report, |r| {
        let state = if r.frozen { "frozen" } else { "open" };
        match r.revision {
            Some(rev) => println!("{} is now {} (r{})", r.branch, state, rev),
            None => println!("{} is already {}", r.branch, state),
        }
    })
}
