// ABOUTME: Read-only commands - info, listbranches and validate

use anyhow::Result;
use serde::Serialize;

use super::output::{display_path, emit};
use super::CliContext;
use crate::branch::{BranchInfo, BranchListing, BranchManager};
use crate::models::{BranchMetadata, Policy};

/// Result of the validate command
#[derive(Serialize)]
struct ValidationReport {
    branch: String,
    message: String,
    accepted: bool,
}

/// Execute the info command
pub fn info(ctx: &CliContext) -> Result<()> {
    let backend = ctx.backend()?;
    let manager = BranchManager::new(&backend, &ctx.cwd);

    let info = manager.info()?;

    emit(ctx.format, &info, info_text)
}

fn info_text(info: &BranchInfo) {
    println!("Working copy: {} (r{})", info.local_root.display(), info.revision);
    println!("Project:      {}", info.project.root);
    print_branch(&info.branch);
    if info.tree_root != info.branch.branch_path {
        println!("Tree root:    {}", info.tree_root);
    }
    if !info.subbranches.is_empty() {
        println!("Subbranches:");
        for sub in &info.subbranches {
            println!(
                "  {} -> {} ({})",
                display_path(&sub.local_dir, &info.local_root),
                sub.branch.branch_path,
                sub.branch.branch_type
            );
        }
    }
}

fn print_branch(branch: &BranchMetadata) {
    println!("Branch:       {} ({})", branch.branch_path, branch.branch_type);
    if let Some(source) = &branch.source {
        println!("Source:       {}", source.path());
        println!("Branch point: r{}", source.branch_point_revision);
        println!("Last merge:   r{}", source.last_merge_revision);
    }
    if branch.code_frozen {
        println!("Code freeze:  yes");
    }
    if let Policy::Custom { rules, .. } = &branch.policy {
        println!("Policy:       custom ({} message rules)", rules.len());
    }
    if let Some(minimum) = branch.policy.minimum_version() {
        println!("Requires:     bw >= {minimum}");
    }
}

/// Execute the listbranches command
pub fn list(ctx: &CliContext) -> Result<()> {
    let backend = ctx.backend()?;
    let manager = BranchManager::new(&backend, &ctx.cwd);

    let listing = manager.list_branches()?;

    emit(ctx.format, &listing, list_text)
}

fn list_text(listing: &BranchListing) {
    println!("Project {}", listing.project.root);
    println!("  trunk: {}", listing.trunk);

    if listing.release_branches.is_empty() {
        println!("  No release branches");
    } else {
        println!("  Release branches:");
        for name in &listing.release_branches {
            println!("    {name}");
        }
    }

    if listing.user_branches.is_empty() {
        println!("  No user branches");
    } else {
        println!("  User branches:");
        for name in &listing.user_branches {
            println!("    {name}");
        }
    }
}

/// Execute the validate command; a rejected message is a policy error
pub fn validate(message: &str, ctx: &CliContext) -> Result<()> {
    let backend = ctx.backend()?;
    let manager = BranchManager::new(&backend, &ctx.cwd);

    let branch = manager.validate_message(message)?;

    let report = ValidationReport {
        branch: branch.branch_path.to_string(),
        message: message.to_string(),
        accepted: true,
    };
    emit(ctx.format, &report, |r| {
        println!("Message accepted for {}", r.branch);
    })
}
