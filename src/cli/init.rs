// ABOUTME: Init command - lay out trunk and the branch containers for a new project

use anyhow::Result;

use super::output::emit;
use super::{CliContext, InitArgs};
use crate::branch::{BranchManager, InitOutcome};
use crate::models::{ProjectLayout, RepoPath};

/// Execute the init command
pub fn execute(args: InitArgs, ctx: &CliContext) -> Result<()> {
    let backend = ctx.backend()?;
    let manager = BranchManager::new(&backend, &ctx.cwd);

    let layout = layout_from_args(&args, ctx.config.project_defaults.layout());
    let outcome = manager.init_project(&RepoPath::new(&args.project_root), &layout)?;

    emit(ctx.format, &outcome, output_text)
}

/// Command-line paths override the configured defaults one by one
fn layout_from_args(args: &InitArgs, defaults: ProjectLayout) -> ProjectLayout {
    ProjectLayout::new(
        args.trunk.as_deref().unwrap_or(&defaults.trunk_path),
        args.release
            .as_deref()
            .unwrap_or(&defaults.release_branches_path),
        args.user.as_deref().unwrap_or(&defaults.user_branches_path),
    )
}

fn output_text(outcome: &InitOutcome) {
    println!(
        "Initialized project {} in r{}",
        outcome.project.root, outcome.revision
    );
    println!("  trunk:            {}", outcome.trunk);
    println!(
        "  release branches: {}",
        outcome.project.root.join(&outcome.project.layout.release_branches_path)
    );
    println!(
        "  user branches:    {}",
        outcome.project.root.join(&outcome.project.layout.user_branches_path)
    );
}
