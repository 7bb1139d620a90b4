// ABOUTME: CLI argument parsing and command routing for bw
//
// Provides command-line interface for:
// - Bootstrapping a project layout (init)
// - Creating, switching and deleting branches
// - Synchronizing and promoting user branches
// - Inspecting the working copy and the project's branches (info, listbranches)
// - Code freeze and commit-message validation

pub mod branch;
pub mod info;
pub mod init;
pub mod output;
pub mod sync;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use crate::branch::{BranchError, ErrorKind};
use crate::config::AppConfig;
use crate::vcs::{SvnBackend, VcsError};

/// Trunk / release branch / user branch workflow on top of Subversion
#[derive(Parser)]
#[command(name = "bw")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Also log to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Run as if started in this directory
    #[arg(short = 'C', global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Repository root URL (default: discovered from the working copy)
    #[arg(long, global = true, value_name = "URL")]
    pub repository: Option<String>,
}

/// Output format for commands
#[derive(Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Lay out a new project (trunk, branch containers, layout properties)
    Init(InitArgs),

    /// Create a release branch from trunk
    #[command(name = "createbranch")]
    CreateBranch(NameArgs),

    /// Create a user branch from the current tree root (from a subdirectory: a subbranch)
    #[command(name = "createuserbranch")]
    CreateUserBranch(CreateUserBranchArgs),

    /// Switch the working copy, or the affected subdirectory, to another branch
    #[command(name = "setbranch")]
    SetBranch(SetBranchArgs),

    /// Merge new source changes into the current user branch
    Synchronize,

    /// Merge the current user branch into its source and delete it
    Promote(PromoteArgs),

    /// Delete a release branch
    #[command(name = "deletebranch")]
    DeleteBranch(DeleteBranchArgs),

    /// Delete a user branch
    #[command(name = "deleteuserbranch")]
    DeleteUserBranch(NameArgs),

    /// List trunk, release branches and user branches
    #[command(name = "listbranches")]
    ListBranches,

    /// Show the current branch, its project and nested subbranches
    Info,

    /// Block ordinary promotions into trunk or a release branch
    Freeze(NameArgs),

    /// Lift a code freeze
    Unfreeze(NameArgs),

    /// Check a commit message against the current branch's policy
    Validate(ValidateArgs),
}

/// Arguments for the init command
#[derive(clap::Args)]
pub struct InitArgs {
    /// Repository path of the project root (e.g. /myproject)
    pub project_root: String,

    /// Trunk path relative to the project root
    #[arg(long)]
    pub trunk: Option<String>,

    /// Release branch container relative to the project root
    #[arg(long)]
    pub release: Option<String>,

    /// User branch container relative to the project root
    #[arg(long)]
    pub user: Option<String>,
}

/// A single branch name
#[derive(clap::Args)]
pub struct NameArgs {
    /// Branch name
    pub name: String,
}

/// Arguments for the createuserbranch command
#[derive(clap::Args)]
pub struct CreateUserBranchArgs {
    /// Branch name
    pub name: String,

    /// Carry uncommitted changes onto the new branch
    #[arg(long, short)]
    pub force: bool,
}

/// Arguments for the setbranch command
#[derive(clap::Args)]
pub struct SetBranchArgs {
    /// Target branch name (trunk, user branch or release branch)
    pub name: String,

    /// Switch despite local changes (the destination marker is reverted)
    #[arg(long, short)]
    pub force: bool,

    /// Allow switching to a branch with a different tree root
    #[arg(long)]
    pub change_root: bool,
}

/// Arguments for the promote command
#[derive(clap::Args)]
pub struct PromoteArgs {
    /// Commit message (default: "<destination> - promote <branch>")
    #[arg(long, short)]
    pub message: Option<String>,
}

/// Arguments for the deletebranch command
#[derive(clap::Args)]
pub struct DeleteBranchArgs {
    /// Release branch name
    pub name: String,

    /// Confirm an administrative deletion
    #[arg(long)]
    pub admin: bool,
}

/// Arguments for the validate command
#[derive(clap::Args)]
pub struct ValidateArgs {
    /// Commit message to check
    #[arg(long, short)]
    pub message: String,
}

/// Everything a command handler needs, passed explicitly
pub struct CliContext {
    pub cwd: PathBuf,
    pub config: AppConfig,
    pub format: OutputFormat,
    pub repository: Option<String>,
}

impl CliContext {
    /// Subversion backend for the configured or discovered repository
    pub fn backend(&self) -> Result<SvnBackend> {
        let backend = match &self.repository {
            Some(url) => SvnBackend::new(url.clone(), &self.config.backend),
            None => SvnBackend::discover(&self.cwd, &self.config.backend),
        };
        backend.with_context(|| {
            format!(
                "Cannot reach the repository from {} (use --repository URL outside a working copy)",
                self.cwd.display()
            )
        })
    }
}

/// Resolve `-C` against the process working directory
pub fn working_dir(directory: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    Ok(match directory {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => cwd.join(dir),
        None => cwd,
    })
}

/// Process exit code for a failed command; 1 for anything outside the branch error taxonomy
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(branch) = err.downcast_ref::<BranchError>() {
        return branch.kind().exit_code();
    }
    if err.downcast_ref::<VcsError>().is_some() {
        return ErrorKind::Backend.exit_code();
    }
    1
}

/// Route a parsed command to its handler
pub fn dispatch(command: Commands, ctx: &CliContext) -> Result<()> {
    match command {
        Commands::Init(args) => init::execute(args, ctx),
        Commands::CreateBranch(args) => branch::create(&args.name, false, false, ctx),
        Commands::CreateUserBranch(args) => branch::create(&args.name, true, args.force, ctx),
        Commands::SetBranch(args) => branch::set(args, ctx),
        Commands::Synchronize => sync::synchronize(ctx),
        Commands::Promote(args) => sync::promote(args, ctx),
        Commands::DeleteBranch(args) => branch::delete(&args.name, false, args.admin, ctx),
        Commands::DeleteUserBranch(args) => branch::delete(&args.name, true, false, ctx),
        Commands::ListBranches => info::list(ctx),
        Commands::Info => info::info(ctx),
        Commands::Freeze(args) => branch::freeze(&args.name, true, ctx),
        Commands::Unfreeze(args) => branch::freeze(&args.name, false, ctx),
        Commands::Validate(args) => info::validate(&args.message, ctx),
    }
}
