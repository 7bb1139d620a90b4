// ABOUTME: Entry point for bw - parses the command line, sets up logging and runs one command

#![allow(missing_docs)]

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use branchwork::cli::{self, Cli, CliContext};
use branchwork::config::AppConfig;

fn main() -> ExitCode {
    // clap's own usage exit code would collide with IllegalTarget
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let ctx = match build_context(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = setup_logging(&ctx.config, cli.verbose) {
        eprintln!("Warning: file logging disabled: {e:#}");
    }
    setup_panic_handler();

    info!("Starting bw {} in {}", env!("CARGO_PKG_VERSION"), ctx.cwd.display());

    match cli::dispatch(cli.command, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("Error: {e:#}");
            ExitCode::from(cli::exit_code(&e))
        }
    }
}

fn build_context(cli: &Cli) -> Result<CliContext> {
    let cwd = cli::working_dir(cli.directory.as_deref())?;
    let config = AppConfig::load(&cwd).context("Failed to load configuration")?;
    Ok(CliContext {
        cwd,
        config,
        format: cli.format,
        repository: cli.repository.clone(),
    })
}

/// JSONL file log per invocation, plus a plain stderr layer with --verbose
fn setup_logging(config: &AppConfig, verbose: bool) -> Result<()> {
    use std::fs::OpenOptions;
    use std::sync::Mutex;
    use tracing_subscriber::prelude::*;

    let log_dir = config.log_dir()?;
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    // Create JSONL log file with timestamp
    let log_file = log_dir.join(format!(
        "bw-{}.jsonl",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to create log file {}", log_file.display()))?;

    let default_filter = if verbose {
        format!("{},branchwork=debug", config.logging.filter)
    } else {
        config.logging.filter.clone()
    };

    let stderr_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(stderr_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    Ok(())
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("bw panicked: {}", panic_info);
        eprintln!("bw panicked: {panic_info}");
        eprintln!("Please check the logs for more details.");
    }));
}
