//! htaccess manager CLI
//!
//! Command-line access to the managed block: inspect drift, diagnose the
//! site, apply or remediate the composed fragments, and restore backups.

mod cli;
mod commands;
mod error;
mod output;

use std::path::Path;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{Cli, Commands};
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing if verbose
    if cli.verbose {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::DEBUG.as_str()));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| CliError::user(format!("Failed to set tracing subscriber: {e}")))?;
        tracing::debug!("Verbose mode enabled");
    }

    let Some(cmd) = cli.command else {
        // No command provided - show help hint
        println!("{} htaccess manager CLI", "htaccess".green().bold());
        println!();
        println!("Run {} for available commands.", "htaccess --help".cyan());
        return Ok(());
    };

    let cwd = std::env::current_dir()?;
    let name = command_name(&cmd);
    let passed = execute_command(&cwd, cli.config.as_deref(), cli.format, cmd)?;

    if cli.strict && !passed {
        return Err(CliError::user(format!("{name} check failed")));
    }
    Ok(())
}

fn execute_command(cwd: &Path, config: Option<&Path>, format: cli::OutputFormat, cmd: Commands) -> Result<bool> {
    match cmd {
        Commands::Status => commands::run_status(cwd, config, format),
        Commands::Diagnose => commands::run_diagnose(cwd, config, format),
        Commands::Scan => commands::run_scan(cwd, config, format),
        Commands::Apply { release } => commands::run_apply(cwd, config, &release, format),
        Commands::Remediate { release } => commands::run_remediate(cwd, config, &release, format),
        Commands::Restore { release } => commands::run_restore(cwd, config, &release, format),
        Commands::ListBackups => commands::run_list_backups(cwd, config, format),
    }
}

fn command_name(cmd: &Commands) -> &'static str {
    match cmd {
        Commands::Status => "status",
        Commands::Diagnose => "diagnose",
        Commands::Scan => "scan",
        Commands::Apply { .. } => "apply",
        Commands::Remediate { .. } => "remediate",
        Commands::Restore { .. } => "restore",
        Commands::ListBackups => "list-backups",
    }
}
