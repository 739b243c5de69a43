//! Apply, remediate and restore commands

use std::path::Path;

use colored::Colorize;
use htaccess_core::{ApplyOutcome, ApplyReport};
use serde::Serialize;

use super::load_engine;
use super::status::print_issues;
use crate::cli::OutputFormat;
use crate::error::Result;
use crate::output::{emit, short_hash};

/// Run the apply command
pub fn run_apply(cwd: &Path, config: Option<&Path>, version: &str, format: OutputFormat) -> Result<bool> {
    let mut engine = load_engine(cwd, config, version)?;
    let report = engine.apply()?;
    emit(format, &report, print_report)?;
    Ok(!report.is_failure())
}

/// Run the remediate command
pub fn run_remediate(cwd: &Path, config: Option<&Path>, version: &str, format: OutputFormat) -> Result<bool> {
    let mut engine = load_engine(cwd, config, version)?;
    let report = engine.remediate()?;
    emit(format, &report, print_report)?;
    Ok(!report.is_failure())
}

fn print_report(report: &ApplyReport) {
    match report {
        ApplyReport::Skipped => {
            println!("{} another process holds the lock", "Skipped:".yellow().bold());
        }
        ApplyReport::Completed(ApplyOutcome::Unchanged) => {
            println!("{} managed block already up to date", "Unchanged:".green().bold());
        }
        ApplyReport::Completed(ApplyOutcome::Written { checksum }) => {
            println!("{} managed block written ({})", "Written:".green().bold(), short_hash(Some(checksum)));
        }
        ApplyReport::Completed(ApplyOutcome::Removed) => {
            println!("{} managed block removed", "Removed:".green().bold());
        }
        ApplyReport::Completed(ApplyOutcome::Failed(failure)) => {
            println!("{} {}", "Failed:".red().bold(), failure);
        }
        ApplyReport::Completed(ApplyOutcome::RolledBack { issues }) => {
            println!("{} site was unhealthy; backup restored", "Rolled back:".red().bold());
            print_issues(issues);
        }
    }
}

#[derive(Debug, Serialize)]
struct RestoreOutput {
    restored: bool,
    version: String,
}

/// Run the restore command
pub fn run_restore(cwd: &Path, config: Option<&Path>, version: &str, format: OutputFormat) -> Result<bool> {
    let engine = load_engine(cwd, config, version)?;
    let output = RestoreOutput {
        restored: engine.restore()?,
        version: version.to_string(),
    };
    emit(format, &output, |output| {
        if output.restored {
            println!("{} file restored from backup", "Restored:".green().bold());
        } else {
            println!("{} another process holds the lock", "Skipped:".yellow().bold());
        }
    })?;
    Ok(output.restored)
}
