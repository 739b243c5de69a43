//! Status, diagnose and scan commands

use std::path::Path;

use colored::Colorize;
use htaccess_core::{BlockStatus, Diagnosis, StatusReport};
use serde::Serialize;

use super::load_engine;
use crate::cli::OutputFormat;
use crate::error::Result;
use crate::output::{emit, short_hash};

/// Run the status command
pub fn run_status(cwd: &Path, config: Option<&Path>, format: OutputFormat) -> Result<bool> {
    let engine = load_engine(cwd, config, env!("CARGO_PKG_VERSION"))?;
    let report = engine.status()?;
    emit(format, &report, print_status)?;
    Ok(report.is_ok())
}

fn print_status(report: &StatusReport) {
    let status = match report.status {
        BlockStatus::Ok => "ok".green().bold(),
        BlockStatus::Missing => "missing".yellow().bold(),
        BlockStatus::Mismatch => "mismatch".yellow().bold(),
        BlockStatus::Invalid | BlockStatus::Error => report.status.as_str().red().bold(),
    };
    println!("{}", "Managed Block Status".bold());
    println!();
    println!("{}:     {}", "Target".dimmed(), report.target.display());
    println!("{}:     {}", "Status".dimmed(), status);
    println!("{}:   {}", "Expected".dimmed(), short_hash(report.expected_hash.as_deref()));
    println!("{}:    {}", "Current".dimmed(), short_hash(report.current_hash.as_deref()));
    print_issues(&report.issues);
}

/// Run the diagnose command
pub fn run_diagnose(cwd: &Path, config: Option<&Path>, format: OutputFormat) -> Result<bool> {
    let engine = load_engine(cwd, config, env!("CARGO_PKG_VERSION"))?;
    let diagnosis = engine.diagnose()?;
    emit(format, &diagnosis, print_diagnosis)?;
    Ok(!diagnosis.has_issues())
}

fn print_diagnosis(diagnosis: &Diagnosis) {
    let valid = if diagnosis.file_valid {
        "valid".green()
    } else {
        "invalid".red()
    };
    let http = match diagnosis.http_status {
        0 => "not probed / no response".dimmed(),
        code if diagnosis.is_server_error() => code.to_string().red(),
        code if diagnosis.reachable => code.to_string().green(),
        code => code.to_string().yellow(),
    };
    println!("{}", "Diagnosis".bold());
    println!();
    println!("{}:   {}", "File".dimmed(), valid);
    println!("{}:   {}", "HTTP".dimmed(), http);
    print_issues(&diagnosis.file_issues);
}

#[derive(Debug, Serialize)]
struct ScanOutput {
    issues_found: bool,
    issues: Vec<String>,
}

/// Run the scan command
pub fn run_scan(cwd: &Path, config: Option<&Path>, format: OutputFormat) -> Result<bool> {
    let engine = load_engine(cwd, config, env!("CARGO_PKG_VERSION"))?;
    let diagnosis = engine.diagnose()?;
    let output = ScanOutput {
        issues_found: diagnosis.has_issues(),
        issues: diagnosis.issues(),
    };
    emit(format, &output, |output| {
        if output.issues_found {
            println!("{}", "Issues found".red().bold());
            print_issues(&output.issues);
        } else {
            println!("{}", "No issues found".green().bold());
        }
    })?;
    Ok(!output.issues_found)
}

pub(crate) fn print_issues(issues: &[String]) {
    if issues.is_empty() {
        return;
    }
    println!();
    println!("{}:", "Issues".bold());
    for issue in issues {
        println!("  {} {}", "-".red(), issue);
    }
}
