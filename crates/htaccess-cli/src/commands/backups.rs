//! List-backups command

use std::path::Path;

use colored::Colorize;
use htaccess_core::BackupInfo;

use super::load_engine;
use crate::cli::OutputFormat;
use crate::error::Result;
use crate::output::emit;

/// Run the list-backups command
pub fn run_list_backups(cwd: &Path, config: Option<&Path>, format: OutputFormat) -> Result<bool> {
    let engine = load_engine(cwd, config, env!("CARGO_PKG_VERSION"))?;
    let backups = engine.list_backups()?;
    emit(format, &backups, |backups: &Vec<BackupInfo>| {
        println!("{}", "Backups".bold());
        println!();
        if backups.is_empty() {
            println!("  {}", "None".dimmed());
        }
        for backup in backups {
            let modified = backup
                .modified
                .map(|m| m.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("  {} {} ({} bytes, {})", "+".green(), backup.path.display(), backup.size, modified);
        }
    })?;
    Ok(true)
}
