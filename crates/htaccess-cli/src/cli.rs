//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// htaccess manager - keep a managed block in a shared .htaccess healthy
#[derive(Parser, Debug)]
#[command(name = "htaccess")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true, env = "HTACCESS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Exit non-zero when the underlying check fails
    #[arg(long, global = true)]
    pub strict: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Compare the managed block with the configured fragments
    Status,

    /// Validate the file and probe the site
    Diagnose,

    /// Report whether the file is invalid or the site returns a 5xx
    Scan,

    /// Write the composed fragments into the managed block
    Apply {
        /// Version written into the "Managed by" line
        #[arg(long = "version", value_name = "VERSION", default_value = env!("CARGO_PKG_VERSION"))]
        release: String,
    },

    /// Remediate the composed body, then apply it
    Remediate {
        /// Version written into the "Managed by" line
        #[arg(long = "version", value_name = "VERSION", default_value = env!("CARGO_PKG_VERSION"))]
        release: String,
    },

    /// Restore the file from its rolling backup
    Restore {
        /// Version written into the "Managed by" line
        #[arg(long = "version", value_name = "VERSION", default_value = env!("CARGO_PKG_VERSION"))]
        release: String,
    },

    /// List the rolling backup
    #[command(visible_alias = "backups")]
    ListBackups,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply_with_version() {
        let cli = Cli::parse_from(["htaccess", "apply", "--version", "9.9.9"]);
        assert_eq!(
            cli.command,
            Some(Commands::Apply {
                release: "9.9.9".to_string()
            })
        );
    }

    #[test]
    fn test_apply_version_defaults_to_crate_version() {
        let cli = Cli::parse_from(["htaccess", "apply"]);
        assert_eq!(
            cli.command,
            Some(Commands::Apply {
                release: env!("CARGO_PKG_VERSION").to_string()
            })
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["htaccess", "status", "--format", "json", "--strict"]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.strict);
    }

    #[test]
    fn test_backups_alias() {
        let cli = Cli::parse_from(["htaccess", "backups"]);
        assert_eq!(cli.command, Some(Commands::ListBackups));
    }
}
