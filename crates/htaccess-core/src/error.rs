//! Error types for htaccess-core

use std::path::PathBuf;

/// Result type for htaccess-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in htaccess-core operations
///
/// Expected conditions of an apply (missing target, invalid body, backup or
/// write failure, unhealthy result) are reported through
/// [`crate::ApplyOutcome`], not through this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The target path could not be resolved to an absolute location
    #[error("Target path could not be resolved: {path}")]
    PathUnresolved { path: PathBuf },

    /// The managed file does not exist
    #[error("Target file not found: {path}")]
    TargetMissing { path: PathBuf },

    /// No rolling backup to restore from
    #[error("No backup found at {path}")]
    BackupMissing { path: PathBuf },

    /// Restoring the backup over the target failed
    #[error("Restore of {path} failed: {reason}")]
    RestoreFailed { path: PathBuf, reason: String },

    /// Configuration is structurally invalid
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The engine has not been given a context yet
    #[error("Engine is not initialized")]
    NotReady,

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from htaccess-fs
    #[error(transparent)]
    Fs(#[from] htaccess_fs::Error),

    /// Block handling error from htaccess-blocks
    #[error(transparent)]
    Blocks(#[from] htaccess_blocks::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
