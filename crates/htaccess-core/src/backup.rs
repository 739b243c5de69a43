//! Single rolling backup of the managed file
//!
//! The backup is a sibling of the target (`.htaccess.nfd-backup` by
//! default) refreshed immediately before every write, so it always holds
//! the last content known to be in service.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use htaccess_fs::{NormalizedPath, RobustnessConfig, io};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, Result};

/// A backup present on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Manages the rolling backup for one suffix.
#[derive(Debug, Clone)]
pub struct BackupStore {
    suffix: String,
    robustness: RobustnessConfig,
}

impl BackupStore {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            robustness: RobustnessConfig::default(),
        }
    }

    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.robustness = robustness;
        self
    }

    /// Path of the backup belonging to `target`.
    pub fn backup_path(&self, target: &NormalizedPath) -> NormalizedPath {
        target.with_suffix(&self.suffix)
    }

    /// Copy the target's current content into the backup.
    ///
    /// An unreadable target is backed up as empty content. A failure to
    /// write the backup is returned and must stop the caller from touching
    /// the target.
    pub fn refresh(&self, target: &NormalizedPath) -> Result<NormalizedPath> {
        let content = fs::read(target.to_native()).unwrap_or_else(|e| {
            debug!(path = %target, error = %e, "target unreadable; backing up empty content");
            Vec::new()
        });
        let backup = self.backup_path(target);
        io::write_atomic(&backup, &content, self.robustness)?;
        debug!(path = %backup, bytes = content.len(), "refreshed backup");
        Ok(backup)
    }

    /// Write the backup's content back over the target.
    ///
    /// # Errors
    /// `BackupMissing` when there is no backup, `RestoreFailed` when the
    /// backup cannot be read or the target cannot be written.
    pub fn restore(&self, target: &NormalizedPath) -> Result<()> {
        let backup = self.backup_path(target);
        if !backup.is_file() {
            return Err(Error::BackupMissing {
                path: backup.to_native(),
            });
        }
        let failed = |reason: String| Error::RestoreFailed {
            path: target.to_native(),
            reason,
        };
        let content = fs::read(backup.to_native()).map_err(|e| failed(e.to_string()))?;
        io::write_atomic(target, &content, self.robustness).map_err(|e| failed(e.to_string()))?;
        info!(path = %target, from = %backup, "restored from backup");
        Ok(())
    }

    /// Zero or one entries: the rolling backup, if it exists.
    pub fn list_backups(&self, target: &NormalizedPath) -> Result<Vec<BackupInfo>> {
        let backup = self.backup_path(target);
        if !backup.is_file() {
            return Ok(Vec::new());
        }
        let native = backup.to_native();
        let metadata = fs::metadata(&native).map_err(|e| htaccess_fs::Error::io(&native, e))?;
        Ok(vec![BackupInfo {
            path: native,
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        }])
    }
}
