//! The apply pipeline for the managed block
//!
//! One call to [`BlockMerger::apply_managed_block`] runs a single pass:
//! migrate legacy blocks, compose the new block, detect a no-op by
//! checksum, refresh the backup, write atomically, check health and roll
//! back if the result is unhealthy. Callers serialize passes with the
//! lease lock; nothing here retries.

use std::sync::Arc;

use chrono::Utc;
use htaccess_blocks::text::{
    canonical_body, collapse_blank_lines, ensure_single_trailing_newline, normalize_line_endings,
    strip_block_header,
};
use htaccess_blocks::writer::remove_span;
use htaccess_blocks::{
    ManagedBlock, PatchDirective, StateLine, apply_patches, extract_marker_lines, find_block_span,
    has_legacy_blocks, inject_block, remove_legacy_blocks,
};
use htaccess_fs::checksum::sha256_hex;
use htaccess_fs::{NormalizedPath, RobustnessConfig, io};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Result;
use crate::backup::BackupStore;
use crate::config::EngineSettings;
use crate::context::Context;
use crate::health::{HealthChecker, Probe};

/// Why an apply stopped without changing the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum ApplyFailure {
    #[error("target path could not be resolved")]
    PathUnresolved,

    #[error("target file does not exist")]
    TargetMissing,

    #[error("target file could not be read: {reason}")]
    TargetUnreadable { reason: String },

    #[error("body failed validation: {}", .errors.join("; "))]
    ValidationFailed { errors: Vec<String> },

    #[error("backup refresh failed: {reason}")]
    BackupRefreshFailed { reason: String },

    #[error("write failed: {reason}")]
    WriteFailed { reason: String },
}

/// Result of one apply pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// The file already carries this body; nothing was written.
    Unchanged,
    /// A new block was written.
    Written { checksum: String },
    /// The managed block and/or legacy blocks were removed.
    Removed,
    Failed(ApplyFailure),
    /// The write made the site unhealthy and the backup was restored.
    RolledBack { issues: Vec<String> },
}

impl ApplyOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Unchanged | Self::Written { .. } | Self::Removed)
    }
}

/// Canonical hash a body would carry once written.
pub fn expected_body_hash(body: &str) -> String {
    sha256_hex(&canonical_body(body))
}

/// Hash of the body currently inside the block labelled `label`, or `None`
/// when there is no complete block.
pub fn body_hash_in(text: &str, label: &str) -> Option<String> {
    let text = normalize_line_endings(text, false);
    let inner = extract_marker_lines(&text, label)?;
    let body = strip_block_header(&inner).join("\n");
    Some(sha256_hex(&canonical_body(&body)))
}

/// Owns the write pipeline for one target.
#[derive(Debug, Clone)]
pub struct BlockMerger {
    context: Context,
    settings: EngineSettings,
    backups: BackupStore,
    health: HealthChecker,
    robustness: RobustnessConfig,
    patches: Vec<PatchDirective>,
}

impl BlockMerger {
    pub fn new(context: Context, settings: EngineSettings) -> Self {
        let backups = BackupStore::new(&settings.backup_suffix);
        let health = HealthChecker::new(&settings.marker_label, settings.effective_exclusive_labels());
        Self {
            context,
            settings,
            backups,
            health,
            robustness: RobustnessConfig::default(),
            patches: Vec::new(),
        }
    }

    pub fn with_probe(mut self, probe: Option<Arc<dyn Probe>>) -> Self {
        self.health = self.health.with_probe(probe);
        self
    }

    pub fn with_robustness(mut self, robustness: RobustnessConfig) -> Self {
        self.robustness = robustness;
        self.backups = self.backups.with_robustness(robustness);
        self
    }

    /// Directives run against every composed file, in order.
    pub fn set_patches(&mut self, patches: Vec<PatchDirective>) {
        self.patches = patches;
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    pub fn health(&self) -> &HealthChecker {
        &self.health
    }

    /// Resolve the target to an existing file.
    pub fn resolve_target(&self) -> std::result::Result<NormalizedPath, ApplyFailure> {
        let target = NormalizedPath::resolve(self.context.target()).ok_or(ApplyFailure::PathUnresolved)?;
        if !target.is_file() {
            return Err(ApplyFailure::TargetMissing);
        }
        Ok(target)
    }

    /// Make the managed block carry `body`.
    ///
    /// An empty body removes the block. Expected failures come back as
    /// [`ApplyOutcome::Failed`] or [`ApplyOutcome::RolledBack`]; only a
    /// failed restore after an unhealthy write is returned as `Err`.
    pub fn apply_managed_block<S: AsRef<str>>(
        &self,
        body: &str,
        host: &str,
        version: &str,
        legacy_labels: &[S],
    ) -> Result<ApplyOutcome> {
        let target = match self.resolve_target() {
            Ok(target) => target,
            Err(failure) => {
                warn!(path = %self.context.target().display(), %failure, "apply aborted");
                return Ok(ApplyOutcome::Failed(failure));
            }
        };
        let label = self.settings.marker_label.as_str();
        let body = canonical_body(body);

        let current = match io::read_text(&target) {
            Ok(text) => normalize_line_endings(&text, false),
            Err(e) => {
                warn!(path = %target, error = %e, "apply aborted; target left untouched");
                return Ok(ApplyOutcome::Failed(ApplyFailure::TargetUnreadable {
                    reason: e.to_string(),
                }));
            }
        };
        let has_block = find_block_span(&current, label).is_some();
        let has_legacy = has_legacy_blocks(&current, legacy_labels, label);

        if body.is_empty() {
            if !has_block && !has_legacy {
                debug!("no block and no legacy blocks; nothing to remove");
                return Ok(ApplyOutcome::Unchanged);
            }
            return self.remove_managed_block(&target, &current, legacy_labels);
        }

        let migrated = remove_legacy_blocks(&current, legacy_labels, label).text;
        let block = ManagedBlock::new(label, &self.settings.product, version, host, &body, Utc::now());
        let span = find_block_span(&migrated, label);
        let injected = inject_block(&migrated, span, &block.render());
        let patched = apply_patches(&injected, &self.patches, label);
        let candidate = ensure_single_trailing_newline(&patched.text);

        if self.is_noop(&candidate, &current) {
            debug!(checksum = %block.checksum(), "checksum unchanged; skipping write");
            return Ok(ApplyOutcome::Unchanged);
        }

        if let Some(failure) = self.write_with_backup(&target, &candidate) {
            return Ok(ApplyOutcome::Failed(failure));
        }
        info!(path = %target, checksum = %block.checksum(), "wrote managed block");

        if let Some(outcome) = self.verify_or_restore(&target)? {
            return Ok(outcome);
        }
        Ok(ApplyOutcome::Written {
            checksum: block.checksum().to_string(),
        })
    }

    /// Hash of the body currently on disk, or `None` when the file is
    /// unreadable or has no managed block. `None` never means "hash of
    /// empty content".
    pub fn get_current_body_hash(&self) -> Option<String> {
        let target = NormalizedPath::resolve(self.context.target())?;
        let text = io::read_text_lossy(&target).ok()?;
        body_hash_in(&text, &self.settings.marker_label)
    }

    fn remove_managed_block<S: AsRef<str>>(
        &self,
        target: &NormalizedPath,
        current: &str,
        legacy_labels: &[S],
    ) -> Result<ApplyOutcome> {
        let label = self.settings.marker_label.as_str();
        let migrated = remove_legacy_blocks(current, legacy_labels, label).text;
        let stripped = match find_block_span(&migrated, label) {
            Some(span) => remove_span(&migrated, span),
            None => migrated,
        };
        let patched = apply_patches(&stripped, &self.patches, label);
        let text = ensure_single_trailing_newline(&collapse_blank_lines(&patched.text));

        if let Some(failure) = self.write_with_backup(target, &text) {
            return Ok(ApplyOutcome::Failed(failure));
        }
        info!(path = %target, "removed managed block");

        if let Some(outcome) = self.verify_or_restore(target)? {
            return Ok(outcome);
        }
        Ok(ApplyOutcome::Removed)
    }

    /// Compare with the STATE line swapped for the current one, so only
    /// the checksum and content decide, never the timestamp.
    fn is_noop(&self, candidate: &str, current: &str) -> bool {
        let label = self.settings.marker_label.as_str();
        let (Some(current_span), Some(candidate_span)) =
            (find_block_span(current, label), find_block_span(candidate, label))
        else {
            return false;
        };
        let (Some((_, current_state)), Some((_, candidate_state))) = (
            StateLine::find_with_span(&current[current_span.clone()]),
            StateLine::find_with_span(&candidate[candidate_span.clone()]),
        ) else {
            return false;
        };

        let current_line = &current[current_span.start + current_state.start..current_span.start + current_state.end];
        let start = candidate_span.start + candidate_state.start;
        let end = candidate_span.start + candidate_state.end;
        let substituted = format!("{}{}{}", &candidate[..start], current_line, &candidate[end..]);
        substituted == current
    }

    /// Refresh the backup, then write. Nothing is written without a fresh
    /// backup.
    fn write_with_backup(&self, target: &NormalizedPath, content: &str) -> Option<ApplyFailure> {
        if let Err(e) = self.backups.refresh(target) {
            warn!(path = %target, error = %e, "backup refresh failed; target untouched");
            return Some(ApplyFailure::BackupRefreshFailed {
                reason: e.to_string(),
            });
        }
        if let Err(e) = io::write_text(target, content, self.robustness) {
            warn!(path = %target, error = %e, "atomic write failed");
            return Some(ApplyFailure::WriteFailed {
                reason: e.to_string(),
            });
        }
        None
    }

    fn verify_or_restore(&self, target: &NormalizedPath) -> Result<Option<ApplyOutcome>> {
        let diagnosis = self.health.diagnose(&self.context);
        if !diagnosis.has_issues() {
            return Ok(None);
        }
        let issues = diagnosis.issues();
        warn!(path = %target, ?issues, "unhealthy after write; restoring backup");
        self.backups.restore(target)?;
        Ok(Some(ApplyOutcome::RolledBack { issues }))
    }
}
