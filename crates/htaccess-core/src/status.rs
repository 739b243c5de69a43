//! Drift status of the managed block

use std::path::PathBuf;

use htaccess_blocks::Validator;
use htaccess_blocks::text::normalize_line_endings;
use htaccess_fs::{NormalizedPath, io};
use serde::{Deserialize, Serialize};

use crate::config::EngineSettings;
use crate::merger::body_hash_in;

/// Status of the managed block on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    /// The block carries the expected body
    Ok,
    /// A body is expected but the file has no block
    Missing,
    /// The block's body differs from the expected one
    Mismatch,
    /// The file fails validation
    Invalid,
    /// The file could not be read
    Error,
}

impl BlockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Missing => "missing",
            Self::Mismatch => "mismatch",
            Self::Invalid => "invalid",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report from a status check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: BlockStatus,
    pub target: PathBuf,
    /// Hash the composed body would carry; `None` when no block is wanted.
    pub expected_hash: Option<String>,
    /// Hash of the body on disk; `None` when there is no block.
    pub current_hash: Option<String>,
    pub issues: Vec<String>,
}

impl StatusReport {
    pub fn is_ok(&self) -> bool {
        self.status == BlockStatus::Ok
    }

    /// Compare the file at `target` with `expected_hash`.
    ///
    /// Checks run in order: unreadable file, missing block, invalid file,
    /// hash mismatch.
    pub fn evaluate(target: &NormalizedPath, settings: &EngineSettings, expected_hash: Option<String>) -> Self {
        let mut report = Self {
            status: BlockStatus::Ok,
            target: target.to_native(),
            expected_hash,
            current_hash: None,
            issues: Vec::new(),
        };

        let text = match io::read_text_lossy(target) {
            Ok(text) => normalize_line_endings(&text, false),
            Err(e) => {
                report.status = BlockStatus::Error;
                report.issues.push(e.to_string());
                return report;
            }
        };

        report.current_hash = body_hash_in(&text, &settings.marker_label);
        if report.current_hash.is_none() {
            if report.expected_hash.is_some() {
                report.status = BlockStatus::Missing;
                report.issues.push(format!("no \"# BEGIN {}\" block", settings.marker_label));
            }
            return report;
        }

        let validation = Validator::new(&settings.marker_label)
            .validate_file(&text, &settings.effective_exclusive_labels());
        if !validation.is_valid() {
            report.status = BlockStatus::Invalid;
            report.issues = validation.errors;
            return report;
        }

        if report.current_hash != report.expected_hash {
            report.status = BlockStatus::Mismatch;
            report.issues.push("managed block differs from composed fragments".to_string());
        }
        report
    }
}
