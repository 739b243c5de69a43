//! Removal of legacy marker blocks.
//!
//! Earlier generations of the manager wrote their rules under other labels.
//! Those blocks are removed wholesale; the active managed block is cut out
//! of the buffer before matching so that removal can never reach into it.

use tracing::{debug, info};

use crate::parser::find_block_span;
use crate::text::{collapse_blank_lines, ensure_single_trailing_newline, normalize_line_endings};
use crate::writer::remove_span;

/// Result of a migration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub text: String,
    /// Number of legacy blocks removed.
    pub removed: usize,
}

/// Labels eligible for removal: trimmed, de-duplicated, never the active one.
fn effective_labels<S: AsRef<str>>(labels: &[S], active_label: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for label in labels {
        let label = label.as_ref().trim();
        if label.is_empty() || label.eq_ignore_ascii_case(active_label.trim()) {
            continue;
        }
        if !out.iter().any(|l| l == label) {
            out.push(label.to_string());
        }
    }
    out
}

/// Drop a leading BOM and unify line endings so marker lines can be found.
fn prepare(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    normalize_line_endings(text, false)
}

/// Non-breaking spaces hide marker spacing. Only foreign regions are
/// cleaned; the active block is never rewritten here.
fn clean_foreign(part: &str) -> String {
    part.replace('\u{a0}', " ")
}

/// Split `text` around the active managed block into cleaned head, the
/// untouched block, and cleaned tail.
fn split_around_active<'a>(text: &'a str, active_label: &str) -> (String, &'a str, String) {
    match find_block_span(text, active_label) {
        Some(span) => (
            clean_foreign(&text[..span.start]),
            &text[span.clone()],
            clean_foreign(&text[span.end..]),
        ),
        None => (clean_foreign(text), "", String::new()),
    }
}

/// Remove every complete `label` block from `part`, returning how many.
fn remove_all(part: &mut String, label: &str) -> usize {
    let mut count = 0usize;
    while let Some(span) = find_block_span(part, label) {
        *part = remove_span(part, span);
        count += 1;
    }
    count
}

/// Whether any of `labels` currently has a complete block outside the
/// active managed block. Read-only.
pub fn has_legacy_blocks<S: AsRef<str>>(text: &str, labels: &[S], active_label: &str) -> bool {
    let labels = effective_labels(labels, active_label);
    if labels.is_empty() {
        return false;
    }
    let prepared = prepare(text);
    let (head, _, tail) = split_around_active(&prepared, active_label);
    labels.iter().any(|label| {
        find_block_span(&head, label).is_some() || find_block_span(&tail, label).is_some()
    })
}

/// Remove every complete block for each of `labels`, leaving the active
/// managed block byte-for-byte untouched.
///
/// A BEGIN line without a matching END is left alone. When nothing is
/// removed the input is returned unchanged.
pub fn remove_legacy_blocks<S: AsRef<str>>(text: &str, labels: &[S], active_label: &str) -> Migration {
    let labels = effective_labels(labels, active_label);
    let unchanged = || Migration {
        text: text.to_string(),
        removed: 0,
    };
    if labels.is_empty() {
        return unchanged();
    }

    let prepared = prepare(text);
    let (mut head, managed, mut tail) = split_around_active(&prepared, active_label);
    let mut removed = 0usize;

    for label in &labels {
        for part in [&mut head, &mut tail] {
            let count = remove_all(part, label);
            if count > 0 {
                removed += count;
                debug!(label = %label, count, "removed legacy block");
            }
        }
    }

    if removed == 0 {
        return unchanged();
    }

    info!(removed, "migrated legacy marker blocks");
    let joined = format!("{head}{managed}{tail}");
    Migration {
        text: ensure_single_trailing_newline(&collapse_blank_lines(&joined)),
        removed,
    }
}
