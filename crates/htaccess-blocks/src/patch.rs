//! Scoped regex patch directives.
//!
//! Fragments sometimes need to adjust text they do not own, most often the
//! WordPress block. Directives run after the managed block has been
//! composed, in registration order. A directive that cannot compile or
//! whose scope is absent is skipped; it never aborts the apply.

use std::ops::Range;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::parser::find_block_span;
use crate::text::is_marker_line;

/// Marker label of the block WordPress core maintains.
pub const WP_BLOCK_LABEL: &str = "WordPress";

/// Region a directive is allowed to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchScope {
    Full,
    WpBlock,
    ManagedBlock,
}

/// A find/replace applied to one region of the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchDirective {
    pub scope: PatchScope,
    pub pattern: String,
    pub replacement: String,
    /// Maximum replacements; `None` replaces every match.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl PatchDirective {
    pub fn new(scope: PatchScope, pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            scope,
            pattern: pattern.into(),
            replacement: replacement.into(),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Compile the directive's pattern.
    ///
    /// # Errors
    /// Returns `Error::InvalidPattern` when the regex does not compile.
    pub fn compile(&self) -> Result<Regex> {
        Regex::new(&self.pattern).map_err(|source| Error::InvalidPattern {
            pattern: self.pattern.clone(),
            source,
        })
    }
}

/// Result of running a directive list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub text: String,
    /// Directives that changed the text.
    pub applied: usize,
    /// Directives skipped because their pattern was invalid or their
    /// scope was absent.
    pub skipped: usize,
}

/// Tracked regions, kept in step with the text as patches change lengths.
#[derive(Debug, Clone)]
struct Spans {
    managed: Option<Range<usize>>,
    wp: Option<Range<usize>>,
}

impl Spans {
    fn locate(text: &str, marker_label: &str) -> Self {
        Self {
            managed: find_block_span(text, marker_label),
            wp: find_block_span(text, WP_BLOCK_LABEL),
        }
    }

    fn region(&self, scope: PatchScope, len: usize) -> Option<Range<usize>> {
        match scope {
            PatchScope::Full => Some(0..len),
            PatchScope::WpBlock => self.wp.clone(),
            PatchScope::ManagedBlock => self.managed.clone(),
        }
    }
}

/// Shift `span` to account for `region` growing or shrinking by `delta`.
///
/// Returns `false` when the span overlaps the region without enclosing it,
/// such as a block nested inside the patched one. Its offsets are then
/// stale and the caller must locate it again.
fn adjust(span: &mut Option<Range<usize>>, region: &Range<usize>, delta: isize) -> bool {
    let Some(s) = span.as_mut() else {
        return true;
    };
    let shift = |v: usize| v.saturating_add_signed(delta);
    if s.end <= region.start {
        true
    } else if s.start >= region.end {
        *s = shift(s.start)..shift(s.end);
        true
    } else if s.start <= region.start && s.end >= region.end {
        s.end = shift(s.end);
        true
    } else {
        false
    }
}

/// Whether `span` still starts at the BEGIN marker for `label`.
fn starts_at_marker(text: &str, span: &Option<Range<usize>>, label: &str) -> bool {
    span.as_ref().is_none_or(|s| {
        text.get(s.clone())
            .and_then(|slice| slice.split('\n').next())
            .is_some_and(|line| is_marker_line(line, "BEGIN", label))
    })
}

/// Apply `directives` in order against `text`.
pub fn apply_patches(text: &str, directives: &[PatchDirective], marker_label: &str) -> PatchOutcome {
    let mut text = text.to_string();
    let mut spans = Spans::locate(&text, marker_label);
    let mut applied = 0usize;
    let mut skipped = 0usize;

    for directive in directives {
        let re = match directive.compile() {
            Ok(re) => re,
            Err(e) => {
                warn!(error = %e, "skipping patch directive");
                skipped += 1;
                continue;
            }
        };
        let Some(region) = spans.region(directive.scope, text.len()) else {
            debug!(scope = ?directive.scope, "patch scope not present; skipping");
            skipped += 1;
            continue;
        };

        let slice = &text[region.clone()];
        let replaced = match directive.limit {
            Some(limit) => re.replacen(slice, limit, directive.replacement.as_str()),
            None => re.replace_all(slice, directive.replacement.as_str()),
        };
        if replaced == slice {
            continue;
        }

        let delta = replaced.len() as isize - slice.len() as isize;
        let patched = format!("{}{}{}", &text[..region.start], replaced, &text[region.end..]);
        text = patched;
        applied += 1;

        match directive.scope {
            PatchScope::Full => spans = Spans::locate(&text, marker_label),
            PatchScope::WpBlock | PatchScope::ManagedBlock => {
                let managed_tracked = adjust(&mut spans.managed, &region, delta);
                let wp_tracked = adjust(&mut spans.wp, &region, delta);
                // A patch that rewrote a marker invalidates offsets
                if !managed_tracked
                    || !wp_tracked
                    || !starts_at_marker(&text, &spans.managed, marker_label)
                    || !starts_at_marker(&text, &spans.wp, WP_BLOCK_LABEL)
                {
                    spans = Spans::locate(&text, marker_label);
                }
            }
        }
    }

    PatchOutcome {
        text,
        applied,
        skipped,
    }
}
