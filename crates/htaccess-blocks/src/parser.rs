//! Marker parsing for `# BEGIN <label>` / `# END <label>` regions.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

use crate::text::{STATE_PREFIX, is_marker_line};

static STATE_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*# STATE sha256: ([0-9a-f]{64}) applied: (\S+)[ \t]*$")
        .expect("Invalid STATE line regex")
});

/// Byte span of the first `# BEGIN <label>` line through the next
/// `# END <label>` line, excluding the END line's newline.
///
/// Returns `None` when either marker is missing.
pub fn find_block_span(text: &str, label: &str) -> Option<Range<usize>> {
    let mut begin = None;
    let mut offset = 0usize;
    for line in text.split('\n') {
        let end = offset + line.len();
        match begin {
            None if is_marker_line(line, "BEGIN", label) => begin = Some(offset),
            Some(start) if is_marker_line(line, "END", label) => return Some(start..end),
            _ => {}
        }
        offset = end + 1;
    }
    None
}

/// Whether a complete block with `label` exists in `text`.
pub fn has_block(text: &str, label: &str) -> bool {
    find_block_span(text, label).is_some()
}

/// Lines strictly between `# BEGIN <label>` and the next `# END <label>`.
///
/// Leading whitespace before `#` is tolerated. Returns `None` unless both
/// markers are present.
pub fn extract_marker_lines<'a>(text: &'a str, label: &str) -> Option<Vec<&'a str>> {
    let lines: Vec<&str> = text.split('\n').collect();
    let begin = lines
        .iter()
        .position(|l| is_marker_line(l, "BEGIN", label))?;
    let end = lines[begin + 1..]
        .iter()
        .position(|l| is_marker_line(l, "END", label))?
        + begin
        + 1;
    Some(lines[begin + 1..end].to_vec())
}

/// Joined form of [`extract_marker_lines`].
pub fn extract_marker_text(text: &str, label: &str) -> Option<String> {
    extract_marker_lines(text, label).map(|lines| lines.join("\n"))
}

/// The `# STATE sha256: <hash> applied: <timestamp>` header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLine {
    /// Lowercase hex SHA-256 of the canonical body.
    pub checksum: String,
    /// When the block was last written, as RFC 3339 UTC text.
    pub applied_at: String,
}

impl StateLine {
    pub fn new(checksum: impl Into<String>, applied_at: DateTime<Utc>) -> Self {
        Self {
            checksum: checksum.into(),
            applied_at: applied_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Parse the first STATE line found in `text`.
    pub fn find(text: &str) -> Option<Self> {
        Self::find_with_span(text).map(|(state, _)| state)
    }

    /// Parse the first STATE line in `text` along with its byte span.
    pub fn find_with_span(text: &str) -> Option<(Self, Range<usize>)> {
        let caps = STATE_LINE_REGEX.captures(text)?;
        let whole = caps.get(0)?;
        Some((
            Self {
                checksum: caps.get(1)?.as_str().to_string(),
                applied_at: caps.get(2)?.as_str().to_string(),
            },
            whole.range(),
        ))
    }

    /// Render as a header line (no trailing newline).
    pub fn render(&self) -> String {
        format!("{STATE_PREFIX}{} applied: {}", self.checksum, self.applied_at)
    }
}
