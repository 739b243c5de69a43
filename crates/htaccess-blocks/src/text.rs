//! Text normalization primitives
//!
//! Pure functions shared by every layer that reads or writes the file.

/// Prefix of the header line naming the product that owns the block.
pub const MANAGED_BY_PREFIX: &str = "# Managed by ";

/// Prefix of the header line carrying the body checksum.
pub const STATE_PREFIX: &str = "# STATE sha256: ";

/// Convert CRLF and lone CR line endings to LF.
///
/// With `trim_trailing` set, trailing newlines are removed as well.
pub fn normalize_line_endings(text: &str, trim_trailing: bool) -> String {
    let mut out = text.replace("\r\n", "\n").replace('\r', "\n");
    if trim_trailing {
        let len = out.trim_end_matches('\n').len();
        out.truncate(len);
    }
    out
}

/// Drop leading and trailing lines that contain only whitespace.
///
/// Indentation and trailing spaces of the remaining edge lines are kept.
pub fn trim_blank_edges(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let Some(start) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return String::new();
    };
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .unwrap_or(start);
    lines[start..=end].join("\n")
}

/// Collapse runs of three or more blank lines down to two.
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut blank_run = 0usize;
    for line in text.split('\n') {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push(line);
    }
    out.join("\n")
}

/// End the text with exactly one newline. Empty text stays empty.
pub fn ensure_single_trailing_newline(text: &str) -> String {
    let trimmed = text.trim_end_matches('\n');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

/// Canonical form of a body for hashing: LF endings, no leading or trailing
/// blank lines.
pub fn canonical_body(body: &str) -> String {
    trim_blank_edges(&normalize_line_endings(body, true))
}

/// Label of a `# <keyword> <label>` marker line.
///
/// This is the one marker grammar every reader shares: leading whitespace,
/// `#`, optional whitespace, the keyword, at least one whitespace character,
/// then the label. Surrounding whitespace is ignored, so hand-edited spacing
/// still identifies the block.
pub fn marker_label<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line
        .trim_start()
        .strip_prefix('#')?
        .trim_start()
        .strip_prefix(keyword)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let label = rest.trim();
    (!label.is_empty()).then_some(label)
}

/// Whether `line` is a `keyword` marker for exactly `label`.
pub fn is_marker_line(line: &str, keyword: &str, label: &str) -> bool {
    marker_label(line, keyword) == Some(label.trim())
}

/// Strip the two header lines and the blank separator that follows them
/// from the lines between a block's markers.
///
/// Nested `# BEGIN`/`# END` lines (patch history, embedded fragments) are
/// body content and are kept.
pub fn strip_block_header<'a>(inner: &[&'a str]) -> Vec<&'a str> {
    let mut out = Vec::with_capacity(inner.len());
    let mut seen_managed_by = false;
    let mut seen_state = false;
    let mut skip_separator = false;

    for line in inner {
        let trimmed = line.trim_start();
        if !seen_managed_by && trimmed.starts_with(MANAGED_BY_PREFIX.trim_end()) {
            seen_managed_by = true;
            continue;
        }
        if !seen_state && trimmed.starts_with(STATE_PREFIX.trim_end()) {
            seen_state = true;
            skip_separator = true;
            continue;
        }
        if skip_separator {
            skip_separator = false;
            if line.trim().is_empty() {
                continue;
            }
        }
        out.push(*line);
    }
    out
}
