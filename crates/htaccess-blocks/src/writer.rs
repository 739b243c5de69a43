//! Block rendering, injection and removal.

use std::ops::Range;

use chrono::{DateTime, Utc};
use htaccess_fs::checksum::sha256_hex;

use crate::error::{Error, Result};
use crate::parser::{StateLine, find_block_span};
use crate::text::{MANAGED_BY_PREFIX, canonical_body};

/// The block this engine owns, ready to be rendered into the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedBlock {
    pub marker_label: String,
    pub managed_by_line: String,
    pub state: StateLine,
    /// Canonical body text; its hash is the block's identity.
    pub body: String,
}

impl ManagedBlock {
    /// Build a block from raw body text.
    ///
    /// The body is canonicalized before hashing, so CRLF input or stray
    /// blank lines never change the checksum.
    pub fn new(
        marker_label: &str,
        product: &str,
        version: &str,
        host: &str,
        body: &str,
        applied_at: DateTime<Utc>,
    ) -> Self {
        let body = canonical_body(body);
        let checksum = sha256_hex(&body);
        Self {
            marker_label: marker_label.to_string(),
            managed_by_line: format!("{MANAGED_BY_PREFIX}{product} v{version} ({host})"),
            state: StateLine::new(checksum, applied_at),
            body,
        }
    }

    pub fn checksum(&self) -> &str {
        &self.state.checksum
    }

    /// Render the block from `# BEGIN` to `# END`, without a trailing
    /// newline. The blank separator is only emitted for a non-empty body.
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("# BEGIN {}", self.marker_label),
            self.managed_by_line.clone(),
            self.state.render(),
        ];
        if !self.body.is_empty() {
            lines.push(String::new());
            lines.push(self.body.clone());
        }
        lines.push(format!("# END {}", self.marker_label));
        lines.join("\n")
    }
}

/// Place a rendered block into `text`.
///
/// With a span, the span is replaced in place. Without one the block is
/// appended, preceded by a newline only when the text is non-empty and
/// does not already end with one.
pub fn inject_block(text: &str, span: Option<Range<usize>>, rendered: &str) -> String {
    match span {
        Some(span) => {
            let mut out = String::with_capacity(text.len() + rendered.len());
            out.push_str(&text[..span.start]);
            out.push_str(rendered);
            out.push_str(&text[span.end..]);
            out
        }
        None => {
            let mut out = String::with_capacity(text.len() + rendered.len() + 2);
            out.push_str(text);
            if !text.is_empty() && !text.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(rendered);
            out.push('\n');
            out
        }
    }
}

/// Cut a span out of `text`, together with the newline that ends it.
pub fn remove_span(text: &str, span: Range<usize>) -> String {
    let mut end = span.end;
    if text[end..].starts_with('\n') {
        end += 1;
    }
    let mut out = String::with_capacity(text.len() - (end - span.start));
    out.push_str(&text[..span.start]);
    out.push_str(&text[end..]);
    out
}

/// Remove the block labelled `label`, BEGIN through END inclusive.
///
/// # Errors
/// Returns `Error::BlockNotFound` if no complete block with that label exists.
pub fn remove_block(text: &str, label: &str) -> Result<String> {
    let span = find_block_span(text, label).ok_or_else(|| Error::BlockNotFound {
        label: label.to_string(),
    })?;
    Ok(remove_span(text, span))
}
