//! Line-oriented syntax checks and conservative remediation.
//!
//! This is not an Apache config parser. It catches the damage that breaks a
//! site in practice: unbalanced `<IfModule>` sections, crossed or unclosed
//! marker pairs, broken rewrite flag brackets, PHP handler overrides and
//! duplicated exclusive blocks.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::parser::{extract_marker_lines, find_block_span};
use crate::text::{collapse_blank_lines, ensure_single_trailing_newline, is_marker_line, marker_label};

static IFMODULE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*<IfModule\s+([^>]*)>").expect("Invalid IfModule regex"));

static IFMODULE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*</IfModule\s*>").expect("Invalid IfModule regex"));

static REWRITE_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(RewriteRule|RewriteCond)\b").expect("Invalid rewrite regex"));

static FORBIDDEN_HANDLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(AddHandler|SetHandler|AddType)\b.*(application/x-httpd-php|php)")
        .expect("Invalid handler regex")
});

static DOUBLED_FLAG_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\](\s*)$").expect("Invalid flag regex"));

/// Errors found by one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Syntax checker bound to the active marker label.
///
/// Handler directives are only policed inside the managed block when a full
/// file is validated; foreign content may legitimately configure PHP.
#[derive(Debug, Clone)]
pub struct Validator {
    marker_label: String,
    errors: Vec<String>,
}

impl Validator {
    pub fn new(marker_label: impl Into<String>) -> Self {
        Self {
            marker_label: marker_label.into(),
            errors: Vec::new(),
        }
    }

    /// Validate `text`, keeping the errors for [`Validator::errors`].
    ///
    /// Text containing the active block is treated as a full file; anything
    /// else as a body.
    pub fn is_valid<S: AsRef<str>>(&mut self, text: &str, exclusive_labels: &[S]) -> bool {
        let report = if find_block_span(text, &self.marker_label).is_some() {
            self.validate_file(text, exclusive_labels)
        } else {
            self.validate_body(text, exclusive_labels)
        };
        let valid = report.is_valid();
        self.errors = report.errors;
        valid
    }

    /// Errors from the most recent [`Validator::is_valid`] call.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Validate a whole file. Handler directives are checked only inside
    /// the active managed block, if one exists.
    pub fn validate_file<S: AsRef<str>>(&self, text: &str, exclusive_labels: &[S]) -> ValidationReport {
        let mut errors = self.structural_errors(text, exclusive_labels);
        if let Some(inner) = extract_marker_lines(text, &self.marker_label) {
            let offset = text
                .split('\n')
                .position(|l| is_marker_line(l, "BEGIN", &self.marker_label))
                .map_or(0, |idx| idx + 1);
            errors.extend(forbidden_handler_errors(inner.into_iter(), offset));
        }
        ValidationReport { errors }
    }

    /// Validate a body-only string. Every line is checked for handler
    /// directives.
    pub fn validate_body<S: AsRef<str>>(&self, text: &str, exclusive_labels: &[S]) -> ValidationReport {
        let mut errors = self.structural_errors(text, exclusive_labels);
        errors.extend(forbidden_handler_errors(text.split('\n'), 0));
        ValidationReport { errors }
    }

    /// Conservative fix-ups: drop PHP handler lines, repair a doubled `]]`
    /// closing a rewrite flag group, right-trim lines, collapse blank runs
    /// and end with one newline. Never invents missing markers.
    pub fn remediate(&self, text: &str) -> String {
        let lines: Vec<String> = text
            .split('\n')
            .filter(|line| !FORBIDDEN_HANDLER.is_match(line))
            .map(|line| {
                let line = if REWRITE_DIRECTIVE.is_match(line) {
                    DOUBLED_FLAG_CLOSE.replace(line, "]$1").into_owned()
                } else {
                    line.to_string()
                };
                line.trim_end().to_string()
            })
            .collect();
        ensure_single_trailing_newline(&collapse_blank_lines(&lines.join("\n")))
    }

    fn structural_errors<S: AsRef<str>>(&self, text: &str, exclusive_labels: &[S]) -> Vec<String> {
        let mut errors = Vec::new();
        check_ifmodule_balance(text, &mut errors);
        check_marker_balance(text, &mut errors);
        check_rewrite_brackets(text, &mut errors);
        check_exclusive_blocks(text, exclusive_labels, &mut errors);
        errors
    }
}

fn check_ifmodule_balance(text: &str, errors: &mut Vec<String>) {
    let mut stack: Vec<String> = Vec::new();
    for (idx, line) in text.split('\n').enumerate() {
        if let Some(caps) = IFMODULE_OPEN.captures(line) {
            stack.push(caps[1].trim().to_string());
        } else if IFMODULE_CLOSE.is_match(line) && stack.pop().is_none() {
            errors.push(format!("Line {}: unmatched </IfModule>", idx + 1));
        }
    }
    if !stack.is_empty() {
        errors.push(format!(
            "Unclosed <IfModule> block(s): {}",
            stack.join(", ")
        ));
    }
}

fn check_marker_balance(text: &str, errors: &mut Vec<String>) {
    let mut stack: Vec<String> = Vec::new();
    for (idx, line) in text.split('\n').enumerate() {
        if let Some(label) = marker_label(line, "BEGIN") {
            stack.push(label.to_string());
        } else if let Some(label) = marker_label(line, "END") {
            match stack.last() {
                Some(top) if top == label => {
                    stack.pop();
                }
                Some(top) => errors.push(format!(
                    "Line {}: BEGIN/END mismatch: expected \"# END {}\", found \"# END {}\"",
                    idx + 1,
                    top,
                    label
                )),
                None => errors.push(format!(
                    "Line {}: \"# END {}\" without matching BEGIN",
                    idx + 1,
                    label
                )),
            }
        }
    }
    if !stack.is_empty() {
        errors.push(format!(
            "Unclosed BEGIN marker(s): {}",
            stack.join(", ")
        ));
    }
}

fn check_rewrite_brackets(text: &str, errors: &mut Vec<String>) {
    for (idx, line) in text.split('\n').enumerate() {
        let Some(caps) = REWRITE_DIRECTIVE.captures(line) else {
            continue;
        };
        let open = line.matches('[').count();
        let close = line.matches(']').count();
        if open != close {
            errors.push(format!(
                "Line {}: unbalanced flag brackets in {} ({} '[' vs {} ']')",
                idx + 1,
                &caps[1],
                open,
                close
            ));
        }
    }
}

fn check_exclusive_blocks<S: AsRef<str>>(text: &str, labels: &[S], errors: &mut Vec<String>) {
    for label in labels {
        let label = label.as_ref();
        let count = text
            .split('\n')
            .filter(|line| is_marker_line(line, "BEGIN", label))
            .count();
        if count > 1 {
            errors.push(format!(
                "Duplicate \"# BEGIN {label}\" blocks: found {count}, expected at most 1"
            ));
        }
    }
}

fn forbidden_handler_errors<'a>(lines: impl Iterator<Item = &'a str>, line_offset: usize) -> Vec<String> {
    lines
        .enumerate()
        .filter(|(_, line)| FORBIDDEN_HANDLER.is_match(line))
        .map(|(idx, line)| {
            format!(
                "Line {}: forbidden handler directive: {}",
                idx + line_offset + 1,
                line.trim()
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NO_LABELS: &[&str] = &[];

    fn validator() -> Validator {
        Validator::new("NFD Htaccess")
    }

    #[test]
    fn unclosed_ifmodule_is_reported() {
        let mut v = validator();
        assert!(!v.is_valid("<IfModule mod_rewrite.c>\nRewriteRule x 1 [L]", NO_LABELS));
        assert!(v.errors().iter().any(|e| e.to_lowercase().contains("unclosed")));
        assert!(v.errors().iter().any(|e| e.contains("mod_rewrite.c")));
    }

    #[test]
    fn stray_ifmodule_close_is_reported() {
        let report = validator().validate_body("</IfModule>", NO_LABELS);
        assert_eq!(report.errors, vec!["Line 1: unmatched </IfModule>".to_string()]);
    }

    #[test]
    fn crossed_markers_are_reported() {
        let mut v = validator();
        assert!(!v.is_valid("# BEGIN Foo\n# END Bar", NO_LABELS));
        assert!(v.errors().iter().any(|e| e.contains("BEGIN/END mismatch")));
    }

    #[test]
    fn nested_markers_are_balanced() {
        let text = "# BEGIN Outer\n# BEGIN Inner\nx\n# END Inner\n# END Outer";
        assert!(validator().validate_body(text, NO_LABELS).is_valid());
    }

    #[test]
    fn rewrite_bracket_mismatch_names_the_line() {
        let report = validator().validate_body("RewriteEngine On\nRewriteRule ^a$ /b [L,R=301", NO_LABELS);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Line 2:"));
    }

    #[test]
    fn handler_lines_fail_a_body() {
        let report = validator().validate_body("AddHandler application/x-httpd-php81 .php", NO_LABELS);
        assert!(!report.is_valid());
    }

    #[test]
    fn handler_lines_outside_the_managed_block_are_ignored() {
        let file = "AddHandler application/x-httpd-php81 .php\n# BEGIN NFD Htaccess\nOptions -Indexes\n# END NFD Htaccess\n";
        assert!(validator().validate_file(file, NO_LABELS).is_valid());

        let file = "# BEGIN NFD Htaccess\nSetHandler php-script\n# END NFD Htaccess\n";
        let report = validator().validate_file(file, NO_LABELS);
        assert_eq!(
            report.errors,
            vec!["Line 2: forbidden handler directive: SetHandler php-script".to_string()]
        );
    }

    #[test]
    fn duplicate_exclusive_blocks_are_reported() {
        let file = "# BEGIN WordPress\n# END WordPress\n# BEGIN WordPress\n# END WordPress\n";
        let report = validator().validate_file(file, &["WordPress"]);
        assert!(report.errors.iter().any(|e| e.contains("Duplicate")));
        assert!(validator().validate_file(file, NO_LABELS).is_valid());
    }

    #[test]
    fn remediation_fixes_what_it_can() {
        let body = "AddType application/x-httpd-php .html\nRewriteRule ^a$ /b [L]]   \nHeader set X 1  \n\n\n\n\n";
        let fixed = validator().remediate(body);
        assert_eq!(fixed, "RewriteRule ^a$ /b [L]\nHeader set X 1\n");
        assert!(validator().validate_body(&fixed, NO_LABELS).is_valid());
    }

    #[test]
    fn remediation_does_not_invent_markers() {
        let body = "# BEGIN Foo\nRule";
        let fixed = validator().remediate(body);
        assert_eq!(fixed, "# BEGIN Foo\nRule\n");
        assert!(!validator().validate_body(&fixed, NO_LABELS).is_valid());
    }
}
