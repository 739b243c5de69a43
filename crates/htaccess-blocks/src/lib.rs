//! Marker-delimited block handling for a shared `.htaccess` file.
//!
//! A managed block is a region of the form:
//!
//! ```text
//! # BEGIN NFD Htaccess
//! # Managed by NFD Htaccess Manager v1.2.0 (example.com)
//! # STATE sha256: <64 hex> applied: 2026-01-01T00:00:00Z
//!
//! <body>
//! # END NFD Htaccess
//! ```
//!
//! Everything outside the block belongs to someone else. The modules here
//! are pure text transformations; file I/O lives in `htaccess-fs` and the
//! write pipeline in `htaccess-core`.
//!
//! - [`text`]: line-ending, blank-line and trailing-newline normalization
//! - [`parser`]: marker spans, marker-region extraction, STATE line parsing
//! - [`writer`]: block rendering, injection and removal
//! - [`migrate`]: removal of previous-generation marker blocks
//! - [`validate`]: line-oriented syntax checks and remediation
//! - [`patch`]: scoped regex directives applied after composition

pub mod error;
pub mod migrate;
pub mod parser;
pub mod patch;
pub mod text;
pub mod validate;
pub mod writer;

pub use error::{Error, Result};
pub use migrate::{Migration, has_legacy_blocks, remove_legacy_blocks};
pub use parser::{StateLine, extract_marker_lines, extract_marker_text, find_block_span, has_block};
pub use patch::{PatchDirective, PatchOutcome, PatchScope, WP_BLOCK_LABEL, apply_patches};
pub use validate::{ValidationReport, Validator};
pub use writer::{ManagedBlock, inject_block, remove_block};

/// Marker label of the block this engine owns unless configured otherwise.
pub const DEFAULT_MARKER_LABEL: &str = "NFD Htaccess";
