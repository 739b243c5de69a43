//! SHA-256 checksum utilities
//!
//! The managed block's STATE line carries a bare 64-character lowercase hex
//! digest, so that is the only format produced here.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Length of a hex-encoded SHA-256 digest.
pub const SHA256_HEX_LEN: usize = 64;

/// Compute the SHA-256 digest of string content as lowercase hex.
pub fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compute the SHA-256 digest of a file's raw bytes as lowercase hex.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_file_checksum(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check that `value` looks like a digest produced by [`sha256_hex`].
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == SHA256_HEX_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
