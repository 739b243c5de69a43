//! Atomic I/O operations
//!
//! Every mutation of the managed file or its backup goes through
//! [`write_atomic`]: readers only ever observe the old content or the
//! complete new content.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::{debug, warn};

use crate::{Error, NormalizedPath, Result};

/// Tuning knobs for atomic writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobustnessConfig {
    /// Flush the temporary file to disk before it is moved into place.
    /// Failures to flush are logged, never fatal.
    pub enable_fsync: bool,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self { enable_fsync: true }
    }
}

/// Write content atomically to a file.
///
/// The data goes to `<name>.tmp-<random>` next to the target first. When the
/// target already exists its permission bits are copied onto the temporary
/// file, which is then renamed over the target. If the rename fails (for
/// example across a bind mount) the temporary file is copied over the target
/// instead. The temporary file is removed on every path.
pub fn write_atomic(path: &NormalizedPath, content: &[u8], config: RobustnessConfig) -> Result<()> {
    let native_path = path.to_native();
    let dir = match native_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    let prefix = format!("{}.tmp-", path.file_name().unwrap_or("file"));

    // Dropping the handle deletes the temp file unless it was persisted
    let mut temp = tempfile::Builder::new()
        .prefix(&prefix)
        .rand_bytes(8)
        .tempfile_in(&dir)
        .map_err(|e| Error::io(&dir, e))?;

    temp.write_all(content)
        .map_err(|e| Error::io(temp.path(), e))?;

    if config.enable_fsync
        && let Err(e) = temp.as_file().sync_all()
    {
        debug!(path = %temp.path().display(), error = %e, "fsync failed; continuing");
    }

    if let Ok(meta) = fs::metadata(&native_path)
        && let Err(e) = fs::set_permissions(temp.path(), meta.permissions())
    {
        warn!(path = %native_path.display(), error = %e, "could not carry permissions onto temp file");
    }

    match temp.persist(&native_path) {
        Ok(_) => Ok(()),
        Err(tempfile::PersistError { error, file }) => {
            debug!(
                path = %native_path.display(),
                error = %error,
                "rename failed; falling back to copy"
            );
            fs::copy(file.path(), &native_path).map_err(|source| Error::PersistFailed {
                path: native_path.clone(),
                source,
            })?;
            Ok(())
        }
    }
}

/// Read a file that is about to be rewritten.
///
/// Bytes that are not valid UTF-8 are an error: a lossy decode written back
/// would corrupt content this crate does not own.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    let bytes = fs::read(&native_path).map_err(|e| Error::io(&native_path, e))?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidUtf8 {
        path: native_path,
        offset: e.utf8_error().valid_up_to(),
    })
}

/// Read a file for inspection only, replacing invalid UTF-8.
///
/// Never feed the result back into a write.
pub fn read_text_lossy(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    let bytes = fs::read(&native_path).map_err(|e| Error::io(&native_path, e))?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            debug!(path = %native_path.display(), "file is not valid UTF-8; replacing invalid bytes for inspection");
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

/// Lossy read for inspection, treating an unreadable file as empty.
pub fn read_text_or_empty(path: &NormalizedPath) -> String {
    match read_text_lossy(path) {
        Ok(text) => text,
        Err(e) => {
            debug!(error = %e, "treating unreadable file as empty");
            String::new()
        }
    }
}

/// Write text content to a file atomically.
pub fn write_text(path: &NormalizedPath, content: &str, config: RobustnessConfig) -> Result<()> {
    write_atomic(path, content.as_bytes(), config)
}
