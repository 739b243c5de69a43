//! Normalized path handling for the managed file and its siblings

use std::path::{Path, PathBuf};

/// A path normalized to use forward slashes internally.
///
/// The managed file, its rolling backup, its lock file and its temporary
/// write files all live side by side, so most derived paths are built with
/// [`NormalizedPath::with_suffix`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedPath {
    inner: String,
}

impl NormalizedPath {
    /// Wrap any path-like input, converting backslashes.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path_str = path.as_ref().to_string_lossy();
        Self {
            inner: path_str.replace('\\', "/"),
        }
    }

    /// Resolve a path to its canonical absolute form.
    ///
    /// Returns `None` when the path (or its parent directory, for files that
    /// do not exist yet) cannot be resolved.
    pub fn resolve(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        if let Ok(canonical) = dunce::canonicalize(path) {
            return Some(Self::new(canonical));
        }
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let name = path.file_name()?;
        dunce::canonicalize(parent)
            .ok()
            .map(|dir| Self::new(dir.join(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Native form for `std::fs` calls.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// Sibling path formed by appending `suffix` to the file name.
    ///
    /// `.htaccess` with suffix `.nfd-backup` becomes `.htaccess.nfd-backup`.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        Self {
            inner: format!("{}{}", self.inner.trim_end_matches('/'), suffix),
        }
    }

    /// Final component, used to name temporary siblings.
    pub fn file_name(&self) -> Option<&str> {
        let trimmed = self.inner.trim_end_matches('/');
        trimmed.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Config format is chosen by this. Dot-files such as `.htaccess`
    /// have no extension.
    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 {
                None
            } else {
                Some(&name[idx + 1..])
            }
        })
    }

    pub fn exists(&self) -> bool {
        self.to_native().exists()
    }

    /// Whether the target is a regular file; apply refuses anything else.
    pub fn is_file(&self) -> bool {
        self.to_native().is_file()
    }
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}
