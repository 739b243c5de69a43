//! [`TestSite`] builder for htaccess scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The block WordPress core writes for pretty permalinks.
pub const WORDPRESS_BLOCK: &str = "# BEGIN WordPress
<IfModule mod_rewrite.c>
RewriteEngine On
RewriteBase /
RewriteRule ^index\\.php$ - [L]
RewriteCond %{REQUEST_FILENAME} !-f
RewriteCond %{REQUEST_FILENAME} !-d
RewriteRule . /index.php [L]
</IfModule>
# END WordPress
";

/// A temporary site directory with helper methods for test setup and
/// assertion.
///
/// # Example
///
/// ```rust,no_run
/// use htaccess_test_utils::{TestSite, WORDPRESS_BLOCK};
///
/// let site = TestSite::with_htaccess(WORDPRESS_BLOCK);
/// site.assert_target_contains("# BEGIN WordPress");
/// ```
pub struct TestSite {
    temp_dir: TempDir,
}

impl Default for TestSite {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSite {
    /// Create an empty temporary directory with no `.htaccess` yet.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a site whose `.htaccess` holds `content`.
    pub fn with_htaccess(content: &str) -> Self {
        let site = Self::new();
        site.write_target(content);
        site
    }

    /// Root path of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of the managed `.htaccess`.
    pub fn target(&self) -> PathBuf {
        self.root().join(".htaccess")
    }

    /// Path of the rolling backup for `suffix`.
    pub fn backup(&self, suffix: &str) -> PathBuf {
        self.root().join(format!(".htaccess{suffix}"))
    }

    pub fn write_target(&self, content: &str) {
        fs::write(self.target(), content).unwrap();
    }

    /// Current content of `.htaccess`.
    ///
    /// # Panics
    /// Panics if the file cannot be read.
    pub fn read_target(&self) -> String {
        fs::read_to_string(self.target())
            .unwrap_or_else(|_| panic!("Could not read {}", self.target().display()))
    }

    /// Write `htaccess.toml` with `content` and return its path.
    pub fn write_config(&self, content: &str) -> PathBuf {
        self.write_file("htaccess.toml", content)
    }

    /// Write a file relative to the root, creating parent directories.
    pub fn write_file(&self, path: &str, content: &str) -> PathBuf {
        let full_path = self.root().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full_path, content).unwrap();
        full_path
    }

    /// Assert that `.htaccess` contains `needle`.
    ///
    /// # Panics
    /// Panics with the file content if it does not.
    pub fn assert_target_contains(&self, needle: &str) {
        let content = self.read_target();
        assert!(
            content.contains(needle),
            "Expected .htaccess to contain {needle:?}, got:\n{content}"
        );
    }

    /// Assert that `.htaccess` does **not** contain `needle`.
    pub fn assert_target_not_contains(&self, needle: &str) {
        let content = self.read_target();
        assert!(
            !content.contains(needle),
            "Expected .htaccess NOT to contain {needle:?}, got:\n{content}"
        );
    }

    /// Assert how many `# BEGIN <label>` lines `.htaccess` has.
    pub fn assert_block_count(&self, label: &str, expected: usize) {
        let begin = format!("# BEGIN {label}");
        let count = self
            .read_target()
            .lines()
            .filter(|line| line.trim() == begin)
            .count();
        assert_eq!(count, expected, "Unexpected number of {begin:?} lines");
    }
}
