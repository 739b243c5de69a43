//! Engine configuration
//!
//! Loaded with [`htaccess_fs::ConfigStore`], so the same structure can be
//! written as TOML, JSON or YAML. Every field has a default; an absent file
//! yields a configuration that manages `.htaccess` in the working directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use htaccess_blocks::{DEFAULT_MARKER_LABEL, PatchDirective, WP_BLOCK_LABEL};
use htaccess_fs::{ConfigStore, LockOptions, NormalizedPath, io};
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::fragment::{DEFAULT_PRIORITY, StaticFragment};
use crate::health::{HttpProbe, Probe};
use crate::{Error, Result};

/// Configuration file looked up when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "htaccess.toml";

/// Product name written into the `# Managed by` line.
pub const DEFAULT_PRODUCT: &str = "NFD Htaccess Manager";

/// Suffix of the rolling backup next to the target.
pub const DEFAULT_BACKUP_SUFFIX: &str = ".nfd-backup";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub site: SiteConfig,
    pub engine: EngineSettings,
    pub lock: LockConfig,
    pub health: HealthConfig,
    pub fragments: Vec<FragmentConfig>,
}

/// `[site]`: where the file lives and how the site is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Managed file; relative paths resolve against the config directory.
    pub target: PathBuf,
    pub home_url: Option<String>,
    pub site_url: Option<String>,
    /// Overrides the host otherwise taken from `home_url`.
    pub host: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            target: PathBuf::from(".htaccess"),
            home_url: None,
            site_url: None,
            host: None,
        }
    }
}

/// `[engine]`: marker and labelling settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub marker_label: String,
    pub product: String,
    pub backup_suffix: String,
    /// Labels that may appear at most once in the file.
    pub exclusive_labels: Vec<String>,
    /// Labels of previous-generation blocks removed on every apply.
    pub legacy_labels: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            marker_label: DEFAULT_MARKER_LABEL.to_string(),
            product: DEFAULT_PRODUCT.to_string(),
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            exclusive_labels: vec![WP_BLOCK_LABEL.to_string()],
            legacy_labels: Vec::new(),
        }
    }
}

impl EngineSettings {
    /// Exclusive labels with the marker label always included.
    pub fn effective_exclusive_labels(&self) -> Vec<String> {
        let mut labels = self.exclusive_labels.clone();
        if !labels.iter().any(|l| l == &self.marker_label) {
            labels.push(self.marker_label.clone());
        }
        labels
    }
}

/// `[lock]`: lease lock timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub lease_secs: u64,
    /// How long to keep retrying a held lock; 0 tries once.
    pub wait_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_secs: 30,
            wait_ms: 0,
        }
    }
}

impl LockConfig {
    pub fn options(&self) -> LockOptions {
        LockOptions {
            lease: Duration::from_secs(self.lease_secs),
            wait: Duration::from_millis(self.wait_ms),
        }
    }
}

/// `[health]`: post-write reachability probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub probe: bool,
    pub timeout_secs: u64,
    pub max_redirects: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe: true,
            timeout_secs: 5,
            max_redirects: 3,
        }
    }
}

impl HealthConfig {
    /// The HTTP probe, unless probing is disabled.
    pub fn build_probe(&self) -> Option<Arc<dyn Probe>> {
        self.probe.then(|| {
            Arc::new(HttpProbe::new(
                Duration::from_secs(self.timeout_secs),
                self.max_redirects,
            )) as Arc<dyn Probe>
        })
    }
}

/// `[[fragments]]`: a fragment declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentConfig {
    pub id: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub content: Option<String>,
    /// Content file, relative to the config directory.
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub patches: Vec<PatchDirective>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_enabled() -> bool {
    true
}

impl EngineConfig {
    /// Load from `path`; the format follows the file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = ConfigStore::new().load(&NormalizedPath::new(path))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`EngineConfig::load`], but a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let config: Self = ConfigStore::new().load_or_default(&NormalizedPath::new(path))?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(Error::InvalidConfig { message });

        if self.engine.marker_label.trim().is_empty() {
            return invalid("engine.marker_label must not be empty".into());
        }
        if self.engine.backup_suffix.is_empty() {
            return invalid("engine.backup_suffix must not be empty".into());
        }

        let mut seen = HashSet::new();
        for fragment in &self.fragments {
            if fragment.id.trim().is_empty() {
                return invalid("fragment id must not be empty".into());
            }
            if !seen.insert(fragment.id.as_str()) {
                return invalid(format!("duplicate fragment id '{}'", fragment.id));
            }
            if fragment.content.is_some() && fragment.file.is_some() {
                return invalid(format!(
                    "fragment '{}' sets both content and file",
                    fragment.id
                ));
            }
        }
        Ok(())
    }

    /// Build the site context. Relative targets resolve against `base_dir`.
    pub fn context(&self, base_dir: &Path) -> Context {
        let mut ctx = Context::new(base_dir.join(&self.site.target));
        if let Some(host) = &self.site.host {
            ctx = ctx.with_host(host);
        }
        if let Some(home_url) = &self.site.home_url {
            ctx = ctx.with_home_url(home_url);
        }
        if let Some(site_url) = &self.site.site_url {
            ctx = ctx.with_site_url(site_url);
        }
        ctx
    }

    /// Turn `[[fragments]]` into providers, reading content files.
    pub fn fragments(&self, base_dir: &Path) -> Result<Vec<StaticFragment>> {
        self.fragments
            .iter()
            .map(|fragment| -> Result<StaticFragment> {
                let content = match (&fragment.content, &fragment.file) {
                    (Some(content), _) => content.clone(),
                    (None, Some(file)) => io::read_text(&NormalizedPath::new(base_dir.join(file)))?,
                    (None, None) => String::new(),
                };
                Ok(StaticFragment::new(&fragment.id, content)
                    .with_priority(fragment.priority)
                    .with_enabled(fragment.enabled)
                    .with_patches(fragment.patches.clone()))
            })
            .collect()
    }
}
