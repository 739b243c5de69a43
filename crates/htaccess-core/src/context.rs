//! Read-only snapshot of the site an apply runs against.

use std::path::{Path, PathBuf};

use serde::Serialize;
use url::Url;

/// Host used in the `# Managed by` line when nothing better is known.
pub const FALLBACK_HOST: &str = "localhost";

/// Site facts handed to fragments and to the apply pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Context {
    target: PathBuf,
    host: String,
    home_url: Option<String>,
    site_url: Option<String>,
    #[serde(skip)]
    host_overridden: bool,
}

impl Context {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            host: FALLBACK_HOST.to_string(),
            home_url: None,
            site_url: None,
            host_overridden: false,
        }
    }

    /// Set the public home URL. Unless a host was set explicitly, the host
    /// is taken from this URL.
    pub fn with_home_url(mut self, home_url: impl Into<String>) -> Self {
        let home_url = home_url.into();
        if !self.host_overridden
            && let Some(host) = host_of(&home_url)
        {
            self.host = host;
        }
        self.home_url = Some(home_url);
        self
    }

    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self.host_overridden = true;
        self
    }

    /// Path of the managed file, as configured.
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn home_url(&self) -> Option<&str> {
        self.home_url.as_deref()
    }

    pub fn site_url(&self) -> Option<&str> {
        self.site_url.as_deref()
    }
}

/// Host component of `url`, if it parses and has one.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}
