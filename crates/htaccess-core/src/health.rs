//! Post-write health checks
//!
//! Two signals: the whole file must pass the validator, and the site's home
//! URL must not answer with a server error. A probe that cannot connect
//! reports status 0 and does not count against the file.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use htaccess_blocks::Validator;
use htaccess_blocks::text::normalize_line_endings;
use htaccess_fs::{NormalizedPath, io};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::Context;

/// Reachability probe for a URL.
pub trait Probe: Send + Sync {
    /// HTTP status returned for `url`, or `None` when no response arrived.
    fn status(&self, url: &str) -> Option<u16>;
}

/// Probe issuing a HEAD request, falling back to GET.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    agent: ureq::Agent,
}

impl HttpProbe {
    pub fn new(timeout: Duration, max_redirects: u32) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .redirects(max_redirects)
            .build();
        Self { agent }
    }

    fn get(&self, url: &str) -> Option<u16> {
        match self.agent.get(url).call() {
            Ok(resp) => Some(resp.status()),
            Err(ureq::Error::Status(code, _)) => Some(code),
            Err(ureq::Error::Transport(err)) => {
                warn!(url, error = %err, "health probe got no response");
                None
            }
        }
    }
}

impl Probe for HttpProbe {
    fn status(&self, url: &str) -> Option<u16> {
        match self.agent.head(url).call() {
            Ok(resp) => Some(resp.status()),
            Err(ureq::Error::Status(405, _)) => self.get(url),
            Err(ureq::Error::Status(code, _)) => Some(code),
            Err(ureq::Error::Transport(err)) => {
                debug!(url, error = %err, "HEAD failed; retrying with GET");
                self.get(url)
            }
        }
    }
}

/// Result of one health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub file_valid: bool,
    pub file_issues: Vec<String>,
    /// 0 when the site was not probed or did not answer.
    pub http_status: u16,
    /// Status in `[200, 400)`.
    pub reachable: bool,
}

impl Diagnosis {
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.http_status)
    }

    /// Whether this diagnosis should trigger a rollback.
    pub fn has_issues(&self) -> bool {
        !self.file_valid || self.is_server_error()
    }

    /// Human-readable reasons behind [`Diagnosis::has_issues`].
    pub fn issues(&self) -> Vec<String> {
        let mut issues = self.file_issues.clone();
        if self.is_server_error() {
            issues.push(format!("home URL answered HTTP {}", self.http_status));
        }
        issues
    }
}

/// Validates the file on disk and probes the site.
#[derive(Clone)]
pub struct HealthChecker {
    marker_label: String,
    exclusive_labels: Vec<String>,
    probe: Option<Arc<dyn Probe>>,
}

impl fmt::Debug for HealthChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthChecker")
            .field("marker_label", &self.marker_label)
            .field("exclusive_labels", &self.exclusive_labels)
            .field("probe", &self.probe.is_some())
            .finish()
    }
}

impl HealthChecker {
    pub fn new(marker_label: impl Into<String>, exclusive_labels: Vec<String>) -> Self {
        Self {
            marker_label: marker_label.into(),
            exclusive_labels,
            probe: None,
        }
    }

    pub fn with_probe(mut self, probe: Option<Arc<dyn Probe>>) -> Self {
        self.probe = probe;
        self
    }

    /// Validate the whole target file and probe the home URL.
    pub fn diagnose(&self, ctx: &Context) -> Diagnosis {
        let text = normalize_line_endings(&io::read_text_or_empty(&NormalizedPath::new(ctx.target())), false);
        let validator = Validator::new(&self.marker_label);
        let report = validator.validate_file(&text, &self.exclusive_labels);

        let http_status = match (&self.probe, ctx.home_url()) {
            (Some(probe), Some(url)) => probe.status(url).unwrap_or(0),
            _ => 0,
        };

        let diagnosis = Diagnosis {
            file_valid: report.is_valid(),
            file_issues: report.errors,
            http_status,
            reachable: (200..400).contains(&http_status),
        };
        debug!(
            file_valid = diagnosis.file_valid,
            http_status = diagnosis.http_status,
            "diagnosed target"
        );
        diagnosis
    }

    /// True when the file is invalid or the site answers with a 5xx.
    pub fn scan_for_issues(&self, ctx: &Context) -> bool {
        self.diagnose(ctx).has_issues()
    }
}
