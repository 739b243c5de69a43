//! The engine: fragment registry, dirty tracking and locked apply cycles
//!
//! An [`Engine`] is constructed once by its host and passed around by
//! reference. Until [`Engine::initialize`] supplies a [`Context`] it is
//! `Uninitialized`: registrations and dirty marks are queued and replayed in
//! order on the transition to `Ready`.

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use htaccess_blocks::Validator;
use htaccess_fs::{LeaseLock, LockOptions, NormalizedPath};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backup::BackupInfo;
use crate::config::{EngineConfig, EngineSettings};
use crate::context::Context;
use crate::fragment::{FragmentProvider, FragmentRegistry};
use crate::health::{Diagnosis, Probe};
use crate::merger::{ApplyFailure, ApplyOutcome, BlockMerger, expected_body_hash};
use crate::status::StatusReport;
use crate::{Error, Result};

/// Lifecycle state of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
}

/// A call buffered while the engine is uninitialized.
pub enum PendingOp {
    Register(Box<dyn FragmentProvider>),
    Unregister(String),
    MarkDirty,
}

impl fmt::Debug for PendingOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(fragment) => f.debug_tuple("Register").field(&fragment.id()).finish(),
            Self::Unregister(id) => f.debug_tuple("Unregister").field(id).finish(),
            Self::MarkDirty => f.write_str("MarkDirty"),
        }
    }
}

/// Result of an apply cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyReport {
    /// Another process holds the lease; nothing was attempted.
    Skipped,
    Completed(ApplyOutcome),
}

impl ApplyReport {
    /// Only a completed, unsuccessful pass is a failure. A skip is benign.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Completed(outcome) if !outcome.succeeded())
    }
}

/// Which body an apply cycle writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyMode {
    /// Validate the composed body, remediating once if needed.
    Validated,
    /// Remediate the composed body up front.
    Remediated,
}

pub struct Engine {
    settings: EngineSettings,
    lock_options: LockOptions,
    probe: Option<Arc<dyn Probe>>,
    version: String,
    registry: FragmentRegistry,
    pending: VecDeque<PendingOp>,
    dirty: bool,
    merger: Option<BlockMerger>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state())
            .field("settings", &self.settings)
            .field("version", &self.version)
            .field("registry", &self.registry)
            .field("pending", &self.pending)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Engine {
    pub fn new(settings: EngineSettings, lock_options: LockOptions) -> Self {
        Self {
            settings,
            lock_options,
            probe: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            registry: FragmentRegistry::new(),
            pending: VecDeque::new(),
            dirty: false,
            merger: None,
        }
    }

    /// Build a ready engine from configuration: settings, probe, declared
    /// fragments and the site context.
    pub fn from_config(config: &EngineConfig, base_dir: &Path) -> Result<Self> {
        config.validate()?;
        let mut engine = Self::new(config.engine.clone(), config.lock.options())
            .with_probe(config.health.build_probe());
        for fragment in config.fragments(base_dir)? {
            engine.register(Box::new(fragment));
        }
        engine.initialize(config.context(base_dir));
        Ok(engine)
    }

    pub fn with_probe(mut self, probe: Option<Arc<dyn Probe>>) -> Self {
        self.probe = probe;
        self
    }

    /// Version written into the `# Managed by` line.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn state(&self) -> EngineState {
        if self.merger.is_some() {
            EngineState::Ready
        } else {
            EngineState::Uninitialized
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &FragmentRegistry {
        &self.registry
    }

    /// Calls waiting for [`Engine::initialize`].
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Supply the site context and replay queued calls in order.
    ///
    /// Calling it again swaps the context; the registry is kept.
    pub fn initialize(&mut self, context: Context) {
        let merger = BlockMerger::new(context, self.settings.clone()).with_probe(self.probe.clone());
        self.merger = Some(merger);

        let flushed = self.pending.len();
        while let Some(op) = self.pending.pop_front() {
            self.run_op(op);
        }
        info!(flushed, "engine ready");
    }

    pub fn register(&mut self, fragment: Box<dyn FragmentProvider>) {
        self.submit(PendingOp::Register(fragment));
    }

    pub fn unregister(&mut self, id: &str) {
        self.submit(PendingOp::Unregister(id.to_string()));
    }

    /// Record that the composed body may have changed.
    pub fn mark_dirty(&mut self) {
        self.submit(PendingOp::MarkDirty);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn submit(&mut self, op: PendingOp) {
        if self.merger.is_some() {
            self.run_op(op);
        } else {
            debug!(?op, "engine not ready; queued");
            self.pending.push_back(op);
        }
    }

    fn run_op(&mut self, op: PendingOp) {
        match op {
            PendingOp::Register(fragment) => self.registry.register(fragment),
            PendingOp::Unregister(id) => {
                if !self.registry.unregister(&id) {
                    debug!(id = %id, "unregister of unknown fragment");
                }
            }
            PendingOp::MarkDirty => self.dirty = true,
        }
    }

    fn merger(&self) -> Result<&BlockMerger> {
        self.merger.as_ref().ok_or(Error::NotReady)
    }

    /// Run a cycle only if something was marked dirty since the last
    /// successful one.
    pub fn apply_if_dirty(&mut self) -> Result<Option<ApplyReport>> {
        if !self.dirty {
            return Ok(None);
        }
        self.apply().map(Some)
    }

    /// Run one apply cycle now.
    pub fn apply(&mut self) -> Result<ApplyReport> {
        self.run_cycle(BodyMode::Validated)
    }

    /// Run one apply cycle with the composed body remediated first.
    pub fn remediate(&mut self) -> Result<ApplyReport> {
        self.run_cycle(BodyMode::Remediated)
    }

    fn run_cycle(&mut self, mode: BodyMode) -> Result<ApplyReport> {
        let report = self.locked_cycle(mode)?;
        if let ApplyReport::Completed(outcome) = &report
            && outcome.succeeded()
        {
            self.dirty = false;
        }
        Ok(report)
    }

    fn locked_cycle(&mut self, mode: BodyMode) -> Result<ApplyReport> {
        let Some(merger) = self.merger.as_mut() else {
            return Err(Error::NotReady);
        };
        let target = match merger.resolve_target() {
            Ok(target) => target,
            Err(failure) => return Ok(ApplyReport::Completed(ApplyOutcome::Failed(failure))),
        };

        // Held until the end of this function, on every path
        let Some(_guard) = LeaseLock::for_target(&target, self.lock_options).try_acquire()? else {
            debug!(path = %target, "lease held elsewhere; skipping apply");
            return Ok(ApplyReport::Skipped);
        };

        let ctx = merger.context().clone();
        let composed = self.registry.compose(&ctx);
        let body = match prepare_body(&self.settings, &composed, mode) {
            Ok(body) => body,
            Err(errors) => {
                warn!(?errors, "composed body is invalid; nothing written");
                return Ok(ApplyReport::Completed(ApplyOutcome::Failed(
                    ApplyFailure::ValidationFailed { errors },
                )));
            }
        };

        merger.set_patches(self.registry.patches(&ctx));
        let outcome = merger.apply_managed_block(&body, ctx.host(), &self.version, &self.settings.legacy_labels)?;
        Ok(ApplyReport::Completed(outcome))
    }

    /// Hash an apply cycle would write for the current fragments, or `None`
    /// when the body is empty and no block is wanted.
    ///
    /// The body goes through the same validation and remediation as
    /// [`Engine::apply`]. A body that cannot be repaired is hashed as
    /// composed, since no write will ever match it.
    pub fn expected_body_hash(&self) -> Result<Option<String>> {
        let merger = self.merger()?;
        let composed = self.registry.compose(merger.context());
        let body = prepare_body(&self.settings, &composed, BodyMode::Validated).unwrap_or(composed);
        Ok((!body.trim().is_empty()).then(|| expected_body_hash(&body)))
    }

    /// Hash of the body currently on disk.
    pub fn current_body_hash(&self) -> Result<Option<String>> {
        Ok(self.merger()?.get_current_body_hash())
    }

    pub fn status(&self) -> Result<StatusReport> {
        let merger = self.merger()?;
        let target = target_path(merger.context().target());
        Ok(StatusReport::evaluate(&target, &self.settings, self.expected_body_hash()?))
    }

    pub fn diagnose(&self) -> Result<Diagnosis> {
        let merger = self.merger()?;
        Ok(merger.health().diagnose(merger.context()))
    }

    /// True when the file is invalid or the site answers with a 5xx.
    pub fn scan(&self) -> Result<bool> {
        Ok(self.diagnose()?.has_issues())
    }

    /// Restore the rolling backup under the lease lock.
    ///
    /// Returns `false` when another process holds the lease.
    pub fn restore(&self) -> Result<bool> {
        let merger = self.merger()?;
        let target = resolve_existing(merger.context().target())?;
        let Some(_guard) = LeaseLock::for_target(&target, self.lock_options).try_acquire()? else {
            debug!(path = %target, "lease held elsewhere; skipping restore");
            return Ok(false);
        };
        merger.backups().restore(&target)?;
        Ok(true)
    }

    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        let merger = self.merger()?;
        merger.backups().list_backups(&target_path(merger.context().target()))
    }
}

/// The body to write, or the validation errors that block it.
fn prepare_body(settings: &EngineSettings, composed: &str, mode: BodyMode) -> std::result::Result<String, Vec<String>> {
    let validator = Validator::new(&settings.marker_label);
    let labels = settings.effective_exclusive_labels();

    let body = match mode {
        BodyMode::Remediated => validator.remediate(composed),
        BodyMode::Validated => {
            if validator.validate_body(composed, &labels).is_valid() {
                return Ok(composed.to_string());
            }
            debug!("composed body invalid; attempting remediation");
            validator.remediate(composed)
        }
    };

    let report = validator.validate_body(&body, &labels);
    if report.is_valid() {
        Ok(body)
    } else {
        Err(report.errors)
    }
}

fn target_path(target: &Path) -> NormalizedPath {
    NormalizedPath::resolve(target).unwrap_or_else(|| NormalizedPath::new(target))
}

fn resolve_existing(target: &Path) -> Result<NormalizedPath> {
    let resolved = NormalizedPath::resolve(target).ok_or_else(|| Error::PathUnresolved {
        path: target.to_path_buf(),
    })?;
    if !resolved.is_file() {
        return Err(Error::TargetMissing {
            path: resolved.to_native(),
        });
    }
    Ok(resolved)
}
