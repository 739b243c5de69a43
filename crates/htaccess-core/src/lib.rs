//! Orchestration layer for the htaccess manager
//!
//! Sits above `htaccess-fs` and `htaccess-blocks` and below the CLI:
//!
//! ```text
//!                  htaccess-cli
//!                       |
//!                 htaccess-core
//!                  /          \
//!         htaccess-fs    htaccess-blocks
//! ```
//!
//! - **BlockMerger**: the single-pass write pipeline with backup, health
//!   check and rollback
//! - **Engine**: fragment registry, deferred registration, dirty tracking
//!   and lease-locked apply cycles
//! - **HealthChecker**: file validation plus an HTTP reachability probe
//! - **BackupStore**: the single rolling backup beside the target
//!
//! # Example
//!
//! ```no_run
//! use htaccess_core::{Context, Engine, EngineSettings, StaticFragment};
//! use htaccess_fs::LockOptions;
//!
//! # fn main() -> htaccess_core::Result<()> {
//! let mut engine = Engine::new(EngineSettings::default(), LockOptions::default());
//! engine.register(Box::new(StaticFragment::new("security", "Options -Indexes")));
//! engine.initialize(Context::new("/var/www/.htaccess").with_home_url("https://example.com"));
//! engine.mark_dirty();
//! let _report = engine.apply_if_dirty()?;
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod fragment;
pub mod health;
pub mod merger;
pub mod status;

pub use backup::{BackupInfo, BackupStore};
pub use config::{
    DEFAULT_CONFIG_FILE, EngineConfig, EngineSettings, FragmentConfig, HealthConfig, LockConfig,
    SiteConfig,
};
pub use context::Context;
pub use engine::{ApplyReport, Engine, EngineState, PendingOp};
pub use error::{Error, Result};
pub use fragment::{FragmentProvider, FragmentRegistry, StaticFragment};
pub use health::{Diagnosis, HealthChecker, HttpProbe, Probe};
pub use merger::{ApplyFailure, ApplyOutcome, BlockMerger, body_hash_in, expected_body_hash};
pub use status::{BlockStatus, StatusReport};
