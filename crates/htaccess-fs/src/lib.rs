//! Filesystem layer for the htaccess manager
//!
//! Provides crash-safe writes, content checksums, the advisory lease lock
//! that serializes apply cycles across processes, and format-agnostic
//! config loading.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod lock;
pub mod path;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use io::RobustnessConfig;
pub use lock::{LeaseGuard, LeaseLock, LockOptions};
pub use path::NormalizedPath;
