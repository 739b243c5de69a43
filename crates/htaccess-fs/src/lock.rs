//! Advisory lease lock serializing apply cycles across processes
//!
//! The lock is an `fs2` exclusive lock on a sibling `<target>.lock` file.
//! Holding it is a lease: the guard records its holder and expiry in the
//! lock file and releases the lock when dropped, on every exit path. A
//! holder that crashes loses the lock when the OS closes its handle.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use backoff::ExponentialBackoff;
use chrono::{SecondsFormat, Utc};
use fs2::FileExt;
use tracing::{debug, warn};

use crate::{Error, NormalizedPath, Result};

/// Suffix appended to the target path to form the lock file path.
pub const LOCK_SUFFIX: &str = ".lock";

/// How a lease is acquired and how long it is expected to be held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Expected upper bound on how long the holder keeps the lock.
    pub lease: Duration,
    /// How long to keep retrying a contended lock. Zero means one attempt.
    pub wait: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(30),
            wait: Duration::ZERO,
        }
    }
}

/// Lease lock bound to one target file.
#[derive(Debug, Clone)]
pub struct LeaseLock {
    lock_path: NormalizedPath,
    options: LockOptions,
}

impl LeaseLock {
    /// Create a lock for `target`; the lock file is `<target>.lock`.
    pub fn for_target(target: &NormalizedPath, options: LockOptions) -> Self {
        Self {
            lock_path: target.with_suffix(LOCK_SUFFIX),
            options,
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &NormalizedPath {
        &self.lock_path
    }

    /// Try to take the lease.
    ///
    /// Returns `Ok(None)` when another holder has it and the wait budget is
    /// exhausted. Contention is not an error.
    pub fn try_acquire(&self) -> Result<Option<LeaseGuard>> {
        let native = self.lock_path.to_native();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&native)
            .map_err(|e| Error::io(&native, e))?;

        let acquired = if self.options.wait.is_zero() {
            file.try_lock_exclusive().is_ok()
        } else {
            let policy = ExponentialBackoff {
                initial_interval: Duration::from_millis(10),
                max_interval: Duration::from_millis(250),
                max_elapsed_time: Some(self.options.wait),
                ..ExponentialBackoff::default()
            };
            backoff::retry(policy, || {
                file.try_lock_exclusive()
                    .map_err(backoff::Error::transient)
            })
            .is_ok()
        };

        if !acquired {
            debug!(path = %native.display(), "lease held elsewhere");
            return Ok(None);
        }

        let mut guard = LeaseGuard {
            file,
            path: native,
            acquired_at: Instant::now(),
            lease: self.options.lease,
        };
        guard.record_holder()?;
        Ok(Some(guard))
    }
}

/// Held lease. Dropping it releases the lock.
#[derive(Debug)]
pub struct LeaseGuard {
    file: File,
    path: PathBuf,
    acquired_at: Instant,
    lease: Duration,
}

impl LeaseGuard {
    /// Time elapsed since the lease was taken.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Whether the holder has run past its lease.
    pub fn is_overdue(&self) -> bool {
        self.held_for() > self.lease
    }

    fn record_holder(&mut self) -> Result<()> {
        let expires = Utc::now()
            + chrono::Duration::from_std(self.lease).unwrap_or_else(|_| chrono::Duration::zero());
        let line = format!(
            "pid={} expires={}\n",
            std::process::id(),
            expires.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        self.file
            .set_len(0)
            .and_then(|_| self.file.seek(SeekFrom::Start(0)))
            .and_then(|_| self.file.write_all(line.as_bytes()))
            .map_err(|_| Error::LockFailed {
                path: self.path.clone(),
            })?;
        Ok(())
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if self.is_overdue() {
            warn!(
                path = %self.path.display(),
                held_ms = self.held_for().as_millis() as u64,
                "lease released after it expired"
            );
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release lease");
        }
    }
}
