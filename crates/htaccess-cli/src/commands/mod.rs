//! Command implementations for the htaccess CLI
//!
//! Each command returns whether its underlying check passed; `main` turns a
//! failed check into a non-zero exit only under `--strict`.

mod apply;
mod backups;
mod status;

pub use apply::{run_apply, run_remediate, run_restore};
pub use backups::run_list_backups;
pub use status::{run_diagnose, run_scan, run_status};

use std::path::{Path, PathBuf};

use htaccess_core::{DEFAULT_CONFIG_FILE, Engine, EngineConfig};

use crate::error::Result;

/// Load configuration and build a ready engine.
///
/// An explicit config path must exist; the default `htaccess.toml` may be
/// absent, in which case defaults apply relative to `cwd`.
pub fn load_engine(cwd: &Path, config: Option<&Path>, version: &str) -> Result<Engine> {
    let (config, base_dir) = match config {
        Some(path) => {
            let path = cwd.join(path);
            let config = EngineConfig::load(&path)?;
            (config, config_dir(&path, cwd))
        }
        None => {
            let path = cwd.join(DEFAULT_CONFIG_FILE);
            (EngineConfig::load_or_default(&path)?, cwd.to_path_buf())
        }
    };
    tracing::debug!(base_dir = %base_dir.display(), "loaded configuration");
    Ok(Engine::from_config(&config, &base_dir)?.with_version(version))
}

fn config_dir(path: &Path, cwd: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => cwd.to_path_buf(),
    }
}
