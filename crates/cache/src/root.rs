//! Cache store root resolution

use crate::{Error, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the cache store root
pub const CACHE_DIR_ENV: &str = "DOCPUB_CACHE_DIR";

/// Directory created under the platform and temp directories
const STORE_DIR: &str = "docpub";

/// Whether `dir` exists (creating it when missing) and accepts new files.
///
/// Self-hosted runners sometimes mount the user cache directory read-only.
fn is_writable(dir: &Path) -> bool {
    if std::fs::create_dir_all(dir).is_err() {
        return false;
    }
    let marker = dir.join(".docpub-write-test");
    let writable = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&marker)
        .is_ok();
    let _ = std::fs::remove_file(&marker);
    writable
}

/// Pick the store root.
///
/// An explicit override must be usable as is. Otherwise the platform cache
/// directory is preferred and the temp directory is the last resort.
fn resolve_root(
    override_dir: Option<PathBuf>,
    platform_dir: Option<PathBuf>,
    temp_dir: &Path,
) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        if is_writable(&dir) {
            return Ok(dir);
        }
        return Err(Error::configuration(format!(
            "{CACHE_DIR_ENV}={} is not a writable directory",
            dir.display()
        )));
    }

    let temp = temp_dir.join(STORE_DIR);
    match platform_dir.map(|dir| dir.join(STORE_DIR)) {
        Some(dir) if is_writable(&dir) => Ok(dir),
        Some(dir) => {
            tracing::warn!(
                dir = %dir.display(),
                fallback = %temp.display(),
                "Cache directory is not writable, using the temp directory"
            );
            writable_or_error(temp)
        }
        None => writable_or_error(temp),
    }
}

fn writable_or_error(dir: PathBuf) -> Result<PathBuf> {
    if is_writable(&dir) {
        Ok(dir)
    } else {
        Err(Error::configuration(format!(
            "no writable cache directory, set {CACHE_DIR_ENV} or [cache] root"
        )))
    }
}

/// Resolve the cache store root: `DOCPUB_CACHE_DIR`, else `docpub` under the
/// platform cache directory (which honors `XDG_CACHE_HOME`), else under the
/// temp directory.
pub fn default_cache_root() -> Result<PathBuf> {
    let override_dir = std::env::var_os(CACHE_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    resolve_root(override_dir, dirs::cache_dir(), &std::env::temp_dir())
}
