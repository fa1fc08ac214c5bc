//! Atomic filesystem operations for lock files.
//!
//! # Implementation Strategy
//!
//! Exclusive creation uses `create_new` (`O_CREAT | O_EXCL`), which is atomic
//! on local filesystems and on NFSv3+.
//!
//! Replacement follows this pattern:
//! 1. Write content to a uniquely named temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Atomically rename it over the target
//!
//! Source and destination must be on the same filesystem for the rename to be
//! atomic, which holds because the temp file is created next to the target.
//! On crash, a temporary file may remain (named `.{filename}.{pid}.{n}.tmp`).

use crate::error::{LockError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Create `path` exclusively and fill it with `content`.
///
/// Returns `Ok(false)` if the file already exists. If the write fails after
/// the file was created, the file is removed again so no empty lock is left
/// behind.
pub fn create_exclusive(path: &Path, content: &[u8]) -> Result<bool> {
    let mut file = match restricted_options().create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(LockError::io("create lock file", path, e)),
    };

    if let Err(e) = file.write_all(content).and_then(|_| file.sync_all()) {
        let _ = fs::remove_file(path);
        return Err(LockError::io("write lock file", path, e));
    }

    Ok(true)
}

/// Atomically replace `path` with `content`.
///
/// The target is never observed in a partial state: readers see either the
/// previous content or the new content.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = generate_temp_path(path)?;

    write_and_sync(&temp_path, content)?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        LockError::io("atomically replace", path, e)
    })?;

    // Persist the directory entry as well
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}

/// Generate a temporary file path in the same directory as the target.
///
/// The name is unique per process and call so that concurrent claimants
/// never share a temp file.
fn generate_temp_path(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| LockError::InvalidPath(target.display().to_string()))?;

    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_name = format!(".{}.{}.{}.tmp", filename, std::process::id(), n);
    Ok(parent.join(temp_name))
}

fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = restricted_options()
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| LockError::io("create temporary file", path, e))?;

    file.write_all(content).and_then(|_| file.sync_all()).map_err(|e| {
        let _ = fs::remove_file(path);
        LockError::io("write temporary file", path, e)
    })
}

/// Write-only options, readable and writable by the owning user only.
fn restricted_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}
