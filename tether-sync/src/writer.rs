//! Atomic local write-back.
//!
//! Every local file the engine touches on down-sync goes through
//! [`atomic_write`]:
//!
//! 1. Ensure the parent directory exists.
//! 2. Write to `<path>.tether.tmp`.
//! 3. Rename to the final path (atomic on POSIX).
//! 4. On rename failure, remove the `.tmp` and leave the original intact.

use std::path::{Path, PathBuf};

use crate::error::{io_err, SyncError};

/// Write `content` to `path` atomically, creating parent directories.
pub fn atomic_write(path: &Path, content: impl AsRef<[u8]>) -> Result<(), SyncError> {
    let tmp = tmp_path(path);
    atomic_write_with_tmp(path, content.as_ref(), &tmp)
}

fn tmp_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.tether.tmp", path.display()))
}

fn atomic_write_with_tmp(path: &Path, content: &[u8], tmp: &Path) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if let Some(tmp_parent) = tmp.parent() {
        std::fs::create_dir_all(tmp_parent).map_err(|e| io_err(tmp_parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::debug!("wrote: {}", path.display());
    Ok(())
}

/// Read a local text file, normalizing CRLF to LF.
pub fn read_text(path: &Path) -> Result<String, SyncError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Ok(content.replace("\r\n", "\n"))
}

/// Whether `path` holds valid UTF-8 text.
pub fn is_text(path: &Path) -> Result<bool, SyncError> {
    let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
    Ok(std::str::from_utf8(&bytes).is_ok())
}

/// Remove a file; an already-missing file is fine.
///
/// Empty parent directories up to (not including) `stop_at` are pruned.
pub fn remove_file(path: &Path, stop_at: &Path) -> Result<(), SyncError> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("already gone: {}", path.display());
            return Ok(());
        }
        Err(e) => return Err(io_err(path, e)),
    }

    let mut dir = path.parent();
    while let Some(d) = dir {
        if d == stop_at || !d.starts_with(stop_at) {
            break;
        }
        // Stops at the first non-empty directory.
        if std::fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
