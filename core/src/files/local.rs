//! Local-side checks and traversal used by transfers.

use std::path::{Path, PathBuf};

use crate::errors::{InvalidArgument, RemoteError};

/// Reject an empty local path.
pub fn require_local_path(path: &Path) -> Result<(), InvalidArgument> {
    if path.as_os_str().is_empty() {
        return Err(InvalidArgument::EmptyLocalPath);
    }
    Ok(())
}

/// Require `path` to be an existing regular file.
pub fn require_local_file(path: &Path) -> Result<(), InvalidArgument> {
    require_local_path(path)?;
    if !path.exists() {
        return Err(InvalidArgument::LocalMissing(absolute(path)));
    }
    if !path.is_file() {
        return Err(InvalidArgument::LocalNotFile(absolute(path)));
    }
    Ok(())
}

/// Require `path` to be an existing directory.
pub fn require_local_dir(path: &Path) -> Result<(), InvalidArgument> {
    require_local_path(path)?;
    if !path.exists() {
        return Err(InvalidArgument::LocalMissing(absolute(path)));
    }
    if !path.is_dir() {
        return Err(InvalidArgument::LocalNotDirectory(absolute(path)));
    }
    Ok(())
}

/// Create `path` (and its parents) when absent, otherwise require a directory.
pub fn ensure_local_dir(path: &Path) -> Result<(), RemoteError> {
    require_local_path(path)?;
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    if !path.is_dir() {
        return Err(InvalidArgument::LocalNotDirectory(absolute(path)).into());
    }
    Ok(())
}

/// List the children of a local directory, skipping `.` and `..`.
///
/// Results are sorted by file name so uploads are deterministic.
pub fn list_dir_sorted(path: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut result = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name();
        if name == "." || name == ".." {
            continue;
        }
        result.push(entry.path());
    }
    result.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(result)
}

/// Base name of a local path as UTF-8 (lossy).
pub fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}

/// Absolute form of `path` for error messages; falls back to the input.
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
