pub mod local;
pub mod path;
pub mod recursive;

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::RemoteError;

/// A file or directory node as reported by a remote backend.
///
/// This is the protocol-neutral structure shared by the FTP and SFTP clients.
/// Entries are built fresh on every listing or stat call and never mutated;
/// use [`Entry::renamed`] to derive a differently named copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub name: String,
    pub is_directory: bool,
    /// Size in bytes, `None` when the backend did not report it.
    pub size: Option<u64>,
    /// Modification time in epoch milliseconds.
    pub modification_time: Option<i64>,
}

impl Entry {
    pub fn new(name: impl Into<String>, is_directory: bool) -> Self {
        Self {
            name: name.into(),
            is_directory,
            size: None,
            modification_time: None,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, false)
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, true)
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn with_modification_time(mut self, millis: Option<i64>) -> Self {
        self.modification_time = millis;
        self
    }

    /// Return a copy of this entry carrying `name`.
    ///
    /// Used to turn a synthetic `.` self-entry into the entry for the
    /// directory it describes.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Dot-prefixed names, excluding the `.`/`..` pseudo entries.
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.') && !self.is_self_or_parent()
    }

    pub fn is_self_or_parent(&self) -> bool {
        self.name == "." || self.name == ".."
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modification_time
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

/// Whether `entry` belongs in a listing result.
///
/// `.` and `..` never do; dot-files only when `filter_hidden` is false.
pub fn is_listed(entry: &Entry, filter_hidden: bool) -> bool {
    !entry.is_self_or_parent() && !(filter_hidden && entry.is_hidden())
}

/// The uniform operation set shared by every backend.
///
/// All methods take `&mut self`: a client owns exactly one session and that
/// session is not reentrant. Use one client per thread.
///
/// The recursive operations are provided on top of the single-level ones
/// and behave identically for every backend; see [`recursive`].
pub trait RemoteClient {
    /// List the immediate children of `path`.
    ///
    /// `.` and `..` are never returned; dot-files are dropped when
    /// `filter_hidden` is set. A missing path yields an empty list.
    fn ls(&mut self, path: &str, filter_hidden: bool) -> Result<Vec<Entry>, RemoteError>;

    /// Create exactly one directory level. Existing targets are a logged no-op.
    fn mkdir(&mut self, path: &str) -> Result<(), RemoteError>;

    /// Download the remote file at `path` to exactly `local_file`.
    fn get(&mut self, path: &str, local_file: &Path) -> Result<(), RemoteError>;

    /// Upload `local_file` into `remote_dir`, keeping the local base name.
    ///
    /// `remote_dir` is created recursively when absent.
    fn put(&mut self, local_file: &Path, remote_dir: &str) -> Result<(), RemoteError>;

    /// Delete one remote file. The root is never accepted.
    fn rm(&mut self, path: &str) -> Result<(), RemoteError>;

    /// Delete one remote directory. The root is never accepted.
    fn rmdir(&mut self, path: &str) -> Result<(), RemoteError>;

    /// Best-effort existence probe; failures are logged and reported as `false`.
    fn exists(&mut self, path: &str) -> bool;

    /// Resolve `path` to an [`Entry`]; failures are logged and reported as `None`.
    fn stat(&mut self, path: &str) -> Option<Entry>;

    /// Disconnect the session and release client-owned resources.
    ///
    /// Closing an already closed client is a no-op.
    fn close(&mut self) -> Result<(), RemoteError>;

    /// [`ls`](Self::ls) with hidden files filtered out.
    fn ls_visible(&mut self, path: &str) -> Result<Vec<Entry>, RemoteError> {
        self.ls(path, true)
    }

    fn mkdir_recursive(&mut self, path: &str) -> Result<(), RemoteError> {
        recursive::mkdir_recursive(self, path)
    }

    fn mget(&mut self, remote_path: &str, local_root: &Path) -> Result<(), RemoteError> {
        recursive::mget(self, remote_path, local_root)
    }

    fn mput(&mut self, local_root: &Path, remote_path: &str) -> Result<(), RemoteError> {
        recursive::mput(self, local_root, remote_path)
    }

    fn rm_recursive(&mut self, path: &str) -> Result<(), RemoteError> {
        recursive::rm_recursive(self, path)
    }
}
