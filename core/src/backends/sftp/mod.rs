//! SFTP backend.
//!
//! Entries are resolved with `lstat`. Directory attributes come from the
//! directory's own `.` entry and file attributes from the parent listing,
//! so both carry what the server reports in a listing.

pub mod auth;
pub mod transport;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tempfile::TempPath;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::errors::{InvalidArgument, RemoteError};
use crate::files::local::{file_name, require_local_file, require_local_path};
use crate::files::path::{
    file_name_from_remote_path, is_blank, join_remote, require_not_blank, require_not_root,
    split_parent,
};
use crate::files::{is_listed, recursive, Entry, RemoteClient};

use self::auth::Identity;
pub use self::transport::{SftpAttrs, SftpTransport, Ssh2Transport};

/// A [`RemoteClient`] speaking SFTP through an [`SftpTransport`].
pub struct SftpClient<T: SftpTransport = Ssh2Transport> {
    transport: T,
    staged_key: Option<TempPath>,
    closed: bool,
}

impl SftpClient<Ssh2Transport> {
    /// Open an SSH session described by `config` and start the SFTP subsystem.
    pub fn connect(config: &ConnectionConfig) -> Result<Self, RemoteError> {
        info!("Connecting to sftp://{}:{}", config.host, config.port());
        let identity = auth::resolve_identity(config)?;
        let session = auth::connect_and_authenticate(config, identity.as_ref())?;
        let sftp = session
            .sftp()
            .map_err(|e| RemoteError::Connection(format!("SFTP subsystem: {e}")))?;

        let client = Self::new(Ssh2Transport::new(session, sftp));
        Ok(match identity.and_then(Identity::into_staged) {
            Some(key) => client.with_staged_key(key),
            None => client,
        })
    }
}

impl<T: SftpTransport> SftpClient<T> {
    /// Wrap an already connected transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            staged_key: None,
            closed: false,
        }
    }

    /// Tie a staged private-key file to this client; it is deleted on close.
    pub fn with_staged_key(mut self, key: TempPath) -> Self {
        self.staged_key = Some(key);
        self
    }

    pub fn staged_key_path(&self) -> Option<&Path> {
        self.staged_key.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn lstat_if_present(&mut self, path: &str) -> Result<Option<SftpAttrs>, RemoteError> {
        match self.transport.lstat(path) {
            Ok(attrs) => Ok(Some(attrs)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolve `path` to an entry, surfacing transport failures.
    fn resolve(&mut self, path: &str) -> Result<Option<Entry>, RemoteError> {
        if is_blank(path) {
            return Ok(None);
        }
        let Some(attrs) = self.lstat_if_present(path)? else {
            return Ok(None);
        };
        let (working, name) = file_name_from_remote_path(path.trim());

        if attrs.is_dir {
            let listed = self.transport.list(&working)?;
            let entry = listed
                .into_iter()
                .find(|(n, _)| n == ".")
                .map(|(_, dot)| entry_from_attrs(".", &dot).renamed(name.as_str()))
                .unwrap_or_else(|| entry_from_attrs(&name, &attrs));
            return Ok(Some(entry));
        }

        let (parent, _) = split_parent(&working);
        let listed = match self.transport.list(&parent) {
            Ok(listed) => listed,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };
        let entry = listed
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(n, a)| entry_from_attrs(&n, &a))
            .unwrap_or_else(|| entry_from_attrs(&name, &attrs));
        Ok(Some(entry))
    }
}

fn entry_from_attrs(name: &str, attrs: &SftpAttrs) -> Entry {
    let millis = attrs
        .mtime
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| secs.checked_mul(1000));
    Entry::new(name, attrs.is_dir)
        .with_size(attrs.size)
        .with_modification_time(millis)
}

impl<T: SftpTransport> RemoteClient for SftpClient<T> {
    fn ls(&mut self, path: &str, filter_hidden: bool) -> Result<Vec<Entry>, RemoteError> {
        require_not_blank(path)?;
        let Some(attrs) = self.lstat_if_present(path)? else {
            info!("{path} does not exist");
            return Ok(Vec::new());
        };
        if !attrs.is_dir {
            return Ok(self
                .resolve(path)?
                .into_iter()
                .filter(|e| is_listed(e, filter_hidden))
                .collect());
        }
        let listed = self.transport.list(path)?;
        Ok(listed
            .iter()
            .map(|(name, attrs)| entry_from_attrs(name, attrs))
            .filter(|e| is_listed(e, filter_hidden))
            .collect())
    }

    fn mkdir(&mut self, path: &str) -> Result<(), RemoteError> {
        require_not_blank(path)?;
        if self.exists(path) {
            warn!("{path} already exists");
            return Ok(());
        }
        debug!("mkdir {path}");
        self.transport.mkdir(path)
    }

    fn get(&mut self, path: &str, local_file: &Path) -> Result<(), RemoteError> {
        require_not_blank(path)?;
        require_local_path(local_file)?;
        let Some(entry) = self.stat(path) else {
            warn!("{path} does not exist");
            return Ok(());
        };
        if entry.is_directory {
            return Err(InvalidArgument::RemoteNotFile(path.to_string()).into());
        }

        let mut writer = BufWriter::new(File::create(local_file)?);
        let bytes = self.transport.retrieve(path, &mut writer)?;
        writer.flush()?;
        debug!("get {path} -> {} ({bytes} bytes)", local_file.display());
        Ok(())
    }

    fn put(&mut self, local_file: &Path, remote_dir: &str) -> Result<(), RemoteError> {
        require_not_blank(remote_dir)?;
        require_local_file(local_file)?;
        let name = file_name(local_file)
            .ok_or_else(|| InvalidArgument::LocalNotFile(local_file.to_path_buf()))?;
        recursive::ensure_remote_dir(self, remote_dir)?;

        let target = join_remote(remote_dir, &name);
        let mut reader = BufReader::new(File::open(local_file)?);
        let bytes = self.transport.store(&target, &mut reader)?;
        debug!("put {} -> {target} ({bytes} bytes)", local_file.display());
        Ok(())
    }

    fn rm(&mut self, path: &str) -> Result<(), RemoteError> {
        require_not_blank(path)?;
        let path = require_not_root(path, InvalidArgument::RootRemoval)?;
        let Some(entry) = self.stat(path) else {
            warn!("{path} does not exist");
            return Ok(());
        };
        if entry.is_directory {
            return Err(InvalidArgument::RemoteNotFile(path.to_string()).into());
        }
        debug!("rm {path}");
        self.transport.delete_file(path)
    }

    fn rmdir(&mut self, path: &str) -> Result<(), RemoteError> {
        require_not_blank(path)?;
        let path = require_not_root(path, InvalidArgument::RootRemoval)?;
        let Some(entry) = self.stat(path) else {
            warn!("{path} does not exist");
            return Ok(());
        };
        if !entry.is_directory {
            return Err(InvalidArgument::RemoteNotDirectory(path.to_string()).into());
        }
        debug!("rmdir {path}");
        self.transport.delete_dir(path)
    }

    fn exists(&mut self, path: &str) -> bool {
        if is_blank(path) {
            return false;
        }
        match self.lstat_if_present(path) {
            Ok(attrs) => attrs.is_some(),
            Err(e) => {
                warn!("Failed to check {path}: {e}");
                false
            }
        }
    }

    fn stat(&mut self, path: &str) -> Option<Entry> {
        match self.resolve(path) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to resolve {path}: {e}");
                None
            }
        }
    }

    fn close(&mut self) -> Result<(), RemoteError> {
        if self.closed {
            debug!("SFTP client already closed");
            return Ok(());
        }
        self.closed = true;
        let disconnected = self.transport.disconnect();
        if let Some(key) = self.staged_key.take() {
            if let Err(e) = key.close() {
                warn!("Failed to delete staged key file: {e}");
            }
        }
        disconnected?;
        info!("SFTP session closed");
        Ok(())
    }
}

impl<T: SftpTransport> Drop for SftpClient<T> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                debug!("Error while closing SFTP session on drop: {e}");
            }
        }
    }
}
