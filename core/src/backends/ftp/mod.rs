//! FTP backend.
//!
//! Entry resolution prefers `MLST` and falls back to listing the parent
//! directory on servers that do not advertise it.

pub mod reply;
pub mod transport;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::errors::{InvalidArgument, RemoteError};
use crate::files::local::{file_name, require_local_file, require_local_path};
use crate::files::path::{
    is_blank, is_root, join_remote, require_not_blank, require_not_root, split_parent,
    strip_trailing_slash,
};
use crate::files::{is_listed, recursive, Entry, RemoteClient};

use self::reply::{normalize_mlst_reply, parse_mlst_entry};
pub use self::transport::{FtpTransport, SuppaFtpTransport};

/// A [`RemoteClient`] speaking FTP through an [`FtpTransport`].
pub struct FtpClient<T: FtpTransport = SuppaFtpTransport> {
    transport: T,
    closed: bool,
}

impl FtpClient<SuppaFtpTransport> {
    /// Open an FTP session described by `config`.
    pub fn connect(config: &ConnectionConfig) -> Result<Self, RemoteError> {
        info!("Connecting to ftp://{}:{}", config.host, config.port());
        Ok(Self::new(SuppaFtpTransport::connect(config)?))
    }
}

impl<T: FtpTransport> FtpClient<T> {
    /// Wrap an already connected transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            closed: false,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Resolve `path` to an entry, surfacing transport failures.
    fn resolve(&mut self, path: &str) -> Result<Option<Entry>, RemoteError> {
        if is_blank(path) {
            return Ok(None);
        }
        if self.transport.supports_mlst() {
            self.resolve_by_mlst(path)
        } else {
            self.resolve_by_listing(path)
        }
    }

    fn resolve_by_mlst(&mut self, path: &str) -> Result<Option<Entry>, RemoteError> {
        let Some(reply) = self.transport.mlst(path)? else {
            return Ok(None);
        };
        let facts = normalize_mlst_reply(&reply)?;
        parse_mlst_entry(&facts, path).map(Some)
    }

    fn resolve_by_listing(&mut self, path: &str) -> Result<Option<Entry>, RemoteError> {
        let path = strip_trailing_slash(path.trim());
        if is_root(path) {
            let Some(entries) = self.list_if_present("/")? else {
                return Ok(None);
            };
            // Servers that omit `.` still have a root.
            let root = entries
                .into_iter()
                .find(|e| e.name == ".")
                .map(|e| e.renamed("/"))
                .unwrap_or_else(|| Entry::directory("/"));
            return Ok(Some(root));
        }

        let (parent, name) = split_parent(path);
        let entries = self.list_if_present(&parent)?.unwrap_or_default();
        Ok(entries.into_iter().find(|e| e.name == name))
    }

    fn list_if_present(&mut self, path: &str) -> Result<Option<Vec<Entry>>, RemoteError> {
        match self.transport.list(path) {
            Ok(entries) => Ok(Some(entries)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<T: FtpTransport> RemoteClient for FtpClient<T> {
    fn ls(&mut self, path: &str, filter_hidden: bool) -> Result<Vec<Entry>, RemoteError> {
        require_not_blank(path)?;
        let Some(entry) = self.resolve(path)? else {
            info!("{path} does not exist");
            return Ok(Vec::new());
        };
        if !entry.is_directory {
            return Ok(std::iter::once(entry)
                .filter(|e| is_listed(e, filter_hidden))
                .collect());
        }
        let entries = self.transport.list(path)?;
        Ok(entries
            .into_iter()
            .filter(|e| is_listed(e, filter_hidden))
            .collect())
    }

    fn mkdir(&mut self, path: &str) -> Result<(), RemoteError> {
        require_not_blank(path)?;
        if self.exists(path) {
            warn!("{path} already exists");
            return Ok(());
        }
        debug!("MKD {path}");
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
        debug!("RETR {path} -> {} ({bytes} bytes)", local_file.display());
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
        debug!("STOR {} -> {target} ({bytes} bytes)", local_file.display());
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
        debug!("DELE {path}");
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
        debug!("RMD {path}");
        self.transport.delete_dir(path)
    }

    fn exists(&mut self, path: &str) -> bool {
        self.stat(path).is_some()
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
            debug!("FTP client already closed");
            return Ok(());
        }
        self.closed = true;
        self.transport.disconnect()?;
        info!("FTP session closed");
        Ok(())
    }
}

impl<T: FtpTransport> Drop for FtpClient<T> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                debug!("Error while closing FTP session on drop: {e}");
            }
        }
    }
}
