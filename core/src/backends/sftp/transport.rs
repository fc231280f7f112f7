//! The raw SFTP surface used by [`SftpClient`](super::SftpClient).

use std::io::{Read, Write};
use std::path::Path;

use ssh2::{ErrorCode, FileStat, Session, Sftp};
use tracing::debug;

use crate::errors::RemoteError;

/// `LIBSSH2_ERROR_FILE`, returned by `readdir` once the handle is exhausted.
const LIBSSH2_ERROR_FILE: i32 = -16;

/// Attributes of a remote node as reported by `lstat` or a directory read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SftpAttrs {
    pub is_dir: bool,
    pub size: Option<u64>,
    /// Seconds since the epoch.
    pub mtime: Option<u64>,
}

impl SftpAttrs {
    pub fn directory() -> Self {
        Self {
            is_dir: true,
            ..Self::default()
        }
    }

    pub fn file(size: u64) -> Self {
        Self {
            is_dir: false,
            size: Some(size),
            mtime: None,
        }
    }
}

impl From<&FileStat> for SftpAttrs {
    fn from(stat: &FileStat) -> Self {
        Self {
            is_dir: stat.is_dir(),
            size: stat.size,
            mtime: stat.mtime,
        }
    }
}

/// Protocol primitives the SFTP client is built on.
///
/// An absent path is reported as [`RemoteError::NotFound`].
pub trait SftpTransport {
    /// Attributes of `path` without following a final symlink.
    fn lstat(&mut self, path: &str) -> Result<SftpAttrs, RemoteError>;

    /// Raw directory contents; names are bare and may include `.` and `..`.
    fn list(&mut self, path: &str) -> Result<Vec<(String, SftpAttrs)>, RemoteError>;

    fn mkdir(&mut self, path: &str) -> Result<(), RemoteError>;

    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, RemoteError>;

    fn store(&mut self, path: &str, source: &mut dyn Read) -> Result<u64, RemoteError>;

    fn delete_file(&mut self, path: &str) -> Result<(), RemoteError>;

    fn delete_dir(&mut self, path: &str) -> Result<(), RemoteError>;

    fn disconnect(&mut self) -> Result<(), RemoteError>;
}

/// [`SftpTransport`] over a blocking `ssh2` session.
pub struct Ssh2Transport {
    sftp: Sftp,
    session: Session,
}

impl Ssh2Transport {
    pub fn new(session: Session, sftp: Sftp) -> Self {
        Self { sftp, session }
    }
}

impl SftpTransport for Ssh2Transport {
    fn lstat(&mut self, path: &str) -> Result<SftpAttrs, RemoteError> {
        self.sftp
            .lstat(Path::new(path))
            .map(|stat| SftpAttrs::from(&stat))
            .map_err(|e| map_ssh_error(e, path))
    }

    // ssh2's own `readdir` drops `.` and `..`; the self-entry is needed
    // for directory attributes, so the handle is read directly.
    fn list(&mut self, path: &str) -> Result<Vec<(String, SftpAttrs)>, RemoteError> {
        let mut dir = self
            .sftp
            .opendir(Path::new(path))
            .map_err(|e| map_ssh_error(e, path))?;
        let mut entries = Vec::new();
        loop {
            match dir.readdir() {
                Ok((name, stat)) => {
                    entries.push((name.to_string_lossy().to_string(), SftpAttrs::from(&stat)));
                }
                Err(e)
                    if matches!(
                        e.code(),
                        ErrorCode::Session(code) if code == LIBSSH2_ERROR_FILE
                    ) =>
                {
                    break
                }
                Err(e) => return Err(map_ssh_error(e, path)),
            }
        }
        Ok(entries)
    }

    fn mkdir(&mut self, path: &str) -> Result<(), RemoteError> {
        self.sftp
            .mkdir(Path::new(path), 0o755)
            .map_err(|e| map_ssh_error(e, path))
    }

    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, RemoteError> {
        let mut file = self
            .sftp
            .open(Path::new(path))
            .map_err(|e| map_ssh_error(e, path))?;
        Ok(std::io::copy(&mut file, sink)?)
    }

    fn store(&mut self, path: &str, source: &mut dyn Read) -> Result<u64, RemoteError> {
        let mut file = self
            .sftp
            .create(Path::new(path))
            .map_err(|e| map_ssh_error(e, path))?;
        Ok(std::io::copy(source, &mut file)?)
    }

    fn delete_file(&mut self, path: &str) -> Result<(), RemoteError> {
        self.sftp
            .unlink(Path::new(path))
            .map_err(|e| map_ssh_error(e, path))
    }

    fn delete_dir(&mut self, path: &str) -> Result<(), RemoteError> {
        self.sftp
            .rmdir(Path::new(path))
            .map_err(|e| map_ssh_error(e, path))
    }

    fn disconnect(&mut self) -> Result<(), RemoteError> {
        debug!("Disconnecting SSH session");
        self.session
            .disconnect(None, "closed by client", None)
            .map_err(|e| RemoteError::Transport(format!("disconnect: {e}")))
    }
}

/// Map an `ssh2` error for `path`.
///
/// SFTP status codes: `SSH_FX_NO_SUCH_FILE` = 2, `SSH_FX_PERMISSION_DENIED` = 3.
fn map_ssh_error(e: ssh2::Error, path: &str) -> RemoteError {
    match e.code() {
        ErrorCode::SFTP(2) => RemoteError::NotFound(path.to_string()),
        ErrorCode::SFTP(3) => RemoteError::Transport(format!("{path}: permission denied")),
        _ => RemoteError::Transport(format!("{path}: {}", e.message())),
    }
}
