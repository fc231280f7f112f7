//! Concrete [`RemoteClient`] implementations.
//!
//! Each backend is generic over a transport trait holding the raw protocol
//! commands, so the client logic can run against in-memory servers.

pub mod ftp;
pub mod net;
pub mod sftp;

use tracing::debug;

use crate::config::{ConnectionConfig, Protocol};
use crate::errors::RemoteError;
use crate::files::RemoteClient;

pub use ftp::FtpClient;
pub use sftp::SftpClient;

/// Validate `config` and open a session for its protocol.
pub fn connect(config: &ConnectionConfig) -> Result<Box<dyn RemoteClient>, RemoteError> {
    config.validate()?;
    debug!("Opening {} session to {}", config.protocol, config.host);
    let client: Box<dyn RemoteClient> = match config.protocol {
        Protocol::Ftp => Box::new(FtpClient::connect(config)?),
        Protocol::Sftp => Box::new(SftpClient::connect(config)?),
    };
    Ok(client)
}
