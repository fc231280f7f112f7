//! Error types for the remotree core crate.
//!
//! Precondition violations are modelled separately ([`InvalidArgument`]) so
//! callers can match on the exact rule that was broken without parsing
//! messages. Everything the transports report is folded into [`RemoteError`].

use std::path::PathBuf;

use thiserror::Error;

/// A violated precondition of a remote operation.
///
/// Always raised before any mutation and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidArgument {
    /// A required remote path was empty or whitespace.
    #[error("remote path can not be null or blank")]
    BlankRemotePath,

    /// A delete operation targeted the remote root.
    #[error("remote root path can not be removed")]
    RootRemoval,

    /// A tree operation that forbids the root was handed the root.
    #[error("remote root path is not allowed")]
    RootNotAllowed,

    /// The remote path exists but is a directory.
    #[error("remote path must be a file: {0}")]
    RemoteNotFile(String),

    /// The remote path exists but is not a directory.
    #[error("remote path must be a directory: {0}")]
    RemoteNotDirectory(String),

    /// A required local path was empty.
    #[error("local path can not be null or empty")]
    EmptyLocalPath,

    /// The local path does not exist.
    #[error("local path must exist: {}", .0.display())]
    LocalMissing(PathBuf),

    /// The local path exists but is not a regular file.
    #[error("local path must be a file: {}", .0.display())]
    LocalNotFile(PathBuf),

    /// The local path exists but is not a directory.
    #[error("local path must be a directory: {}", .0.display())]
    LocalNotDirectory(PathBuf),
}

/// Errors returned by remote clients and their transports.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// A precondition of the operation was violated.
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),

    /// The transport reported that the entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server sent a reply that could not be interpreted.
    #[error("Malformed server reply: {0}")]
    MalformedReply(String),

    /// The connection settings are unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The session could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The server rejected the supplied credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A protocol-level command failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A local I/O error (file handles, local directories).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Whether this is the transport's "entity absent" signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

/// Errors raised while loading or validating a connection configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A field holds a value that can not be used.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// The configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for the expected shape.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
