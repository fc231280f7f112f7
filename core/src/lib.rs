//! Uniform FTP/SFTP client with recursive tree operations.
//!
//! [`files::RemoteClient`] is the operation set every backend provides;
//! [`backends::connect`] opens the backend a [`config::ConnectionConfig`]
//! asks for.

pub mod backends;
pub mod config;
pub mod errors;
pub mod files;

pub use backends::connect;
pub use config::{ConnectionConfig, Protocol};
pub use errors::{ConfigError, InvalidArgument, RemoteError};
pub use files::{Entry, RemoteClient};
