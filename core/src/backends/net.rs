//! TCP connections shared by both backends, direct or through a SOCKS5 proxy.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use socks::Socks5Stream;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::errors::RemoteError;

/// Open the control connection `config` describes.
///
/// With a proxy configured the server address is resolved by the proxy.
/// Read and write timeouts are set on the returned stream either way.
pub fn open_stream(config: &ConnectionConfig) -> Result<TcpStream, RemoteError> {
    let host = config.host.as_str();
    let port = config.port();
    let timeout = config.timeout();
    let stream = match config.proxy() {
        Some((proxy_host, proxy_port)) => {
            debug!("Connecting to {host}:{port} through SOCKS5 proxy {proxy_host}:{proxy_port}");
            Socks5Stream::connect((proxy_host, proxy_port), (host, port))
                .map_err(|e| {
                    RemoteError::Connection(format!(
                        "{host}:{port} via proxy {proxy_host}:{proxy_port}: {e}"
                    ))
                })?
                .into_inner()
        }
        None => {
            let addr = resolve(host, port)?;
            TcpStream::connect_timeout(&addr, timeout)
                .map_err(|e| RemoteError::Connection(format!("{addr}: {e}")))?
        }
    };
    apply_timeouts(&stream, timeout)
        .map_err(|e| RemoteError::Connection(format!("{host}:{port}: {e}")))?;
    Ok(stream)
}

/// Open a data connection to `addr` through the SOCKS5 proxy at
/// `proxy_host:proxy_port`.
pub fn open_proxied(
    proxy_host: &str,
    proxy_port: u16,
    addr: SocketAddr,
    timeout: Duration,
) -> std::io::Result<TcpStream> {
    let stream = Socks5Stream::connect((proxy_host, proxy_port), addr)?.into_inner();
    apply_timeouts(&stream, timeout)?;
    Ok(stream)
}

fn apply_timeouts(stream: &TcpStream, timeout: Duration) -> std::io::Result<()> {
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, RemoteError> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| RemoteError::Connection(format!("{host}:{port}: {e}")))?
        .next()
        .ok_or_else(|| RemoteError::Connection(format!("{host}:{port}: no address")))
}
