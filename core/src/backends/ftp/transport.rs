//! The raw FTP command surface used by [`FtpClient`](super::FtpClient).

use std::io::{Read, Write};

use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Mode, Status};
use tracing::{debug, info};

use super::reply::{feat_lists_mlst, parse_list_line};
use crate::backends::net;
use crate::config::ConnectionConfig;
use crate::errors::RemoteError;
use crate::files::Entry;

/// Protocol primitives the FTP client is built on.
///
/// Implementations map a "file unavailable" reply to
/// [`RemoteError::NotFound`]; every other failure is a transport error.
pub trait FtpTransport {
    /// Whether the server advertised `MLST` in its `FEAT` reply.
    fn supports_mlst(&self) -> bool;

    /// The fact line of a positive `MLST` reply, `None` on a negative one.
    fn mlst(&mut self, path: &str) -> Result<Option<String>, RemoteError>;

    /// Raw `LIST -a` entries, `.` and `..` included when the server sends them.
    fn list(&mut self, path: &str) -> Result<Vec<Entry>, RemoteError>;

    fn mkdir(&mut self, path: &str) -> Result<(), RemoteError>;

    /// Stream the remote file into `sink`, returning the bytes copied.
    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, RemoteError>;

    /// Store `source` as the remote file `path`, returning the bytes copied.
    fn store(&mut self, path: &str, source: &mut dyn Read) -> Result<u64, RemoteError>;

    fn delete_file(&mut self, path: &str) -> Result<(), RemoteError>;

    fn delete_dir(&mut self, path: &str) -> Result<(), RemoteError>;

    fn disconnect(&mut self) -> Result<(), RemoteError>;
}

/// [`FtpTransport`] over a blocking `suppaftp` control connection.
pub struct SuppaFtpTransport {
    stream: FtpStream,
    mlst: bool,
}

impl SuppaFtpTransport {
    /// Connect, log in and prepare the session.
    ///
    /// The session uses binary transfers, passive mode unless disabled, and
    /// `/` as working directory. `FEAT` is probed once for `MLST`.
    pub fn connect(config: &ConnectionConfig) -> Result<Self, RemoteError> {
        let addr = format!("{}:{}", config.host, config.port());
        let tcp = net::open_stream(config)?;
        let mut stream = FtpStream::connect_with_stream(tcp)
            .map_err(|e| RemoteError::Connection(format!("{addr}: {e}")))?;
        if let Some((proxy_host, proxy_port)) = config.proxy() {
            // Passive data connections go through the proxy as well.
            let proxy_host = proxy_host.to_string();
            let timeout = config.timeout();
            stream = stream.passive_stream_builder(move |data_addr| {
                net::open_proxied(&proxy_host, proxy_port, data_addr, timeout)
                    .map_err(FtpError::ConnectionError)
            });
        }

        let password = config.password.as_deref().unwrap_or_default();
        if let Err(e) = stream.login(config.username.as_str(), password) {
            let _ = stream.quit();
            return Err(RemoteError::Authentication(format!(
                "{}@{}: {e}",
                config.username, config.host
            )));
        }

        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| command_error("TYPE I", e))?;
        stream.set_mode(if config.passive {
            Mode::Passive
        } else {
            Mode::Active
        });
        stream.cwd("/").map_err(|e| command_error("/", e))?;

        let mlst = match stream.custom_command("FEAT", &[Status::System]) {
            Ok(response) => feat_lists_mlst(&String::from_utf8_lossy(&response.body)),
            Err(e) => {
                debug!("FEAT not available: {e}");
                false
            }
        };
        info!(
            "FTP session to {addr} ready (MLST {})",
            if mlst { "supported" } else { "unsupported" }
        );
        Ok(Self { stream, mlst })
    }
}

impl FtpTransport for SuppaFtpTransport {
    fn supports_mlst(&self) -> bool {
        self.mlst
    }

    fn mlst(&mut self, path: &str) -> Result<Option<String>, RemoteError> {
        match self
            .stream
            .custom_command(format!("MLST {path}"), &[Status::RequestedFileActionOk])
        {
            Ok(response) => {
                let body = String::from_utf8_lossy(&response.body);
                match body.lines().nth(1) {
                    Some(line) => Ok(Some(line.trim_end_matches('\r').to_string())),
                    None => Err(RemoteError::MalformedReply(format!(
                        "MLST {path} returned no entry line"
                    ))),
                }
            }
            Err(FtpError::UnexpectedResponse(response)) => {
                debug!("MLST {path}: negative reply {:?}", response.status);
                Ok(None)
            }
            Err(e) => Err(command_error(path, e)),
        }
    }

    fn list(&mut self, path: &str) -> Result<Vec<Entry>, RemoteError> {
        let lines = self
            .stream
            .list(Some(format!("-a {path}").as_str()))
            .map_err(|e| command_error(path, e))?;
        Ok(lines.iter().filter_map(|line| parse_list_line(line)).collect())
    }

    fn mkdir(&mut self, path: &str) -> Result<(), RemoteError> {
        self.stream.mkdir(path).map_err(|e| command_error(path, e))
    }

    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, RemoteError> {
        self.stream
            .retr(path, |reader| {
                std::io::copy(reader, &mut *sink).map_err(FtpError::ConnectionError)
            })
            .map_err(|e| command_error(path, e))
    }

    fn store(&mut self, path: &str, mut source: &mut dyn Read) -> Result<u64, RemoteError> {
        self.stream
            .put_file(path, &mut source)
            .map_err(|e| command_error(path, e))
    }

    fn delete_file(&mut self, path: &str) -> Result<(), RemoteError> {
        self.stream.rm(path).map_err(|e| command_error(path, e))
    }

    fn delete_dir(&mut self, path: &str) -> Result<(), RemoteError> {
        self.stream.rmdir(path).map_err(|e| command_error(path, e))
    }

    fn disconnect(&mut self) -> Result<(), RemoteError> {
        self.stream.quit().map_err(|e| command_error("QUIT", e))
    }
}

/// Map a `suppaftp` error, turning "file unavailable" (550) into `NotFound`.
fn command_error(subject: &str, e: FtpError) -> RemoteError {
    match e {
        FtpError::UnexpectedResponse(response)
            if matches!(response.status, Status::FileUnavailable) =>
        {
            RemoteError::NotFound(subject.to_string())
        }
        other => RemoteError::Transport(format!("{subject}: {other}")),
    }
}
