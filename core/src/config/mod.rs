pub mod expand;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Transfer protocol of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[serde(alias = "ftp")]
    Ftp,
    #[serde(alias = "sftp")]
    Sftp,
}

impl Protocol {
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Ftp => 21,
            Protocol::Sftp => 22,
        }
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ftp" => Ok(Protocol::Ftp),
            "sftp" => Ok(Protocol::Sftp),
            other => Err(ConfigError::Invalid(format!(
                "unknown protocol '{other}', expected ftp or sftp"
            ))),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ftp => f.write_str("FTP"),
            Protocol::Sftp => f.write_str("SFTP"),
        }
    }
}

/// Everything needed to open a remote session.
///
/// - `port`: defaults to 21 for FTP and 22 for SFTP.
/// - `key_path` / `private_key`: SFTP key authentication; the inline key wins.
/// - `timeout_ms`: connect, read and write timeout (default 60s).
/// - `passive`: FTP data connection mode (default passive).
/// - `proxy_host` / `proxy_port`: SOCKS5 proxy both protocols connect through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub protocol: Protocol,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_passive")]
    pub passive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_port: Option<u16>,
}

impl ConnectionConfig {
    pub fn new(protocol: Protocol, host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            protocol,
            host: host.into(),
            port: None,
            username: username.into(),
            password: None,
            key_path: None,
            private_key: None,
            passphrase: None,
            timeout_ms: default_timeout_ms(),
            passive: default_passive(),
            proxy_host: None,
            proxy_port: None,
        }
    }

    /// Load a JSON settings file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// The configured port, or the protocol default.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.protocol.default_port())
    }

    /// The SOCKS5 proxy to tunnel through, when one is configured.
    ///
    /// A blank host means no proxy.
    pub fn proxy(&self) -> Option<(&str, u16)> {
        let host = self.proxy_host.as_deref().map(str::trim)?;
        if host.is_empty() {
            return None;
        }
        Some((host, self.proxy_port?))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Return a copy with all `${env:...}` placeholders and `~` expanded.
    pub fn expand(mut self) -> Self {
        self.host = expand::expand_env_placeholders(&self.host);
        self.username = expand::expand_env_placeholders(&self.username);
        self.password = self.password.map(|s| expand::expand_env_placeholders(&s));
        self.passphrase = self.passphrase.map(|s| expand::expand_env_placeholders(&s));
        self.proxy_host = self.proxy_host.map(|s| expand::expand_env_placeholders(&s));
        self.key_path = self.key_path.map(|s| {
            // Pasted paths often keep their quotes.
            let stripped = s.trim().trim_matches('"').trim_matches('\'');
            expand::expand_tilde(&expand::expand_env_placeholders(stripped))
        });
        self
    }

    /// Reject values no session could be opened with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host can not be blank".to_string()));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::Invalid("username can not be blank".to_string()));
        }
        if self.port == Some(0) {
            return Err(ConfigError::Invalid("port must be between 1 and 65535".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeoutMs must be positive".to_string()));
        }
        let proxy_host = self.proxy_host.as_deref().filter(|h| !h.trim().is_empty());
        match (proxy_host, self.proxy_port) {
            (Some(_), None) => {
                return Err(ConfigError::Invalid("proxyHost requires a proxyPort".to_string()));
            }
            (_, Some(0)) => {
                return Err(ConfigError::Invalid(
                    "proxyPort must be between 1 and 65535".to_string(),
                ));
            }
            _ => {}
        }
        Ok(())
    }
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_passive() -> bool {
    true
}
