use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use remotree_core::{ConnectionConfig, Entry, Protocol, RemoteClient};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "remotree", version)]
#[command(about = "FTP/SFTP client with recursive download, upload and delete")]
struct Cli {
    /// JSON connection settings; flags below override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Protocol: ftp or sftp
    #[arg(long = "type", global = true)]
    protocol: Option<Protocol>,

    #[arg(long, global = true)]
    host: Option<String>,

    #[arg(long, global = true)]
    port: Option<u16>,

    #[arg(long = "user", global = true)]
    username: Option<String>,

    #[arg(long = "pass", global = true)]
    password: Option<String>,

    /// Private key for SFTP public-key authentication
    #[arg(long, global = true)]
    key_path: Option<String>,

    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// SOCKS5 proxy host
    #[arg(long = "proxy", global = true)]
    proxy_host: Option<String>,

    #[arg(long, global = true)]
    proxy_port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a remote directory
    Ls {
        remote: String,
        /// Include dot-files
        #[arg(short, long)]
        all: bool,
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a single remote entry
    Stat {
        remote: String,
        #[arg(long)]
        json: bool,
    },
    /// Download one remote file to a local path
    Get { remote: String, local: PathBuf },
    /// Upload one local file into a remote directory
    Put { local: PathBuf, remote_dir: String },
    /// Create a remote directory
    Mkdir {
        remote: String,
        /// Create missing parent directories
        #[arg(short, long)]
        parents: bool,
    },
    /// Delete a remote file
    Rm {
        remote: String,
        /// Delete directories and their contents
        #[arg(short, long)]
        recursive: bool,
    },
    /// Delete an empty remote directory
    Rmdir { remote: String },
    /// Download a remote directory tree
    Download {
        remote: String,
        #[arg(long, default_value = "download-test")]
        local: PathBuf,
    },
    /// Upload a local directory tree into a remote directory
    Upload { local: PathBuf, remote: String },
}

impl Cli {
    /// Merge the config file (if any) with command-line overrides.
    fn connection_config(&self) -> Result<ConnectionConfig> {
        let mut config = match &self.config {
            Some(path) => ConnectionConfig::from_json_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => {
                let Some(protocol) = self.protocol else {
                    bail!("--type is required without --config");
                };
                let (Some(host), Some(username)) = (&self.host, &self.username) else {
                    bail!("--host and --user are required without --config");
                };
                ConnectionConfig::new(protocol, host.as_str(), username.as_str())
            }
        };

        if let Some(protocol) = self.protocol {
            config.protocol = protocol;
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = Some(port);
        }
        if let Some(username) = &self.username {
            config.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(key_path) = &self.key_path {
            config.key_path = Some(key_path.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(proxy_host) = &self.proxy_host {
            config.proxy_host = Some(proxy_host.clone());
        }
        if let Some(proxy_port) = self.proxy_port {
            config.proxy_port = Some(proxy_port);
        }
        Ok(config.expand())
    }
}

fn format_entry(entry: &Entry) -> String {
    let kind = if entry.is_directory { 'd' } else { '-' };
    let size = entry
        .size
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    let modified = entry
        .modified()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{kind} {size:>12} {modified:>16} {}", entry.name)
}

fn run(client: &mut dyn RemoteClient, command: Command) -> Result<()> {
    match command {
        Command::Ls { remote, all, json } => {
            let entries = client.ls(&remote, !all)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    println!("{}", format_entry(entry));
                }
            }
        }
        Command::Stat { remote, json } => {
            let Some(entry) = client.stat(&remote) else {
                bail!("{remote} does not exist");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                println!("{}", format_entry(&entry));
            }
        }
        Command::Get { remote, local } => client.get(&remote, &local)?,
        Command::Put { local, remote_dir } => client.put(&local, &remote_dir)?,
        Command::Mkdir { remote, parents } => {
            if parents {
                client.mkdir_recursive(&remote)?;
            } else {
                client.mkdir(&remote)?;
            }
        }
        Command::Rm { remote, recursive } => {
            if recursive {
                client.rm_recursive(&remote)?;
            } else {
                client.rm(&remote)?;
            }
        }
        Command::Rmdir { remote } => client.rmdir(&remote)?,
        Command::Download { remote, local } => {
            client.mget(&remote, &local)?;
            info!("Downloaded {remote} into {}", local.display());
        }
        Command::Upload { local, remote } => {
            client.mput(&local, &remote)?;
            info!("Uploaded {} into {remote}", local.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = cli.connection_config().and_then(|config| {
        let mut client = remotree_core::connect(&config)
            .with_context(|| format!("Failed to connect to {}", config.host))?;
        let outcome = run(client.as_mut(), cli.command);
        let closed = client.close();
        outcome?;
        closed.context("Failed to close session")
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
