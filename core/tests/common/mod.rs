//! Shared test utilities for remotree core integration tests.
//!
//! Provides an in-memory remote filesystem that implements both transport
//! traits, so every client behavior can be exercised without a server,
//! plus a log-capturing `tracing` subscriber.

// Each integration test is compiled as its own crate, so not every test file
// uses every function from this shared module. Suppress dead_code warnings.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use remotree_core::backends::ftp::FtpTransport;
use remotree_core::backends::sftp::{SftpAttrs, SftpTransport};
use remotree_core::backends::{FtpClient, SftpClient};
use remotree_core::{Entry, RemoteError};

/// Fixed modification time of every node, in epoch seconds.
pub const MTIME: u64 = 1_704_110_400;

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Default)]
struct FsState {
    nodes: BTreeMap<String, Node>,
    calls: Vec<String>,
    disconnects: usize,
    broken: bool,
    fail_on: Option<String>,
}

/// A remote filesystem shared between a fake transport and the test body.
#[derive(Clone)]
pub struct MemoryFs {
    state: Rc<RefCell<FsState>>,
}

/// Canonical form of a remote path: absolute, no empty segments, no
/// trailing `/`; the root is `/`.
pub fn normalize(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

fn parent_of(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    let index = path.rfind('/')?;
    Some(if index == 0 {
        "/".to_string()
    } else {
        path[..index].to_string()
    })
}

fn base_name(path: &str) -> String {
    if path == "/" {
        return "/".to_string();
    }
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn transport_error(message: impl Into<String>) -> RemoteError {
    RemoteError::Transport(message.into())
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// An empty filesystem holding only the root directory.
    pub fn new() -> Self {
        let mut state = FsState::default();
        state.nodes.insert("/".to_string(), Node::Dir);
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// The fixture most tests start from: `/hello.txt`, a hidden file and
    /// the `/new/a` tree with three files.
    pub fn fixture() -> Self {
        let fs = Self::new();
        fs.add_file("/hello.txt", b"Hello World");
        fs.add_file("/.hidden.txt", b"secret");
        fs.add_file("/new/a/a.txt", b"This is a.txt");
        fs.add_file("/new/a/b/b.txt", b"This is b.txt");
        fs.add_file("/new/a/b/c/c.txt", b"This is c.txt");
        fs.clear_calls();
        fs
    }

    /// Create a directory and every missing ancestor.
    pub fn add_dir(&self, path: &str) {
        let path = normalize(path);
        let mut state = self.state.borrow_mut();
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            state.nodes.entry(current.clone()).or_insert(Node::Dir);
        }
    }

    /// Create a file, creating its parent directories.
    pub fn add_file(&self, path: &str, content: &[u8]) {
        let path = normalize(path);
        if let Some(parent) = parent_of(&path) {
            self.add_dir(&parent);
        }
        self.state
            .borrow_mut()
            .nodes
            .insert(path, Node::File(content.to_vec()));
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.borrow().nodes.contains_key(&normalize(path))
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(
            self.state.borrow().nodes.get(&normalize(path)),
            Some(Node::Dir)
        )
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.borrow().nodes.get(&normalize(path)) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Every path currently stored, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.state.borrow().nodes.keys().cloned().collect()
    }

    /// Mutating commands received so far, e.g. `"mkdir /a"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn disconnects(&self) -> usize {
        self.state.borrow().disconnects
    }

    /// Make every subsequent command fail with a transport error.
    pub fn set_broken(&self, broken: bool) {
        self.state.borrow_mut().broken = broken;
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.state.borrow().broken {
            return Err(transport_error("connection reset"));
        }
        Ok(())
    }

    /// Make the mutating command recorded as `call` fail.
    pub fn fail_on(&self, call: &str) {
        self.state.borrow_mut().fail_on = Some(call.to_string());
    }

    fn record(&self, call: String) -> Result<(), RemoteError> {
        let mut state = self.state.borrow_mut();
        let fail = state.fail_on.as_deref() == Some(call.as_str());
        state.calls.push(call.clone());
        if fail {
            return Err(transport_error(format!("{call}: injected failure")));
        }
        Ok(())
    }

    fn node(&self, path: &str) -> Option<Node> {
        self.state.borrow().nodes.get(path).cloned()
    }

    /// Immediate children of a directory as `(name, node)` pairs.
    fn children(&self, dir: &str) -> Vec<(String, Node)> {
        let state = self.state.borrow();
        state
            .nodes
            .iter()
            .filter(|(path, _)| parent_of(path).as_deref() == Some(dir))
            .map(|(path, node)| (base_name(path), node.clone()))
            .collect()
    }

    fn make_dir(&self, path: &str) -> Result<(), RemoteError> {
        self.check()?;
        let path = normalize(path);
        self.record(format!("mkdir {path}"))?;
        if self.node(&path).is_some() {
            return Err(transport_error(format!("{path}: already exists")));
        }
        match parent_of(&path).and_then(|p| self.node(&p)) {
            Some(Node::Dir) => {
                self.state.borrow_mut().nodes.insert(path, Node::Dir);
                Ok(())
            }
            Some(Node::File(_)) => Err(transport_error(format!("{path}: parent is a file"))),
            None => Err(RemoteError::NotFound(path)),
        }
    }

    fn read_file(&self, path: &str, sink: &mut dyn Write) -> Result<u64, RemoteError> {
        self.check()?;
        let path = normalize(path);
        match self.node(&path) {
            Some(Node::File(data)) => {
                sink.write_all(&data)?;
                Ok(data.len() as u64)
            }
            Some(Node::Dir) => Err(transport_error(format!("{path}: is a directory"))),
            None => Err(RemoteError::NotFound(path)),
        }
    }

    fn write_file(&self, path: &str, source: &mut dyn Read) -> Result<u64, RemoteError> {
        self.check()?;
        let path = normalize(path);
        self.record(format!("store {path}"))?;
        if !matches!(parent_of(&path).and_then(|p| self.node(&p)), Some(Node::Dir)) {
            return Err(RemoteError::NotFound(path));
        }
        if matches!(self.node(&path), Some(Node::Dir)) {
            return Err(transport_error(format!("{path}: is a directory")));
        }
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        let len = data.len() as u64;
        self.state.borrow_mut().nodes.insert(path, Node::File(data));
        Ok(len)
    }

    fn remove_file(&self, path: &str) -> Result<(), RemoteError> {
        self.check()?;
        let path = normalize(path);
        self.record(format!("delete_file {path}"))?;
        match self.node(&path) {
            Some(Node::File(_)) => {
                self.state.borrow_mut().nodes.remove(&path);
                Ok(())
            }
            Some(Node::Dir) => Err(transport_error(format!("{path}: is a directory"))),
            None => Err(RemoteError::NotFound(path)),
        }
    }

    fn remove_dir(&self, path: &str) -> Result<(), RemoteError> {
        self.check()?;
        let path = normalize(path);
        self.record(format!("delete_dir {path}"))?;
        match self.node(&path) {
            Some(Node::Dir) if path == "/" => Err(transport_error("/: permission denied")),
            Some(Node::Dir) if !self.children(&path).is_empty() => {
                Err(transport_error(format!("{path}: directory not empty")))
            }
            Some(Node::Dir) => {
                self.state.borrow_mut().nodes.remove(&path);
                Ok(())
            }
            Some(Node::File(_)) => Err(transport_error(format!("{path}: not a directory"))),
            None => Err(RemoteError::NotFound(path)),
        }
    }

    fn disconnect(&self) {
        self.state.borrow_mut().disconnects += 1;
    }
}

fn ftp_entry(name: &str, node: &Node) -> Entry {
    let millis = Some(MTIME as i64 * 1000);
    match node {
        Node::Dir => Entry::directory(name)
            .with_size(Some(4096))
            .with_modification_time(millis),
        Node::File(data) => Entry::file(name)
            .with_size(Some(data.len() as u64))
            .with_modification_time(millis),
    }
}

fn sftp_attrs(node: &Node) -> SftpAttrs {
    match node {
        Node::Dir => SftpAttrs {
            is_dir: true,
            size: Some(4096),
            mtime: Some(MTIME),
        },
        Node::File(data) => SftpAttrs {
            is_dir: false,
            size: Some(data.len() as u64),
            mtime: Some(MTIME),
        },
    }
}

/// An FTP server backed by a [`MemoryFs`].
pub struct FakeFtp {
    fs: MemoryFs,
    /// Whether `FEAT` advertises `MLST`.
    pub mlst: bool,
    /// Send `MLST` entry lines without the leading space.
    pub mlst_missing_space: bool,
    /// Answer every `MLST` for an existing path with this raw line.
    pub mlst_reply: Option<String>,
}

impl FakeFtp {
    pub fn new(fs: MemoryFs) -> Self {
        Self {
            fs,
            mlst: true,
            mlst_missing_space: false,
            mlst_reply: None,
        }
    }
}

impl FtpTransport for FakeFtp {
    fn supports_mlst(&self) -> bool {
        self.mlst
    }

    fn mlst(&mut self, path: &str) -> Result<Option<String>, RemoteError> {
        self.fs.check()?;
        let path = normalize(path);
        let Some(node) = self.fs.node(&path) else {
            return Ok(None);
        };
        if let Some(reply) = &self.mlst_reply {
            return Ok(Some(reply.clone()));
        }
        let facts = match &node {
            Node::Dir => "type=dir;".to_string(),
            Node::File(data) => format!("type=file;size={};", data.len()),
        };
        let lead = if self.mlst_missing_space { "" } else { " " };
        Ok(Some(format!(
            "{lead}{facts}modify=20240101120000; {path}"
        )))
    }

    fn list(&mut self, path: &str) -> Result<Vec<Entry>, RemoteError> {
        self.fs.check()?;
        let path = normalize(path);
        match self.fs.node(&path) {
            None => Err(RemoteError::NotFound(path)),
            Some(node @ Node::File(_)) => Ok(vec![ftp_entry(&base_name(&path), &node)]),
            Some(Node::Dir) => {
                let mut entries = vec![ftp_entry(".", &Node::Dir), ftp_entry("..", &Node::Dir)];
                entries.extend(
                    self.fs
                        .children(&path)
                        .iter()
                        .map(|(name, node)| ftp_entry(name, node)),
                );
                Ok(entries)
            }
        }
    }

    fn mkdir(&mut self, path: &str) -> Result<(), RemoteError> {
        self.fs.make_dir(path)
    }

    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, RemoteError> {
        self.fs.read_file(path, sink)
    }

    fn store(&mut self, path: &str, source: &mut dyn Read) -> Result<u64, RemoteError> {
        self.fs.write_file(path, source)
    }

    fn delete_file(&mut self, path: &str) -> Result<(), RemoteError> {
        self.fs.remove_file(path)
    }

    fn delete_dir(&mut self, path: &str) -> Result<(), RemoteError> {
        self.fs.remove_dir(path)
    }

    fn disconnect(&mut self) -> Result<(), RemoteError> {
        self.fs.disconnect();
        Ok(())
    }
}

/// An SFTP server backed by a [`MemoryFs`].
pub struct FakeSftp {
    fs: MemoryFs,
    /// Leave `.` and `..` out of directory reads.
    pub omit_dot_entries: bool,
}

impl FakeSftp {
    pub fn new(fs: MemoryFs) -> Self {
        Self {
            fs,
            omit_dot_entries: false,
        }
    }
}

impl SftpTransport for FakeSftp {
    fn lstat(&mut self, path: &str) -> Result<SftpAttrs, RemoteError> {
        self.fs.check()?;
        let path = normalize(path);
        self.fs
            .node(&path)
            .map(|node| sftp_attrs(&node))
            .ok_or(RemoteError::NotFound(path))
    }

    fn list(&mut self, path: &str) -> Result<Vec<(String, SftpAttrs)>, RemoteError> {
        self.fs.check()?;
        let path = normalize(path);
        match self.fs.node(&path) {
            None => Err(RemoteError::NotFound(path)),
            Some(Node::File(_)) => Err(transport_error(format!("{path}: not a directory"))),
            Some(Node::Dir) => {
                let mut entries = Vec::new();
                if !self.omit_dot_entries {
                    entries.push((".".to_string(), sftp_attrs(&Node::Dir)));
                    entries.push(("..".to_string(), sftp_attrs(&Node::Dir)));
                }
                entries.extend(
                    self.fs
                        .children(&path)
                        .iter()
                        .map(|(name, node)| (name.clone(), sftp_attrs(node))),
                );
                Ok(entries)
            }
        }
    }

    fn mkdir(&mut self, path: &str) -> Result<(), RemoteError> {
        self.fs.make_dir(path)
    }

    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, RemoteError> {
        self.fs.read_file(path, sink)
    }

    fn store(&mut self, path: &str, source: &mut dyn Read) -> Result<u64, RemoteError> {
        self.fs.write_file(path, source)
    }

    fn delete_file(&mut self, path: &str) -> Result<(), RemoteError> {
        self.fs.remove_file(path)
    }

    fn delete_dir(&mut self, path: &str) -> Result<(), RemoteError> {
        self.fs.remove_dir(path)
    }

    fn disconnect(&mut self) -> Result<(), RemoteError> {
        self.fs.disconnect();
        Ok(())
    }
}

pub fn ftp_client(fs: &MemoryFs) -> FtpClient<FakeFtp> {
    FtpClient::new(FakeFtp::new(fs.clone()))
}

pub fn sftp_client(fs: &MemoryFs) -> SftpClient<FakeSftp> {
    SftpClient::new(FakeSftp::new(fs.clone()))
}

// --- Log capture ---

#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber writing into the returned buffer.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, LogBuffer) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .without_time()
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer)
}

// --- Live servers ---

/// Check if a TCP port is reachable on the given host.
pub fn is_port_reachable(host: &str, port: u16) -> bool {
    let addr = format!("{host}:{port}");
    if let Ok(addr) = addr.parse() {
        TcpStream::connect_timeout(&addr, Duration::from_secs(2)).is_ok()
    } else {
        false
    }
}

/// Skip the current test if no server is listening on the given port.
macro_rules! require_server {
    ($port:expr) => {
        if !common::is_port_reachable("127.0.0.1", $port) {
            eprintln!(
                "SKIPPED: no server reachable on port {} \
                 (start with: docker compose -f core/tests/docker/docker-compose.yml up -d)",
                $port
            );
            return;
        }
    };
}
pub(crate) use require_server;
