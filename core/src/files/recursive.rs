//! Tree operations built only on the [`RemoteClient`] single-level operations.
//!
//! Nothing here knows which backend it drives. Walks use the call stack,
//! stop at the first error and leave whatever was already transferred or
//! deleted in place.

use std::path::Path;

use tracing::{debug, warn};

use super::local::{ensure_local_dir, file_name, list_dir_sorted, require_local_dir};
use super::path::{join_remote, prefixes, require_not_blank, require_not_root};
use super::{Entry, RemoteClient};
use crate::errors::{InvalidArgument, RemoteError};

/// Create `path` and every missing ancestor, shortest prefix first.
pub fn mkdir_recursive<C: RemoteClient + ?Sized>(
    client: &mut C,
    path: &str,
) -> Result<(), RemoteError> {
    require_not_blank(path)?;
    if client.exists(path) {
        warn!("{path} already exists");
        return Ok(());
    }
    for prefix in prefixes(path) {
        client.mkdir(&prefix)?;
    }
    Ok(())
}

/// Make sure `path` is a remote directory, creating it when absent.
pub(crate) fn ensure_remote_dir<C: RemoteClient + ?Sized>(
    client: &mut C,
    path: &str,
) -> Result<(), RemoteError> {
    if !client.exists(path) {
        return mkdir_recursive(client, path);
    }
    require_remote_dir(client, path)
}

fn require_remote_dir<C: RemoteClient + ?Sized>(
    client: &mut C,
    path: &str,
) -> Result<(), RemoteError> {
    match client.stat(path) {
        Some(entry) if entry.is_directory => Ok(()),
        _ => Err(InvalidArgument::RemoteNotDirectory(path.to_string()).into()),
    }
}

/// Download the remote directory `remote_path` into `local_root/<name>`.
///
/// The root can not be downloaded. A missing remote path is a logged no-op.
pub fn mget<C: RemoteClient + ?Sized>(
    client: &mut C,
    remote_path: &str,
    local_root: &Path,
) -> Result<(), RemoteError> {
    require_not_blank(remote_path)?;
    let remote_path = require_not_root(remote_path, InvalidArgument::RootNotAllowed)?;
    ensure_local_dir(local_root)?;

    let Some(entry) = client.stat(remote_path) else {
        warn!("{remote_path} does not exist");
        return Ok(());
    };
    if !entry.is_directory {
        return Err(InvalidArgument::RemoteNotDirectory(remote_path.to_string()).into());
    }
    download(client, &entry, remote_path, local_root)
}

fn download<C: RemoteClient + ?Sized>(
    client: &mut C,
    entry: &Entry,
    remote: &str,
    local_parent: &Path,
) -> Result<(), RemoteError> {
    let local = local_parent.join(&entry.name);
    if !entry.is_directory {
        debug!("downloading {remote} to {}", local.display());
        return client.get(remote, &local);
    }

    ensure_local_dir(&local)?;
    for child in client.ls(remote, false)? {
        if !is_plain_name(&child.name) {
            warn!("skipping {remote} child with unusable name {:?}", child.name);
            continue;
        }
        download(client, &child, &join_remote(remote, &child.name), &local)?;
    }
    Ok(())
}

/// Upload the local directory `local_root` into `remote_path/<name>`.
///
/// `remote_path` is created when absent and must otherwise be a directory.
pub fn mput<C: RemoteClient + ?Sized>(
    client: &mut C,
    local_root: &Path,
    remote_path: &str,
) -> Result<(), RemoteError> {
    require_not_blank(remote_path)?;
    require_local_dir(local_root)?;
    ensure_remote_dir(client, remote_path)?;
    upload(client, local_root, remote_path)
}

fn upload<C: RemoteClient + ?Sized>(
    client: &mut C,
    local: &Path,
    remote_parent: &str,
) -> Result<(), RemoteError> {
    if local.is_file() {
        debug!("uploading {} into {remote_parent}", local.display());
        return client.put(local, remote_parent);
    }
    if !local.is_dir() {
        warn!("skipping {}: not a file or directory", local.display());
        return Ok(());
    }

    let name = file_name(local)
        .or_else(|| local.canonicalize().ok().and_then(|p| file_name(&p)))
        .ok_or_else(|| InvalidArgument::LocalNotDirectory(local.to_path_buf()))?;
    let remote = join_remote(remote_parent, &name);
    mkdir_recursive(client, &remote)?;
    require_remote_dir(client, &remote)?;

    for child in list_dir_sorted(local)? {
        upload(client, &child, &remote)?;
    }
    Ok(())
}

/// Delete `path` and, for directories, everything below it (post-order).
///
/// The root is never accepted. A missing path is a logged no-op.
pub fn rm_recursive<C: RemoteClient + ?Sized>(
    client: &mut C,
    path: &str,
) -> Result<(), RemoteError> {
    require_not_blank(path)?;
    let path = require_not_root(path, InvalidArgument::RootRemoval)?;

    let Some(entry) = client.stat(path) else {
        warn!("{path} does not exist");
        return Ok(());
    };
    delete(client, &entry, path)
}

fn delete<C: RemoteClient + ?Sized>(
    client: &mut C,
    entry: &Entry,
    path: &str,
) -> Result<(), RemoteError> {
    if !entry.is_directory {
        return client.rm(path);
    }
    for child in client.ls(path, false)? {
        if !is_plain_name(&child.name) {
            warn!("skipping {path} child with unusable name {:?}", child.name);
            continue;
        }
        delete(client, &child, &join_remote(path, &child.name))?;
    }
    client.rmdir(path)
}

/// A single path component that can be appended to a path safely.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\\')
}
