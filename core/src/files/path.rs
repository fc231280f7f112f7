//! Remote path helpers shared by both backends and the recursive engine.
//!
//! Remote paths are POSIX-style strings rooted at the session's working
//! directory, which both clients pin to `/` on connect.

use crate::errors::InvalidArgument;

pub fn is_blank(path: &str) -> bool {
    path.trim().is_empty()
}

/// Reject blank remote paths.
pub fn require_not_blank(path: &str) -> Result<(), InvalidArgument> {
    if is_blank(path) {
        return Err(InvalidArgument::BlankRemotePath);
    }
    Ok(())
}

/// Strip a single trailing `/`.
pub fn strip_trailing_slash(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

/// Whether what is left after stripping a trailing `/` is root-only:
/// blank, or nothing but `/` characters.
fn is_root_only(stripped: &str) -> bool {
    stripped.trim().trim_matches('/').is_empty()
}

/// Strip a trailing `/` and reject what is left if it denotes the root.
///
/// `violation` selects the message: removals report
/// [`InvalidArgument::RootRemoval`], traversals
/// [`InvalidArgument::RootNotAllowed`].
pub fn require_not_root(path: &str, violation: InvalidArgument) -> Result<&str, InvalidArgument> {
    let stripped = strip_trailing_slash(path);
    if is_root_only(stripped) {
        return Err(violation);
    }
    Ok(stripped)
}

/// Whether `path` names the root once a trailing `/` is removed.
pub fn is_root(path: &str) -> bool {
    is_root_only(strip_trailing_slash(path.trim()))
}

/// Derive the working path and base name of a remote path.
///
/// One trailing `/` is stripped. A remainder that is blank or only `/`
/// denotes the root and yields `("/", "/")`; otherwise the base name is the text after the last
/// `/`, or the whole remainder when it has none.
pub fn file_name_from_remote_path(path: &str) -> (String, String) {
    let stripped = strip_trailing_slash(path);
    if is_root_only(stripped) {
        return ("/".to_string(), "/".to_string());
    }
    let name = match stripped.rfind('/') {
        Some(index) => &stripped[index + 1..],
        None => stripped,
    };
    (stripped.to_string(), name.to_string())
}

/// Split a path into its parent directory and base name.
///
/// The parent of a top-level or relative single-segment path is `/`.
/// The root itself splits into `("/", "/")`.
pub fn split_parent(path: &str) -> (String, String) {
    let stripped = strip_trailing_slash(path.trim());
    if is_root_only(stripped) {
        return ("/".to_string(), "/".to_string());
    }
    match stripped.rfind('/') {
        Some(index) => {
            let parent = &stripped[..index];
            let parent = if is_blank(parent) { "/" } else { parent };
            (parent.to_string(), stripped[index + 1..].to_string())
        }
        None => ("/".to_string(), stripped.to_string()),
    }
}

/// Append `name` to `parent` with exactly one `/` between them.
pub fn join_remote(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Every directory prefix of `path`, shortest first.
///
/// A leading `/` stays attached to the first segment and empty segments
/// are skipped, so `/a//b/` yields `["/a", "/a/b"]`.
pub fn prefixes(path: &str) -> Vec<String> {
    let absolute = path.starts_with('/');
    let mut current = String::new();
    let mut result = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if current.is_empty() {
            if absolute {
                current.push('/');
            }
        } else {
            current.push('/');
        }
        current.push_str(segment);
        result.push(current.clone());
    }
    result
}
