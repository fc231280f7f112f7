//! Parsing of FTP control-channel replies into [`Entry`] values.
//!
//! Kept free of I/O so server quirks can be reproduced with plain strings.

use std::str::FromStr;
use std::time::UNIX_EPOCH;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::errors::RemoteError;
use crate::files::path::{file_name_from_remote_path, is_root, strip_trailing_slash};
use crate::files::Entry;

/// Repair and validate the fact line of an `MLST` reply.
///
/// RFC 3659 requires the entry line to start with a space, which some
/// servers omit; one is prepended when missing. The reply must then hold at
/// least three characters (space, facts or separator, name). Returns the
/// fact string with leading whitespace removed.
pub fn normalize_mlst_reply(reply: &str) -> Result<String, RemoteError> {
    let mut line = reply.trim_end_matches(['\r', '\n']).to_string();
    if !line.starts_with(' ') {
        line.insert(0, ' ');
    }
    if line.len() < 3 || !line.starts_with(' ') {
        return Err(RemoteError::MalformedReply(format!(
            "Invalid server reply (MLST): '{line}'"
        )));
    }
    Ok(line.trim_start().to_string())
}

/// Parse a normalized `MLST` fact string for the path that was requested.
///
/// The entry is named after the last component of the reported pathname.
/// A `.` name, or a request for the root, takes the requested path's base
/// name instead (`/` for the root).
pub fn parse_mlst_entry(facts_line: &str, requested: &str) -> Result<Entry, RemoteError> {
    let (facts, pathname) = match facts_line.split_once(' ') {
        Some((facts, pathname)) => (facts, pathname),
        // Fact-less entries are just a pathname.
        None if !facts_line.contains(';') => ("", facts_line),
        None => {
            return Err(RemoteError::MalformedReply(format!(
                "MLST entry without pathname: '{facts_line}'"
            )))
        }
    };
    if pathname.is_empty() {
        return Err(RemoteError::MalformedReply(format!(
            "MLST entry without pathname: '{facts_line}'"
        )));
    }

    let mut is_directory = false;
    let mut size = None;
    let mut modified = None;
    for fact in facts.split(';').filter(|f| !f.is_empty()) {
        let Some((key, value)) = fact.split_once('=') else {
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "type" => {
                is_directory = matches!(
                    value.to_ascii_lowercase().as_str(),
                    "dir" | "cdir" | "pdir"
                );
            }
            "size" => size = value.parse::<u64>().ok(),
            "modify" => modified = parse_mlst_time(value),
            _ => {}
        }
    }

    let reported = match file_name_from_remote_path(pathname).1.as_str() {
        "." => None,
        name => Some(name.to_string()),
    };
    let name = match reported {
        Some(name) if !is_root(requested) => name,
        _ => file_name_from_remote_path(strip_trailing_slash(requested.trim())).1,
    };

    Ok(Entry::new(name, is_directory)
        .with_size(size)
        .with_modification_time(modified))
}

/// Parse an `MLST` `modify` fact (`YYYYMMDDHHMMSS[.sss]`, UTC) into epoch millis.
pub fn parse_mlst_time(value: &str) -> Option<i64> {
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if whole.len() != 14 || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let time = NaiveDateTime::parse_from_str(whole, "%Y%m%d%H%M%S").ok()?;
    let digits: String = fraction.chars().take(3).collect();
    let millis = if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        format!("{digits:0<3}").parse::<i64>().unwrap_or(0)
    } else {
        0
    };
    Some(time.and_utc().timestamp_millis() + millis)
}

/// Whether a `FEAT` reply advertises `MLST`.
pub fn feat_lists_mlst(reply: &str) -> bool {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("211"))
        .filter_map(|line| line.split_whitespace().next())
        .any(|feature| feature.eq_ignore_ascii_case("MLST"))
}

/// Parse one `LIST` line (UNIX or DOS style). Unparsable lines yield `None`.
pub fn parse_list_line(line: &str) -> Option<Entry> {
    match suppaftp::list::File::from_str(line) {
        Ok(file) => {
            let modified = file
                .modified()
                .duration_since(UNIX_EPOCH)
                .ok()
                .and_then(|d| i64::try_from(d.as_millis()).ok());
            Some(
                Entry::new(file.name(), file.is_directory())
                    .with_size(Some(file.size() as u64))
                    .with_modification_time(modified),
            )
        }
        Err(e) => {
            debug!("ignoring LIST line {line:?}: {e}");
            None
        }
    }
}
