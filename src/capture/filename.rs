//! Transcript file naming.
//!
//! `<sanitized-path>-<unixMillis>.<req|res>` inside the output directory.
//! Two requests for the same path within the same millisecond get the same
//! name; that collision is a known limitation of the scheme.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Which half of an exchange a transcript records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptKind {
    Request,
    Response,
}

impl TranscriptKind {
    /// Three-letter file suffix.
    pub fn suffix(&self) -> &'static str {
        match self {
            TranscriptKind::Request => "req",
            TranscriptKind::Response => "res",
        }
    }
}

impl std::fmt::Display for TranscriptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptKind::Request => f.write_str("request"),
            TranscriptKind::Response => f.write_str("response"),
        }
    }
}

/// Allocate a transcript path for `request_path`, stamped with the current time.
pub fn allocate(output_dir: &Path, request_path: &str, kind: TranscriptKind) -> PathBuf {
    allocate_at(output_dir, request_path, kind, unix_millis())
}

/// Allocate a transcript path with an explicit millisecond timestamp.
pub fn allocate_at(
    output_dir: &Path,
    request_path: &str,
    kind: TranscriptKind,
    timestamp_millis: u128,
) -> PathBuf {
    output_dir.join(format!(
        "{}-{}.{}",
        sanitize(request_path),
        timestamp_millis,
        kind.suffix()
    ))
}

/// Turn a request path into a file-name stem.
///
/// The query string is dropped, surrounding slashes are trimmed and each of
/// `/ = ? : & \` becomes `_`. A root request becomes `root`.
pub fn sanitize(request_path: &str) -> String {
    let path = request_path
        .split_once('?')
        .map(|(path, _)| path)
        .unwrap_or(request_path);

    let trimmed = path.trim_matches('/');
    let replaced: String = trimmed.chars().map(replace_reserved).collect();

    // only an underscore produced by replacement is collapsed
    let name = match trimmed.chars().next() {
        Some(first) if replace_reserved(first) != first => &replaced[1..],
        _ => replaced.as_str(),
    };
    if name.is_empty() {
        "root".to_string()
    } else {
        name.to_string()
    }
}

fn replace_reserved(c: char) -> char {
    match c {
        '/' | '=' | '?' | ':' | '&' | '\\' => '_',
        other => other,
    }
}

/// Milliseconds since the Unix epoch.
pub fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
