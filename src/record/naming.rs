//! Record file names
//!
//! A record is stored as `<seq>_<yyyymmdd>_<hhmmss>_<METHOD>_<path>.json`.
//! Files spooled for the same transaction share the record's base name:
//! `<base>-body.<ext>`, `<base>-<filename>` and `<base>-multipart_<n>.<ext>`.

use chrono::{DateTime, FixedOffset};

/// Longest sanitized path kept in a file name
const MAX_PATH_LEN: usize = 128;

/// Build the record file name for a captured request
///
/// `path` is the request path without query. Path separators and dots
/// become underscores and doubled underscores are collapsed.
pub fn record_filename(
    seq: u64,
    time: &DateTime<FixedOffset>,
    method: &str,
    path: &str,
) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    let mut sanitized: String = path
        .chars()
        .map(|c| match c {
            '/' | '\\' | '.' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if sanitized.len() > MAX_PATH_LEN {
        let mut end = MAX_PATH_LEN;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized.truncate(end);
    }

    let filename = format!(
        "{:04}_{}_{}_{}.json",
        seq,
        time.format("%Y%m%d_%H%M%S"),
        method,
        sanitized
    );
    filename.replace("__", "_")
}

/// Base name shared by a record and its spooled files
pub fn base_name(record_filename: &str) -> &str {
    record_filename
        .strip_suffix(".json")
        .unwrap_or(record_filename)
}

/// Spool name hint for a request body
pub fn body_hint(base: &str) -> String {
    format!("{}-body.dat", base)
}

/// Spool name hint for a multipart part
///
/// `unnamed` counts the parts without a usable filename seen so far.
pub fn part_hint(base: &str, filename: Option<&str>, unnamed: usize) -> String {
    match filename.and_then(sanitize_part_filename) {
        Some(name) => format!("{}-{}", base, name),
        None => format!("{}-multipart_{}.dat", base, unnamed),
    }
}

/// Reduce a client supplied filename to its last path component
///
/// Returns `None` when nothing usable is left.
pub fn sanitize_part_filename(filename: &str) -> Option<&str> {
    let name = filename
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or("")
        .trim();
    match name {
        "" | "." | ".." => None,
        name if name.chars().any(char::is_control) => None,
        name => Some(name),
    }
}

/// Replace the extension of a file name
///
/// The extension is whatever follows the last dot of the final component.
pub fn with_extension(name: &str, ext: &str) -> String {
    let stem = match name.rfind('.') {
        Some(pos) if !name[pos..].contains(&['/', '\\'][..]) => &name[..pos],
        _ => name,
    };
    format!("{}.{}", stem, ext)
}

/// Insert `_<n>` before the extension of a file name
pub fn numbered(name: &str, n: usize) -> String {
    match name.rfind('.') {
        Some(pos) if pos > 0 && !name[pos..].contains(&['/', '\\'][..]) => {
            format!("{}_{}{}", &name[..pos], n, &name[pos..])
        }
        _ => format!("{}_{}", name, n),
    }
}
