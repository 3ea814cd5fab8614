//! Media types
//!
//! Parsing of `Content-Type` values and the built-in table used to pick a
//! file extension for a spooled body, or a content type for a file that is
//! being replayed or served.

use std::path::Path;

/// Extension (without dot) and its content type
///
/// When several extensions share a type, the first one listed is the one
/// used for spooled files.
const TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain; charset=utf-8"),
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("css", "text/css; charset=utf-8"),
    ("csv", "text/csv; charset=utf-8"),
    ("md", "text/markdown; charset=utf-8"),
    ("js", "text/javascript; charset=utf-8"),
    ("mjs", "text/javascript; charset=utf-8"),
    ("xml", "application/xml"),
    ("xml", "text/xml; charset=utf-8"),
    ("json", "application/json"),
    ("yaml", "application/yaml"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("wasm", "application/wasm"),
    ("bin", "application/octet-stream"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
];

/// A parsed media type such as `multipart/form-data; boundary=xyz`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    essence: String,
    params: Vec<(String, String)>,
}

impl MediaType {
    /// Parse a `Content-Type` value
    ///
    /// Returns `None` when the value has no `type/subtype`. Malformed
    /// parameters are skipped.
    pub fn parse(value: &str) -> Option<Self> {
        let mut rest = value;
        let essence = match rest.find(';') {
            Some(pos) => {
                let essence = &rest[..pos];
                rest = &rest[pos + 1..];
                essence
            }
            None => {
                let essence = rest;
                rest = "";
                essence
            }
        };

        let essence = essence.trim().to_ascii_lowercase();
        let (ty, subtype) = essence.split_once('/')?;
        if ty.is_empty() || subtype.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        while !rest.is_empty() {
            let (param, tail) = split_param(rest);
            rest = tail;
            if let Some((name, value)) = param {
                params.push((name, value));
            }
        }

        Some(MediaType { essence, params })
    }

    /// The lowercase `type/subtype`
    pub fn essence(&self) -> &str {
        &self.essence
    }

    /// Look up a parameter by case-insensitive name
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The `boundary` parameter, when non-empty
    pub fn boundary(&self) -> Option<&str> {
        self.param("boundary").filter(|b| !b.is_empty())
    }
}

/// Split one `name=value` parameter off the front of `input`
fn split_param(input: &str) -> (Option<(String, String)>, &str) {
    let input = input.trim_start();
    let Some(eq) = input.find('=') else {
        let tail = input.find(';').map(|p| &input[p + 1..]).unwrap_or("");
        return (None, tail);
    };
    if let Some(semi) = input.find(';') {
        if semi < eq {
            return (None, &input[semi + 1..]);
        }
    }

    let name = input[..eq].trim().to_ascii_lowercase();
    let after = input[eq + 1..].trim_start();

    let (value, tail) = if let Some(quoted) = after.strip_prefix('"') {
        let mut value = String::new();
        let mut chars = quoted.char_indices();
        let mut end = quoted.len();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        value.push(escaped);
                    }
                }
                '"' => {
                    end = i + 1;
                    break;
                }
                _ => value.push(c),
            }
        }
        let tail = &quoted[end..];
        let tail = tail.find(';').map(|p| &tail[p + 1..]).unwrap_or("");
        (value, tail)
    } else {
        match after.find(';') {
            Some(p) => (after[..p].trim().to_string(), &after[p + 1..]),
            None => (after.trim().to_string(), ""),
        }
    };

    if name.is_empty() {
        return (None, tail);
    }
    (Some((name, value)), tail)
}

/// Look up a parameter of a header value such as `Content-Disposition`
///
/// Everything before the first `;` is ignored.
pub fn header_param(value: &str, name: &str) -> Option<String> {
    let mut rest = value.split_once(';')?.1;
    while !rest.is_empty() {
        let (param, tail) = split_param(rest);
        rest = tail;
        if let Some((n, v)) = param {
            if n.eq_ignore_ascii_case(name) {
                return Some(v);
            }
        }
    }
    None
}

/// Whether a content type denotes a multipart form body
pub fn is_multipart(content_type: &str) -> bool {
    content_type
        .to_ascii_lowercase()
        .contains("multipart/form-data")
}

/// Whether a content type denotes a JSON body
pub fn is_json(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("/json")
}

/// Preferred file extension (without dot) for a content type
pub fn extension_for_type(content_type: &str) -> Option<&'static str> {
    let media = MediaType::parse(content_type)?;
    TYPES
        .iter()
        .find(|(_, ty)| essence_of(ty) == media.essence())
        .map(|(ext, _)| *ext)
}

/// Content type for a file extension (with or without dot)
pub fn type_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.');
    TYPES
        .iter()
        .find(|(e, _)| e.eq_ignore_ascii_case(ext))
        .map(|(_, ty)| *ty)
}

/// Content type for a file path, from its extension
pub fn type_for_path(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(type_for_extension)
}

fn essence_of(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or("").trim()
}
