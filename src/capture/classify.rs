//! Body classification
//!
//! Decides how a body is kept in a record. JSON bodies are embedded as-is,
//! short printable bodies are stored inline, everything else is spooled to
//! a file next to the record. At most one peek window of the body is held
//! in memory, apart from JSON bodies which are capped separately.

use crate::mime;
use crate::record::naming;
use crate::record::{Body, Error, PartBody, Result};
use serde_json::value::RawValue;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Bytes inspected before deciding between inline text and a spool file
pub const PEEK_WINDOW: usize = 64 * 1024;

/// Largest JSON body kept in a record
pub const JSON_LIMIT: usize = 1024 * 1024;

/// Outcome of classifying one body
#[derive(Debug, Clone)]
pub enum Classified {
    Empty,
    Text(String),
    /// Name of the spool file, relative to the save directory
    File(String),
    Json(Box<RawValue>),
}

impl Classified {
    pub fn into_body(self) -> Body {
        match self {
            Classified::Empty => Body::None,
            Classified::Text(text) => Body::Text(text),
            Classified::File(name) => Body::File(name),
            Classified::Json(raw) => Body::Json(raw),
        }
    }

    pub fn into_part_body(self) -> PartBody {
        match self {
            Classified::Empty => PartBody::None,
            Classified::Text(text) => PartBody::Text(text),
            Classified::File(name) => PartBody::File(name),
            Classified::Json(raw) => PartBody::Json(raw),
        }
    }
}

/// Classifies bodies and spools them into one directory
#[derive(Debug, Clone)]
pub struct BodyClassifier {
    dir: PathBuf,
}

impl BodyClassifier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        BodyClassifier { dir: dir.into() }
    }

    /// Directory spool files are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Classify a non-multipart message body
    ///
    /// JSON content types are embedded; anything else is inline text when
    /// the whole body fits in the peek window and is printable, or spooled
    /// to a file named after `hint` otherwise.
    pub fn classify<R: Read + ?Sized>(
        &self,
        reader: &mut R,
        content_type: &str,
        hint: &str,
    ) -> Result<Classified> {
        if mime::is_json(content_type) {
            return read_json(reader);
        }

        let (window, complete) = peek(reader)?;
        if window.is_empty() {
            return Ok(Classified::Empty);
        }
        if complete {
            if let Some(text) = printable_text(&window) {
                return Ok(Classified::Text(text));
            }
        }

        self.spool(&window, reader, content_type, hint)
            .map(Classified::File)
    }

    /// Classify the body of a multipart part
    ///
    /// Parts are never stored inline: JSON parts are embedded, everything
    /// else non-empty is spooled.
    pub fn classify_part<R: Read + ?Sized>(
        &self,
        reader: &mut R,
        content_type: &str,
        hint: &str,
    ) -> Result<Classified> {
        if mime::is_json(content_type) {
            return read_json(reader);
        }

        let mut first = [0u8; 8192];
        let n = read_retrying(reader, &mut first)?;
        if n == 0 {
            return Ok(Classified::Empty);
        }
        self.spool(&first[..n], reader, content_type, hint)
            .map(Classified::File)
    }

    /// Write `prefix` followed by the rest of `reader` to a spool file
    ///
    /// The hint's extension is replaced by the one registered for
    /// `content_type`, when there is one. A name already taken in the spool
    /// directory gets a `_<n>` suffix before its extension. Returns the file
    /// name actually written.
    pub fn spool<R: Read + ?Sized>(
        &self,
        prefix: &[u8],
        reader: &mut R,
        content_type: &str,
        hint: &str,
    ) -> Result<String> {
        let wanted = match mime::extension_for_type(content_type) {
            Some(ext) => naming::with_extension(hint, ext),
            None => hint.to_string(),
        };
        let (name, path, mut file) = self.create_unique(&wanted)?;

        file.write_all(prefix)?;
        let copied = io::copy(reader, &mut file)?;
        file.flush()?;

        tracing::debug!(
            file = %path.display(),
            bytes = prefix.len() as u64 + copied,
            "body spooled"
        );
        Ok(name)
    }

    fn create_unique(&self, wanted: &str) -> io::Result<(String, PathBuf, File)> {
        let mut name = wanted.to_string();
        let mut n = 0;
        loop {
            let path = self.dir.join(&name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((name, path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    n += 1;
                    name = naming::numbered(wanted, n);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn read_retrying<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Fill one peek window
///
/// Returns the bytes read and whether the body ended within the window.
/// A body of exactly one window is complete; one byte more is not.
fn peek<R: Read + ?Sized>(reader: &mut R) -> io::Result<(Vec<u8>, bool)> {
    let mut window = vec![0u8; PEEK_WINDOW];
    let mut filled = 0;
    while filled < PEEK_WINDOW {
        let n = read_retrying(reader, &mut window[filled..])?;
        if n == 0 {
            window.truncate(filled);
            return Ok((window, true));
        }
        filled += n;
    }

    let mut extra = [0u8; 1];
    if read_retrying(reader, &mut extra)? == 0 {
        return Ok((window, true));
    }
    window.push(extra[0]);
    Ok((window, false))
}

/// The window as text, if every character is a letter, digit or whitespace
fn printable_text(window: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(window).ok()?;
    text.chars()
        .all(|c| c.is_alphabetic() || is_decimal_digit(c) || c.is_whitespace())
        .then(|| text.to_string())
}

/// First code point of each run of ten decimal digits (category Nd)
const DIGIT_ZEROS: &[u32] = &[
    0x0030, 0x0660, 0x06F0, 0x07C0, 0x0966, 0x09E6,
    0x0A66, 0x0AE6, 0x0B66, 0x0BE6, 0x0C66, 0x0CE6,
    0x0D66, 0x0DE6, 0x0E50, 0x0ED0, 0x0F20, 0x1040,
    0x1090, 0x17E0, 0x1810, 0x1946, 0x19D0, 0x1A80,
    0x1A90, 0x1B50, 0x1BB0, 0x1C40, 0x1C50, 0xA620,
    0xA8D0, 0xA900, 0xA9D0, 0xA9F0, 0xAA50, 0xABF0,
    0xFF10, 0x104A0, 0x10D30, 0x11066, 0x110F0, 0x11136,
    0x111D0, 0x112F0, 0x11450, 0x114D0, 0x11650, 0x116C0,
    0x11730, 0x118E0, 0x11950, 0x11C50, 0x11D50, 0x11DA0,
    0x16A60, 0x16AC0, 0x16B50, 0x1D7CE, 0x1D7D8, 0x1D7E2,
    0x1D7EC, 0x1D7F6, 0x1E140, 0x1E2F0, 0x1E950, 0x1FBF0,
];

/// A decimal digit in any script
///
/// Fractions, Roman numerals and other numeric symbols are not digits.
fn is_decimal_digit(c: char) -> bool {
    let code = c as u32;
    c.is_numeric() && DIGIT_ZEROS.iter().any(|&zero| (zero..zero + 10).contains(&code))
}

/// Read a JSON body, up to [`JSON_LIMIT`] bytes
fn read_json<R: Read + ?Sized>(reader: &mut R) -> Result<Classified> {
    let mut data = Vec::new();
    reader
        .take(JSON_LIMIT as u64 + 1)
        .read_to_end(&mut data)?;

    if data.is_empty() {
        return Ok(Classified::Empty);
    }
    if data.len() > JSON_LIMIT {
        return Err(Error::BodyTooLargeOrInvalid(format!(
            "JSON body exceeds {} bytes",
            JSON_LIMIT
        )));
    }

    let text = String::from_utf8(data)
        .map_err(|_| Error::BodyTooLargeOrInvalid("JSON body is not UTF-8".to_string()))?;
    let raw = RawValue::from_string(text)
        .map_err(|e| Error::BodyTooLargeOrInvalid(format!("invalid JSON body: {}", e)))?;
    Ok(Classified::Json(raw))
}
