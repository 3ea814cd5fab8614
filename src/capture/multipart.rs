//! Multipart decomposition
//!
//! [`MultipartReader`] walks a `multipart/form-data` body part by part
//! without buffering it: each part's headers are parsed, and its content is
//! exposed as a `Read` that stops at the next boundary delimiter.
//! [`decompose`] runs every part through the body classifier and builds the
//! ordered part list stored in a record.

use super::classify::BodyClassifier;
use crate::http::Headers;
use crate::mime;
use crate::record::{self, naming, Error, Part, Result};
use std::io::{self, Read};

const READ_CHUNK: usize = 64 * 1024;

/// Upper bound on the header block of a single part
const MAX_PART_HEAD: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the first delimiter
    Preamble,
    /// Inside the content of a part
    Content,
    /// Positioned at a delimiter
    Delimiter,
    /// Past the close delimiter
    Done,
}

enum Scan {
    /// A delimiter starts at this offset
    Found(usize),
    /// This many leading bytes cannot belong to a delimiter
    Clean(usize),
    /// More input is needed to decide
    More,
}

/// Streaming reader over the parts of a multipart body
pub struct MultipartReader<R: Read> {
    inner: R,
    buf: Vec<u8>,
    start: usize,
    /// Bytes after `start` known to contain no delimiter
    clean: usize,
    eof: bool,
    seen_input: bool,
    /// `CRLF--boundary`
    delimiter: Vec<u8>,
    state: State,
}

impl<R: Read> MultipartReader<R> {
    pub fn new(inner: R, boundary: &str) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary.as_bytes());

        MultipartReader {
            inner,
            // The first delimiter may sit at the very start of the body
            buf: b"\r\n".to_vec(),
            start: 0,
            clean: 0,
            eof: false,
            seen_input: false,
            delimiter,
            state: State::Preamble,
        }
    }

    /// Advance to the next part and return its headers
    ///
    /// Unread content of the current part is skipped. Returns `None` after
    /// the close delimiter, or when the body is empty.
    pub fn next_part(&mut self) -> io::Result<Option<Headers>> {
        match self.state {
            State::Done => return Ok(None),
            State::Preamble => match self.skip_content() {
                Ok(_) => {}
                Err(_) if self.eof && !self.seen_input => {
                    self.state = State::Done;
                    return Ok(None);
                }
                Err(e) => return Err(e),
            },
            State::Content => {
                self.skip_content()?;
            }
            State::Delimiter => {}
        }
        if self.state != State::Delimiter {
            return Err(Error::malformed_io("multipart boundary not found"));
        }

        self.consume(self.delimiter.len());
        self.require(2)?;
        if self.data().starts_with(b"--") {
            self.state = State::Done;
            return Ok(None);
        }

        // Transport padding, then the end of the delimiter line
        loop {
            self.require(1)?;
            match self.data()[0] {
                b' ' | b'\t' => self.consume(1),
                _ => break,
            }
        }
        let line = self.read_line()?;
        if !line.is_empty() {
            return Err(Error::malformed_io("garbage after multipart boundary"));
        }

        let headers = self.read_part_headers()?;
        self.state = State::Content;
        Ok(Some(headers))
    }

    /// Reader over the content of the current part
    pub fn content(&mut self) -> PartContent<'_, R> {
        PartContent { reader: self }
    }

    /// Give back the underlying reader
    ///
    /// Bytes already buffered (the epilogue, typically) are dropped.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn data(&self) -> &[u8] {
        &self.buf[self.start..]
    }

    fn consume(&mut self, n: usize) {
        self.start += n;
        self.clean = self.clean.saturating_sub(n);
    }

    /// Read more input; returns false at end of stream
    fn fill(&mut self) -> io::Result<bool> {
        if self.eof {
            return Ok(false);
        }
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.start = 0;
        }

        let len = self.buf.len();
        self.buf.resize(len + READ_CHUNK, 0);
        let n = loop {
            match self.inner.read(&mut self.buf[len..]) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        match n {
            Ok(n) => {
                self.buf.truncate(len + n);
                if n == 0 {
                    self.eof = true;
                } else {
                    self.seen_input = true;
                }
                Ok(n > 0)
            }
            Err(e) => {
                self.buf.truncate(len);
                Err(e)
            }
        }
    }

    /// Make sure at least `n` bytes are buffered
    fn require(&mut self, n: usize) -> io::Result<()> {
        while self.data().len() < n {
            if !self.fill()? {
                return Err(Error::malformed_io("unexpected end of multipart body"));
            }
        }
        Ok(())
    }

    /// Read one line, without its line ending
    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        loop {
            if let Some(pos) = self.data().iter().position(|&b| b == b'\n') {
                let mut line = self.data()[..pos].to_vec();
                self.consume(pos + 1);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(line);
            }
            if self.data().len() > MAX_PART_HEAD {
                return Err(Error::malformed_io("multipart header line too long"));
            }
            if !self.fill()? {
                return Err(Error::malformed_io("unexpected end of multipart headers"));
            }
        }
    }

    fn read_part_headers(&mut self) -> io::Result<Headers> {
        let mut headers = Headers::new();
        let mut size = 0;
        loop {
            let line = self.read_line()?;
            if line.is_empty() {
                return Ok(headers);
            }
            size += line.len() + 2;
            if size > MAX_PART_HEAD {
                return Err(Error::malformed_io("multipart part headers too large"));
            }
            if matches!(line[0], b' ' | b'\t') {
                return Err(Error::malformed_io("folded multipart header"));
            }
            let line = String::from_utf8_lossy(&line);
            headers
                .push_line(&line)
                .map_err(|e| Error::malformed_io(e.to_string()))?;
        }
    }

    /// Look for a delimiter in the buffered data
    ///
    /// A delimiter only counts when followed by `--`, whitespace or a line
    /// ending; `--boundaryX` inside content is data.
    fn scan(&self) -> Scan {
        let data = self.data();
        let delim = &self.delimiter;

        let mut from = 0;
        while let Some(offset) = find(&data[from..], delim) {
            let at = from + offset;
            let after = &data[at + delim.len()..];
            let verdict = match after {
                [] => None,
                [b'-'] => None,
                [b'-', b'-', ..] => Some(true),
                [b' ' | b'\t' | b'\r' | b'\n', ..] => Some(true),
                _ => Some(false),
            };
            match verdict {
                Some(true) => return Scan::Found(at),
                Some(false) => from = at + 1,
                None if at > 0 => return Scan::Clean(at),
                None if self.eof => return Scan::Found(at),
                None => return Scan::More,
            }
        }

        // A partial delimiter may sit at the end of the buffer
        let safe = data.len().saturating_sub(delim.len() - 1);
        if safe > 0 {
            Scan::Clean(safe)
        } else if self.eof {
            Scan::Clean(data.len())
        } else {
            Scan::More
        }
    }

    /// Read content of the current part, stopping at the next delimiter
    fn read_content(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if !matches!(self.state, State::Content | State::Preamble) || out.is_empty() {
            return Ok(0);
        }

        loop {
            if self.clean > 0 {
                let n = self.clean.min(out.len());
                out[..n].copy_from_slice(&self.data()[..n]);
                self.consume(n);
                return Ok(n);
            }

            match self.scan() {
                Scan::Found(0) => {
                    self.state = State::Delimiter;
                    return Ok(0);
                }
                Scan::Found(at) | Scan::Clean(at) if at > 0 => self.clean = at,
                Scan::Found(_) | Scan::Clean(_) | Scan::More => {
                    if !self.fill()? {
                        return Err(Error::malformed_io("unexpected end of multipart body"));
                    }
                }
            }
        }
    }

    /// Discard content up to the next delimiter
    fn skip_content(&mut self) -> io::Result<u64> {
        let mut skipped = 0;
        let mut scratch = [0u8; 8192];
        loop {
            match self.read_content(&mut scratch) {
                Ok(0) => return Ok(skipped),
                Ok(n) => skipped += n as u64,
                Err(e) => return Err(e),
            }
        }
    }
}

/// Content of the current part
pub struct PartContent<'a, R: Read> {
    reader: &'a mut MultipartReader<R>,
}

impl<R: Read> Read for PartContent<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read_content(buf)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    let last = haystack.len() - needle.len();
    let mut i = 0;
    while i <= last {
        let offset = haystack[i..=last].iter().position(|&b| b == needle[0])?;
        i += offset;
        if &haystack[i..i + needle.len()] == needle {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Split a multipart body into record parts
///
/// JSON parts are embedded; every other non-empty part is spooled. Spool
/// names derive from `base`: `<base>-<filename>` for parts with a filename,
/// `<base>-multipart_<n>.dat` for the others, `n` counting those parts only.
pub fn decompose<R: Read>(
    reader: R,
    boundary: &str,
    classifier: &BodyClassifier,
    base: &str,
) -> Result<Vec<Part>> {
    let mut multipart = MultipartReader::new(reader, boundary);
    let mut parts = Vec::new();
    let mut unnamed = 0;

    while let Some(headers) = multipart.next_part()? {
        let content_type = headers.get("Content-Type").unwrap_or("").to_string();
        let filename = headers
            .get("Content-Disposition")
            .and_then(|value| mime::header_param(value, "filename"));

        let hint = if mime::is_json(&content_type) {
            String::new()
        } else {
            let named = filename
                .as_deref()
                .and_then(naming::sanitize_part_filename)
                .is_some();
            let hint = naming::part_hint(base, filename.as_deref(), unnamed);
            if !named {
                unnamed += 1;
            }
            hint
        };

        let classified = classifier.classify_part(&mut multipart.content(), &content_type, &hint)?;
        parts.push(Part {
            header: record::fold(&headers),
            body: classified.into_part_body(),
        });
    }

    tracing::debug!(parts = parts.len(), "multipart body decomposed");
    Ok(parts)
}
