//! Request reconstruction
//!
//! [`ReplayBuilder`] turns a loaded [`TransactionRecord`] back into a request
//! that can be written to a connection, reversing whatever representation
//! the capture chose for the body.

use super::multipart::{random_boundary, recompose};
use super::pipe::PipeReader;
use super::target::Target;
use crate::http::{Headers, RequestHead, Version};
use crate::mime::{self, MediaType};
use crate::record::{self, Body, Error, Result, TransactionRecord};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Headers describing the recorded connection rather than the request
const HOP_HEADERS: &[&str] = &["Host", "Content-Length", "Transfer-Encoding", "Trailer"];

/// Credentials layered over the recorded request
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// `user:password`
    Basic(String),
    Bearer(String),
}

impl Auth {
    fn header_value(&self) -> String {
        match self {
            Auth::Basic(credentials) => format!("Basic {}", STANDARD.encode(credentials)),
            Auth::Bearer(token) => format!("Bearer {}", token),
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Basic(_) => f.write_str("Basic(..)"),
            Auth::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

/// Body of a rebuilt request
pub enum OutboundBody {
    Empty,
    Bytes(io::Cursor<Vec<u8>>),
    File { file: File, length: u64 },
    /// Produced on the fly, length unknown
    Stream(PipeReader),
}

impl OutboundBody {
    /// Length when known up front
    pub fn length(&self) -> Option<u64> {
        match self {
            OutboundBody::Empty => Some(0),
            OutboundBody::Bytes(cursor) => Some(cursor.get_ref().len() as u64),
            OutboundBody::File { length, .. } => Some(*length),
            OutboundBody::Stream(_) => None,
        }
    }
}

impl Read for OutboundBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            OutboundBody::Empty => Ok(0),
            OutboundBody::Bytes(cursor) => cursor.read(buf),
            OutboundBody::File { file, .. } => file.read(buf),
            OutboundBody::Stream(reader) => reader.read(buf),
        }
    }
}

impl fmt::Debug for OutboundBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundBody::Empty => f.write_str("Empty"),
            OutboundBody::Bytes(cursor) => write!(f, "Bytes({})", cursor.get_ref().len()),
            OutboundBody::File { length, .. } => write!(f, "File({})", length),
            OutboundBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A request ready to send
#[derive(Debug)]
pub struct OutboundRequest {
    pub head: RequestHead,
    pub body: OutboundBody,
}

/// Rebuilds recorded requests for one target
#[derive(Debug, Clone)]
pub struct ReplayBuilder {
    target: Target,
    auth: Option<Auth>,
    restore_encoding: bool,
}

impl ReplayBuilder {
    pub fn new(target: Target) -> Self {
        ReplayBuilder {
            target,
            auth: None,
            restore_encoding: false,
        }
    }

    /// Set `Authorization`, replacing any recorded value
    pub fn auth(mut self, auth: Option<Auth>) -> Self {
        self.auth = auth;
        self
    }

    /// Send the recorded `Content-Encoding` again
    pub fn restore_encoding(mut self, restore: bool) -> Self {
        self.restore_encoding = restore;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Rebuild the request of `record`
    ///
    /// Spooled files are looked up in `dir`, the directory of the record
    /// file.
    pub fn build(&self, record: TransactionRecord, dir: &Path) -> Result<OutboundRequest> {
        let method = record.method.as_str();
        if method.is_empty() {
            return Err(Error::InvalidRecordFile("record has no method".to_string()));
        }
        let version = Version::from_str(&record.protocol).unwrap_or_default();
        let mut head = RequestHead::new(method, self.target.request_target(&record.url), version);

        let message = record.request.unwrap_or_default();
        let mut recorded = record::unfold(&message.header);
        for name in HOP_HEADERS {
            recorded.remove(name);
        }

        let headers = head.headers_mut();
        headers.insert("Host", self.target.host_header());
        for (name, value) in recorded.iter() {
            headers.insert(name, value);
        }
        if self.restore_encoding && !message.original_content_encoding.is_empty() {
            headers.set("Content-Encoding", message.original_content_encoding.as_str());
        }
        if let Some(auth) = &self.auth {
            headers.set("Authorization", auth.header_value());
        }

        let body = match message.body {
            Body::File(name) => {
                let path = dir.join(&name);
                let file = File::open(&path).map_err(|e| match e.kind() {
                    io::ErrorKind::NotFound => Error::MissingPartFile(path.clone()),
                    _ => Error::Io(e),
                })?;
                let length = file.metadata()?.len();
                if !headers.contains("Content-Type") {
                    headers.set(
                        "Content-Type",
                        mime::type_for_path(&path).unwrap_or("application/octet-stream"),
                    );
                }
                OutboundBody::File { file, length }
            }
            Body::Json(raw) => {
                default_content_type(headers, "application/json");
                OutboundBody::Bytes(io::Cursor::new(compact_json(raw.get()).into_bytes()))
            }
            Body::Multipart(parts) => {
                let boundary = multipart_boundary(headers);
                OutboundBody::Stream(recompose(parts, &boundary, dir)?)
            }
            Body::Text(text) => {
                default_content_type(headers, "text/plain");
                OutboundBody::Bytes(io::Cursor::new(text.into_bytes()))
            }
            Body::None => {
                default_content_type(headers, "text/plain");
                OutboundBody::Empty
            }
        };

        match body.length() {
            Some(0) if !matches!(head.method(), "POST" | "PUT" | "PATCH") => {}
            Some(n) => head.headers_mut().set("Content-Length", n.to_string()),
            None => head.headers_mut().set("Transfer-Encoding", "chunked"),
        }

        Ok(OutboundRequest { head, body })
    }
}

fn default_content_type(headers: &mut Headers, content_type: &str) {
    if !headers.contains("Content-Type") {
        headers.set("Content-Type", content_type);
    }
}

/// Boundary for a recomposed body
///
/// A boundary in a recorded `multipart/*` content type is reused, and one
/// without a boundary gets a random one appended. Any other content type
/// is replaced by `multipart/form-data`.
fn multipart_boundary(headers: &mut Headers) -> String {
    let content_type = headers.get("Content-Type").unwrap_or("").to_string();
    let media = MediaType::parse(&content_type)
        .filter(|media| media.essence().starts_with("multipart/"));

    if let Some(boundary) = media.as_ref().and_then(MediaType::boundary) {
        return boundary.to_string();
    }

    let boundary = random_boundary();
    let value = match media {
        Some(_) => format!("{}; boundary={}", content_type.trim().trim_end_matches(';'), boundary),
        None => format!("multipart/form-data; boundary={}", boundary),
    };
    headers.set("Content-Type", value);
    boundary
}

/// Remove insignificant whitespace from a JSON document
pub fn compact_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in json.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            ' ' | '\t' | '\n' | '\r' => {}
            '"' => {
                in_string = true;
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FoldedHeaders, HeaderValue, Message, Part, PartBody};
    use chrono::{FixedOffset, TimeZone};
    use serde_json::value::RawValue;
    use std::fs;

    fn target() -> Target {
        Target::parse("localhost:8080", None, false).unwrap()
    }

    fn sample(method: &str, url: &str, header: FoldedHeaders, body: Body) -> TransactionRecord {
        let time = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .unwrap();
        let mut record = TransactionRecord::new(method, url, time, "HTTP/1.1");
        let mut message = Message::new(header);
        message.body = body;
        record.request = Some(message);
        record
    }

    fn read_body(request: &mut OutboundRequest) -> Vec<u8> {
        let mut out = Vec::new();
        request.body.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_compact_json() {
        assert_eq!(
            compact_json("{ \"a\" : [1, 2,\n 3],\t\"s\": \"x y \\\" z\" }"),
            "{\"a\":[1,2,3],\"s\":\"x y \\\" z\"}"
        );
        assert_eq!(compact_json("\"\\\\\" "), "\"\\\\\"");
    }

    #[test]
    fn test_text_body() {
        let mut header = FoldedHeaders::new();
        header.set("Content-Length", "999");
        header.set("Host", "recorded.example");
        header.insert(
            "Accept",
            HeaderValue::Multi(vec!["a/b".to_string(), "c/d".to_string()]),
        );
        let record = sample("POST", "/submit?x=1", header, Body::Text("hello".to_string()));

        let dir = tempfile::tempdir().unwrap();
        let mut request = ReplayBuilder::new(target()).build(record, dir.path()).unwrap();
        let headers = request.head.headers();
        assert_eq!(request.head.method(), "POST");
        assert_eq!(request.head.target(), "/submit?x=1");
        assert_eq!(headers.get("Host"), Some("localhost:8080"));
        assert_eq!(headers.get("Content-Length"), Some("5"));
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get_all("accept"), vec!["a/b", "c/d"]);
        assert_eq!(read_body(&mut request), b"hello");
    }

    #[test]
    fn test_json_body_compacted() {
        let raw = RawValue::from_string("{ \"a\" : 1 }".to_string()).unwrap();
        let record = sample("PUT", "/j", FoldedHeaders::new(), Body::Json(raw));

        let dir = tempfile::tempdir().unwrap();
        let mut request = ReplayBuilder::new(target()).build(record, dir.path()).unwrap();
        assert_eq!(request.head.headers().get("Content-Type"), Some("application/json"));
        assert_eq!(request.head.headers().get("Content-Length"), Some("7"));
        assert_eq!(read_body(&mut request), b"{\"a\":1}");
    }

    #[test]
    fn test_file_body_relative_to_record() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("r-body.png"), b"\x89PNG").unwrap();
        let record = sample("POST", "/img", FoldedHeaders::new(), Body::File("r-body.png".to_string()));

        let mut request = ReplayBuilder::new(target()).build(record, dir.path()).unwrap();
        assert_eq!(request.head.headers().get("Content-Type"), Some("image/png"));
        assert_eq!(request.body.length(), Some(4));
        assert_eq!(read_body(&mut request), b"\x89PNG");

        let mut header = FoldedHeaders::new();
        header.set("content-type", "application/x-custom");
        let record = sample("POST", "/img", header, Body::File("r-body.png".to_string()));
        let request = ReplayBuilder::new(target()).build(record, dir.path()).unwrap();
        assert_eq!(
            request.head.headers().get("Content-Type"),
            Some("application/x-custom")
        );

        let record = sample("POST", "/img", FoldedHeaders::new(), Body::File("gone.bin".to_string()));
        let err = ReplayBuilder::new(target()).build(record, dir.path()).unwrap_err();
        assert!(matches!(err, Error::MissingPartFile(_)));
    }

    #[test]
    fn test_empty_body_content_length() {
        let dir = tempfile::tempdir().unwrap();

        let request = ReplayBuilder::new(target())
            .build(sample("GET", "/", FoldedHeaders::new(), Body::None), dir.path())
            .unwrap();
        assert!(!request.head.headers().contains("Content-Length"));

        let request = ReplayBuilder::new(target())
            .build(sample("POST", "/", FoldedHeaders::new(), Body::None), dir.path())
            .unwrap();
        assert_eq!(request.head.headers().get("Content-Length"), Some("0"));
    }

    #[test]
    fn test_auth_and_encoding_overrides() {
        let mut header = FoldedHeaders::new();
        header.set("Authorization", "Bearer stale");
        let mut record = sample("GET", "/", header, Body::None);
        if let Some(request) = record.request.as_mut() {
            request.original_content_encoding = "gzip".to_string();
        }

        let dir = tempfile::tempdir().unwrap();
        let builder = ReplayBuilder::new(target()).auth(Some(Auth::Basic("user:pass".to_string())));
        let request = builder.build(record.clone(), dir.path()).unwrap();
        assert_eq!(
            request.head.headers().get_all("Authorization"),
            vec!["Basic dXNlcjpwYXNz"]
        );
        assert!(!request.head.headers().contains("Content-Encoding"));

        let builder = ReplayBuilder::new(target())
            .auth(Some(Auth::Bearer("tok".to_string())))
            .restore_encoding(true);
        let request = builder.build(record, dir.path()).unwrap();
        assert_eq!(request.head.headers().get("Authorization"), Some("Bearer tok"));
        assert_eq!(request.head.headers().get("Content-Encoding"), Some("gzip"));
    }

    #[test]
    fn test_multipart_boundary_handling() {
        let dir = tempfile::tempdir().unwrap();
        let mut part_header = FoldedHeaders::new();
        part_header.set("Content-Disposition", "form-data; name=\"a\"");
        let parts = vec![Part {
            header: part_header,
            body: PartBody::Text("v".to_string()),
        }];

        let mut header = FoldedHeaders::new();
        header.set("Content-Type", "multipart/form-data; boundary=keepme");
        let record = sample("POST", "/up", header, Body::Multipart(parts.clone()));
        let mut request = ReplayBuilder::new(target()).build(record, dir.path()).unwrap();
        assert_eq!(request.head.headers().get("Transfer-Encoding"), Some("chunked"));
        assert!(!request.head.headers().contains("Content-Length"));
        let body = String::from_utf8(read_body(&mut request)).unwrap();
        assert!(body.starts_with("--keepme\r\n"));
        assert!(body.ends_with("\r\n--keepme--\r\n"));

        let record = sample("POST", "/up", FoldedHeaders::new(), Body::Multipart(parts));
        let mut request = ReplayBuilder::new(target()).build(record, dir.path()).unwrap();
        let content_type = request.head.headers().get("Content-Type").unwrap().to_string();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap()
            .to_string();
        assert_eq!(boundary.len(), 60);
        let body = String::from_utf8(read_body(&mut request)).unwrap();
        assert!(body.starts_with(&format!("--{}\r\n", boundary)));
    }

    #[test]
    fn test_multipart_foreign_content_type_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let parts = vec![Part {
            header: FoldedHeaders::new(),
            body: PartBody::Text("v".to_string()),
        }];

        let mut header = FoldedHeaders::new();
        header.set("Content-Type", "text/plain; boundary=ignored");
        let record = sample("POST", "/up", header, Body::Multipart(parts.clone()));
        let mut request = ReplayBuilder::new(target()).build(record, dir.path()).unwrap();
        let content_type = request.head.headers().get("Content-Type").unwrap().to_string();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap()
            .to_string();
        assert_ne!(boundary, "ignored");
        let body = String::from_utf8(read_body(&mut request)).unwrap();
        assert!(body.starts_with(&format!("--{}\r\n", boundary)));

        let mut header = FoldedHeaders::new();
        header.set("Content-Type", "multipart/mixed");
        let record = sample("POST", "/up", header, Body::Multipart(parts));
        let request = ReplayBuilder::new(target()).build(record, dir.path()).unwrap();
        let content_type = request.head.headers().get("Content-Type").unwrap();
        assert!(content_type.starts_with("multipart/mixed; boundary="), "{}", content_type);
    }

    #[test]
    fn test_version_fallback() {
        let mut record = sample("GET", "/", FoldedHeaders::new(), Body::None);
        record.protocol = "HTTP/2.0".to_string();
        let dir = tempfile::tempdir().unwrap();
        let request = ReplayBuilder::new(target()).build(record, dir.path()).unwrap();
        assert_eq!(request.head.version(), Version::Http11);
    }
}
