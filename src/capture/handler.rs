//! Per-request capture
//!
//! [`CaptureHandler`] turns one inbound request into a record file (plus
//! any spooled body files) and then answers it through the configured
//! [`Responder`]. The record is written only once every body has been
//! classified, so a failed capture never leaves a record behind.

use super::classify::BodyClassifier;
use super::multipart;
use super::respond::Responder;
use super::sequence::SequenceAllocator;
use crate::http::{HttpResponse, RequestHead, Status};
use crate::mime::{self, MediaType};
use crate::record::{self, naming, Error, Message, Result, TransactionRecord};
use chrono::{DateTime, FixedOffset, Local};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Outcome of a successful capture
#[derive(Debug, Clone)]
pub struct Captured {
    pub seq: u64,
    pub time: DateTime<FixedOffset>,
    /// Path of the record file
    pub path: PathBuf,
}

/// Captures requests into a save directory
#[derive(Debug)]
pub struct CaptureHandler {
    classifier: BodyClassifier,
    sequence: SequenceAllocator,
    responder: Responder,
}

impl CaptureHandler {
    pub fn new(save_dir: impl Into<PathBuf>, sequence: SequenceAllocator, responder: Responder) -> Self {
        CaptureHandler {
            classifier: BodyClassifier::new(save_dir),
            sequence,
            responder,
        }
    }

    pub fn save_dir(&self) -> &Path {
        self.classifier.dir()
    }

    pub fn sequence(&self) -> &SequenceAllocator {
        &self.sequence
    }

    /// Capture a request and produce the response to send back
    ///
    /// Capture failures are answered with 400 for bad client input and 500
    /// otherwise; those responses ask for the connection to be closed.
    pub fn handle<R: Read>(&self, head: &RequestHead, body: R) -> HttpResponse {
        match self.capture(head, body) {
            Ok(captured) => {
                let response = self.responder.respond(head);
                tracing::info!(
                    "#{:04} [{}] {} {}",
                    captured.seq,
                    captured.time.format("%H:%M:%S"),
                    head.method(),
                    head.decoded_path()
                );
                response
            }
            Err(e) => {
                tracing::error!(
                    method = head.method(),
                    target = head.target(),
                    "capture failed: {}",
                    e
                );
                let status = if e.is_client_error() {
                    Status::BAD_REQUEST
                } else {
                    Status::INTERNAL_SERVER_ERROR
                };
                HttpResponse::builder()
                    .status(status)
                    .header("Content-Type", "text/plain; charset=utf-8")
                    .header("Connection", "close")
                    .body(format!("{}\n", e).into_bytes())
                    .build()
            }
        }
    }

    /// Write the record (and spooled bodies) for one request
    pub fn capture<R: Read>(&self, head: &RequestHead, mut body: R) -> Result<Captured> {
        let time: DateTime<FixedOffset> = Local::now().into();
        let seq = self.sequence.next();
        let filename = naming::record_filename(seq, &time, head.method(), &head.decoded_path());
        let base = naming::base_name(&filename);

        let mut header = record::fold(head.headers());
        let encoding = header
            .remove("Content-Encoding")
            .and_then(|value| value.first().map(str::to_string))
            .unwrap_or_default();
        let mut message = Message::new(header);
        message.original_content_encoding = encoding;

        let content_type = head.headers().get("Content-Type").unwrap_or("");
        message.body = if mime::is_multipart(content_type) {
            let boundary = MediaType::parse(content_type)
                .and_then(|media| media.boundary().map(str::to_string))
                .ok_or_else(|| {
                    Error::MalformedMultipart("no boundary in Content-Type".to_string())
                })?;
            let parts = multipart::decompose(&mut body, &boundary, &self.classifier, base)?;
            if parts.is_empty() {
                record::Body::None
            } else {
                record::Body::Multipart(parts)
            }
        } else {
            self.classifier
                .classify(&mut body, content_type, &naming::body_hint(base))?
                .into_body()
        };

        let mut record = TransactionRecord::new(
            head.method(),
            head.target(),
            time,
            head.version().as_str(),
        );
        record.request = Some(message);

        let path = record::save(self.save_dir(), &filename, &record)?;
        Ok(Captured { seq, time, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Body, HeaderValue, PartBody};
    use crate::http::Version;
    use std::fs;

    fn handler(dir: &Path) -> CaptureHandler {
        CaptureHandler::new(dir, SequenceAllocator::new(0), Responder::canned(Status::OK, ""))
    }

    fn request(method: &str, target: &str, headers: &[(&str, &str)]) -> RequestHead {
        let mut head = RequestHead::new(method, target, Version::Http11);
        for (name, value) in headers {
            head.headers_mut().insert(*name, *value);
        }
        head
    }

    #[test]
    fn test_capture_text_body() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());
        let head = request(
            "POST",
            "/api/items?x=1",
            &[("Content-Type", "text/plain"), ("X-Tag", "a"), ("x-tag", "b")],
        );

        let captured = handler.capture(&head, &b"hello world"[..]).unwrap();
        assert_eq!(captured.seq, 1);
        let name = captured.path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("0001_"), "{}", name);
        assert!(name.ends_with("_POST_api_items.json"), "{}", name);

        let record = record::load(&captured.path).unwrap();
        assert_eq!(record.method, "POST");
        assert_eq!(record.url, "/api/items?x=1");
        assert_eq!(record.protocol, "HTTP/1.1");
        let request = record.request.unwrap();
        assert!(matches!(request.body, Body::Text(ref t) if t == "hello world"));
        assert_eq!(
            request.header.get("X-Tag"),
            Some(&HeaderValue::Multi(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[test]
    fn test_capture_strips_content_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());
        let head = request(
            "PUT",
            "/gz",
            &[("Content-Type", "application/gzip"), ("Content-Encoding", "gzip")],
        );

        let captured = handler.capture(&head, &b"\x1f\x8b\x08\x00"[..]).unwrap();
        let request = record::load(&captured.path).unwrap().request.unwrap();
        assert!(!request.header.contains("Content-Encoding"));
        assert_eq!(request.original_content_encoding, "gzip");

        let base = naming::base_name(captured.path.file_name().unwrap().to_str().unwrap());
        let spooled = format!("{}-body.gz", base);
        assert!(matches!(request.body, Body::File(ref f) if f == &spooled));
        assert_eq!(fs::read(dir.path().join(&spooled)).unwrap(), b"\x1f\x8b\x08\x00");
    }

    #[test]
    fn test_capture_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());
        let head = request(
            "POST",
            "/upload",
            &[("Content-Type", "multipart/form-data; boundary=XX")],
        );
        let body = b"--XX\r\nContent-Disposition: form-data; name=\"f\"; filename=\"a.bin\"\r\n\r\n\x00\x01\r\n--XX--\r\n";

        let captured = handler.capture(&head, &body[..]).unwrap();
        let request = record::load(&captured.path).unwrap().request.unwrap();
        match request.body {
            Body::Multipart(parts) => {
                assert_eq!(parts.len(), 1);
                assert!(matches!(parts[0].body, PartBody::File(ref f) if f.ends_with("-a.bin")));
            }
            other => panic!("expected multipart body, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_capture_writes_no_record() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());

        let head = request("POST", "/j", &[("Content-Type", "application/json")]);
        let response = handler.handle(&head, &b"{not json"[..]);
        assert_eq!(response.status(), Status::BAD_REQUEST);
        assert!(response.headers().has_token("Connection", "close"));

        let head = request("POST", "/m", &[("Content-Type", "multipart/form-data")]);
        let response = handler.handle(&head, &b"--x\r\n"[..]);
        assert_eq!(response.status(), Status::BAD_REQUEST);

        let records = fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().map_or(false, |x| x == "json"))
            .count();
        assert_eq!(records, 0);
    }

    #[test]
    fn test_handle_runs_responder() {
        let dir = tempfile::tempdir().unwrap();
        let handler = CaptureHandler::new(
            dir.path(),
            SequenceAllocator::new(41),
            Responder::canned(Status::new(202).unwrap(), "queued"),
        );
        let response = handler.handle(&request("GET", "/", &[]), std::io::empty());
        assert_eq!(response.status().code(), 202);
        assert_eq!(response.body(), b"queued");
        assert_eq!(handler.sequence().current(), 42);

        let name = fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .file_name();
        assert!(name.to_str().unwrap().starts_with("0042_"));
    }
}
