//! HTTP message types
//!
//! This module defines the request and response heads exchanged over a
//! connection, and the fully-buffered responses the capture server sends back.
//! Bodies of requests are never part of these types: they are streamed through
//! [`super::BodyReader`] so that arbitrarily large uploads can be spooled.

use super::{Error, Headers, Result, CRLF};
use std::fmt;

/// HTTP version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    /// Parse version from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            _ => Err(Error::InvalidVersion(s.to_string())),
        }
    }

    /// Convert version to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Check that a method is a valid HTTP token
pub fn validate_method(method: &str) -> Result<()> {
    let valid = !method.is_empty()
        && method.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        });
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidMethod(method.to_string()))
    }
}

/// HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
}

impl Status {
    /// Create a new status code
    pub fn new(code: u16) -> Result<Self> {
        if (100..600).contains(&code) {
            Ok(Status { code })
        } else {
            Err(Error::InvalidStatus(format!("Invalid status code: {}", code)))
        }
    }

    /// Get the status code
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Get the canonical reason phrase for this status code
    pub fn reason_phrase(&self) -> &'static str {
        match self.code {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            203 => "Non-Authoritative Information",
            204 => "No Content",
            205 => "Reset Content",
            206 => "Partial Content",
            300 => "Multiple Choices",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            406 => "Not Acceptable",
            408 => "Request Timeout",
            409 => "Conflict",
            410 => "Gone",
            411 => "Length Required",
            413 => "Payload Too Large",
            414 => "URI Too Long",
            415 => "Unsupported Media Type",
            417 => "Expectation Failed",
            418 => "I'm a teapot",
            422 => "Unprocessable Entity",
            429 => "Too Many Requests",
            431 => "Request Header Fields Too Large",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            505 => "HTTP Version Not Supported",
            _ => "Unknown",
        }
    }

    /// Check if this is an informational status (1xx)
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Check if this is a success status (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Check if a response with this status never carries a body
    pub fn is_bodyless(&self) -> bool {
        self.is_informational() || self.code == 204 || self.code == 304
    }

    pub const OK: Status = Status { code: 200 };
    pub const BAD_REQUEST: Status = Status { code: 400 };
    pub const NOT_FOUND: Status = Status { code: 404 };
    pub const INTERNAL_SERVER_ERROR: Status = Status { code: 500 };
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason_phrase())
    }
}

/// Request line and headers of an HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    method: String,
    target: String,
    version: Version,
    headers: Headers,
}

impl RequestHead {
    /// Create a request head with no headers
    pub fn new(method: impl Into<String>, target: impl Into<String>, version: Version) -> Self {
        RequestHead {
            method: method.into(),
            target: target.into(),
            version,
            headers: Headers::new(),
        }
    }

    /// Get the request method, exactly as received
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Get the request target, exactly as received
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Get the path component of the request target, without the query
    pub fn path(&self) -> &str {
        let target = self.target.as_str();
        let target = match target.find("://") {
            Some(pos) => {
                let rest = &target[pos + 3..];
                rest.find('/').map(|p| &rest[p..]).unwrap_or("/")
            }
            None => target,
        };
        target.split(&['?', '#'][..]).next().unwrap_or("/")
    }

    /// Get the path with percent-escapes decoded
    ///
    /// Invalid escapes are kept as-is; invalid UTF-8 is replaced.
    pub fn decoded_path(&self) -> String {
        let path = self.path().as_bytes();
        let mut out = Vec::with_capacity(path.len());
        let mut i = 0;
        while i < path.len() {
            if path[i] == b'%' && i + 2 < path.len() {
                let (hi, lo) = (path[i + 1], path[i + 2]);
                if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() {
                    out.push(hex_value(hi) << 4 | hex_value(lo));
                    i += 3;
                    continue;
                }
            }
            out.push(path[i]);
            i += 1;
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get mutable headers
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Whether the connection should stay open after this exchange
    pub fn keep_alive(&self) -> bool {
        if self.headers.has_token("Connection", "close") {
            return false;
        }
        match self.version {
            Version::Http11 => true,
            Version::Http10 => self.headers.has_token("Connection", "keep-alive"),
        }
    }

    /// Whether the client waits for `100 Continue` before sending the body
    pub fn expects_continue(&self) -> bool {
        self.version == Version::Http11 && self.headers.has_token("Expect", "100-continue")
    }

    /// Convert the request line and headers to wire format
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(self.method.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.target.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.version.as_str().as_bytes());
        buf.extend_from_slice(CRLF.as_bytes());

        self.headers.write_wire(&mut buf);

        buf.extend_from_slice(CRLF.as_bytes());
        buf
    }
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

/// Status line and headers of an HTTP response
#[derive(Debug, Clone)]
pub struct ResponseHead {
    version: Version,
    status: Status,
    reason: String,
    headers: Headers,
}

impl ResponseHead {
    /// Create a response head
    pub fn new(version: Version, status: Status, reason: impl Into<String>, headers: Headers) -> Self {
        ResponseHead {
            version,
            status,
            reason: reason.into(),
            headers,
        }
    }

    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the status code
    pub fn status(&self) -> Status {
        self.status
    }

    /// Get the reason phrase
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }
}

/// HTTP response with a fully buffered body
#[derive(Debug, Clone)]
pub struct HttpResponse {
    version: Version,
    status: Status,
    reason: String,
    headers: Headers,
    body: Vec<u8>,
}

impl HttpResponse {
    /// Create a new HTTP response
    pub fn new(status: Status) -> Self {
        HttpResponse {
            version: Version::default(),
            status,
            reason: status.reason_phrase().to_string(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Create a builder for constructing responses
    pub fn builder() -> HttpResponseBuilder {
        HttpResponseBuilder::default()
    }

    /// Get the status code
    pub fn status(&self) -> Status {
        self.status
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get mutable headers
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Get the body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Convert the response to wire format
    ///
    /// `Content-Length` is always derived from the body, replacing any value
    /// already present in the headers.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(self.version.as_str().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.status.code().to_string().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.reason.as_bytes());
        buf.extend_from_slice(CRLF.as_bytes());

        let mut headers = self.headers.clone();
        headers.set("Content-Length", self.body.len().to_string());
        headers.write_wire(&mut buf);

        buf.extend_from_slice(CRLF.as_bytes());
        buf.extend_from_slice(&self.body);
        buf
    }
}

/// Builder for HTTP responses
#[derive(Debug, Default)]
pub struct HttpResponseBuilder {
    status: Option<Status>,
    reason: Option<String>,
    headers: Headers,
    body: Vec<u8>,
}

impl HttpResponseBuilder {
    /// Set the status code
    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the reason phrase
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Build the response
    pub fn build(self) -> HttpResponse {
        let status = self.status.unwrap_or(Status::OK);
        let reason = self.reason.unwrap_or_else(|| status.reason_phrase().to_string());
        HttpResponse {
            version: Version::default(),
            status,
            reason,
            headers: self.headers,
            body: self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_from_str() {
        assert_eq!(Version::from_str("HTTP/1.0").unwrap(), Version::Http10);
        assert_eq!(Version::from_str("HTTP/1.1").unwrap(), Version::Http11);
        assert!(Version::from_str("HTTP/2.0").is_err());
    }

    #[test]
    fn test_validate_method() {
        assert!(validate_method("GET").is_ok());
        assert!(validate_method("PROPFIND").is_ok());
        assert!(validate_method("M-SEARCH").is_ok());
        assert!(validate_method("").is_err());
        assert!(validate_method("GE T").is_err());
    }

    #[test]
    fn test_status() {
        let status = Status::new(200).unwrap();
        assert_eq!(status.code(), 200);
        assert_eq!(status.reason_phrase(), "OK");
        assert!(status.is_success());
        assert!(Status::new(204).unwrap().is_bodyless());
        assert!(Status::new(99).is_err());
    }

    #[test]
    fn test_request_head_path() {
        let head = RequestHead::new("GET", "/upload/a.txt?x=1", Version::Http11);
        assert_eq!(head.path(), "/upload/a.txt");

        let head = RequestHead::new("GET", "http://example.com/p?q", Version::Http11);
        assert_eq!(head.path(), "/p");

        let head = RequestHead::new("GET", "http://example.com", Version::Http11);
        assert_eq!(head.path(), "/");
    }

    #[test]
    fn test_request_head_decoded_path() {
        let head = RequestHead::new("GET", "/a%20b/%E6%97%A5.txt?x=%20", Version::Http11);
        assert_eq!(head.decoded_path(), "/a b/日.txt");

        let head = RequestHead::new("GET", "/100%/%zz%4", Version::Http11);
        assert_eq!(head.decoded_path(), "/100%/%zz%4");
    }

    #[test]
    fn test_keep_alive() {
        let mut head = RequestHead::new("GET", "/", Version::Http11);
        assert!(head.keep_alive());
        head.headers_mut().insert("Connection", "close");
        assert!(!head.keep_alive());

        let mut head = RequestHead::new("GET", "/", Version::Http10);
        assert!(!head.keep_alive());
        head.headers_mut().insert("Connection", "Keep-Alive");
        assert!(head.keep_alive());
    }

    #[test]
    fn test_request_head_to_wire() {
        let mut head = RequestHead::new("POST", "/x", Version::Http11);
        head.headers_mut().insert("Host", "example.com");

        let wire = String::from_utf8(head.to_wire()).unwrap();
        assert_eq!(wire, "POST /x HTTP/1.1\r\nHost: example.com\r\n\r\n");
    }

    #[test]
    fn test_response_to_wire() {
        let resp = HttpResponse::builder()
            .status(Status::new(404).unwrap())
            .header("Content-Type", "text/plain")
            .header("Content-Length", "999")
            .body(b"Not Found".to_vec())
            .build();

        let wire = String::from_utf8(resp.to_wire()).unwrap();
        assert!(wire.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(wire.contains("Content-Length: 9\r\n"));
        assert!(!wire.contains("999"));
        assert!(wire.ends_with("\r\n\r\nNot Found"));
    }
}
