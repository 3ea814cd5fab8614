//! HTTP/1.1 transport for the recorder
//!
//! This module provides the wire-level plumbing both halves of the recorder
//! sit on: the capture listener reads request heads and streams request
//! bodies through [`HttpServer`], and the replay side writes a reconstructed
//! request and reads the answer through [`HttpClient`].
//!
//! # Architecture
//!
//! The HTTP layer uses a session operations abstraction pattern that allows
//! seamless switching between plain TCP and TLS connections:
//!
//! - `SessionOps` trait defines operations (poll, read, write, close)
//! - `HttpSession` wraps a `SessionOps` with a timeout and exposes
//!   `std::io::Read`/`Write`, so bodies can be streamed with `io::copy`
//! - All HTTP I/O code is transparent to the underlying transport
//!
//! Bodies are never buffered whole: [`body::BodyReader`] frames a request or
//! response body (Content-Length, chunked, or read-to-close) as a `Read`, and
//! [`chunked::ChunkedEncoder`] frames an outbound body of unknown length.
//!
//! # Examples
//!
//! ```no_run
//! use reqrec::http::{HttpClient, RequestHead, Version};
//! use reqrec::http::session::FdSessionOps;
//! use std::net::TcpStream;
//!
//! let stream = TcpStream::connect("127.0.0.1:8080").unwrap();
//! let mut client = HttpClient::new(FdSessionOps::new(stream));
//!
//! let mut head = RequestHead::new("GET", "/", Version::Http11);
//! head.headers_mut().insert("Host", "localhost");
//! client.send_request(&head, &mut std::io::empty(), Some(0)).unwrap();
//!
//! let response = client.receive_response_head("GET").unwrap();
//! assert_eq!(response.status().code(), 200);
//! ```

pub mod body;
pub mod chunked;
pub mod client;
pub mod headers;
pub mod message;
pub mod parser;
pub mod server;
pub mod session;
pub mod tls;

pub use body::BodyReader;
pub use client::HttpClient;
pub use headers::Headers;
pub use message::{HttpResponse, RequestHead, ResponseHead, Status, Version};
pub use server::HttpServer;
pub use session::{HttpSession, SessionOps};

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] tls::TlsError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Message head too large")]
    HeadTooLarge,

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::Timeout => std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout"),
            Error::ConnectionClosed => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection closed")
            }
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

/// Maximum number of headers per message
pub const MAX_HEADERS: usize = 256;

/// Maximum size of a request or status line plus headers
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default HTTPS port
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// CRLF line ending
pub const CRLF: &str = "\r\n";
