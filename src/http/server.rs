//! HTTP server implementation
//!
//! This module provides the server half of a connection accepted by the
//! capture listener: request heads are parsed from a buffered session and
//! the body is handed out as a streaming reader.

use super::{
    parser, BodyReader, HttpResponse, HttpSession, RequestHead, Result, SessionOps,
};
use std::io::BufReader;
use std::time::Duration;

/// HTTP server
///
/// Provides methods for receiving requests and sending responses.
pub struct HttpServer<S: SessionOps> {
    conn: BufReader<HttpSession<S>>,
}

impl<S: SessionOps> HttpServer<S> {
    /// Create a new HTTP server with a session
    pub fn new(session: S) -> Self {
        HttpServer {
            conn: BufReader::new(HttpSession::new(session)),
        }
    }

    /// Set the timeout for operations
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.conn.get_mut().set_timeout(timeout);
    }

    /// Receive the next request head
    ///
    /// Returns `None` when the client closed the connection between requests.
    pub fn receive_request_head(&mut self) -> Result<Option<RequestHead>> {
        parser::read_request_head(&mut self.conn)
    }

    /// Body of the request whose head was just received
    pub fn request_body(
        &mut self,
        head: &RequestHead,
    ) -> Result<BodyReader<&mut BufReader<HttpSession<S>>>> {
        BodyReader::for_request(head, &mut self.conn)
    }

    /// Tell a client waiting on `Expect: 100-continue` to send the body
    pub fn send_continue(&mut self) -> Result<()> {
        let session = self.conn.get_mut();
        session.write_all_bytes(b"HTTP/1.1 100 Continue\r\n\r\n")?;
        session.get_mut().flush()
    }

    /// Send an HTTP response
    pub fn send_response(&mut self, response: &HttpResponse) -> Result<()> {
        let session = self.conn.get_mut();
        session.write_all_bytes(&response.to_wire())?;
        session.get_mut().flush()
    }

    /// Close the connection
    pub fn close(&mut self) -> Result<()> {
        self.conn.get_mut().close()
    }
}
