//! HTTP client implementation
//!
//! This module provides the client half used to replay recorded requests.
//! Request bodies are streamed from any `Read`, so a multi-gigabyte spool
//! file or a multipart body produced on the fly never sits in memory.

use super::{
    chunked::ChunkedEncoder, parser, BodyReader, Error, HttpSession, RequestHead, ResponseHead,
    Result, SessionOps,
};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::time::Duration;

const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// HTTP client
///
/// Provides methods for sending requests and receiving responses.
pub struct HttpClient<S: SessionOps> {
    conn: BufReader<HttpSession<S>>,
}

impl<S: SessionOps> HttpClient<S> {
    /// Create a new HTTP client with a session
    pub fn new(session: S) -> Self {
        HttpClient {
            conn: BufReader::new(HttpSession::new(session)),
        }
    }

    /// Set the timeout for operations
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.conn.get_mut().set_timeout(Some(timeout));
    }

    /// Send a request head followed by its body
    ///
    /// With `Some(length)` exactly that many bytes are copied from `body` and
    /// a non-zero length is announced with `Content-Length`. With `None` the
    /// body is sent with chunked transfer coding until `body` reaches EOF.
    /// Returns the number of body bytes sent.
    pub fn send_request<R: Read + ?Sized>(
        &mut self,
        head: &RequestHead,
        body: &mut R,
        length: Option<u64>,
    ) -> Result<u64> {
        let mut head = head.clone();
        match length {
            Some(n) => {
                head.headers_mut().remove("Transfer-Encoding");
                if n > 0 {
                    head.headers_mut().set("Content-Length", n.to_string());
                }
            }
            None => {
                head.headers_mut().remove("Content-Length");
                head.headers_mut().set("Transfer-Encoding", "chunked");
            }
        }

        let session = self.conn.get_mut();
        session.write_all_bytes(&head.to_wire())?;

        let sent = match length {
            Some(0) => 0,
            Some(n) => {
                let copied = io::copy(&mut body.take(n), &mut *session)?;
                if copied != n {
                    return Err(Error::Protocol(format!(
                        "Request body ended after {} of {} bytes",
                        copied, n
                    )));
                }
                copied
            }
            None => {
                let mut encoder =
                    ChunkedEncoder::new(BufWriter::with_capacity(WRITE_BUFFER_SIZE, &mut *session));
                let copied = io::copy(body, &mut encoder)?;
                encoder.finish()?;
                copied
            }
        };

        session.flush()?;
        Ok(sent)
    }

    /// Receive the head of the final response
    ///
    /// Interim 1xx responses other than `101 Switching Protocols` are skipped.
    pub fn receive_response_head(&mut self, method: &str) -> Result<ResponseHead> {
        loop {
            let head = parser::read_response_head(&mut self.conn)?;
            let code = head.status().code();
            if head.status().is_informational() && code != 101 {
                tracing::debug!(method, code, "skipping interim response");
                continue;
            }
            return Ok(head);
        }
    }

    /// Body of a response whose head was just received
    pub fn response_body(
        &mut self,
        method: &str,
        head: &ResponseHead,
    ) -> Result<BodyReader<&mut BufReader<HttpSession<S>>>> {
        BodyReader::for_response(method, head, &mut self.conn)
    }

    /// Receive a whole response, copying its body into `out`
    pub fn receive_response<W: Write + ?Sized>(
        &mut self,
        method: &str,
        out: &mut W,
    ) -> Result<(ResponseHead, u64)> {
        let head = self.receive_response_head(method)?;
        let mut body = self.response_body(method, &head)?;
        let n = io::copy(&mut body, out)?;
        Ok((head, n))
    }

    /// Close the connection
    pub fn close(&mut self) -> Result<()> {
        self.conn.get_mut().close()
    }
}
