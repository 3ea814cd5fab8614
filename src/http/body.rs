//! Message body framing
//!
//! [`BodyReader`] exposes the body of a request or response as a plain
//! `std::io::Read`, framed by Content-Length, chunked transfer coding, or the
//! end of the connection. Nothing is buffered beyond what the underlying
//! `BufRead` already holds.

use super::chunked::ChunkedDecoder;
use super::{Error, Headers, RequestHead, ResponseHead, Result};
use std::io::{self, BufRead, Read};

#[derive(Debug)]
enum Framing {
    Empty,
    Length(u64),
    Chunked(ChunkedDecoder),
    UntilClose,
}

/// Streaming reader over one message body
pub struct BodyReader<R: BufRead> {
    reader: R,
    framing: Framing,
}

/// Determine the declared Content-Length, rejecting conflicting values
fn content_length(headers: &Headers) -> Result<Option<u64>> {
    let mut length = None;
    for value in headers.get_all("Content-Length") {
        for part in value.split(',') {
            let n = part
                .trim()
                .parse::<u64>()
                .map_err(|_| Error::Parse(format!("Invalid Content-Length: {}", value)))?;
            if length.is_some_and(|l| l != n) {
                return Err(Error::Parse(format!("Conflicting Content-Length: {}", value)));
            }
            length = Some(n);
        }
    }
    Ok(length)
}

/// Whether the final transfer coding is chunked
fn is_chunked(headers: &Headers) -> bool {
    headers
        .get_all("Transfer-Encoding")
        .iter()
        .flat_map(|v| v.split(','))
        .last()
        .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

impl<R: BufRead> BodyReader<R> {
    /// Frame the body of a request
    ///
    /// A request without Content-Length or chunked coding has no body.
    pub fn for_request(head: &RequestHead, reader: R) -> Result<Self> {
        let headers = head.headers();
        let framing = if is_chunked(headers) {
            Framing::Chunked(ChunkedDecoder::new())
        } else {
            match content_length(headers)? {
                Some(0) | None => Framing::Empty,
                Some(n) => Framing::Length(n),
            }
        };
        Ok(BodyReader { reader, framing })
    }

    /// Frame the body of a response to a request made with `method`
    pub fn for_response(method: &str, head: &ResponseHead, reader: R) -> Result<Self> {
        let headers = head.headers();
        let framing = if method.eq_ignore_ascii_case("HEAD") || head.status().is_bodyless() {
            Framing::Empty
        } else if is_chunked(headers) {
            Framing::Chunked(ChunkedDecoder::new())
        } else {
            match content_length(headers)? {
                Some(0) => Framing::Empty,
                Some(n) => Framing::Length(n),
                None => Framing::UntilClose,
            }
        };
        Ok(BodyReader { reader, framing })
    }

    /// Whether the whole body has been consumed
    pub fn is_finished(&self) -> bool {
        match &self.framing {
            Framing::Empty => true,
            Framing::Length(n) => *n == 0,
            Framing::Chunked(decoder) => decoder.is_complete(),
            Framing::UntilClose => false,
        }
    }

    /// Read and discard whatever is left of the body
    pub fn drain(&mut self) -> io::Result<u64> {
        io::copy(self, &mut io::sink())
    }

    /// Give back the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: BufRead> Read for BodyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.framing {
            Framing::Empty => Ok(0),
            Framing::Length(remaining) => {
                if *remaining == 0 || buf.is_empty() {
                    return Ok(0);
                }
                let max = (*remaining).min(buf.len() as u64) as usize;
                let n = self.reader.read(&mut buf[..max])?;
                if n == 0 {
                    return Err(io::Error::from(Error::ConnectionClosed));
                }
                *remaining -= n as u64;
                Ok(n)
            }
            Framing::Chunked(decoder) => decoder.read(&mut self.reader, buf),
            Framing::UntilClose => self.reader.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Status, Version};

    fn request(headers: &[(&str, &str)]) -> RequestHead {
        let mut head = RequestHead::new("POST", "/", Version::Http11);
        for (name, value) in headers {
            head.headers_mut().insert(*name, *value);
        }
        head
    }

    #[test]
    fn test_content_length_body() {
        let head = request(&[("Content-Length", "5")]);
        let mut body = BodyReader::for_request(&head, &b"HelloNEXT"[..]).unwrap();

        let mut out = Vec::new();
        body.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"Hello");
        assert!(body.is_finished());
        assert_eq!(body.into_inner(), b"NEXT");
    }

    #[test]
    fn test_chunked_body() {
        let head = request(&[("Transfer-Encoding", "chunked")]);
        let mut body =
            BodyReader::for_request(&head, &b"4\r\nWiki\r\n0\r\n\r\n"[..]).unwrap();

        let mut out = Vec::new();
        body.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"Wiki");
    }

    #[test]
    fn test_request_without_length_is_empty() {
        let head = request(&[]);
        let mut body = BodyReader::for_request(&head, &b"ignored"[..]).unwrap();
        assert_eq!(body.drain().unwrap(), 0);
    }

    #[test]
    fn test_truncated_body_is_an_error() {
        let head = request(&[("Content-Length", "10")]);
        let mut body = BodyReader::for_request(&head, &b"short"[..]).unwrap();

        let mut out = Vec::new();
        assert!(body.read_to_end(&mut out).is_err());
    }

    #[test]
    fn test_conflicting_content_length() {
        let head = request(&[("Content-Length", "5"), ("Content-Length", "6")]);
        assert!(BodyReader::for_request(&head, &b""[..]).is_err());

        let head = request(&[("Content-Length", "5, 5")]);
        assert!(BodyReader::for_request(&head, &b""[..]).is_ok());
    }

    #[test]
    fn test_response_until_close() {
        let head = ResponseHead::new(Version::Http11, Status::OK, "OK", Headers::new());
        let mut body = BodyReader::for_response("GET", &head, &b"all of it"[..]).unwrap();

        let mut out = Vec::new();
        body.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"all of it");

        let mut body = BodyReader::for_response("HEAD", &head, &b"nothing"[..]).unwrap();
        assert_eq!(body.drain().unwrap(), 0);
    }
}
