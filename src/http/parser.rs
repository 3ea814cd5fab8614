//! HTTP message head parsing
//!
//! This module parses request and response heads (start line plus header
//! fields) from a buffered connection. The body is left unread in the buffer
//! so the caller can frame it with [`super::BodyReader`].

use super::message::validate_method;
use super::{Error, Headers, RequestHead, ResponseHead, Result, Status, Version, MAX_HEAD_SIZE};
use std::io::{BufRead, Read};

/// Find the next CRLF in a buffer
pub fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parse HTTP request line
///
/// Format: METHOD TARGET VERSION
/// Example: GET /index.html HTTP/1.1
pub fn parse_request_line(line: &str) -> Result<(String, String, Version)> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    if parts.len() != 3 {
        return Err(Error::Parse(format!(
            "Invalid request line: expected 3 parts, got {}",
            parts.len()
        )));
    }

    validate_method(parts[0])?;
    let version = Version::from_str(parts[2])?;

    Ok((parts[0].to_string(), parts[1].to_string(), version))
}

/// Parse HTTP response status line
///
/// Format: VERSION STATUS REASON
/// Example: HTTP/1.1 200 OK
pub fn parse_status_line(line: &str) -> Result<(Version, Status, String)> {
    let parts: Vec<&str> = line.splitn(3, ' ').collect();

    if parts.len() < 2 {
        return Err(Error::Parse(format!(
            "Invalid status line: expected at least 2 parts, got {}",
            parts.len()
        )));
    }

    let version = Version::from_str(parts[0])?;
    let status_code = parts[1]
        .parse::<u16>()
        .map_err(|_| Error::Parse(format!("Invalid status code: {}", parts[1])))?;
    let status = Status::new(status_code)?;
    let reason = match parts.get(2) {
        Some(reason) => reason.to_string(),
        None => status.reason_phrase().to_string(),
    };

    Ok((version, status, reason))
}

/// Read one line, without its terminator
///
/// Returns `Ok(None)` at end of stream when nothing was read. `budget` is the
/// number of head bytes still allowed and is decremented by the line length.
fn read_line<R: BufRead>(reader: &mut R, budget: &mut usize) -> Result<Option<String>> {
    let mut line = Vec::new();
    let n = reader
        .by_ref()
        .take(*budget as u64 + 1)
        .read_until(b'\n', &mut line)?;

    if n == 0 {
        return Ok(None);
    }
    if n > *budget {
        return Err(Error::HeadTooLarge);
    }
    *budget -= n;

    if line.last() != Some(&b'\n') {
        return Err(Error::ConnectionClosed);
    }
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }

    String::from_utf8(line)
        .map(Some)
        .map_err(|_| Error::Parse("Non UTF-8 bytes in message head".to_string()))
}

/// Read header fields up to and including the empty line
fn read_headers<R: BufRead>(reader: &mut R, budget: &mut usize) -> Result<Headers> {
    let mut headers = Headers::new();
    loop {
        let line = read_line(reader, budget)?.ok_or(Error::ConnectionClosed)?;
        if line.is_empty() {
            return Ok(headers);
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            return Err(Error::InvalidHeader(
                "Obsolete line folding is not supported".to_string(),
            ));
        }
        headers.push_line(&line)?;
    }
}

/// Read a request head from a connection
///
/// Returns `Ok(None)` when the peer closed the connection before sending
/// anything, which is how a keep-alive connection normally ends.
pub fn read_request_head<R: BufRead>(reader: &mut R) -> Result<Option<RequestHead>> {
    let mut budget = MAX_HEAD_SIZE;

    // Leading empty lines before the request line are tolerated
    let line = loop {
        match read_line(reader, &mut budget)? {
            None => return Ok(None),
            Some(line) if line.is_empty() => continue,
            Some(line) => break line,
        }
    };

    let (method, target, version) = parse_request_line(&line)?;
    let mut head = RequestHead::new(method, target, version);
    *head.headers_mut() = read_headers(reader, &mut budget)?;

    Ok(Some(head))
}

/// Read a response head from a connection
pub fn read_response_head<R: BufRead>(reader: &mut R) -> Result<ResponseHead> {
    let mut budget = MAX_HEAD_SIZE;

    let line = read_line(reader, &mut budget)?.ok_or(Error::ConnectionClosed)?;
    let (version, status, reason) = parse_status_line(&line)?;
    let headers = read_headers(reader, &mut budget)?;

    Ok(ResponseHead::new(version, status, reason, headers))
}
