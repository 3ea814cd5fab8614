//! Chunked transfer encoding support
//!
//! This module provides encoding and decoding for HTTP chunked transfer encoding.
//! The decoder works directly on a buffered connection so that a chunked
//! request body can be streamed to disk without being collected first.

use super::{Error, Result, CRLF};
use std::io::{self, BufRead, Read, Write};

/// Longest chunk-size line accepted, extensions included
const MAX_CHUNK_LINE: u64 = 4096;

/// Chunked encoder
///
/// Encodes data in HTTP chunked transfer encoding format
pub struct ChunkedEncoder<W: Write> {
    writer: W,
}

impl<W: Write> ChunkedEncoder<W> {
    /// Create a new chunked encoder
    pub fn new(writer: W) -> Self {
        ChunkedEncoder { writer }
    }

    /// Write a chunk of data
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        write!(self.writer, "{:x}{}", data.len(), CRLF)?;
        self.writer.write_all(data)?;
        self.writer.write_all(CRLF.as_bytes())?;

        Ok(())
    }

    /// Write the final chunk (0-sized chunk)
    pub fn finish(&mut self) -> Result<()> {
        write!(self.writer, "0{}{}", CRLF, CRLF)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Consume the encoder and return the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Write for ChunkedEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_chunk(buf).map_err(io::Error::from)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Chunked decoder
///
/// Decodes HTTP chunked transfer encoding format from a buffered reader.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: DecoderState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DecoderState {
    ChunkSize,
    ChunkData(u64),
    ChunkEnd,
    Complete,
}

impl ChunkedDecoder {
    /// Create a new chunked decoder
    pub fn new() -> Self {
        ChunkedDecoder {
            state: DecoderState::ChunkSize,
        }
    }

    /// Check if decoding is complete
    pub fn is_complete(&self) -> bool {
        self.state == DecoderState::Complete
    }

    /// Decode body bytes into `buf`
    ///
    /// Returns 0 once the last chunk and the trailer section have been
    /// consumed. Trailer fields are discarded.
    pub fn read<R: BufRead>(&mut self, reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            match self.state {
                DecoderState::ChunkSize => {
                    let line = read_chunk_line(reader)?;
                    let size_str = line.split(';').next().unwrap_or("").trim();
                    let size = u64::from_str_radix(size_str, 16).map_err(|_| {
                        io::Error::from(Error::InvalidChunkSize(size_str.to_string()))
                    })?;

                    if size == 0 {
                        // Trailer section, up to the empty line
                        while !read_chunk_line(reader)?.is_empty() {}
                        self.state = DecoderState::Complete;
                    } else {
                        self.state = DecoderState::ChunkData(size);
                    }
                }

                DecoderState::ChunkData(remaining) => {
                    let max = remaining.min(buf.len() as u64) as usize;
                    let n = reader.read(&mut buf[..max])?;
                    if n == 0 {
                        return Err(io::Error::from(Error::ConnectionClosed));
                    }

                    let remaining = remaining - n as u64;
                    self.state = if remaining == 0 {
                        DecoderState::ChunkEnd
                    } else {
                        DecoderState::ChunkData(remaining)
                    };
                    return Ok(n);
                }

                DecoderState::ChunkEnd => {
                    if !read_chunk_line(reader)?.is_empty() {
                        return Err(io::Error::from(Error::Protocol(
                            "Expected CRLF after chunk".to_string(),
                        )));
                    }
                    self.state = DecoderState::ChunkSize;
                }

                DecoderState::Complete => return Ok(0),
            }
        }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn read_chunk_line<R: BufRead>(reader: &mut R) -> io::Result<String> {
    let mut line = Vec::new();
    reader
        .by_ref()
        .take(MAX_CHUNK_LINE)
        .read_until(b'\n', &mut line)?;

    if line.last() != Some(&b'\n') {
        let err = if line.len() as u64 >= MAX_CHUNK_LINE {
            Error::Protocol("Chunk line too long".to_string())
        } else {
            Error::ConnectionClosed
        };
        return Err(io::Error::from(err));
    }

    let line = String::from_utf8_lossy(&line);
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

/// Decode complete chunked body from bytes
pub fn decode_chunked_body(input: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ChunkedDecoder::new();
    let mut reader = input;
    let mut output = Vec::new();
    let mut temp = [0u8; 8192];

    loop {
        let n = decoder.read(&mut reader, &mut temp)?;
        if n == 0 {
            break;
        }
        output.extend_from_slice(&temp[..n]);
    }

    Ok(output)
}

/// Encode data as chunked body
pub fn encode_chunked_body(data: &[u8], chunk_size: usize) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let mut encoder = ChunkedEncoder::new(&mut output);

    for chunk in data.chunks(chunk_size) {
        encoder.write_chunk(chunk)?;
    }

    encoder.finish()?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_multiple_chunks() {
        let mut output = Vec::new();
        let mut encoder = ChunkedEncoder::new(&mut output);

        encoder.write_chunk(b"Hello").unwrap();
        encoder.write_chunk(b"").unwrap();
        encoder.write_chunk(b"World").unwrap();
        encoder.finish().unwrap();

        assert_eq!(output, b"5\r\nHello\r\n5\r\nWorld\r\n0\r\n\r\n");
    }

    #[test]
    fn test_encoder_as_writer() {
        let mut output = Vec::new();
        {
            let mut encoder = ChunkedEncoder::new(&mut output);
            std::io::copy(&mut &b"streamed"[..], &mut encoder).unwrap();
            encoder.finish().unwrap();
        }
        assert_eq!(decode_chunked_body(&output).unwrap(), b"streamed");
    }

    #[test]
    fn test_decode_multiple_chunks() {
        let input = b"5\r\nHello\r\n5\r\nWorld\r\n0\r\n\r\n";
        let output = decode_chunked_body(input).unwrap();
        assert_eq!(output, b"HelloWorld");
    }

    #[test]
    fn test_decode_with_extension_and_trailer() {
        let input = b"5;extension=value\r\nHello\r\n0\r\nX-Trailer: yes\r\n\r\n";
        let output = decode_chunked_body(input).unwrap();
        assert_eq!(output, b"Hello");
    }

    #[test]
    fn test_decode_leaves_following_bytes() {
        let input = b"3\r\nabc\r\n0\r\n\r\nGET / HTTP/1.1\r\n";
        let mut reader = &input[..];
        let mut decoder = ChunkedDecoder::new();
        let mut buf = [0u8; 16];

        assert_eq!(decoder.read(&mut reader, &mut buf).unwrap(), 3);
        assert_eq!(decoder.read(&mut reader, &mut buf).unwrap(), 0);
        assert!(decoder.is_complete());
        assert_eq!(reader, b"GET / HTTP/1.1\r\n");
    }

    #[test]
    fn test_decode_errors() {
        assert!(decode_chunked_body(b"zz\r\nHello\r\n0\r\n\r\n").is_err());
        assert!(decode_chunked_body(b"5\r\nHelloX\r\n0\r\n\r\n").is_err());
        assert!(decode_chunked_body(b"5\r\nHel").is_err());
    }

    #[test]
    fn test_encode_chunked_body_helper() {
        let data = b"Hello, World!";
        let output = encode_chunked_body(data, 5).unwrap();
        assert_eq!(decode_chunked_body(&output).unwrap(), data);
    }
}
