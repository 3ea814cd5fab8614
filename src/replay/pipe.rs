//! Bounded in-memory pipe
//!
//! Connects a producer thread writing a request body with the client that
//! sends it. The writer blocks while `capacity` chunks are queued; dropping
//! it ends the stream, and [`PipeWriter::close_with_error`] makes the
//! reader fail with the given error instead.

use bytes::{Buf, Bytes};
use std::io::{self, Read, Write};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

/// Create a pipe holding at most `capacity` chunks in flight
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = sync_channel(capacity);
    (
        PipeWriter { tx },
        PipeReader {
            rx,
            chunk: Bytes::new(),
            state: ReadState::Open,
        },
    )
}

/// Producing end of a [`pipe`]
#[derive(Debug)]
pub struct PipeWriter {
    tx: SyncSender<io::Result<Bytes>>,
}

impl PipeWriter {
    /// End the stream with an error seen by the reader after the data
    /// already written
    pub fn close_with_error(self, err: io::Error) {
        let _ = self.tx.send(Err(err));
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Open,
    Eof,
    Failed,
}

/// Consuming end of a [`pipe`]
#[derive(Debug)]
pub struct PipeReader {
    rx: Receiver<io::Result<Bytes>>,
    chunk: Bytes,
    state: ReadState,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while !self.chunk.has_remaining() {
            match self.state {
                ReadState::Eof => return Ok(0),
                ReadState::Failed => {
                    return Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "pipe closed with an error",
                    ))
                }
                ReadState::Open => {}
            }
            match self.rx.recv() {
                Ok(Ok(chunk)) => self.chunk = chunk,
                Ok(Err(e)) => {
                    self.state = ReadState::Failed;
                    return Err(e);
                }
                Err(_) => self.state = ReadState::Eof,
            }
        }

        let n = buf.len().min(self.chunk.remaining());
        buf[..n].copy_from_slice(&self.chunk[..n]);
        self.chunk.advance(n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_pipe_transfers_in_order() {
        let (mut writer, mut reader) = pipe(2);
        let producer = thread::spawn(move || {
            for i in 0..100u32 {
                writer.write_all(format!("{},", i).as_bytes()).unwrap();
            }
        });

        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        producer.join().unwrap();

        let expected: String = (0..100u32).map(|i| format!("{},", i)).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_pipe_small_reads() {
        let (mut writer, mut reader) = pipe(4);
        writer.write_all(b"abcdef").unwrap();
        drop(writer);

        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_close_with_error_reaches_reader() {
        let (mut writer, mut reader) = pipe(4);
        writer.write_all(b"partial").unwrap();
        writer.close_with_error(io::Error::new(io::ErrorKind::NotFound, "gone"));

        let mut buf = [0u8; 64];
        assert_eq!(reader.read(&mut buf).unwrap(), 7);
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(reader.read(&mut buf).is_err());
    }

    #[test]
    fn test_write_after_reader_dropped() {
        let (mut writer, reader) = pipe(1);
        drop(reader);
        let err = writer.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
