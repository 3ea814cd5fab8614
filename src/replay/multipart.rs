//! Multipart recomposition
//!
//! Rebuilds a `multipart/form-data` body from the parts of a record. The
//! body is produced on its own thread and handed to the sender through a
//! bounded [`pipe`](super::pipe), so spooled part files are streamed rather
//! than loaded.

use super::pipe::{pipe, PipeReader};
use crate::record::{self, Error, Part, PartBody, Result};
use rand::RngCore;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::thread;

/// Chunks queued between the producer and the sender
const PIPE_CAPACITY: usize = 16;

const CHUNK_SIZE: usize = 32 * 1024;

/// A fresh random boundary of 60 hex digits
pub fn random_boundary() -> String {
    let mut bytes = [0u8; 30];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Start producing the multipart body for `parts`
///
/// Part files are resolved against `dir` and must all exist before anything
/// is produced. Errors hit later, while streaming, surface as a read error
/// on the returned reader.
pub fn recompose(parts: Vec<Part>, boundary: &str, dir: &Path) -> Result<PipeReader> {
    for part in &parts {
        if let PartBody::File(name) = &part.body {
            let path = dir.join(name);
            if !path.is_file() {
                return Err(Error::MissingPartFile(path));
            }
        }
    }

    let (mut writer, reader) = pipe(PIPE_CAPACITY);
    let boundary = boundary.to_string();
    let dir = dir.to_path_buf();
    thread::Builder::new()
        .name("multipart-writer".to_string())
        .spawn(move || {
            let result = {
                let mut out = BufWriter::with_capacity(CHUNK_SIZE, &mut writer);
                write_parts(&mut out, &parts, &boundary, &dir).and_then(|_| out.flush())
            };
            if let Err(e) = result {
                tracing::debug!(error = %e, "multipart body aborted");
                writer.close_with_error(e);
            }
        })?;

    Ok(reader)
}

/// Write a complete multipart body
pub fn write_parts<W: Write + ?Sized>(
    out: &mut W,
    parts: &[Part],
    boundary: &str,
    dir: &Path,
) -> io::Result<()> {
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.write_all(b"\r\n")?;
        }
        write!(out, "--{}\r\n", boundary)?;

        let mut head = Vec::new();
        record::unfold(&part.header).write_wire(&mut head);
        out.write_all(&head)?;
        out.write_all(b"\r\n")?;

        match &part.body {
            PartBody::None => {}
            PartBody::Text(text) => out.write_all(text.as_bytes())?,
            PartBody::Json(raw) => out.write_all(raw.get().as_bytes())?,
            PartBody::File(name) => {
                let path = dir.join(name);
                let mut file = open_part(&path)?;
                io::copy(&mut file, out)?;
            }
        }
    }

    if parts.is_empty() {
        write!(out, "--{}--\r\n", boundary)
    } else {
        write!(out, "\r\n--{}--\r\n", boundary)
    }
}

fn open_part(path: &Path) -> io::Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::missing_file_io(path.to_path_buf())
        } else {
            e
        }
    })
}
