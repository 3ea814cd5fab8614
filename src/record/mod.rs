//! Transaction records
//!
//! A [`TransactionRecord`] is the on-disk description of one captured HTTP
//! request: method, target, capture time, protocol and the request message.
//! Message bodies are kept in one of four representations (inline text,
//! spooled file, raw JSON, or a list of multipart parts), see [`Body`].
//!
//! This module also owns the error taxonomy shared by capture and replay.

pub mod header;
pub mod model;
pub mod naming;
pub mod store;

pub use header::{fold, unfold, FoldedHeaders, HeaderValue};
pub use model::{Body, Message, Part, PartBody, TransactionRecord};
pub use store::{load, save};

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Result type for capture and replay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Capture and replay errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("Body too large or invalid: {0}")]
    BodyTooLargeOrInvalid(String),

    #[error("Malformed multipart body: {0}")]
    MalformedMultipart(String),

    #[error("Missing part file: {}", .0.display())]
    MissingPartFile(PathBuf),

    #[error("Invalid record file: {0}")]
    InvalidRecordFile(String),

    #[error("HTTP error: {0}")]
    Http(#[from] crate::http::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] crate::http::tls::TlsError),
}

impl Error {
    /// Whether the error was caused by what the client sent
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::BodyTooLargeOrInvalid(_) | Error::MalformedMultipart(_)
        )
    }

    /// An `io::Error` that converts back into [`Error::MalformedMultipart`]
    pub(crate) fn malformed_io(msg: impl Into<String>) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, Carried::Malformed(msg.into()))
    }

    /// An `io::Error` that converts back into [`Error::MissingPartFile`]
    pub(crate) fn missing_file_io(path: PathBuf) -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, Carried::MissingFile(path))
    }
}

/// Codec errors raised inside `Read`/`Write` implementations
#[derive(Debug)]
enum Carried {
    Malformed(String),
    MissingFile(PathBuf),
}

impl fmt::Display for Carried {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Carried::Malformed(msg) => write!(f, "malformed multipart body: {}", msg),
            Carried::MissingFile(path) => write!(f, "missing part file: {}", path.display()),
        }
    }
}

impl std::error::Error for Carried {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        let carried = err.get_ref().and_then(|inner| inner.downcast_ref::<Carried>());
        match carried {
            Some(Carried::Malformed(msg)) => Error::MalformedMultipart(msg.clone()),
            Some(Carried::MissingFile(path)) => Error::MissingPartFile(path.clone()),
            None => Error::Io(err),
        }
    }
}
