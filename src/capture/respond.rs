//! Response strategies
//!
//! The recorder answers every captured request with either a fixed status
//! and body, or a file served from a document root.

use crate::http::{HttpResponse, RequestHead, Status};
use crate::mime;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// How captured requests are answered
#[derive(Debug, Clone)]
pub enum Responder {
    /// The same status and body for every request
    Canned { status: Status, body: Vec<u8> },
    /// Files below a document root
    StaticFiles { root: PathBuf },
}

impl Responder {
    /// A canned response; an empty body defaults to the reason phrase
    pub fn canned(status: Status, body: &str) -> Self {
        let body = if body.is_empty() {
            status.reason_phrase()
        } else {
            body
        };
        Responder::Canned {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    /// Serve files below `root`, which must be an existing directory
    pub fn static_files(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        let meta = fs::metadata(&root).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("cannot use {} as document root: {}", root.display(), e),
            )
        })?;
        if !meta.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Responder::StaticFiles { root })
    }

    /// Build the response for a request
    pub fn respond(&self, head: &RequestHead) -> HttpResponse {
        match self {
            Responder::Canned { status, body } => HttpResponse::builder()
                .status(*status)
                .header("Content-Type", "text/plain; charset=utf-8")
                .body(body.clone())
                .build(),
            Responder::StaticFiles { root } => serve_file(root, head),
        }
    }
}

fn serve_file(root: &Path, head: &RequestHead) -> HttpResponse {
    let Some(mut path) = resolve(root, &head.decoded_path()) else {
        return plain(Status::BAD_REQUEST, "invalid URL path");
    };
    if path.is_dir() {
        path.push("index.html");
    }

    match fs::read(&path) {
        Ok(data) => {
            let content_type = mime::type_for_path(&path).unwrap_or("application/octet-stream");
            let body = if head.method() == "HEAD" { Vec::new() } else { data };
            HttpResponse::builder()
                .status(Status::OK)
                .header("Content-Type", content_type)
                .body(body)
                .build()
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "static file not served");
            plain(Status::NOT_FOUND, "404 page not found")
        }
    }
}

/// Map a request path below `root`, refusing anything that climbs out
fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for component in Path::new(request_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(path)
}

fn plain(status: Status, body: &str) -> HttpResponse {
    HttpResponse::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(body.as_bytes().to_vec())
        .build()
}
