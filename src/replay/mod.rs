//! Request replay
//!
//! Loads a record file, rebuilds the request it describes and sends it to a
//! target server. Spooled bodies and part files are read from the record's
//! own directory, and multipart bodies are regenerated while they are sent.

pub mod builder;
pub mod multipart;
pub mod pipe;
pub mod send;
pub mod target;

pub use builder::{compact_json, Auth, OutboundBody, OutboundRequest, ReplayBuilder};
pub use multipart::recompose;
pub use send::{send, SendOptions};
pub use target::{Scheme, Target, TargetError};

use crate::http::ResponseHead;
use crate::record::{self, Result};
use std::io::Write;
use std::path::Path;

/// Replay the record stored at `path`, writing the response body to `out`
pub fn replay_file<W: Write + ?Sized>(
    path: &Path,
    builder: &ReplayBuilder,
    options: &SendOptions,
    out: &mut W,
) -> Result<ResponseHead> {
    let record = record::load(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    tracing::debug!(
        file = %path.display(),
        method = %record.method,
        url = %record.url,
        target = %builder.target(),
        "replaying record"
    );

    let request = builder.build(record, dir)?;
    send(request, builder.target(), options, out)
}
