//! reqrec - HTTP request recorder and replayer
//!
//! The capture side accepts HTTP/1.1 requests (plain or TLS), stores each
//! one as a numbered JSON record next to any spooled body or multipart part
//! files, and answers with a canned response or a static file. The replay
//! side loads such a record, rebuilds the request it describes and sends it
//! to another server.

pub mod capture;
pub mod config;
pub mod http;
pub mod listener;
pub mod logging;
pub mod mime;
pub mod record;
pub mod replay;
