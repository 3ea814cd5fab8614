//! TLS support for HTTP connections
//!
//! The capture listener can terminate HTTPS with a PEM certificate and key,
//! and the replay client can talk to HTTPS targets, optionally without
//! verifying the peer.
//!
//! # Architecture
//!
//! The TLS implementation uses the session operations abstraction pattern:
//!
//! 1. `TlsConfig` holds an OpenSSL context for one side of the connection
//! 2. `TlsSessionOps` implements the `SessionOps` trait for encrypted I/O
//! 3. All HTTP code remains unchanged - it transparently uses TLS operations
//!
//! # Examples
//!
//! ```no_run
//! use reqrec::http::tls::TlsConfig;
//! use reqrec::http::HttpClient;
//! use std::net::TcpStream;
//!
//! let tls_config = TlsConfig::client()
//!     .unwrap()
//!     .servername("example.com")
//!     .verify_peer(true)
//!     .unwrap()
//!     .build();
//!
//! let tcp_stream = TcpStream::connect("example.com:443").unwrap();
//! let tls_session = tls_config.connect(tcp_stream).unwrap();
//! let mut client = HttpClient::new(tls_session);
//! ```

pub mod config;
pub mod session;

pub use config::{ClientConfigBuilder, ServerConfigBuilder, TlsConfig, TlsError};
pub use session::TlsSessionOps;

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;
