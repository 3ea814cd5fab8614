//! TLS configuration
//!
//! This module provides TLS configuration builders for both client and server.

use openssl::ssl::{SslContext, SslContextBuilder, SslFiletype, SslMethod, SslVerifyMode};
use std::path::Path;

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),
}

/// TLS configuration (immutable after building)
#[derive(Clone)]
pub struct TlsConfig {
    pub(crate) ctx: SslContext,
    pub(crate) is_server: bool,
    pub(crate) servername: Option<String>,
    pub(crate) verify_peer: bool,
}

impl TlsConfig {
    /// Create a new client configuration builder
    pub fn client() -> Result<ClientConfigBuilder, TlsError> {
        ClientConfigBuilder::new()
    }

    /// Create a new server configuration builder
    pub fn server() -> Result<ServerConfigBuilder, TlsError> {
        ServerConfigBuilder::new()
    }

    /// Connect to a server with TLS (client-side)
    pub fn connect(&self, stream: std::net::TcpStream) -> Result<super::TlsSessionOps, TlsError> {
        if self.is_server {
            return Err(TlsError::InvalidConfig(
                "Cannot use server config for client connection".to_string(),
            ));
        }
        super::session::TlsSessionOps::connect(stream, self)
    }

    /// Accept a client connection with TLS (server-side)
    pub fn accept(&self, stream: std::net::TcpStream) -> Result<super::TlsSessionOps, TlsError> {
        if !self.is_server {
            return Err(TlsError::InvalidConfig(
                "Cannot use client config for server accept".to_string(),
            ));
        }
        super::session::TlsSessionOps::accept(stream, self)
    }
}

/// Client configuration builder
pub struct ClientConfigBuilder {
    ctx_builder: SslContextBuilder,
    servername: Option<String>,
    verify_peer: bool,
}

impl ClientConfigBuilder {
    fn new() -> Result<Self, TlsError> {
        let mut ctx_builder = SslContextBuilder::new(SslMethod::tls_client())?;
        ctx_builder.set_verify(SslVerifyMode::NONE);

        Ok(ClientConfigBuilder {
            ctx_builder,
            servername: None,
            verify_peer: false,
        })
    }

    /// Set SNI servername, also used for hostname verification
    pub fn servername(mut self, name: impl Into<String>) -> Self {
        self.servername = Some(name.into());
        self
    }

    /// Enable/disable peer certificate verification
    ///
    /// Verification uses the system trust store.
    pub fn verify_peer(mut self, verify: bool) -> Result<Self, TlsError> {
        self.verify_peer = verify;
        if verify {
            self.ctx_builder.set_default_verify_paths()?;
            self.ctx_builder.set_verify(SslVerifyMode::PEER);
        } else {
            self.ctx_builder.set_verify(SslVerifyMode::NONE);
        }
        Ok(self)
    }

    /// Build the TLS configuration
    pub fn build(self) -> TlsConfig {
        TlsConfig {
            ctx: self.ctx_builder.build(),
            is_server: false,
            servername: self.servername,
            verify_peer: self.verify_peer,
        }
    }
}

/// Server configuration builder
pub struct ServerConfigBuilder {
    ctx_builder: SslContextBuilder,
    has_cert: bool,
    has_key: bool,
}

impl ServerConfigBuilder {
    fn new() -> Result<Self, TlsError> {
        let ctx_builder = SslContextBuilder::new(SslMethod::tls_server())?;

        Ok(ServerConfigBuilder {
            ctx_builder,
            has_cert: false,
            has_key: false,
        })
    }

    /// Load the server certificate chain from a PEM file
    pub fn cert_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TlsError> {
        let path = path.as_ref();
        self.ctx_builder
            .set_certificate_chain_file(path)
            .map_err(|e| {
                TlsError::Certificate(format!(
                    "Failed to load certificate '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        self.has_cert = true;
        Ok(self)
    }

    /// Load the server private key from a PEM file
    pub fn key_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TlsError> {
        let path = path.as_ref();
        self.ctx_builder
            .set_private_key_file(path, SslFiletype::PEM)
            .map_err(|e| {
                TlsError::Certificate(format!(
                    "Failed to load private key '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        self.has_key = true;
        Ok(self)
    }

    /// Build the TLS configuration
    pub fn build(self) -> Result<TlsConfig, TlsError> {
        if !self.has_cert || !self.has_key {
            return Err(TlsError::InvalidConfig(
                "Server needs both a certificate and a private key".to_string(),
            ));
        }
        self.ctx_builder.check_private_key().map_err(|e| {
            TlsError::Certificate(format!("Private key does not match certificate: {}", e))
        })?;

        Ok(TlsConfig {
            ctx: self.ctx_builder.build(),
            is_server: true,
            servername: None,
            verify_peer: false,
        })
    }
}
