//! Command-line configuration
//!
//! `reqrec server` records requests, `reqrec req` replays one record. The
//! raw clap arguments are resolved into [`ServerConfig`] and
//! [`ReplayConfig`], which carry only validated values.

use crate::capture::{CaptureHandler, Responder, SequenceAllocator};
use crate::http::tls::{TlsConfig, TlsError};
use crate::http::Status;
use crate::listener::Listener;
use crate::replay::{Auth, ReplayBuilder, SendOptions, Target, TargetError};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

pub const DEFAULT_HTTP_LISTEN: &str = ":8080";
pub const DEFAULT_HTTPS_LISTEN: &str = ":443";
pub const DEFAULT_CERT_FILE: &str = "cert.pem";
pub const DEFAULT_KEY_FILE: &str = "key.pem";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid listen address '{0}'")]
    InvalidListen(String),

    #[error("TLS {0} file is required")]
    MissingTlsFile(&'static str),

    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    #[error("invalid document root: {0}")]
    DocumentRoot(io::Error),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Request recorder
#[derive(Parser, Debug)]
#[command(name = "reqrec", version, about = "Record HTTP requests and replay them")]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, env = "REQREC_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the recording server
    Server(ServerArgs),
    /// Replay a recorded request
    Req(ReqArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Listen address, ':8080' by default or ':443' for HTTPS
    #[arg(short, long, env = "REQREC_LISTEN")]
    pub listen: Option<String>,

    /// Serve HTTPS
    #[arg(short = 'H', long, env = "REQREC_HTTPS")]
    pub https: bool,

    /// TLS certificate file (PEM), 'cert.pem' by default
    #[arg(short, long, env = "REQREC_CERT")]
    pub cert: Option<PathBuf>,

    /// TLS private key file (PEM), 'key.pem' by default
    #[arg(short, long, env = "REQREC_KEY")]
    pub key: Option<PathBuf>,

    /// Directory record files are saved to
    #[arg(short, long, env = "REQREC_SAVE", default_value = "./")]
    pub save: PathBuf,

    /// Number of the last existing record; 0 scans the save directory
    #[arg(short = 'C', long, env = "REQREC_NUM", default_value_t = 0, allow_negative_numbers = true)]
    pub num: i64,

    /// Status code of the canned response
    #[arg(short = 'S', long, env = "REQREC_STATUS", default_value_t = 200)]
    pub status: u16,

    /// Body of the canned response, the status reason phrase by default
    #[arg(short, long, env = "REQREC_BODY", default_value = "")]
    pub body: String,

    /// Serve static files from this directory instead of the canned response
    #[arg(short, long, env = "REQREC_WWWROOT")]
    pub wwwroot: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ReqArgs {
    /// Record file to replay
    #[arg(short, long)]
    pub file: PathBuf,

    /// Server address; a full URL also replaces the recorded path
    #[arg(short, long, env = "REQREC_SERVER", default_value = "localhost")]
    pub server: String,

    /// Server port, 80 or 443 by default
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Use HTTPS
    #[arg(short = 'H', long)]
    pub https: bool,

    /// Skip certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Basic authentication as user:password
    #[arg(long, env = "REQREC_BASIC")]
    pub basic: Option<String>,

    /// Bearer token, takes precedence over --basic
    #[arg(long, env = "REQREC_BEARER")]
    pub bearer: Option<String>,

    /// Log connection and handshake progress
    #[arg(short, long)]
    pub verbose: bool,

    /// Send the recorded Content-Encoding header again
    #[arg(long)]
    pub restore_encoding: bool,
}

/// Certificate and key for an HTTPS listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Resolved `server` configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub tls: Option<TlsFiles>,
    pub save_dir: PathBuf,
    /// Last number already used; `None` to scan the save directory
    pub start: Option<u64>,
    pub responder: Responder,
}

impl ServerConfig {
    pub fn from_args(args: &ServerArgs) -> Result<Self, ConfigError> {
        let wants_tls = args.https || (args.cert.is_some() && args.key.is_some());
        let tls = if wants_tls {
            let (cert, key) = match (&args.cert, &args.key) {
                (None, None) => (PathBuf::from(DEFAULT_CERT_FILE), PathBuf::from(DEFAULT_KEY_FILE)),
                (Some(cert), Some(key)) => (cert.clone(), key.clone()),
                (None, Some(_)) => return Err(ConfigError::MissingTlsFile("certificate")),
                (Some(_), None) => return Err(ConfigError::MissingTlsFile("key")),
            };
            Some(TlsFiles { cert, key })
        } else {
            None
        };

        let listen = match &args.listen {
            Some(listen) if !listen.is_empty() => listen.as_str(),
            _ if wants_tls => DEFAULT_HTTPS_LISTEN,
            _ => DEFAULT_HTTP_LISTEN,
        };

        let status = Status::new(args.status).map_err(|_| ConfigError::InvalidStatus(args.status))?;
        let responder = match &args.wwwroot {
            Some(root) => Responder::static_files(root).map_err(ConfigError::DocumentRoot)?,
            None => Responder::canned(status, &args.body),
        };

        Ok(ServerConfig {
            listen: parse_listen(listen)?,
            tls,
            save_dir: args.save.clone(),
            start: u64::try_from(args.num).ok().filter(|&n| n > 0),
            responder,
        })
    }

    /// Allocator continuing after `start`, or after the records in the save directory
    pub fn sequence(&self) -> io::Result<SequenceAllocator> {
        match self.start {
            Some(start) => Ok(SequenceAllocator::new(start)),
            None => SequenceAllocator::for_dir(&self.save_dir),
        }
    }

    pub fn tls_config(&self) -> Result<Option<TlsConfig>, TlsError> {
        let Some(files) = &self.tls else {
            return Ok(None);
        };
        let config = TlsConfig::server()?
            .cert_file(&files.cert)?
            .key_file(&files.key)?
            .build()?;
        Ok(Some(config))
    }

    /// Create the save directory and bind the listener
    pub fn bind(self) -> Result<Listener, ConfigError> {
        fs::create_dir_all(&self.save_dir)?;
        let sequence = self.sequence()?;
        let tls = self.tls_config()?;
        let handler = CaptureHandler::new(self.save_dir, sequence, self.responder);
        Ok(Listener::bind(self.listen, tls, handler)?)
    }
}

/// Resolve a listen address; `:port` binds every interface
pub fn parse_listen(listen: &str) -> Result<SocketAddr, ConfigError> {
    let invalid = || ConfigError::InvalidListen(listen.to_string());
    let address = match listen.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => listen.to_string(),
    };
    address
        .to_socket_addrs()
        .map_err(|_| invalid())?
        .next()
        .ok_or_else(invalid)
}

/// Resolved `req` configuration
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub record: PathBuf,
    pub target: Target,
    pub auth: Option<Auth>,
    pub restore_encoding: bool,
    pub options: SendOptions,
}

impl ReplayConfig {
    pub fn from_args(args: &ReqArgs) -> Result<Self, ConfigError> {
        let target = Target::parse(&args.server, args.port, args.https)?;
        let auth = match (&args.bearer, &args.basic) {
            (Some(token), _) if !token.is_empty() => Some(Auth::Bearer(token.clone())),
            (_, Some(credentials)) if !credentials.is_empty() => {
                Some(Auth::Basic(credentials.clone()))
            }
            _ => None,
        };

        Ok(ReplayConfig {
            record: args.file.clone(),
            target,
            auth,
            restore_encoding: args.restore_encoding,
            options: SendOptions {
                insecure: args.insecure,
                verbose: args.verbose,
                timeout: None,
            },
        })
    }

    pub fn builder(&self) -> ReplayBuilder {
        ReplayBuilder::new(self.target.clone())
            .auth(self.auth.clone())
            .restore_encoding(self.restore_encoding)
    }
}
