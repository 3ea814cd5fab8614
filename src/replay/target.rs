//! Replay target resolution

use crate::http::{DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT};
use std::fmt;

#[derive(Debug, thiserror::Error)]
#[error("invalid server address '{address}': {reason}")]
pub struct TargetError {
    address: String,
    reason: String,
}

impl TargetError {
    fn new(address: &str, reason: impl Into<String>) -> Self {
        TargetError {
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => DEFAULT_HTTP_PORT,
            Scheme::Https => DEFAULT_HTTPS_PORT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Where a record is replayed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: Scheme,
    /// Host name or address, without brackets
    pub host: String,
    pub port: u16,
    /// Replaces the recorded request target when set
    pub path: Option<String>,
}

impl Target {
    /// Resolve the `--server` argument
    ///
    /// Accepts `scheme://host[:port][/path]`, in which case `port` and
    /// `https` are ignored, or `host[:port][/path]`.
    pub fn parse(server: &str, port: Option<u16>, https: bool) -> Result<Self, TargetError> {
        let server = server.trim();
        if let Some((scheme, rest)) = server.split_once("://") {
            let scheme = match scheme.to_ascii_lowercase().as_str() {
                "http" => Scheme::Http,
                "https" => Scheme::Https,
                other => {
                    return Err(TargetError::new(
                        server,
                        format!("unsupported scheme '{}'", other),
                    ))
                }
            };
            let (authority, path) = split_path(rest);
            let (host, explicit) = split_host_port(server, authority)?;
            return Ok(Target {
                scheme,
                host,
                port: explicit.unwrap_or(scheme.default_port()),
                path,
            });
        }

        let scheme = if https { Scheme::Https } else { Scheme::Http };
        let (authority, path) = split_path(server);
        let (host, explicit) = split_host_port(server, authority)?;
        let port = explicit
            .or(port.filter(|&p| p > 0))
            .unwrap_or(scheme.default_port());
        Ok(Target {
            scheme,
            host,
            port,
            path,
        })
    }

    pub fn is_https(&self) -> bool {
        self.scheme == Scheme::Https
    }

    /// Value of the `Host` header; default ports are left out
    pub fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == self.scheme.default_port() {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    /// Request target to send for a recorded URL
    ///
    /// An explicit path wins. Absolute-form URLs are reduced to path and
    /// query.
    pub fn request_target(&self, recorded: &str) -> String {
        if let Some(path) = &self.path {
            return path.clone();
        }
        let target = match recorded.split_once("://") {
            Some((_, rest)) => rest.find('/').map(|p| &rest[p..]).unwrap_or("/"),
            None => recorded,
        };
        if target.is_empty() {
            "/".to_string()
        } else {
            target.to_string()
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme.as_str(), self.host_header())
    }
}

/// Split `authority[/path]`; the path keeps its leading slash
fn split_path(input: &str) -> (&str, Option<String>) {
    match input.find('/') {
        Some(pos) => (&input[..pos], Some(input[pos..].to_string())),
        None => (input, None),
    }
}

fn split_host_port(address: &str, authority: &str) -> Result<(String, Option<u16>), TargetError> {
    if authority.is_empty() {
        return Err(TargetError::new(address, "missing host"));
    }

    let (host, port) = if let Some(rest) = authority.strip_prefix('[') {
        let end = rest
            .find(']')
            .ok_or_else(|| TargetError::new(address, "unterminated IPv6 address"))?;
        let tail = &rest[end + 1..];
        let port = match tail.strip_prefix(':') {
            Some(port) => Some(port),
            None if tail.is_empty() => None,
            None => return Err(TargetError::new(address, "unexpected text after address")),
        };
        (&rest[..end], port)
    } else {
        match authority.rsplit_once(':') {
            Some((host, _)) if host.contains(':') => {
                return Err(TargetError::new(address, "too many colons in address"))
            }
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return Err(TargetError::new(address, "missing host"));
    }
    let port = match port {
        Some(port) => Some(
            port.parse::<u16>()
                .ok()
                .filter(|&p| p > 0)
                .ok_or_else(|| TargetError::new(address, format!("invalid port '{}'", port)))?,
        ),
        None => None,
    };
    Ok((host.to_string(), port))
}
