//! Sending a rebuilt request

use super::builder::OutboundRequest;
use super::target::Target;
use crate::http::session::FdSessionOps;
use crate::http::tls::TlsConfig;
use crate::http::{self, HttpClient, ResponseHead, SessionOps};
use crate::record::{Error, Result};
use std::io::{self, Write};
use std::net::TcpStream;
use std::time::Duration;
use tracing::info;

/// Connection settings for a replay
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Skip certificate verification for HTTPS targets
    pub insecure: bool,
    /// Log connection and handshake progress
    pub verbose: bool,
    /// Per-operation timeout, the session default when unset
    pub timeout: Option<Duration>,
}

/// Send `request` to `target` and copy the response body into `out`
pub fn send<W: Write + ?Sized>(
    request: OutboundRequest,
    target: &Target,
    options: &SendOptions,
    out: &mut W,
) -> Result<ResponseHead> {
    let stream = connect(target, options.verbose)?;

    if !target.is_https() {
        return exchange(HttpClient::new(FdSessionOps::new(stream)), request, options, out);
    }

    let config = TlsConfig::client()?
        .servername(target.host.as_str())
        .verify_peer(!options.insecure)?
        .build();
    if options.verbose {
        info!("TLS handshake ...");
    }
    let session = match config.connect(stream) {
        Ok(session) => session,
        Err(e) => {
            if options.verbose {
                info!("Handshake failed: {}", e);
            }
            return Err(e.into());
        }
    };
    if options.verbose {
        info!("Handshake OK ({}, {})", session.version(), session.cipher().unwrap_or("-"));
    }
    exchange(HttpClient::new(session), request, options, out)
}

fn connect(target: &Target, verbose: bool) -> Result<TcpStream> {
    if verbose {
        info!("Connecting to server '{}:{}' ...", target.host, target.port);
    }
    match TcpStream::connect((target.host.as_str(), target.port)) {
        Ok(stream) => {
            if verbose {
                info!("Connected");
            }
            let _ = stream.set_nodelay(true);
            Ok(stream)
        }
        Err(e) => {
            if verbose {
                info!("Connect failed: {}", e);
            }
            Err(e.into())
        }
    }
}

fn exchange<S: SessionOps, W: Write + ?Sized>(
    mut client: HttpClient<S>,
    mut request: OutboundRequest,
    options: &SendOptions,
    out: &mut W,
) -> Result<ResponseHead> {
    if let Some(timeout) = options.timeout {
        client.set_timeout(timeout);
    }

    let length = request.body.length();
    let method = request.head.method().to_string();
    let sent = client
        .send_request(&request.head, &mut request.body, length)
        .map_err(carried_error)?;
    tracing::debug!(method = %method, bytes = sent, "request sent");

    let head = client.receive_response_head(&method)?;
    info!("Response: {} {}", head.status().code(), head.reason());

    let mut body = client.response_body(&method, &head)?;
    io::copy(&mut body, out)?;
    out.flush()?;

    let _ = client.close();
    Ok(head)
}

/// Surface codec errors raised by the body reader as themselves
fn carried_error(err: http::Error) -> Error {
    match err {
        http::Error::Io(e) => Error::from(e),
        other => Error::Http(other),
    }
}
