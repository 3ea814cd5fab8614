//! Capture listener
//!
//! Accepts connections (plain or TLS) and serves each one on its own
//! thread. Requests on a connection are handled one after another until the
//! client closes it, asks for `Connection: close`, or a capture fails.

use crate::capture::CaptureHandler;
use crate::http::session::FdSessionOps;
use crate::http::tls::TlsConfig;
use crate::http::{self, HttpResponse, HttpServer, SessionOps, Status};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

const BACKLOG: i32 = 1024;

/// A bound capture listener
pub struct Listener {
    inner: TcpListener,
    tls: Option<Arc<TlsConfig>>,
    handler: Arc<CaptureHandler>,
}

impl Listener {
    /// Bind `addr`; with `tls` every connection starts with a handshake
    pub fn bind(addr: SocketAddr, tls: Option<TlsConfig>, handler: CaptureHandler) -> io::Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        if addr.is_ipv6() {
            socket.set_only_v6(false)?;
        }
        socket.bind(&addr.into())?;
        socket.listen(BACKLOG)?;

        Ok(Listener {
            inner: socket.into(),
            tls: tls.map(Arc::new),
            handler: Arc::new(handler),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    pub fn handler(&self) -> &CaptureHandler {
        &self.handler
    }

    /// Accept connections until the listening socket fails
    pub fn run(self) -> io::Result<()> {
        loop {
            let (stream, peer) = match self.inner.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_transient(&e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let tls = self.tls.clone();
            let handler = Arc::clone(&self.handler);
            let spawned = thread::Builder::new()
                .name(format!("conn-{}", peer))
                .spawn(move || serve_connection(stream, peer, tls.as_deref(), &handler));
            if let Err(e) = spawned {
                warn!(%peer, error = %e, "cannot spawn connection thread");
            }
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset | io::ErrorKind::WouldBlock
    ) || matches!(err.raw_os_error(), Some(libc::EMFILE) | Some(libc::ENFILE))
}

fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    tls: Option<&TlsConfig>,
    handler: &CaptureHandler,
) {
    let _ = stream.set_nodelay(true);
    debug!(%peer, "connection accepted");

    let result = match tls {
        None => serve(HttpServer::new(FdSessionOps::new(stream)), handler),
        Some(config) => match config.accept(stream) {
            Ok(session) => serve(HttpServer::new(session), handler),
            Err(e) => {
                warn!(%peer, error = %e, "TLS handshake failed");
                return;
            }
        },
    };

    match result {
        Ok(()) => debug!(%peer, "connection closed"),
        Err(http::Error::Timeout) | Err(http::Error::ConnectionClosed) => {
            debug!(%peer, "connection dropped")
        }
        Err(e) => warn!(%peer, error = %e, "connection failed"),
    }
}

/// Serve requests on one connection
pub fn serve<S: SessionOps>(mut server: HttpServer<S>, handler: &CaptureHandler) -> http::Result<()> {
    loop {
        let head = match server.receive_request_head() {
            Ok(Some(head)) => head,
            Ok(None) => break,
            Err(e @ (http::Error::Parse(_)
            | http::Error::InvalidVersion(_)
            | http::Error::InvalidMethod(_)
            | http::Error::InvalidHeader(_)
            | http::Error::HeadTooLarge)) => {
                let response = HttpResponse::builder()
                    .status(Status::BAD_REQUEST)
                    .header("Connection", "close")
                    .body(format!("{}\n", e).into_bytes())
                    .build();
                let _ = server.send_response(&response);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        if head.expects_continue() {
            server.send_continue()?;
        }

        let mut response = {
            let mut body = server.request_body(&head)?;
            let response = handler.handle(&head, &mut body);
            if !response.headers().has_token("Connection", "close") && !body.is_finished() {
                body.drain()?;
            }
            response
        };

        let close = !head.keep_alive() || response.headers().has_token("Connection", "close");
        if close && !response.headers().contains("Connection") {
            response.headers_mut().set("Connection", "close");
        }
        server.send_response(&response)?;
        if close {
            break;
        }
    }

    server.close()
}
