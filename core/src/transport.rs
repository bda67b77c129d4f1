//! Plain-TCP and TLS-over-TCP behind one write/read/shutdown contract.
//!
//! # Design
//! `Connection` is a tagged variant: a session owns either a bare
//! `TcpStream` or a rustls stream wrapping one, never both. Each operation is
//! a `match` with one arm per variant. `shutdown` takes `self` by value, so
//! once a session is closed the compiler rules out any further I/O on it.
//! Dropping a `Connection` on an error path closes the socket.

use std::io::{self, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;

use rustls::{ClientConfig, ClientConnection, StreamOwned};
use tracing::debug;

use crate::codec;
use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};
use crate::tls;

/// Where to send a request. Immutable for the lifetime of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: String,
    pub use_tls: bool,
}

impl Endpoint {
    pub fn new(host: &str, port: &str, use_tls: bool) -> Self {
        Self {
            host: host.to_string(),
            port: port.to_string(),
            use_tls,
        }
    }
}

/// One transport session.
pub enum Connection {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Connection {
    /// Resolve, connect and, for TLS, complete the handshake using the
    /// default trust roots.
    pub fn open(endpoint: &Endpoint) -> Result<Self, TransportError> {
        Self::open_with(endpoint, None)
    }

    /// Like `open`, with an optional TLS config replacing the default one.
    /// The config is ignored for plain endpoints.
    pub fn open_with(
        endpoint: &Endpoint,
        tls_config: Option<Arc<ClientConfig>>,
    ) -> Result<Self, TransportError> {
        if endpoint.use_tls {
            // SNI is fixed before any name lookup or bytes on the wire.
            let config = tls_config.unwrap_or_else(tls::client_config);
            let session = tls::client_session(&endpoint.host, config)?;
            let tcp = connect_first(endpoint, &resolve(endpoint)?)?;
            let mut stream = StreamOwned::new(session, tcp);
            while stream.conn.is_handshaking() {
                stream
                    .conn
                    .complete_io(&mut stream.sock)
                    .map_err(TransportError::Handshake)?;
            }
            debug!(
                host = %endpoint.host,
                version = ?stream.conn.protocol_version(),
                "tls handshake complete"
            );
            Ok(Connection::Tls(Box::new(stream)))
        } else {
            let tcp = connect_first(endpoint, &resolve(endpoint)?)?;
            Ok(Connection::Plain(tcp))
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Connection::Tls(_))
    }

    /// Write the whole request to the active stream.
    pub fn write(&mut self, request: &HttpRequest) -> Result<(), TransportError> {
        let wire = request.encode();
        match self {
            Connection::Plain(stream) => {
                stream.write_all(&wire)?;
                stream.flush()?;
            }
            Connection::Tls(stream) => {
                stream.write_all(&wire)?;
                stream.flush()?;
            }
        }
        debug!(bytes = wire.len(), "request written");
        Ok(())
    }

    /// Read one complete response, using `buffer` as scratch space.
    pub fn read(&mut self, buffer: &mut Vec<u8>) -> Result<HttpResponse, TransportError> {
        let response = match self {
            Connection::Plain(stream) => codec::read_response(stream, buffer)?,
            Connection::Tls(stream) => codec::read_response(stream.as_mut(), buffer)?,
        };
        debug!(status = response.status, bytes = response.body.len(), "response read");
        Ok(response)
    }

    /// Orderly close of the active stream.
    ///
    /// TLS sends close-notify and half-closes the socket; a peer that is
    /// already gone (end of stream, broken pipe, reset, not connected) is
    /// not an error.
    /// Plain sockets shut down both directions and tolerate only end of
    /// stream.
    pub fn shutdown(self) -> Result<(), TransportError> {
        let result = match self {
            Connection::Tls(mut stream) => {
                stream.conn.send_close_notify();
                match stream.flush().and_then(|()| stream.sock.shutdown(Shutdown::Write)) {
                    Err(e) if peer_already_closed(&e) => {
                        debug!("tls peer closed before close-notify: {e}");
                        Ok(())
                    }
                    other => other,
                }
            }
            Connection::Plain(stream) => stream.shutdown(Shutdown::Both),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(()),
            Err(e) => Err(TransportError::Shutdown(e)),
        }
    }
}

fn peer_already_closed(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::NotConnected
    )
}

fn resolve(endpoint: &Endpoint) -> Result<Vec<std::net::SocketAddr>, TransportError> {
    let resolve_err = |reason: String| TransportError::Resolve {
        host: endpoint.host.clone(),
        port: endpoint.port.clone(),
        reason,
    };

    let port: u16 = endpoint
        .port
        .parse()
        .map_err(|_| resolve_err(format!("invalid port {:?}", endpoint.port)))?;
    let addrs: Vec<_> = (endpoint.host.as_str(), port)
        .to_socket_addrs()
        .map_err(|e| resolve_err(e.to_string()))?
        .collect();
    if addrs.is_empty() {
        return Err(resolve_err("no addresses".into()));
    }
    debug!(host = %endpoint.host, candidates = addrs.len(), "resolved");
    Ok(addrs)
}

/// Connect to the first reachable candidate.
fn connect_first(
    endpoint: &Endpoint,
    addrs: &[std::net::SocketAddr],
) -> Result<TcpStream, TransportError> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                debug!(%addr, "connected");
                return Ok(stream);
            }
            Err(e) => {
                debug!(%addr, "connect failed: {e}");
                last_err = Some(e);
            }
        }
    }
    Err(TransportError::Connect {
        host: endpoint.host.clone(),
        port: endpoint.port.clone(),
        source: last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses")),
    })
}
