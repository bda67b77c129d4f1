//! Error types for the text relay.
//!
//! # Design
//! Callers only ever see `SendError`, a closed two-variant enum: either the
//! network exchange failed somewhere (`Connection`) or something nobody
//! anticipated happened (`Other`). The transport layer reports the precise
//! cause as a `TransportError`; the orchestrator logs that detail and then
//! collapses it into `SendError::Connection`. A request that cannot be
//! framed safely is a `RequestError` and becomes `SendError::Other`.

use std::io;

/// Errors returned by `send_text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// Resolution, connect, SNI setup, TLS handshake, write, read, or a
    /// shutdown fault that is not a tolerated end-of-stream.
    #[error("connection error")]
    Connection,

    /// Any other fault, including panics caught at the call boundary.
    #[error("unexpected failure")]
    Other,
}

/// Detailed transport failures. Internal to the exchange; mapped to
/// `SendError::Connection` at the call boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The host/port pair could not be resolved to any address.
    #[error("failed to resolve {host}:{port}: {reason}")]
    Resolve {
        host: String,
        port: String,
        reason: String,
    },

    /// None of the resolved addresses accepted a TCP connection.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: String,
        #[source]
        source: io::Error,
    },

    /// The host could not be used as a TLS server name.
    #[error("failed to set SNI hostname {0:?}")]
    Sni(String),

    /// The TLS client session could not be created.
    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),

    /// The TLS handshake did not complete.
    #[error("tls handshake failed: {0}")]
    Handshake(#[source] io::Error),

    /// I/O error while writing the request or reading the response.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The peer sent something that is not a well-framed HTTP/1.x response.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Orderly close failed with something other than end-of-stream.
    #[error("shutdown error: {0}")]
    Shutdown(#[source] io::Error),
}

/// A request that cannot be put on the wire as written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("request target contains a line break")]
    Target,

    #[error("header {0:?} contains a line break")]
    Header(String),
}

impl From<httparse::Error> for TransportError {
    fn from(err: httparse::Error) -> Self {
        TransportError::Malformed(err.to_string())
    }
}

impl From<TransportError> for SendError {
    fn from(_: TransportError) -> Self {
        SendError::Connection
    }
}

impl From<RequestError> for SendError {
    fn from(_: RequestError) -> Self {
        SendError::Other
    }
}
