//! Blocking text relay over HTTP/1.x, plain or TLS.
//!
//! # Overview
//! `send_text` POSTs one opaque text payload (typically a JSON prompt for a
//! completions API) to `host:port`, optionally over TLS, and returns the
//! whole response body as text. Every failure is reduced to the closed
//! `SendError` enum.
//!
//! # Design
//! - `transport::Connection` is a tagged variant over a plain `TcpStream` and
//!   a rustls stream, with one write/read/shutdown contract for both.
//! - `codec` reads exactly one fully buffered HTTP/1.x response.
//! - `client::RelayClient` builds the request, logs request and response
//!   dumps through `tracing`, drives one connection through its lifecycle,
//!   and is the single point where unexpected faults become `SendError::Other`.
//! - No pooling, retries, redirects or URL parsing; each call owns its
//!   connection from open to shutdown.

pub mod client;
pub mod codec;
pub mod error;
pub mod http;
pub mod tls;
pub mod transport;

pub use client::{send_text, RelayClient};
pub use error::{RequestError, SendError, TransportError};
pub use http::{HttpRequest, HttpResponse, HttpVersion};
pub use transport::{Connection, Endpoint};
