//! Request orchestration: build the POST, drive one transport session through
//! its whole lifecycle, and reduce every outcome to `Result<String, SendError>`.
//!
//! # Design
//! `RelayClient` is stateless between calls; it holds the endpoint, the API
//! key and the HTTP version. Building the request (`build_request`) is kept
//! separate from executing it so the wire format can be checked without a
//! network. Each `send_text` opens its own `Connection` and drops it before
//! returning, on success and on every failure path.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rustls::ClientConfig;
use tracing::{error, info};

use crate::error::{RequestError, SendError, TransportError};
use crate::http::{HttpRequest, HttpResponse, HttpVersion, USER_AGENT};
use crate::transport::{Connection, Endpoint};

/// Synchronous client for one text-completion style endpoint.
#[derive(Debug, Clone)]
pub struct RelayClient {
    endpoint: Endpoint,
    api_key: String,
    version: HttpVersion,
    tls_config: Option<Arc<ClientConfig>>,
}

impl RelayClient {
    pub fn new(endpoint: Endpoint, api_key: &str) -> Self {
        Self {
            endpoint,
            api_key: api_key.to_string(),
            version: HttpVersion::default(),
            tls_config: None,
        }
    }

    pub fn with_version(mut self, version: HttpVersion) -> Self {
        self.version = version;
        self
    }

    /// Use `config` instead of the default trust roots for TLS endpoints,
    /// e.g. to trust a private CA.
    pub fn with_tls_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.tls_config = Some(config);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The POST request that `send_text` would put on the wire. The body is
    /// copied byte-for-byte and never inspected; the target and header values
    /// must not contain line breaks.
    pub fn build_request(&self, target: &str, body: &str) -> Result<HttpRequest, RequestError> {
        let mut req = HttpRequest::post(target, self.version);
        req.set_header("Host", &self.endpoint.host);
        req.set_header("User-Agent", USER_AGENT);
        req.set_header("Content-Type", "application/json");
        req.set_header("Authorization", &format!("Bearer {}", self.api_key));
        req.body = body.as_bytes().to_vec();
        req.prepare_payload();
        req.validate()?;
        Ok(req)
    }

    /// POST `body` to `target` and return the response body as text.
    ///
    /// Any HTTP status counts as success; only transport failures are
    /// errors. Panics raised anywhere in the call, logging included, are
    /// caught here and reported as `SendError::Other`.
    pub fn send_text(&self, target: &str, body: &str) -> Result<String, SendError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.relay(target, body))) {
            Ok(result) => result,
            Err(payload) => {
                error!("unexpected failure: {}", panic_message(payload.as_ref()));
                Err(SendError::Other)
            }
        }
    }

    fn relay(&self, target: &str, body: &str) -> Result<String, SendError> {
        let request = self.build_request(target, body).map_err(|err| {
            error!("invalid request: {err}");
            SendError::from(err)
        })?;
        info!("{request}");

        let response = self.exchange(&request).map_err(|err| {
            error!("Network Error:\n{err}");
            SendError::from(err)
        })?;

        String::from_utf8(response.body).map_err(|err| {
            error!("response body is not valid UTF-8: {err}");
            SendError::Other
        })
    }

    fn exchange(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut conn = Connection::open_with(&self.endpoint, self.tls_config.clone())?;
        conn.write(request)?;

        let mut buffer = Vec::new();
        let response = conn.read(&mut buffer)?;
        info!("{response}");

        conn.shutdown()?;
        Ok(response)
    }
}

/// One-shot convenience over `RelayClient`.
pub fn send_text(
    host: &str,
    port: &str,
    use_tls: bool,
    target: &str,
    api_key: &str,
    body: &str,
    version: HttpVersion,
) -> Result<String, SendError> {
    RelayClient::new(Endpoint::new(host, port, use_tls), api_key)
        .with_version(version)
        .send_text(target, body)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use tracing_test::traced_test;

    fn client(port: &str) -> RelayClient {
        RelayClient::new(Endpoint::new("127.0.0.1", port, false), "INVALID KEY")
    }

    /// Accept one connection, read the full request, reply with `reply` and
    /// close.
    fn one_shot_server(reply: &'static [u8]) -> (String, thread::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port().to_string();
        let handle = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut seen = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = sock.read(&mut chunk).unwrap();
                seen.extend_from_slice(&chunk[..n]);
                if n == 0 || request_complete(&seen) {
                    break;
                }
            }
            sock.write_all(reply).unwrap();
            seen
        });
        (port, handle)
    }

    fn request_complete(seen: &[u8]) -> bool {
        let Some(end) = seen.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&seen[..end]);
        let len: usize = head
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        seen.len() >= end + 4 + len
    }

    #[test]
    fn build_request_has_fixed_headers_in_order() {
        let req = client("8080")
            .build_request("/v1/completions", r#"{"test": "data"}"#)
            .unwrap();
        let names: Vec<&str> = req.headers.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            ["Host", "User-Agent", "Content-Type", "Authorization", "Content-Length"]
        );
        assert_eq!(req.header("host"), Some("127.0.0.1"));
        assert_eq!(req.header("authorization"), Some("Bearer INVALID KEY"));
        assert_eq!(req.header("content-length"), Some("16"));
        assert_eq!(req.body, br#"{"test": "data"}"#);
    }

    #[test]
    fn build_request_does_not_validate_the_body() {
        let req = client("8080")
            .build_request("/", "not json at all \u{1F600}")
            .unwrap();
        assert_eq!(req.body, "not json at all \u{1F600}".as_bytes());
    }

    #[test]
    fn http10_client_uses_http10_request_line() {
        let req = client("8080")
            .with_version(HttpVersion::Http10)
            .build_request("/x?y=1", "")
            .unwrap();
        assert!(req.to_string().starts_with("POST /x?y=1 HTTP/1.0\r\n"));
    }

    #[test]
    fn peer_closing_after_response_is_success() {
        let (port, server) =
            one_shot_server(b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 7\r\n\r\nrelayed");
        let text = client(&port).send_text("/", "payload").unwrap();
        assert_eq!(text, "relayed");

        let seen = String::from_utf8(server.join().unwrap()).unwrap();
        assert!(seen.starts_with("POST / HTTP/1.1\r\nHost: 127.0.0.1\r\n"));
        assert!(seen.ends_with("\r\n\r\npayload"));
    }

    #[test]
    fn error_status_is_still_returned_as_text() {
        let (port, _server) =
            one_shot_server(b"HTTP/1.1 401 Unauthorized\r\nContent-Length: 13\r\n\r\ninvalid token");
        let text = client(&port).send_text("/", "{}").unwrap();
        assert_eq!(text, "invalid token");
    }

    #[test]
    fn truncated_response_is_a_connection_error() {
        let (port, _server) =
            one_shot_server(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial");
        let err = client(&port).send_text("/", "{}").unwrap_err();
        assert_eq!(err, SendError::Connection);
    }

    #[test]
    fn non_http_reply_is_a_connection_error() {
        let (port, _server) = one_shot_server(b"220 smtp.example.com ESMTP ready\r\n");
        let err = client(&port).send_text("/", "{}").unwrap_err();
        assert_eq!(err, SendError::Connection);
    }

    #[test]
    fn non_utf8_body_is_other_failure() {
        let (port, _server) = one_shot_server(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\n\xff\xfe");
        let err = client(&port).send_text("/", "{}").unwrap_err();
        assert_eq!(err, SendError::Other);
    }

    #[test]
    #[traced_test]
    fn request_and_response_are_logged() {
        let (port, _server) = one_shot_server(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}",
        );
        client(&port).send_text("/logged", r#"{"k": 1}"#).unwrap();
        assert!(logs_contain("POST /logged HTTP/1.1"));
        assert!(logs_contain("HTTP/1.1 200 OK"));
    }

    #[test]
    fn line_break_in_api_key_is_rejected_before_connecting() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let port = listener.local_addr().unwrap().port().to_string();
        let client = RelayClient::new(
            Endpoint::new("127.0.0.1", &port, false),
            "k\r\nX-Injected: 1",
        );

        assert_eq!(
            client.build_request("/", "{}").unwrap_err(),
            RequestError::Header("Authorization".to_string())
        );
        assert_eq!(client.send_text("/", "{}").unwrap_err(), SendError::Other);
        assert_eq!(
            listener.accept().unwrap_err().kind(),
            std::io::ErrorKind::WouldBlock
        );
    }

    #[test]
    fn line_break_in_target_is_rejected() {
        let err = client("8080")
            .send_text("/ HTTP/1.1\r\nX-Injected: 1\r\n", "{}")
            .unwrap_err();
        assert_eq!(err, SendError::Other);
    }

    #[test]
    fn peer_resetting_mid_request_is_a_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port().to_string();
        let server = thread::spawn(move || {
            // Closing without reading anything resets the connection.
            let (sock, _) = listener.accept().unwrap();
            drop(sock);
        });

        let body = "x".repeat(32 * 1024 * 1024);
        let err = client(&port).send_text("/", &body).unwrap_err();
        assert_eq!(err, SendError::Connection);
        server.join().unwrap();
    }

    /// Subscriber whose `info` events panic, standing in for a broken
    /// logging backend.
    struct PanicOnInfo;

    impl tracing::Subscriber for PanicOnInfo {
        fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }

        fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}

        fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}

        fn event(&self, event: &tracing::Event<'_>) {
            if *event.metadata().level() == tracing::Level::INFO {
                panic!("log sink failed");
            }
        }

        fn enter(&self, _: &tracing::span::Id) {}

        fn exit(&self, _: &tracing::span::Id) {}
    }

    #[test]
    fn panic_while_logging_the_request_is_other_failure() {
        let result = tracing::subscriber::with_default(PanicOnInfo, || {
            send_text("127.0.0.1", "1", false, "/", "k", "{}", HttpVersion::Http11)
        });
        assert_eq!(result, Err(SendError::Other));
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
