//! HTTP/1.x message types and their text serialization.
//!
//! # Design
//! `HttpRequest` and `HttpResponse` are plain data. A request knows how to
//! write itself in wire format (`encode`) and how to render itself as a
//! human-readable dump (`Display`); a response only needs the dump, since
//! parsing lives in `codec`. Headers are kept as an ordered `Vec` so the wire
//! order is exactly the insertion order.

use std::fmt;

use crate::error::RequestError;

/// The only method the relay sends.
pub const METHOD: &str = "POST";

/// Value sent in the `User-Agent` header.
pub const USER_AGENT: &str = concat!("relay-core/", env!("CARGO_PKG_VERSION"));

/// HTTP protocol version of a request or response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    #[default]
    Http11,
}

impl HttpVersion {
    /// Map the integer codes `10` and `11` to a version.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            10 => Some(HttpVersion::Http10),
            11 => Some(HttpVersion::Http11),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpVersion::Http10 => "HTTP/1.0",
            HttpVersion::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A POST request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub target: String,
    pub version: HttpVersion,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// An empty POST request for `target`.
    pub fn post(target: &str, version: HttpVersion) -> Self {
        Self {
            target: target.to_string(),
            version,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Replace the first header named `name` (case-insensitive) in place, or
    /// append it when absent.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => slot.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Set `Content-Length` from the current body.
    pub fn prepare_payload(&mut self) {
        let len = self.body.len().to_string();
        self.set_header("Content-Length", &len);
    }

    /// Check that the target and every header fit on their own line, so no
    /// value can end the head early or smuggle in extra headers.
    pub fn validate(&self) -> Result<(), RequestError> {
        if has_line_break(&self.target) {
            return Err(RequestError::Target);
        }
        match self
            .headers
            .iter()
            .find(|(name, value)| has_line_break(name) || has_line_break(value))
        {
            Some((name, _)) => Err(RequestError::Header(name.clone())),
            None => Ok(()),
        }
    }

    /// Serialize in HTTP/1.x wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256 + self.body.len());
        self.write_head(&mut out);
        out.extend_from_slice(&self.body);
        out
    }

    fn write_head(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(METHOD.as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.target.as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.version.as_str().as_bytes());
        out.extend_from_slice(b"\r\n");
        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
    }
}

/// Diagnostic dump: the request exactly as it goes on the wire, with a
/// non-UTF-8 body rendered lossily.
impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}\r\n", METHOD, self.target, self.version)?;
        write_headers(f, &self.headers)?;
        f.write_str(&String::from_utf8_lossy(&self.body))
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub version: HttpVersion,
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Diagnostic dump: status line, headers, blank line, body.
impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}\r\n", self.version, self.status, self.reason)?;
        write_headers(f, &self.headers)?;
        f.write_str(&String::from_utf8_lossy(&self.body))
    }
}

fn has_line_break(s: &str) -> bool {
    s.contains(['\r', '\n'])
}

fn write_headers(f: &mut fmt::Formatter<'_>, headers: &[(String, String)]) -> fmt::Result {
    for (name, value) in headers {
        write!(f, "{name}: {value}\r\n")?;
    }
    f.write_str("\r\n")
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HttpRequest {
        let mut req = HttpRequest::post("/v1/completions", HttpVersion::Http11);
        req.set_header("Host", "api.example.com");
        req.set_header("Content-Type", "application/json");
        req.body = br#"{"prompt":"hi"}"#.to_vec();
        req.prepare_payload();
        req
    }

    #[test]
    fn encode_writes_request_line_headers_and_body() {
        let wire = sample().encode();
        let text = String::from_utf8(wire).unwrap();
        assert_eq!(
            text,
            "POST /v1/completions HTTP/1.1\r\n\
             Host: api.example.com\r\n\
             Content-Type: application/json\r\n\
             Content-Length: 15\r\n\
             \r\n\
             {\"prompt\":\"hi\"}"
        );
    }

    #[test]
    fn http10_request_line() {
        let req = HttpRequest::post("/", HttpVersion::Http10);
        let text = String::from_utf8(req.encode()).unwrap();
        assert!(text.starts_with("POST / HTTP/1.0\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn display_matches_wire_for_text_bodies() {
        let req = sample();
        assert_eq!(req.to_string().into_bytes(), req.encode());
    }

    #[test]
    fn encoding_is_repeatable() {
        let req = sample();
        assert_eq!(req.encode(), req.encode());
        assert_eq!(req.to_string(), req.to_string());
    }

    #[test]
    fn validate_accepts_ordinary_requests() {
        assert_eq!(sample().validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_line_breaks_in_header_values() {
        let mut req = sample();
        req.set_header("Authorization", "Bearer k\r\nX-Injected: 1");
        assert_eq!(
            req.validate(),
            Err(RequestError::Header("Authorization".to_string()))
        );

        let mut req = sample();
        req.set_header("X-Note", "bare\nnewline");
        assert_eq!(req.validate(), Err(RequestError::Header("X-Note".to_string())));
    }

    #[test]
    fn validate_rejects_line_breaks_in_the_target() {
        let req = HttpRequest::post("/ HTTP/1.1\r\nHost: evil", HttpVersion::Http11);
        assert_eq!(req.validate(), Err(RequestError::Target));
    }

    #[test]
    fn set_header_replaces_in_place() {
        let mut req = sample();
        req.set_header("content-type", "text/plain");
        assert_eq!(req.headers[1], ("Content-Type".to_string(), "text/plain".to_string()));
        assert_eq!(req.headers.len(), 3);
    }

    #[test]
    fn prepare_payload_tracks_body_length() {
        let mut req = sample();
        req.body = b"abc".to_vec();
        req.prepare_payload();
        assert_eq!(req.header("content-length"), Some("3"));
    }

    #[test]
    fn version_codes() {
        assert_eq!(HttpVersion::from_code(10), Some(HttpVersion::Http10));
        assert_eq!(HttpVersion::from_code(11), Some(HttpVersion::Http11));
        assert_eq!(HttpVersion::from_code(20), None);
    }

    #[test]
    fn response_dump_has_headers_then_body() {
        let res = HttpResponse {
            version: HttpVersion::Http11,
            status: 200,
            reason: "OK".to_string(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: b"{}".to_vec(),
        };
        assert_eq!(
            res.to_string(),
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{}"
        );
        assert_eq!(res.header("CONTENT-TYPE"), Some("application/json"));
    }
}
