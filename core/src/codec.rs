//! Reads one HTTP/1.x response off a blocking byte stream.
//!
//! The head is parsed with `httparse`; the body is framed by
//! `Transfer-Encoding: chunked`, `Content-Length`, or end of stream, in that
//! order of precedence. Interim `1xx` responses are skipped. The caller's
//! scratch buffer holds bytes read ahead of what has been consumed.

use std::io::{self, Read};

use crate::error::TransportError;
use crate::http::{HttpResponse, HttpVersion};

const MAX_HEAD_BYTES: usize = 64 * 1024;
const MAX_HEADERS: usize = 64;
const READ_CHUNK: usize = 8 * 1024;

struct Head {
    version: HttpVersion,
    status: u16,
    reason: String,
    headers: Vec<(String, String)>,
    len: usize,
}

enum Framing {
    Empty,
    Length(usize),
    Chunked,
    UntilClose,
}

/// Read exactly one complete response from `stream`.
pub fn read_response<R: Read>(
    stream: &mut R,
    buf: &mut Vec<u8>,
) -> Result<HttpResponse, TransportError> {
    loop {
        let head = read_head(stream, buf)?;
        buf.drain(..head.len);
        if (100..200).contains(&head.status) {
            continue;
        }

        let body = match framing(&head)? {
            Framing::Empty => Vec::new(),
            Framing::Length(len) => read_exact_body(stream, buf, len)?,
            Framing::Chunked => read_chunked_body(stream, buf)?,
            Framing::UntilClose => read_body_to_end(stream, buf)?,
        };

        return Ok(HttpResponse {
            version: head.version,
            status: head.status,
            reason: head.reason,
            headers: head.headers,
            body,
        });
    }
}

fn read_head<R: Read>(stream: &mut R, buf: &mut Vec<u8>) -> Result<Head, TransportError> {
    loop {
        if let Some(head) = parse_head(buf)? {
            return Ok(head);
        }
        if buf.len() > MAX_HEAD_BYTES {
            return Err(TransportError::Malformed("response head too large".into()));
        }
        need_more(stream, buf, "response head")?;
    }
}

fn parse_head(buf: &[u8]) -> Result<Option<Head>, TransportError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut res = httparse::Response::new(&mut headers);
    let len = match res.parse(buf)? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => return Ok(None),
    };

    let version = match res.version {
        Some(0) => HttpVersion::Http10,
        _ => HttpVersion::Http11,
    };
    let status = res
        .code
        .ok_or_else(|| TransportError::Malformed("missing status code".into()))?;
    let headers = res
        .headers
        .iter()
        .map(|h| {
            (
                h.name.to_string(),
                String::from_utf8_lossy(h.value).into_owned(),
            )
        })
        .collect();

    Ok(Some(Head {
        version,
        status,
        reason: res.reason.unwrap_or_default().to_string(),
        headers,
        len,
    }))
}

fn framing(head: &Head) -> Result<Framing, TransportError> {
    if head.status == 204 || head.status == 304 {
        return Ok(Framing::Empty);
    }

    let header = |name: &str| {
        head.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
    };

    if let Some(te) = header("transfer-encoding") {
        // Only the final coding decides the framing.
        let last = te.rsplit(',').next().unwrap_or("").trim();
        return Ok(if last.eq_ignore_ascii_case("chunked") {
            Framing::Chunked
        } else {
            Framing::UntilClose
        });
    }

    match header("content-length") {
        Some(cl) => cl
            .parse::<usize>()
            .map(Framing::Length)
            .map_err(|_| TransportError::Malformed(format!("invalid Content-Length {cl:?}"))),
        None => Ok(Framing::UntilClose),
    }
}

fn read_exact_body<R: Read>(
    stream: &mut R,
    buf: &mut Vec<u8>,
    len: usize,
) -> Result<Vec<u8>, TransportError> {
    while buf.len() < len {
        need_more(stream, buf, "response body")?;
    }
    Ok(buf.drain(..len).collect())
}

fn read_body_to_end<R: Read>(stream: &mut R, buf: &mut Vec<u8>) -> Result<Vec<u8>, TransportError> {
    loop {
        match fill(stream, buf) {
            Ok(0) => break,
            Ok(_) => {}
            // A TLS peer that skips close-notify still ends the body.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(buf.drain(..).collect())
}

fn read_chunked_body<R: Read>(
    stream: &mut R,
    buf: &mut Vec<u8>,
) -> Result<Vec<u8>, TransportError> {
    let mut body = Vec::new();
    loop {
        let (consumed, size) = loop {
            match httparse::parse_chunk_size(buf) {
                Ok(httparse::Status::Complete(parsed)) => break parsed,
                Ok(httparse::Status::Partial) => need_more(stream, buf, "chunk size")?,
                Err(_) => return Err(TransportError::Malformed("invalid chunk size".into())),
            }
        };
        buf.drain(..consumed);

        if size == 0 {
            skip_trailers(stream, buf)?;
            return Ok(body);
        }

        let size = usize::try_from(size)
            .ok()
            .filter(|s| s.checked_add(2).is_some())
            .ok_or_else(|| TransportError::Malformed("chunk too large".into()))?;
        while buf.len() < size + 2 {
            need_more(stream, buf, "chunk data")?;
        }
        if &buf[size..size + 2] != b"\r\n" {
            return Err(TransportError::Malformed("chunk not terminated by CRLF".into()));
        }
        body.extend_from_slice(&buf[..size]);
        buf.drain(..size + 2);
    }
}

/// Consume trailer fields up to and including the terminating empty line.
fn skip_trailers<R: Read>(stream: &mut R, buf: &mut Vec<u8>) -> Result<(), TransportError> {
    loop {
        match buf.windows(2).position(|w| w == b"\r\n") {
            Some(0) => {
                buf.drain(..2);
                return Ok(());
            }
            Some(end) => {
                buf.drain(..end + 2);
            }
            None => {
                if buf.len() > MAX_HEAD_BYTES {
                    return Err(TransportError::Malformed("trailers too large".into()));
                }
                need_more(stream, buf, "chunked trailer")?;
            }
        }
    }
}

fn need_more<R: Read>(
    stream: &mut R,
    buf: &mut Vec<u8>,
    what: &str,
) -> Result<(), TransportError> {
    match fill(stream, buf)? {
        0 => Err(TransportError::Malformed(format!(
            "connection closed while reading {what}"
        ))),
        _ => Ok(()),
    }
}

/// Append one read's worth of bytes to `buf`; `Ok(0)` means end of stream.
fn fill<R: Read>(stream: &mut R, buf: &mut Vec<u8>) -> io::Result<usize> {
    let start = buf.len();
    buf.resize(start + READ_CHUNK, 0);
    loop {
        match stream.read(&mut buf[start..]) {
            Ok(n) => {
                buf.truncate(start + n);
                return Ok(n);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                buf.truncate(start);
                return Err(e);
            }
        }
    }
}
