use http::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::io::{self, Read};
use url::form_urlencoded;
use tracing::debug;

/// Decoded request body, driven by `Content-Type`.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    /// Anything that is not a form or a JSON object, byte-for-byte.
    Raw(Vec<u8>),
    /// `application/x-www-form-urlencoded` fields.
    Form(HashMap<String, String>),
    /// `application/json` payloads that parsed successfully.
    Json(Value),
}

/// Parsed HTTP request data used by the service.
///
/// Immutable once parsed; the sandbox deep-copies what handlers may touch.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    /// HTTP method (defaults to GET when the request line is incomplete)
    pub method: Method,
    /// Path component of the request target, still percent-encoded, no query
    pub path: String,
    /// Protocol version token as received (informational)
    pub version: String,
    /// HTTP headers (lowercase names, last write wins)
    pub headers: HashMap<String, String>,
    /// Cookies from the `Cookie` header
    pub cookies: HashMap<String, String>,
    /// Decoded query string parameters (duplicate keys: last wins)
    pub query_params: HashMap<String, String>,
    /// Decoded body
    pub body: Body,
}

/// Unrecoverable protocol error; the connection gets a 400 and is closed.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// No request bytes arrived before EOF or timeout.
    Empty,
    /// The request line contained an invalid method token.
    MalformedRequestLine,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty request"),
            ParseError::MalformedRequestLine => write!(f, "malformed request line"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse a raw request byte buffer into a [`ParsedRequest`].
///
/// The head is split from the body on the first blank line; header lines
/// without a `": "` separator are silently dropped. Missing request-line
/// parts default to `GET` / `/`.
pub fn parse_request(raw: &[u8]) -> Result<ParsedRequest, ParseError> {
    if raw.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ParseError::Empty);
    }

    let (head_bytes, body_bytes) = match find_head_end(raw) {
        Some(pos) => (&raw[..pos], &raw[pos + 4..]),
        None => (raw, &raw[raw.len()..]),
    };
    let head = String::from_utf8_lossy(head_bytes);
    let mut lines = head.split("\r\n");

    let request_line = lines.next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let method = match parts.next() {
        Some(token) => token
            .parse::<Method>()
            .map_err(|_| ParseError::MalformedRequestLine)?,
        None => Method::GET,
    };
    let target = parts.next().unwrap_or("/");
    let version = parts.next().unwrap_or("HTTP/1.1").to_string();

    let mut headers = HashMap::new();
    for line in lines {
        // header lines split once on ": "; anything else is dropped
        if let Some((name, value)) = line.split_once(": ") {
            headers.insert(name.to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), q),
        None => (target.to_string(), ""),
    };
    let query_params = parse_query_params(query);
    let cookies = parse_cookies(&headers);
    let body = parse_body(&headers, body_bytes);

    debug!(
        method = %method,
        path = %path,
        header_count = headers.len(),
        cookie_count = cookies.len(),
        "request parsed"
    );

    Ok(ParsedRequest {
        method,
        path,
        version,
        headers,
        cookies,
        query_params,
        body,
    })
}

/// Decode `key=value&key=value` pairs; duplicate keys keep the last value.
pub fn parse_query_params(query: &str) -> HashMap<String, String> {
    form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Split the `Cookie` header on `;`, trim, split each pair on the first `=`.
/// Pairs without `=` are skipped.
pub fn parse_cookies(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .get("cookie")
        .map(|header| {
            header
                .split(';')
                .filter_map(|pair| {
                    let (name, value) = pair.trim().split_once('=')?;
                    let name = name.trim();
                    if name.is_empty() {
                        return None;
                    }
                    Some((name.to_string(), value.trim().to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_body(headers: &HashMap<String, String>, bytes: &[u8]) -> Body {
    let bytes = match content_length(headers) {
        Some(len) if bytes.len() > len => &bytes[..len],
        _ => bytes,
    };
    if bytes.is_empty() {
        return Body::Empty;
    }
    let content_type = headers
        .get("content-type")
        .map(String::as_str)
        .unwrap_or("")
        .to_ascii_lowercase();
    if content_type.contains("application/json") {
        // a parse failure is not fatal; the handler sees the raw bytes
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Body::Json(value),
            Err(_) => Body::Raw(bytes.to_vec()),
        }
    } else if content_type.contains("application/x-www-form-urlencoded") {
        Body::Form(
            form_urlencoded::parse(bytes)
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    } else {
        Body::Raw(bytes.to_vec())
    }
}

fn find_head_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(headers: &HashMap<String, String>) -> Option<usize> {
    headers.get("content-length")?.parse().ok()
}

/// Outcome of draining one request from a connection.
pub(crate) enum ReadOutcome {
    Request(Vec<u8>),
    TooLarge,
}

/// Read one request's bytes from the connection.
///
/// Reads cooperatively (the coroutine suspends while the socket is idle)
/// until the head and the `Content-Length`-declared body have arrived, EOF is
/// reached, or the read timeout fires. A timeout after partial data returns
/// what arrived so far, matching the one-shot read of a connection-per-request
/// client; the parser decides whether that is usable.
pub(crate) fn read_request<R: Read>(reader: &mut R, max_bytes: usize) -> io::Result<ReadOutcome> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > max_bytes {
                    return Ok(ReadOutcome::TooLarge);
                }
                if let Some(head_end) = find_head_end(&buf) {
                    let declared = head_body_length(&buf[..head_end]);
                    if buf.len() >= head_end + 4 + declared {
                        break;
                    }
                }
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(ReadOutcome::Request(buf))
}

/// Liberal `Content-Length` scan over the raw head, for the read loop only.
fn head_body_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .split("\r\n")
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .unwrap_or(0)
}

#[cfg(test)]
impl ParsedRequest {
    pub(crate) fn empty_for_tests() -> Self {
        ParsedRequest {
            method: Method::GET,
            path: "/".to_string(),
            version: "HTTP/1.1".to_string(),
            headers: HashMap::new(),
            cookies: HashMap::new(),
            query_params: HashMap::new(),
            body: Body::Empty,
        }
    }
}
