//! HTTP request parsing and representation.

use std::collections::HashMap;
use std::str::FromStr;
use serde::de::DeserializeOwned;

use crate::parser::error::Error;
use crate::parser::method::Method;
use crate::parser::version::HttpVersion;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Represents an HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The raw request target, including any query string
    pub target: String,
    /// The request path without the query string; this is what routes match on
    pub path: String,
    /// The HTTP version
    pub version: HttpVersion,
    /// The HTTP headers
    pub headers: HashMap<String, String>,
    /// The request body
    pub body: Vec<u8>,
    /// Query parameters parsed from the target
    pub query_params: HashMap<String, String>,
}

impl HttpRequest {
    /// Create a new HTTP request with an empty body.
    ///
    /// The query string, if any, is split off `target` and decoded into
    /// `query_params`.
    pub fn new(method: Method, target: impl Into<String>, version: HttpVersion, headers: HashMap<String, String>) -> Self {
        let target = target.into();
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), query),
            None => (target.clone(), ""),
        };

        // Form decoding: `+` is a space and percent escapes are resolved.
        let query_params = serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .map(|pairs| pairs.into_iter().collect())
            .unwrap_or_default();

        Self {
            method,
            target,
            path,
            version,
            headers,
            body: Vec::new(),
            query_params,
        }
    }

    /// Create a new HTTP request with a body.
    pub fn with_body(method: Method, target: impl Into<String>, version: HttpVersion, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        let mut request = Self::new(method, target, version, headers);
        request.body = body;
        request
    }

    /// Get a header value by case-insensitive name.
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers
            .iter()
            .find_map(|(k, v)| k.eq_ignore_ascii_case(name).then_some(v))
    }

    /// Check if a header exists.
    pub fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }

    /// The declared body length; zero when no `Content-Length` header is sent.
    pub fn content_length(&self) -> Result<usize, Error> {
        match self.get_header("Content-Length") {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map_err(|_| Error::InvalidContentLength(value.clone())),
            None => Ok(0),
        }
    }

    /// Deserialize the body as JSON.
    ///
    /// Unlike a strict API server this does not insist on a JSON content type;
    /// clients posting with `curl -d` send `application/x-www-form-urlencoded`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Get a query parameter value.
    pub fn get_query_param(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }

    /// Check if a query parameter exists.
    pub fn has_query_param(&self, name: &str) -> bool {
        self.query_params.contains_key(name)
    }
}

/// Locate the end of the request head.
///
/// Returns the offset just past the blank line that terminates the headers,
/// or `None` if the terminator has not been received yet.
pub fn find_head_end(input: &[u8]) -> Option<usize> {
    input
        .windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
        .map(|pos| pos + HEAD_TERMINATOR.len())
}

/// Parse the request line and headers.
///
/// Returns the request (with an empty body) and the number of bytes the head
/// occupies. If no head terminator is present the whole input is treated as
/// the head.
pub fn parse_head(input: &[u8]) -> Result<(HttpRequest, usize), Error> {
    let head_len = find_head_end(input).unwrap_or(input.len());

    let head = std::str::from_utf8(&input[..head_len])
        .map_err(|_| Error::MalformedRequestLine("Invalid UTF-8".to_string()))?;

    let mut lines = head.lines();

    let request_line = match lines.next() {
        Some(line) if !line.trim().is_empty() => line,
        _ => return Err(Error::EmptyRequest),
    };

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(Error::MalformedRequestLine(request_line.to_string()));
    }

    let method = Method::from_str(parts[0])?;

    let target = parts[1];
    if !target.starts_with('/') {
        return Err(Error::InvalidPath(target.to_string()));
    }

    let version = HttpVersion::from_str(parts[2])?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidHeaderFormat(line.to_string()))?;

        headers.insert(name.trim().to_string(), value.trim().to_string());
    }

    if version.requires_host() && !headers.keys().any(|k| k.eq_ignore_ascii_case("Host")) {
        return Err(Error::MissingHeader("Host".to_string()));
    }

    Ok((HttpRequest::new(method, target, version, headers), head_len))
}

/// Parse a complete HTTP request from a byte slice.
///
/// The body is taken from the bytes after the head, truncated to the declared
/// `Content-Length`. Bytes beyond it are ignored since each connection carries
/// a single request.
pub fn parse_request(input: &[u8]) -> Result<HttpRequest, Error> {
    let (mut request, head_len) = parse_head(input)?;

    let rest = &input[head_len..];
    let declared = request.content_length()?;
    request.body = rest[..declared.min(rest.len())].to_vec();

    Ok(request)
}
