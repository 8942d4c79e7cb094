//! HTTP response types and utilities.

use std::fmt;

/// Value of the `Server` header on every response.
pub const SERVER_HEADER: &str = "id-allocation";

/// An HTTP status code.
///
/// Handlers may return arbitrary codes through a raw envelope, so this is a
/// thin wrapper over the numeric value rather than a closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const PAYLOAD_TOO_LARGE: StatusCode = StatusCode(413);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);

    /// Wrap a numeric status code.
    pub const fn from_u16(code: u16) -> Self {
        StatusCode(code)
    }

    /// The numeric value.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// True for `200 OK`.
    pub fn is_ok(&self) -> bool {
        *self == StatusCode::OK
    }

    /// Get the reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            409 => "Conflict",
            413 => "Payload Too Large",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "Unknown",
        }
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::OK
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents an HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The HTTP status code
    pub status: StatusCode,
    /// The HTTP headers, written in insertion order
    pub headers: Vec<(String, String)>,
    /// The response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a new HTTP response with the given status code and an empty body.
    pub fn new(status: StatusCode) -> Self {
        let headers = vec![
            ("Server".to_string(), SERVER_HEADER.to_string()),
            ("Connection".to_string(), "close".to_string()),
            ("Content-Length".to_string(), "0".to_string()),
        ];

        Self {
            status,
            headers,
            body: Vec::new(),
        }
    }

    /// A `text/plain` response carrying `text` as its body.
    pub fn plain(status: StatusCode, text: impl Into<String>) -> Self {
        Self::new(status)
            .with_content_type("text/plain; charset=UTF-8")
            .with_body_string(text)
    }

    /// Set the response body with a string.
    pub fn with_body_string(self, body: impl Into<String>) -> Self {
        self.with_body_bytes(body.into().into_bytes())
    }

    /// Set the response body with bytes.
    pub fn with_body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        let content_length = self.body.len().to_string();
        self.with_header("Content-Length", content_length)
    }

    /// Add a header, or replace the value of one with the same name in place.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(existing) => existing.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Set the content type.
    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        self.with_header("Content-Type", content_type)
    }

    /// Get a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Convert the response to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(128 + self.body.len());

        let status_line = format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), self.status.reason_phrase());
        bytes.extend_from_slice(status_line.as_bytes());

        for (name, value) in &self.headers {
            let header_line = format!("{name}: {value}\r\n");
            bytes.extend_from_slice(header_line.as_bytes());
        }

        bytes.extend_from_slice(b"\r\n");
        bytes.extend_from_slice(&self.body);

        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_reason_phrase() {
        assert_eq!(StatusCode::OK.reason_phrase(), "OK");
        assert_eq!(StatusCode::NOT_FOUND.reason_phrase(), "Not Found");
        assert_eq!(StatusCode::from_u16(418).reason_phrase(), "Unknown");
        assert_eq!(StatusCode::from_u16(503).reason_phrase(), "Service Unavailable");
    }

    #[test]
    fn test_http_response_creation() {
        let response = HttpResponse::new(StatusCode::OK);
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.header("Server"), Some(SERVER_HEADER));
        assert_eq!(response.header("Connection"), Some("close"));
        assert_eq!(response.header("Content-Length"), Some("0"));
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_plain_response() {
        let response = HttpResponse::plain(StatusCode::NOT_FOUND, "404");
        assert_eq!(response.body, b"404");
        assert_eq!(response.header("Content-Type"), Some("text/plain; charset=UTF-8"));
        assert_eq!(response.header("Content-Length"), Some("3"));
    }

    #[test]
    fn test_http_response_to_bytes() {
        let response = HttpResponse::new(StatusCode::OK)
            .with_content_type("text/plain")
            .with_body_string("Hello, world!");

        let bytes = response.to_bytes();
        let response_str = String::from_utf8_lossy(&bytes);

        assert!(response_str.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response_str.contains("Content-Type: text/plain\r\n"));
        assert!(response_str.contains("Content-Length: 13\r\n"));
        assert!(response_str.contains("Server: id-allocation\r\n"));
        assert!(response_str.ends_with("\r\n\r\nHello, world!"));
    }

    #[test]
    fn test_headers_written_in_insertion_order() {
        let response = HttpResponse::plain(StatusCode::METHOD_NOT_ALLOWED, "no")
            .with_header("Allow", "GET, POST")
            .with_header("content-type", "text/html");

        let bytes = response.to_bytes();
        assert_eq!(
            String::from_utf8_lossy(&bytes),
            "HTTP/1.1 405 Method Not Allowed\r\n\
             Server: id-allocation\r\n\
             Connection: close\r\n\
             Content-Length: 2\r\n\
             Content-Type: text/html\r\n\
             Allow: GET, POST\r\n\
             \r\n\
             no"
        );
        assert_eq!(response.to_bytes(), bytes);
    }

    #[test]
    fn test_unknown_status_line() {
        let bytes = HttpResponse::new(StatusCode::from_u16(299)).to_bytes();
        assert!(String::from_utf8_lossy(&bytes).starts_with("HTTP/1.1 299 Unknown\r\n"));
    }
}
