//! Error types for the HTTP request parser.

use thiserror::Error;

/// Errors that can occur while parsing an HTTP request.
#[derive(Debug, Error)]
pub enum Error {
    /// The request line carries a method this server does not understand.
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// The request target is empty or does not start with `/`.
    #[error("Invalid HTTP path: {0}")]
    InvalidPath(String),

    /// The request line does not have exactly three components.
    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    /// The HTTP version is not supported.
    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    /// A header required by the protocol version is missing.
    #[error("Required header is missing: {0}")]
    MissingHeader(String),

    /// A header line has no `:` separator.
    #[error("Invalid header format: {0}")]
    InvalidHeaderFormat(String),

    /// `Content-Length` is present but not a valid length.
    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    /// The request is empty.
    #[error("Empty request")]
    EmptyRequest,

    /// The body is not valid JSON for the requested type.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}
