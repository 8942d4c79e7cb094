//! Error types for the HTTP server.

use thiserror::Error;

use crate::parser::{Error as ParserError, Method};

/// Errors that can occur during HTTP server operation.
///
/// None of these abort the accept loop; per-connection errors are logged and
/// the connection is dropped after its single response.
#[derive(Debug, Error)]
pub enum Error {
    /// Error parsing an HTTP request.
    #[error("Parse error: {0}")]
    ParseError(#[from] ParserError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The request exceeded the configured buffer limit.
    #[error("Request exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The method is not handed to the dispatcher.
    #[error("Method {0} not allowed for path: {1}")]
    MethodNotAllowed(Method, String),

    /// The peer closed the connection before the request was complete.
    #[error("Connection closed after {0} bytes of an incomplete request")]
    IncompleteRequest(usize),

    /// Forking or supervising serving processes failed.
    #[error("Process error: {0}")]
    Process(String),
}
