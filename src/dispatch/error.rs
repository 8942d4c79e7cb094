//! Dispatch error types.

use thiserror::Error;

use crate::envelope::ResponseEnvelope;

/// Any failure a handler operation reports.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// What a handler operation returns.
pub type HandlerResult = Result<ResponseEnvelope, HandlerError>;

/// Failures at the dispatch layer. Both surface as HTTP 404 with the message
/// as the body; business failures travel inside a JSON envelope instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No route is registered for the path.
    #[error("no route matches {0}")]
    RouteNotFound(String),

    /// The handler operation failed or panicked.
    #[error("{operation} failed: {reason}")]
    HandlerFault { operation: String, reason: String },
}
