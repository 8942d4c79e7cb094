//! Per-request state.

use std::sync::Arc;

use crate::parser::{HttpRequest, Method};
use crate::server::StatusCode;

/// The state of one request from parse to response.
///
/// Owned by the connection task serving it. Handlers only see the shared,
/// immutable [`HttpRequest`]; the status and reason slots are written by the
/// dispatcher when resolution or the handler fails.
#[derive(Debug)]
pub struct RequestContext {
    request: Arc<HttpRequest>,
    /// Status to answer with; anything but 200 bypasses the envelope.
    pub status: StatusCode,
    /// Failure text written as the body of a non-200 answer.
    pub reason: String,
}

impl RequestContext {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request: Arc::new(request),
            status: StatusCode::OK,
            reason: String::new(),
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// A handle to the request that can move to a worker thread.
    pub fn shared_request(&self) -> Arc<HttpRequest> {
        Arc::clone(&self.request)
    }

    /// The route path, without query string.
    pub fn path(&self) -> &str {
        &self.request.path
    }

    pub fn method(&self) -> Method {
        self.request.method
    }

    /// Record a failure to be written instead of an envelope.
    pub fn fail(&mut self, status: StatusCode, reason: impl Into<String>) {
        self.status = status;
        self.reason = reason.into();
    }
}
