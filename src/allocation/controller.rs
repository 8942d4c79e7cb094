//! The allocation route handler.

use std::sync::Arc;
use log::{debug, error};
use serde_json::Value;

use crate::allocation::backend::{AllocationBackend, AllocationRequest};
use crate::dispatch::{HandlerResult, RouteRegistry};
use crate::envelope::ResponseEnvelope;
use crate::parser::HttpRequest;

pub const ALLOCATION_PATH: &str = "/id_allocation/allocation";
pub const INVALID_INPUT: &str = "Invalid input body";
pub const EMPTY_ALLOCATION: &str = "allocation ID=null";

/// Handles one allocation request. Built fresh for every request.
pub struct AllocationController {
    request: Arc<HttpRequest>,
    backend: Arc<dyn AllocationBackend>,
}

impl AllocationController {
    pub fn new(request: Arc<HttpRequest>, backend: Arc<dyn AllocationBackend>) -> Self {
        Self { request, backend }
    }

    /// Validate the body and call the backend once.
    ///
    /// Every business outcome is a JSON envelope with HTTP 200: invalid input
    /// and backend failures carry code -1 and a message, success carries the
    /// first row the procedure returned.
    pub fn allocation(&self) -> HandlerResult {
        let Some(request) = AllocationRequest::from_request(&self.request) else {
            return Ok(ResponseEnvelope::failure(INVALID_INPUT));
        };

        let rows = match self.backend.allocate(&request) {
            Ok(rows) => rows,
            Err(e) => {
                error!("allocation for graph {graph} failed: {e}", graph = request.graph_id);
                return Ok(ResponseEnvelope::failure(e.to_string()));
            }
        };

        debug!("allocation vids: {vids:?}, result: {rows:?}", vids = request.vids);

        match rows.into_iter().next() {
            Some(row) => Ok(ResponseEnvelope::success(Value::Object(row))),
            None => Ok(ResponseEnvelope::failure(EMPTY_ALLOCATION)),
        }
    }
}

/// Register the allocation route against `backend`.
pub fn register_routes(registry: &mut RouteRegistry, backend: Arc<dyn AllocationBackend>) {
    registry.register(
        ALLOCATION_PATH,
        move |request| AllocationController::new(request, Arc::clone(&backend)),
        "allocation",
        AllocationController::allocation,
    );
}
