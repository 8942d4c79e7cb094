//! The allocation request and the backend seam.

use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::allocation::postgres::PgError;
use crate::parser::HttpRequest;
use crate::pool::PoolError;

/// One result row, column name to value.
pub type Row = Map<String, Value>;

/// Body of `POST /id_allocation/allocation`.
///
/// Missing fields fall back to empty values so that validation, not
/// deserialization, decides what is acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AllocationRequest {
    #[serde(default)]
    pub graph_id: String,
    #[serde(default)]
    pub updated_nanosecond: i64,
    #[serde(default)]
    pub vids: Vec<String>,
}

impl AllocationRequest {
    /// Parse and validate the body of `request`.
    ///
    /// Returns `None` for an empty or non-JSON body, a wrongly typed field,
    /// an empty `graph_id`, a zero `updated_nanosecond`, or an empty `vids`.
    /// Vertex ids are opaque strings and are passed through untouched.
    pub fn from_request(request: &HttpRequest) -> Option<Self> {
        if request.body.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        match request.json::<AllocationRequest>() {
            Ok(parsed) => parsed.is_valid().then_some(parsed),
            Err(e) => {
                debug!("Rejecting allocation body: {e}");
                None
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.graph_id.is_empty() && self.updated_nanosecond != 0 && !self.vids.is_empty()
    }
}

/// Failures talking to the allocation backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Postgres(#[from] PgError),

    #[error(transparent)]
    Pool(#[from] PoolError<PgError>),
}

/// Runs the external allocation procedure.
///
/// Called on a worker thread; implementations may block.
pub trait AllocationBackend: Send + Sync {
    /// Allocate ids for `request`, returning the procedure's rows.
    fn allocate(&self, request: &AllocationRequest) -> Result<Vec<Row>, BackendError>;
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::parser::{HttpVersion, Method};

    fn parse(body: &[u8]) -> Option<AllocationRequest> {
        let request = HttpRequest::with_body(Method::POST, "/id_allocation/allocation", HttpVersion::Http10, HashMap::new(), body.to_vec());
        AllocationRequest::from_request(&request)
    }

    #[test]
    fn test_valid_body() {
        let request = parse(br#"{"graph_id":"g1","updated_nanosecond":1000,"vids":["v1","v2"]}"#).unwrap();
        assert_eq!(request.graph_id, "g1");
        assert_eq!(request.updated_nanosecond, 1000);
        assert_eq!(request.vids, vec!["v1".to_string(), "v2".to_string()]);
    }

    #[test]
    fn test_invalid_bodies() {
        let cases: [&[u8]; 9] = [
            b"",
            b"  \n",
            b"not json",
            br#"{"updated_nanosecond":1000,"vids":["v1"]}"#,
            br#"{"graph_id":"","updated_nanosecond":1000,"vids":["v1"]}"#,
            br#"{"graph_id":"g1","vids":["v1"]}"#,
            br#"{"graph_id":"g1","updated_nanosecond":1000,"vids":[]}"#,
            br#"{"graph_id":"g1","updated_nanosecond":1000}"#,
            br#"{"graph_id":"g1","updated_nanosecond":"1000","vids":["v1"]}"#,
        ];
        for body in cases {
            assert!(parse(body).is_none(), "accepted {}", String::from_utf8_lossy(body));
        }
    }

    #[test]
    fn test_vids_are_opaque() {
        let request = parse(br#"{"graph_id":"g'1","updated_nanosecond":-5,"vids":["a','b","]"]}"#).unwrap();
        assert_eq!(request.graph_id, "g'1");
        assert_eq!(request.vids, vec!["a','b".to_string(), "]".to_string()]);
    }
}
