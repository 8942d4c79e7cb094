//! Graph identifier allocation.
//!
//! The only route the shipped server registers. The allocation itself is a
//! database procedure; this module validates input, calls it through an
//! [`AllocationBackend`], and maps outcomes onto JSON envelopes.

mod backend;
mod controller;
mod postgres;

pub use backend::{AllocationBackend, AllocationRequest, BackendError, Row};
pub use controller::{register_routes, AllocationController, ALLOCATION_PATH, EMPTY_ALLOCATION, INVALID_INPUT};
pub use postgres::{PgAllocator, PgConnection, PgError, PgManager, ALLOCATION_QUERY};
